use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use tokio::sync::mpsc;

pub const MAX_QUERIES: usize = 256;

pub type RequestId = usize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    #[default]
    Any,
    V4,
    V6,
}

impl AddressFamily {
    fn accepts(self, addr: &IpAddr) -> bool {
        match self {
            AddressFamily::Any => true,
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
        }
    }

    fn filter(self, addrs: impl IntoIterator<Item = IpAddr>) -> Vec<IpAddr> {
        let mut out = Vec::new();
        for addr in addrs {
            if self.accepts(&addr) && !out.contains(&addr) {
                out.push(addr);
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolveStatus {
    #[default]
    None,
    Waiting,
    Done,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no {family:?} address for '{host}'")]
    NotFound { host: String, family: AddressFamily },
    #[error("resolver worker unavailable")]
    WorkerGone,
    #[error("resolver i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default)]
struct Slot {
    hostname: String,
    family: AddressFamily,
    status: ResolveStatus,
    addresses: Vec<IpAddr>,
}

impl Slot {
    fn clear(&mut self) {
        *self = Slot::default();
    }
}

#[derive(Debug)]
struct Table {
    slots: Vec<Slot>,
    cache: HashMap<(String, AddressFamily), Vec<IpAddr>>,
}

impl Table {
    fn new() -> Self {
        Self {
            slots: (0..MAX_QUERIES).map(|_| Slot::default()).collect(),
            cache: HashMap::new(),
        }
    }

    fn find_empty(&self) -> Option<RequestId> {
        self.slots
            .iter()
            .position(|slot| slot.status == ResolveStatus::None)
    }
}

/// Hostname lookups, blocking or queued to a background worker.
///
/// The worker drives a single-threaded tokio runtime; finished lookups land in
/// a slot table the caller polls with [`Resolver::status`]. Successful results
/// are cached per `(host, family)`.
pub struct Resolver {
    table: Arc<Mutex<Table>>,
    requests: Option<mpsc::Sender<RequestId>>,
    worker: Option<JoinHandle<()>>,
}

impl Resolver {
    pub fn new() -> Result<Self, ResolveError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let (sender, receiver) = mpsc::channel(MAX_QUERIES);
        let table = Arc::new(Mutex::new(Table::new()));

        let worker_table = Arc::clone(&table);
        let worker = std::thread::Builder::new()
            .name("mpnet-resolver".into())
            .spawn(move || runtime.block_on(run_worker(worker_table, receiver)))?;

        Ok(Self {
            table,
            requests: Some(sender),
            worker: Some(worker),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // A panicked worker leaves the table consistent; keep serving it.
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Resolves on the calling thread unless the answer is cached.
    pub fn resolve(&self, host: &str, family: AddressFamily) -> Result<Vec<IpAddr>, ResolveError> {
        let key = (host.to_owned(), family);
        if let Some(cached) = self.lock().cache.get(&key) {
            return Ok(cached.clone());
        }

        let addrs = family.filter((host, 0).to_socket_addrs()?.map(|addr| addr.ip()));
        if addrs.is_empty() {
            return Err(ResolveError::NotFound {
                host: host.to_owned(),
                family,
            });
        }

        self.lock().cache.insert(key, addrs.clone());
        Ok(addrs)
    }

    /// Queues a lookup. Returns `None` when every slot is taken or the worker
    /// has stopped.
    pub fn queue(&self, host: &str, family: AddressFamily) -> Option<RequestId> {
        let mut table = self.lock();
        let Some(id) = table.find_empty() else {
            log::warn!("out of resolver queries");
            return None;
        };

        let cached = table.cache.get(&(host.to_owned(), family)).cloned();
        let slot = &mut table.slots[id];
        slot.hostname = host.to_owned();
        slot.family = family;

        if let Some(addresses) = cached {
            slot.addresses = addresses;
            slot.status = ResolveStatus::Done;
            return Some(id);
        }

        slot.addresses.clear();
        slot.status = ResolveStatus::Waiting;

        let sent = self
            .requests
            .as_ref()
            .is_some_and(|sender| sender.try_send(id).is_ok());
        if !sent {
            log::error!("resolver worker rejected request for '{}'", host);
            slot.clear();
            return None;
        }
        Some(id)
    }

    pub fn status(&self, id: RequestId) -> ResolveStatus {
        if id >= MAX_QUERIES {
            log::error!("resolver request {} out of range", id);
            return ResolveStatus::None;
        }
        self.lock().slots[id].status
    }

    /// Addresses of a finished request; empty unless its status is `Done`.
    pub fn addresses(&self, id: RequestId) -> Vec<IpAddr> {
        if id >= MAX_QUERIES {
            log::error!("resolver request {} out of range", id);
            return Vec::new();
        }
        let table = self.lock();
        let slot = &table.slots[id];
        if slot.status != ResolveStatus::Done {
            log::error!("resolve of '{}' didn't complete yet", slot.hostname);
            return Vec::new();
        }
        slot.addresses.clone()
    }

    /// Frees the slot. A lookup still in flight is discarded when it lands.
    pub fn erase(&self, id: RequestId) {
        if id >= MAX_QUERIES {
            log::error!("resolver request {} out of range", id);
            return;
        }
        self.lock().slots[id].clear();
    }

    /// Drops cached results for `host`, or everything when `None`.
    pub fn clear_cache(&self, host: Option<&str>) {
        let mut table = self.lock();
        match host {
            None => table.cache.clear(),
            Some(host) => table.cache.retain(|(cached, _), _| cached != host),
        }
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop.
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("resolver worker panicked");
            }
        }
    }
}

async fn run_worker(table: Arc<Mutex<Table>>, mut requests: mpsc::Receiver<RequestId>) {
    let lock = || table.lock().unwrap_or_else(|e| e.into_inner());

    while let Some(id) = requests.recv().await {
        let (hostname, family) = {
            let table = lock();
            let slot = &table.slots[id];
            if slot.status != ResolveStatus::Waiting {
                continue;
            }
            (slot.hostname.clone(), slot.family)
        };

        // Unlocked while resolving so callers can keep queueing.
        let addresses = match tokio::net::lookup_host((hostname.as_str(), 0)).await {
            Ok(addrs) => family.filter(addrs.map(|addr| addr.ip())),
            Err(e) => {
                log::debug!("lookup of '{}' failed: {}", hostname, e);
                Vec::new()
            }
        };

        let mut table = lock();
        let slot = &table.slots[id];
        // Erased or reused while we were resolving.
        if slot.status != ResolveStatus::Waiting || slot.hostname != hostname || slot.family != family
        {
            continue;
        }
        if !addresses.is_empty() {
            table.cache.insert((hostname, family), addresses.clone());
        }
        let slot = &mut table.slots[id];
        slot.status = if addresses.is_empty() {
            ResolveStatus::Error
        } else {
            ResolveStatus::Done
        };
        slot.addresses = addresses;
    }

    log::debug!("resolver worker stopped");
}
