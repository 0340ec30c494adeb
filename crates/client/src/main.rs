mod command;
mod console;

use std::net::{IpAddr, SocketAddr};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;

use console::Console;
use mpnet::{
    AddressFamily, ClientConfig, ClientManager, DEFAULT_PORT, DEFAULT_TICK_RATE, ResolveStatus,
    Resolver,
};

#[derive(Parser)]
#[command(name = "mpnet-client")]
#[command(about = "Console client for an mpnet session")]
struct Args {
    #[arg(long, default_value = "127.0.0.1", help = "Host name or address")]
    host: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(long, help = "Only use IPv4 addresses")]
    ipv4: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let family = if args.ipv4 {
        AddressFamily::V4
    } else {
        AddressFamily::Any
    };

    let resolver = Resolver::new()?;
    let ip = lookup(&resolver, &args.host, family)?;
    let host_addr = SocketAddr::new(ip, args.port);

    let client = ClientManager::connect(host_addr, ClientConfig::default())?;
    println!("connecting to {} ... type /quit to leave", host_addr);

    let mut console = Console::new(client, args.tick_rate)?;
    console.run()?;
    Ok(())
}

/// Polls the resolver until `host` is looked up.
fn lookup(resolver: &Resolver, host: &str, family: AddressFamily) -> Result<IpAddr> {
    let id = resolver
        .queue(host, family)
        .context("resolver has no free request slots")?;

    let started = Instant::now();
    let status = loop {
        let status = resolver.status(id);
        if status != ResolveStatus::Waiting || started.elapsed() > Duration::from_secs(10) {
            break status;
        }
        thread::sleep(Duration::from_millis(10));
    };

    let resolved = match status {
        ResolveStatus::Done => resolver.addresses(id).first().copied(),
        _ => None,
    };
    resolver.erase(id);
    match (status, resolved) {
        (_, Some(ip)) => {
            log::info!("resolved '{}' to {}", host, ip);
            Ok(ip)
        }
        (ResolveStatus::Waiting, None) => bail!("timed out resolving '{}'", host),
        _ => bail!("could not resolve '{}'", host),
    }
}
