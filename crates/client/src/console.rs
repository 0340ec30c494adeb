use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use mpnet::{
    ClientEvent, ClientManager, ClientState, MessageType, NetError, PacketArgument, PacketKind,
};

use crate::command::Command;

/// Console front end: reads commands from stdin on a helper thread and
/// drives the client's poll loop.
pub struct Console {
    client: ClientManager,
    lines: Receiver<String>,
    tick_duration: Duration,
}

impl Console {
    pub fn new(client: ClientManager, tick_rate: u32) -> io::Result<Self> {
        Ok(Self {
            client,
            lines: spawn_stdin_reader()?,
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64),
        })
    }

    pub fn run(&mut self) -> Result<(), NetError> {
        loop {
            let started = Instant::now();
            self.client.poll()?;
            self.print_events();
            if self.client.state() == ClientState::Closed {
                return Ok(());
            }

            match self.lines.try_recv() {
                Ok(line) => {
                    if !self.handle_line(&line) {
                        break;
                    }
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    log::info!("stdin closed");
                    break;
                }
            }

            if let Some(rest) = self.tick_duration.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        self.client.close();
        Ok(())
    }

    /// Returns `false` once the user asked to quit.
    fn handle_line(&mut self, line: &str) -> bool {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return true,
            Err(e) => {
                println!("! {}", e);
                return true;
            }
        };
        if command == Command::Quit {
            return false;
        }
        if !self.client.is_connected() {
            println!("! still connecting to {}", self.client.host_addr());
            return true;
        }
        if let Err(e) = self.execute(command) {
            log::warn!("command failed: {}", e);
            println!("! {}", e);
        }
        true
    }

    fn execute(&mut self, command: Command) -> Result<(), NetError> {
        match command {
            Command::Ready(ready) => {
                self.client.set_ready(ready)?;
            }
            Command::Private { to, text } => self.client.send_private_message(to, &text)?,
            Command::CreateGroup(ids) => self.client.create_chat_group(&ids)?,
            Command::GroupMessage { group, text } => self.client.send_group_message(group, &text)?,
            Command::Raw(text) => {
                self.client.broadcast_packet(
                    PacketKind::SendRaw,
                    &PacketArgument::SendRaw(text.as_bytes()),
                )?;
            }
            Command::Players => self.print_players(),
            Command::Public(text) => self.client.send_public_message(&text)?,
            Command::Quit => {}
        }
        Ok(())
    }

    fn print_players(&self) {
        let session = self.client.session();
        println!("session '{}':", session.name());
        for player in session.players().values() {
            let you = if player.client_id == self.client.client_id() {
                " (you)"
            } else {
                ""
            };
            println!(
                "  [{}] {}{}{}",
                player.client_id,
                player.name,
                if player.ready { " ready" } else { "" },
                you
            );
        }
    }

    fn print_events(&mut self) {
        let events: Vec<ClientEvent> = self.client.drain_events().collect();
        for event in events {
            match event {
                ClientEvent::Connected { client_id } => {
                    println!("* connected as client {}", client_id);
                }
                ClientEvent::Disconnected { reason } => {
                    println!("* disconnected: {}", reason.as_str());
                }
                ClientEvent::SessionUpdated => {
                    let session = self.client.session();
                    log::debug!(
                        "session '{}' now has {} player(s)",
                        session.name(),
                        session.players().len()
                    );
                }
                ClientEvent::RawPacket { bytes } => {
                    println!("* raw: {}", String::from_utf8_lossy(&bytes));
                }
                ClientEvent::ChatMessage(log) => {
                    let channel = match log.data.kind {
                        MessageType::Private => String::from("pm"),
                        MessageType::Group => format!("group {}", log.data.target),
                        _ => String::from("all"),
                    };
                    println!("<{} @ {}> {}", log.from_id, channel, log.data.message);
                }
                ClientEvent::ChatGroupCreated { group } => {
                    println!("* chat group {} created", group);
                }
                ClientEvent::ChatGroupModified { group, .. } => {
                    println!("* chat group {} changed", group);
                }
                ClientEvent::ChatGroupDeleted { group } => {
                    println!("* chat group {} deleted", group);
                }
                ClientEvent::GameAction(action) => {
                    log::debug!("game action {:?}", action);
                }
                ClientEvent::Battleplan(plan) => {
                    log::debug!("battleplan {} with {} waypoints", plan.tag, plan.waypoints.len());
                }
                ClientEvent::PlayerLeft { client_id } => {
                    println!("* client {} left", client_id);
                }
                ClientEvent::PacketDropped { error } => {
                    log::warn!("dropped packet from host: {}", error);
                }
            }
        }
    }
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("mpnet-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(receiver)
}
