mod config;
mod server;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use mpnet::multiplayer::DEFAULT_CACHE_CAPACITY;
use mpnet::{DEFAULT_PORT, DEFAULT_TICK_RATE, HostConfig, PacketLossSimulation};
use server::HostServer;

#[derive(Parser)]
#[command(name = "mpnet-host")]
#[command(about = "Headless multiplayer session host")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    #[arg(long, default_value = "mpnet session")]
    session_name: String,

    #[arg(
        long,
        default_value_t = DEFAULT_CACHE_CAPACITY,
        help = "Bytes kept for retransmission"
    )]
    cache_capacity: usize,

    #[arg(long, help = "Forget cached packets once acknowledged")]
    prune_acknowledged: bool,

    #[arg(long, default_value_t = 30, help = "Seconds of silence before a client is dropped")]
    peer_timeout: u64,

    #[arg(long, help = "Enable outgoing packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let bind_addr = format!("{}:{}", args.bind, args.port);

    let packet_loss = if args.simulate_packet_loss {
        Some(PacketLossSimulation::with_loss(args.loss_percent.clamp(0.0, 100.0) / 100.0))
    } else {
        None
    };

    let config = ServerConfig {
        tick_rate: args.tick_rate,
        host: HostConfig {
            max_clients: args.max_clients,
            cache_capacity: args.cache_capacity,
            prune_acknowledged: args.prune_acknowledged,
            peer_timeout: Duration::from_secs(args.peer_timeout),
            session_name: args.session_name,
            ..Default::default()
        },
        packet_loss,
        ..Default::default()
    };

    let mut server = HostServer::new(&bind_addr, config)?;
    log::info!("host listening on {}", server.local_addr()?);

    spawn_interrupt_listener(server.running())?;
    server.run();
    log::info!("host stopped");

    Ok(())
}

/// Clears `running` on Ctrl-C so the poll loop can close the socket cleanly.
fn spawn_interrupt_listener(running: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    std::thread::Builder::new()
        .name("mpnet-interrupt".into())
        .spawn(move || {
            runtime.block_on(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("cannot listen for Ctrl-C: {}", e);
                    return;
                }
                log::info!("interrupt received");
                running.store(false, Ordering::SeqCst);
            });
        })?;
    Ok(())
}
