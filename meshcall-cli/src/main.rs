use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use meshcall::RoomId;
use meshcall::client::connection::RtcConnectionFactory;
use meshcall::client::media::NoMedia;
use meshcall::client::signaling::WsConnector;
use meshcall::client::{MeshConfig, MeshCoordinator, MeshEvent};
use meshcall::model::IceServerConfig;
use meshcall::server::{RelayConfig, SignalingService};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshcall")]
#[command(bin_name = "meshcall")]
#[command(about = "Mesh video-call signaling relay and headless participant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay.
    Relay {
        #[arg(long, env = "MESHCALL_LISTEN", default_value = "0.0.0.0:3000")]
        listen: SocketAddr,

        /// STUN/TURN urls pushed to participants. Defaults to public STUN servers.
        #[arg(long, env = "MESHCALL_STUN", value_delimiter = ',')]
        stun: Vec<String>,
    },

    /// Print a fresh room id.
    NewRoom,

    /// Join a room as a participant without local media.
    Join {
        #[arg(long, env = "MESHCALL_URL", default_value = "ws://127.0.0.1:3000")]
        url: String,

        #[arg(long)]
        room: String,

        /// Also gather loopback candidates, for calls on one machine.
        #[arg(long)]
        loopback: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Relay { listen, stun } => run_relay(listen, stun).await,
        Commands::NewRoom => {
            println!("{}", RoomId::generate().to_string().green().bold());
            Ok(())
        }
        Commands::Join {
            url,
            room,
            loopback,
        } => run_join(url, room, loopback).await,
    }
}

async fn run_relay(listen: SocketAddr, stun: Vec<String>) -> Result<()> {
    let mut config = RelayConfig::default();
    if !stun.is_empty() {
        config.ice_servers = vec![IceServerConfig {
            urls: stun,
            username: None,
            credential: None,
        }];
    }

    let app = SignalingService::with_config(config).router();

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {listen}"))?;
    println!(
        "{} ws://{}/ws/{{room}}",
        "📡 Relay listening on".green().bold(),
        listen
    );
    info!("Signaling relay listening on {}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("Relay server failed")?;
    Ok(())
}

async fn run_join(url: String, room: String, loopback: bool) -> Result<()> {
    let room_id = RoomId::parse(&room).with_context(|| format!("Invalid room id '{room}'"))?;
    let connector = WsConnector::new(url);
    let factory = if loopback {
        RtcConnectionFactory::with_loopback_candidates()
    } else {
        RtcConnectionFactory::default()
    };

    let mut joined = MeshCoordinator::join(
        room_id.clone(),
        MeshConfig::default(),
        &connector,
        Arc::new(factory),
        Arc::new(NoMedia),
    )
    .await
    .context("Failed to join room")?;

    println!(
        "{} {} as {}",
        "✅ Joined".green().bold(),
        room_id,
        joined.local_id.to_string().cyan()
    );

    loop {
        tokio::select! {
            event = joined.events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
                if matches!(event, MeshEvent::RoomFailed { .. }) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "👋 Leaving...".yellow());
                joined.handle.leave().await?;
                break;
            }
        }
    }

    Ok(())
}

fn print_event(event: &MeshEvent) {
    match event {
        MeshEvent::PeerJoined { participant, role } => {
            println!("{} {} ({})", "➕".green(), participant, role);
        }
        MeshEvent::PeerConnected { participant } => {
            println!("{} {}", "🔗 connected".green(), participant);
        }
        MeshEvent::PeerDisconnected { participant } => {
            println!("{} {}", "➖ left".yellow(), participant);
        }
        MeshEvent::PeerFailed {
            participant,
            reason,
        } => {
            println!("{} {}: {}", "⚠️  failed".red(), participant, reason);
        }
        MeshEvent::RemoteTrack { participant, track } => {
            println!(
                "{} {:?} track {} from {}",
                "🎞".cyan(),
                track.kind,
                track.id,
                participant
            );
        }
        MeshEvent::RoomFailed { reason } => {
            println!("{} {}", "❌ room failed:".red().bold(), reason);
        }
    }
}
