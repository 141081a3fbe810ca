//! Operator and display client for the announcement API.
//!
//! Usage:
//!   announce watch                         follow announcements in the terminal
//!   announce login                         unlock admin actions for 30 minutes
//!   announce post "Early release" -t warning
//!   announce disable
//!   announce status
//!   announce hash-passcode                 print the value for ANNOUNCE_PASSCODE_HASH
//!
//! Environment variables:
//!   ANNOUNCE_API_URL        server root (default: http://localhost:3001)
//!   ANNOUNCE_FALLBACK_URL   static fallback (default: <api>/announcement.json)
//!   ANNOUNCE_API_KEY        sent as X-API-Key on post/disable
//!   ANNOUNCE_PASSCODE_HASH  SHA-256 hex of the operator passcode
//!   ANNOUNCE_STATE_FILE     gate state (default: ~/.announce-gate.json)
//!   ANNOUNCE_POLL_MS        poll interval for `watch` (default: 2000)

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use portal_announce::{
    client::{
        admin::{hash_passcode, AdminPanel, GatePolicy, PasscodeGate},
        clock::Clock,
        delivery::DeliveryTimings,
        poller::AnnouncementPoller,
        service::AnnouncementService,
    },
    config::ClientConfig,
    models::announcement::AnnouncementKind,
};

#[derive(Parser)]
#[command(name = "announce", version, about = "Broadcast and follow portal announcements")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll for announcements and print them as they are shown and hidden
    Watch,
    /// Enter the operator passcode and start an admin session
    Login {
        /// Passcode; read from stdin when omitted
        #[arg(long)]
        passcode: Option<String>,
    },
    /// End the admin session
    Logout,
    /// Broadcast a new announcement
    Post {
        message: String,
        /// info, warning or success
        #[arg(short = 't', long = "type", default_value = "info")]
        kind: AnnouncementKind,
        /// Store the announcement without showing it
        #[arg(long)]
        disabled: bool,
    },
    /// Clear the current announcement
    Disable,
    /// Show backend health, the current announcement and the session state
    Status,
    /// Hash a passcode for ANNOUNCE_PASSCODE_HASH
    HashPasscode {
        /// Passcode; read from stdin when omitted
        passcode: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;

    match cli.command {
        Command::Watch => watch(&config).await,
        Command::Login { passcode } => {
            let mut gate = open_gate(&config)?;
            let passcode = match passcode {
                Some(p) => p,
                None => prompt("Passcode: ")?,
            };
            gate.authenticate(&passcode, now_ms())?;
            println!("Logged in. Session expires in 30 minutes.");
            Ok(())
        }
        Command::Logout => {
            open_gate(&config)?.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Post {
            message,
            kind,
            disabled,
        } => {
            let mut panel = panel(&config)?;
            let record = panel.create(&message, kind, !disabled).await?;
            println!("Announcement {} sent: [{}] {}", record.id, record.kind, record.message);
            Ok(())
        }
        Command::Disable => {
            panel(&config)?.disable().await?;
            println!("Announcement disabled.");
            Ok(())
        }
        Command::Status => status(&config).await,
        Command::HashPasscode { passcode } => {
            let passcode = match passcode {
                Some(p) => p,
                None => prompt("Passcode: ")?,
            };
            println!("{}", hash_passcode(&passcode));
            Ok(())
        }
    }
}

async fn watch(config: &ClientConfig) -> Result<()> {
    let service = Arc::new(AnnouncementService::from_config(config));
    let timings = DeliveryTimings {
        poll_interval: config.poll_interval,
        ..DeliveryTimings::default()
    };
    let poller = AnnouncementPoller::spawn(service, timings, Clock::system());
    let mut frames = poller.frames();

    eprintln!("Watching {} (Ctrl-C to stop)", config.api_url);
    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                match frame.render() {
                    Some(line) => println!("{line}"),
                    None => println!("-- {:?}", frame.phase),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.shutdown();
    Ok(())
}

async fn status(config: &ClientConfig) -> Result<()> {
    let service = AnnouncementService::from_config(config);

    match service.health().await {
        Ok(health) => println!("Backend: {health}"),
        Err(e) => println!("Backend: unreachable ({e})"),
    }

    match service.check_for_updates().await {
        Some(record) => println!(
            "Current: [{}] {} (id {}, published {})",
            record.kind, record.message, record.id, record.timestamp
        ),
        None => println!("Current: none"),
    }

    match config.passcode_hash {
        Some(_) => {
            let mut gate = open_gate(config)?;
            let now = now_ms();
            if let Some(remaining) = gate.lockout_remaining(now) {
                println!("Session: locked for {}s", remaining.as_secs());
            } else if gate.is_authenticated(now) {
                println!("Session: active");
            } else {
                println!("Session: logged out");
            }
        }
        None => println!("Session: ANNOUNCE_PASSCODE_HASH not set"),
    }
    Ok(())
}

fn open_gate(config: &ClientConfig) -> Result<PasscodeGate> {
    let Some(hash) = config.passcode_hash.clone() else {
        bail!("ANNOUNCE_PASSCODE_HASH is not set; generate one with `announce hash-passcode`");
    };
    PasscodeGate::open(GatePolicy::new(hash), &config.state_file)
        .with_context(|| format!("opening {}", config.state_file.display()))
}

fn panel(config: &ClientConfig) -> Result<AdminPanel> {
    let service = Arc::new(AnnouncementService::from_config(config));
    Ok(AdminPanel::new(service, config.api_key.clone(), open_gate(config)?))
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
