//! Command-line interface for the fluffd Furby gateway.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fluffd_api::config::env_vars;
use fluffd_api::{build_transport, GatewayConfig, TransportKind};
use fluffd_commands::{Command as CatalogEntry, CommandRegistry};
use fluffd_devices::{discover_furbys, DEFAULT_SCAN_TIMEOUT};

/// fluffd - control Furby Connect toys over Bluetooth LE.
#[derive(Parser, Debug)]
#[command(name = "fluffd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./config.toml when present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use simulated Furbys instead of the Bluetooth adapter.
    #[arg(long, global = true)]
    simulate: bool,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP gateway.
    Serve {
        /// Host to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to.
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the command catalog as JSON.
    List {
        /// Print a readable table instead.
        #[arg(long)]
        table: bool,
    },
    /// Scan for nearby Furbys and exit.
    Scan {
        /// Scan window in seconds.
        #[arg(short, long, default_value_t = DEFAULT_SCAN_TIMEOUT.as_secs())]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if args.simulate {
        config.transport.kind = TransportKind::Simulated;
    }

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await
        }
        Command::List { table } => list_commands(table),
        Command::Scan { seconds } => run_scan(&config, Duration::from_secs(seconds)).await,
    }
}

fn init_logging(verbose: bool) {
    // JSON format for production/container environments
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "fluffd=debug" } else { "fluffd=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_directive)
            .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init();
    }
}

async fn run_server(config: GatewayConfig) -> Result<()> {
    let transport = build_transport(&config.transport).await?;
    tracing::info!(
        transport = ?config.transport.kind,
        "Starting fluffd {}",
        env!("CARGO_PKG_VERSION")
    );
    fluffd_api::run(&config, transport).await
}

fn list_commands(table: bool) -> Result<()> {
    let registry = CommandRegistry::builtin();
    if !table {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(());
    }

    for entry in registry.iter() {
        match entry {
            CatalogEntry::Direct(spec) => {
                println!("{:<16} {}", entry.name(), spec.description);
            }
            CatalogEntry::Category(category) => {
                println!("{:<16} {}", entry.name(), category.description);
                for (button, shortcut) in &category.shortcuts {
                    println!(
                        "  {:<14} {} -> {}",
                        format!("{}/{}", category.name, button),
                        shortcut.label,
                        shortcut.target
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_scan(config: &GatewayConfig, window: Duration) -> Result<()> {
    let transport = build_transport(&config.transport).await?;
    println!("Scanning for {}s...", window.as_secs());

    let found = discover_furbys(transport.as_ref(), window).await?;
    if found.is_empty() {
        println!("No Furbys found.");
    }
    for device in found {
        println!("{}  {}", device.address, device.name);
    }
    Ok(())
}
