//! Blocker host diagnostics
//!
//! Inspects the local side of volume management without talking to the
//! storage service.
//!
//! Usage:
//!   blocker-ctl config --config /etc/blocker/blocker.toml
//!   blocker-ctl slots

use std::path::PathBuf;

use anyhow::{Context, Result};
use blocker_common::BlockerConfig;
use blocker_volume::{DevicePool, SlotOccupancy, SystemDeviceProbe};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "blocker-ctl")]
#[command(about = "Blocker host diagnostics")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, env = "BLOCKER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (overrides logging.level)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective configuration as JSON
    Config,

    /// Show local occupancy of every device slot
    Slots,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = BlockerConfig::load(args.config.as_deref()).context("load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(args.log_level.as_deref(), &config.logging.level))
        .with_writer(std::io::stderr)
        .init();

    debug!(config = ?args.config, "configuration loaded");

    match args.command {
        Commands::Config => {
            let json = serde_json::to_string_pretty(&config).context("serialize configuration")?;
            println!("{json}");
        }
        Commands::Slots => print_slots(&config),
    }

    Ok(())
}

/// `--log-level` wins over `RUST_LOG`, which wins over `logging.level`
fn log_filter(flag: Option<&str>, configured: &str) -> EnvFilter {
    let filter = match flag {
        Some(level) => EnvFilter::try_new(level),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(configured)),
    };
    filter.unwrap_or_else(|_| EnvFilter::new("info"))
}

fn print_slots(config: &BlockerConfig) {
    let pool = DevicePool::from(&config.devices);
    let probe = SystemDeviceProbe;

    println!("{:<8} {:<12} {:<12} STATUS", "SLOT", "DEVICE", "REMAPPED");
    let mut free = 0;
    for slot in pool.slots() {
        let status = match pool.occupancy(&slot, &probe) {
            SlotOccupancy::Free => {
                free += 1;
                "free"
            }
            SlotOccupancy::Legacy => "in use",
            SlotOccupancy::Remapped => "in use (remapped)",
        };
        println!(
            "{:<8} {:<12} {:<12} {status}",
            slot.letter, slot.device, slot.alt_device
        );
    }
    println!("\n{free} of {} slots free", pool.len());
}
