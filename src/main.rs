//! ISS distance tracker service launcher.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                     GATEWAY                          │
//!   client        │  GET /?location=X                                    │
//!   ─────────────▶│  root span ─┬─▶ geolocator-service ──▶ Nominatim     │
//!                 │             │      {latitude, longitude}             │
//!                 │             └─▶ iss-distance-service ──▶ Open Notify │
//!   ◀─────────────│                    {distance, location}              │
//!                 └──────────────────────────────────────────────────────┘
//!
//!   Cross-cutting: traceparent + x-request-id + x-request-timeout-ms on
//!   every hop; spans exported as structured logs; counters on /metrics.
//! ```
//!
//! One role per process:
//!
//! ```text
//! iss-tracker gateway     [--config FILE] [--bind ADDR]
//! iss-tracker geolocator  [--config FILE] [--bind ADDR]
//! iss-tracker distance    [--config FILE] [--bind ADDR]
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use iss_tracker::config::ServiceRole;
use iss_tracker::lifecycle::{startup, LaunchOptions};

#[derive(Parser)]
#[command(name = "iss-tracker")]
#[command(version, about = "How far is the ISS from a place", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept client requests and orchestrate the two lookups
    Gateway(ServeArgs),
    /// Resolve place names to coordinates
    Geolocator(ServeArgs),
    /// Compute the distance between a location and the ISS
    Distance(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long, env = "ISS_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (role, args) = match cli.command {
        Commands::Gateway(args) => (ServiceRole::Gateway, args),
        Commands::Geolocator(args) => (ServiceRole::Geolocator, args),
        Commands::Distance(args) => (ServiceRole::Distance, args),
    };

    startup::run(LaunchOptions {
        role,
        config_path: args.config,
        bind_address: args.bind,
    })
    .await?;

    Ok(())
}
