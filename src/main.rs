//! Checkpoint/restore request interceptor.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     INTERCEPTOR                      │
//!                     │                                                      │
//!   Client Request    │  ┌─────────┐   available?  ┌──────────┐              │
//!   ──────────────────┼─▶│  http   │──────yes─────▶│ forward  │──────────────┼──▶ Application
//!                     │  │ server  │               │ + ledger │              │
//!                     │  └────┬────┘               └────▲─────┘              │
//!                     │       │ no                      │                    │
//!                     │       ▼                         │                    │
//!                     │  ┌─────────┐   drain loop       │                    │
//!                     │  │ replay  │────────────────────┘                    │
//!                     │  │  queue  │                                         │
//!                     │  └─────────┘                                         │
//!                     │                                                      │
//!                     │  ┌────────────┐  CreateSnapshot   ┌───────────────┐  │
//!                     │  │ checkpoint │──────────────────▶│               │  │
//!                     │  │coordinator │                   │  Checkpoint   │  │
//!                     │  └────────────┘                   │    daemon     │  │
//!                     │  ┌────────────┐  Stop/Reprocess/  │               │  │
//!                     │  │  control   │◀──────Reply───────│               │  │
//!                     │  │  endpoint  │                   └───────────────┘  │
//!                     │  └────────────┘                                      │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use cr_interceptor::config::load_config;
use cr_interceptor::lifecycle;
use cr_interceptor::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "cr-interceptor")]
#[command(about = "Request interceptor for checkpoint/restore of an application container", long_about = None)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, env = "INTERCEPTOR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("cr-interceptor: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "cr-interceptor starting");

    lifecycle::run(config).await?;
    Ok(())
}
