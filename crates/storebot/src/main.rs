// SPDX-FileCopyrightText: 2026 Storebot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storebot - the conversational shopping assistant server.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Storebot - the conversational shopping assistant server.
#[derive(Parser, Debug)]
#[command(name = "storebot", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and webhook pipeline.
    Serve,
    /// Load and validate configuration, then exit.
    CheckConfig {
        /// Validate this file instead of the layered lookup.
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) => {
            let config = match storebot_config::load_and_validate() {
                Ok(config) => config,
                Err(errors) => {
                    storebot_config::render_errors(&errors);
                    std::process::exit(1);
                }
            };
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("storebot: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig { path }) => {
            let loaded = match path.as_deref() {
                Some(path) => storebot_config::load_and_validate_path(path),
                None => storebot_config::load_and_validate(),
            };
            match loaded {
                Ok(config) => {
                    println!(
                        "storebot: config ok (listening on {}:{}, database {})",
                        config.server.host, config.server.port, config.storage.database_path
                    );
                }
                Err(errors) => {
                    storebot_config::render_errors(&errors);
                    std::process::exit(1);
                }
            }
        }
        None => {
            println!("storebot: use --help for available commands");
        }
    }
}
