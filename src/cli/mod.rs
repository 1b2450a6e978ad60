//! Command-line interface.

pub mod commands;
pub mod output;
pub mod runtime;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "chatdo")]
#[command(about = "Manage a to-do list by chatting", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Read configuration from this file instead of chatdo.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send one chat message and print the reply
    Chat {
        /// User the message is sent as
        #[arg(short, long)]
        user: String,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<Uuid>,

        /// The message text
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Create the database if needed and apply migrations
    Migrate,
}

/// Print an error in the selected output mode and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1)
}
