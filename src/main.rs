//! chatdo CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatdo::cli::runtime::load_config;
use chatdo::cli::{commands, handle_error, Cli, Commands};
use chatdo::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let _logger = LoggerImpl::init(&LogConfig::try_from(&config.logging)?)?;
            commands::serve::execute(config, host, port).await
        }
        Commands::Chat {
            user,
            conversation,
            message,
        } => {
            init_quiet_logging();
            commands::chat::execute(config, user, conversation, message.join(" "), cli.json).await
        }
        Commands::Migrate => {
            init_quiet_logging();
            commands::migrate::execute(config, cli.json).await
        }
    }
}

/// One-shot commands keep stdout for their output and only log warnings to stderr.
fn init_quiet_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
