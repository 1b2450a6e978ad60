use anyhow::{anyhow, Result};
use tracing::info;

use crate::adapters::http::{ChatHttpConfig, ChatHttpServer};
use crate::cli::runtime::{build_services, open_database};
use crate::domain::models::Config;

/// Run the HTTP server until Ctrl-C.
pub async fn execute(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let pool = open_database(&config).await?;
    let (chat, guard) = build_services(pool, &config)?;
    let server = ChatHttpServer::new(chat, guard, ChatHttpConfig::from(&config.server));

    info!(provider = ?config.reasoning.provider, "starting chatdo server");
    server
        .serve_with_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| anyhow!(e))
}
