//! Monkeys IAM API Server
//!
//! # Usage
//!
//! ```bash
//! # Development: in-memory stores, HMAC tokens
//! MONKEYS_JWT_SECRET=dev-secret monkeys-server
//!
//! # Production
//! monkeys-server \
//!     --database-url postgresql://monkeys@db/monkeys \
//!     --redis-url redis://cache:6379/ \
//!     --jwt-rsa-public-key /etc/monkeys/jwt.pub.pem \
//!     --trust-proxy --json-logs
//! ```
//!
//! `RUST_LOG` overrides `--log-level` when set.

use anyhow::Result;
use clap::Parser;
use monkeys_api_server::{AppState, Args, Server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Monkeys IAM API server");

    let settings = args.into_settings();
    let state = match AppState::connect(&settings).await {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = Server::new(settings.server, state).run().await {
        error!("Server error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing/logging subsystem
fn init_tracing(log_level: &str, json_logs: bool) {
    let level = log_level.parse::<tracing::Level>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', using 'info'", log_level);
        tracing::Level::INFO
    });
    let framework = if level <= tracing::Level::DEBUG { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "monkeys_api_server={level},monkeys_server={level},monkeys_authz={level},monkeys_authn={level},tower_http={framework},axum={framework}",
            level = level.as_str().to_lowercase(),
            framework = framework,
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}
