//! Forwarding HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ net::listener ──▶ http::server ──▶ http::session
//!                                  │ forbidden        │ header parse
//!                                  │ user             │ security::policy
//!                                  ▼                  │ routing::redirect
//!                             rejection text          │ cache::store
//!                                                     ▼
//!   Client ◀── http::relay ◀────────────────────── Origin server
//!                  │
//!                  └──▶ cache artifact (<cache dir>/<sanitized url>.cache)
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use forward_proxy::config::loader::load_config;
use forward_proxy::config::validation::validate_config;
use forward_proxy::lifecycle::startup;
use forward_proxy::observability::logging;
use forward_proxy::ProxyConfig;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Forwarding HTTP proxy with a file cache", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding the configured bind address port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding cache artifacts
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

impl Args {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(port) = self.port {
            let host = config
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.listener.bind_address = format!("{}:{}", host, port);
        }
        if let Some(dir) = &self.cache_dir {
            config.cache.directory = dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ProxyConfig::default(),
    };
    args.apply(&mut config);

    if let Err(errors) = validate_config(&config) {
        for error in errors {
            eprintln!("invalid configuration: {}", error);
        }
        return ExitCode::FAILURE;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        cache_directory = %config.cache.directory.display(),
        "forward-proxy starting"
    );

    match startup::run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Proxy failed");
            ExitCode::FAILURE
        }
    }
}
