//! # print-rest CLI
//!
//! Process glue only: configuration loading, template registry start-up and
//! the HTTP server. All conversion logic lives in `print-rest-core`.
//!
//! - `serve` runs the HTTP service until SIGINT/SIGTERM, then drains
//!   in-flight requests.
//! - `check` loads everything `serve` would, prints a summary and exits.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use actix_web::{web, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use print_rest_core::config::ServiceConfig;
use print_rest_core::{PrintService, TemplateRegistry};
use tracing::{info, warn};

use crate::http::{build_app, AppState};
use crate::load_config::load_config;

const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// CLI for print-rest: print HTML to PDF/PNG over HTTP.
#[derive(Parser)]
#[clap(
    name = "print-rest",
    version,
    about = "HTTP service that prints HTML, URLs and report templates to PDF or PNG"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Path to an optional YAML config file; environment variables override it
        #[clap(long)]
        config: Option<PathBuf>,
        /// Listen address, overrides BIND_ADDRESS
        #[clap(long)]
        bind: Option<String>,
    },
    /// Load configuration and templates, print a summary and exit
    Check {
        /// Path to an optional YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { config, bind } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            config.trace_loaded();
            serve(config).await
        }
        Commands::Check { config } => {
            let config = load_config(config.as_deref())?;
            config.trace_loaded();
            let registry = load_registry(&config);
            println!("Configuration:\n{config:#?}");
            let names = registry.names();
            println!("Templates ({}): {}", names.len(), names.join(", "));
            Ok(())
        }
    }
}

async fn serve(config: ServiceConfig) -> Result<()> {
    let registry = Arc::new(load_registry(&config));
    let service = PrintService::from_config(&config, registry);
    let bind_address = config.bind_address.clone();
    let state = web::Data::new(AppState::new(service, config));

    info!(bind_address = %bind_address, "Starting HTTP server");
    HttpServer::new(move || build_app(state.clone()))
        .bind(&bind_address)
        .with_context(|| format!("cannot bind {bind_address}"))?
        .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
        .run()
        .await
        .context("HTTP server failed")?;
    info!("HTTP server stopped");
    Ok(())
}

/// A missing or unreadable template directory is not fatal: the service
/// still prints requests that bring their own styles.
fn load_registry(config: &ServiceConfig) -> TemplateRegistry {
    let registry = TemplateRegistry::new(config.debug);
    let directory: &Path = &config.template_directory;
    match registry.load(directory) {
        Ok(count) => info!(directory = %directory.display(), count, "Template registry ready"),
        Err(err) => warn!(directory = %directory.display(), error = %err, "Template directory unavailable"),
    }
    registry
}
