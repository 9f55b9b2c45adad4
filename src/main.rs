//! Entry point for the Commission Engine binary.
//!
//! Running this binary starts an HTTP server exposing the evaluation
//! engine over an initially empty, in-memory rule collection.  Rules
//! are loaded through the import endpoint.  See [`config`] for the
//! environment variables read at startup.

use anyhow::{Context, Result};
use commission_engine::api::{self, AppState};
use commission_engine::config::EngineConfig;
use commission_engine::ruleset::RuleSet;
use commission_engine::CommissionEngine;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = EngineConfig::from_env().context("reading configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .context("building log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(tiers = ?config.tiers, "starting commission engine");
    let engine = CommissionEngine::new(Arc::new(config.tiers));
    let state = Arc::new(AppState::new(engine, RuleSet::new()));
    api::serve(&config.bind_addr, state).await
}

// Public re-exports so the binary has access to library modules
pub use commission_engine::{config, engine, models, rate};
