//! sheetstock-api library
//!
//! Records inventory movements (additions, issuances, receipts) into a
//! spreadsheet-backed store, optionally attaching uploaded images via a
//! cloud file store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod handlers;
pub mod ledger;
pub mod openapi;
pub mod sheets;

use std::sync::Arc;

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

use errors::ServiceError;
use ledger::LedgerEngine;

/// Remote backend handle, fixed at startup. When construction failed, every
/// request that needs it fails fast with the recorded reason instead of the
/// process crashing or retrying.
#[derive(Clone)]
pub enum Backend {
    Ready(Arc<LedgerEngine>),
    Unavailable(String),
}

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub backend: Backend,
}

impl AppState {
    /// The ledger engine, or a configuration error when startup
    /// initialization failed.
    pub fn engine(&self) -> Result<Arc<LedgerEngine>, ServiceError> {
        match &self.backend {
            Backend::Ready(engine) => Ok(engine.clone()),
            Backend::Unavailable(reason) => Err(ServiceError::ConfigError(reason.clone())),
        }
    }
}

/// Health check for load balancers and uptime monitors.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// All application routes.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/inventory", handlers::inventory_routes())
}
