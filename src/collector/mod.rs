//! Local statistics collector.
//!
//! Speaks the same wire protocol as the production statistics endpoint and
//! retains accepted batches in memory for inspection. Used as the sink in
//! development setups and end-to-end tests.

mod handlers;
mod middleware;

pub use middleware::CollectorConfig;

use std::sync::{Arc, Mutex};

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::models::EventBatch;

/// Shared collector state: every accepted batch, in arrival order.
#[derive(Clone, Default)]
pub struct CollectorState {
    received: Arc<Mutex<Vec<EventBatch>>>,
}

impl CollectorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything accepted so far.
    pub fn received(&self) -> Vec<EventBatch> {
        self.received
            .lock()
            .expect("collector lock poisoned")
            .clone()
    }
}

pub fn create_router(state: CollectorState) -> Router {
    create_router_with_config(state, CollectorConfig::disabled())
}

pub fn create_router_with_config(state: CollectorState, config: CollectorConfig) -> Router {
    // Health stays reachable without a token; everything else is guarded.
    let api = Router::new()
        .route("/events", post(handlers::receive_events))
        .route("/received", get(handlers::list_received))
        .route("/received", delete(handlers::clear_received))
        .layer(axum::middleware::from_fn_with_state(
            config,
            middleware::auth_middleware,
        ))
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
