//! Optica inventory ledger
//!
//! Per-branch stock records for optical products, an append-only movement
//! ledger, and the engine that keeps the two consistent under concurrent
//! writers. The HTTP layer in [`routes`] is a thin shell over [`services`].

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};

use services::{
    AlertClassifier, MovementLedger, ReconciliationEngine, ReversalCoordinator, StockService,
};
use store::LedgerStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LedgerStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn LedgerStore>, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn stock(&self) -> StockService {
        StockService::new(self.store.clone())
    }

    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(self.store.clone(), self.config.ledger.retry())
    }

    pub fn reversals(&self) -> ReversalCoordinator {
        ReversalCoordinator::new(self.engine())
    }

    pub fn ledger(&self) -> MovementLedger {
        MovementLedger::new(self.store.clone())
    }

    pub fn alerts(&self) -> AlertClassifier {
        AlertClassifier::new(self.store.clone())
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Optica Inventory Ledger API v1"
}
