//! qv-server library
//!
//! HTTP service for shop-floor quality verification: operators record
//! checklists, equipment checks and FTQ counts per shift; supervisors review
//! them; reports and Excel exports summarize the results.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use qv_common::time::{Clock, SystemClock};
use qv_common::tolerance::ToleranceTable;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Plant-local wall clock
    pub clock: Arc<dyn Clock>,
    /// Advisory reading ranges
    pub tolerances: Arc<ToleranceTable>,
    /// Excel cell layout file, read on every export
    pub export_template: PathBuf,
}

impl AppState {
    pub fn new(db: SqlitePool, tolerances: ToleranceTable, export_template: PathBuf) -> Self {
        Self {
            db,
            clock: Arc::new(SystemClock),
            tolerances: Arc::new(tolerances),
            export_template,
        }
    }

    /// Replace the clock (tests pin the time with `FixedClock`)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::health_routes())
        .merge(api::shift_routes())
        .merge(api::user_routes())
        .merge(api::verification_routes())
        .merge(api::checklist_routes())
        .merge(api::subgroup_routes())
        .merge(api::equipment_routes())
        .merge(api::ftq_routes())
        .merge(api::history_routes())
        .merge(api::report_routes())
        .merge(api::export_routes())
        .merge(api::settings_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
