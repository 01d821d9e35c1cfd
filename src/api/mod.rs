//! REST API over a finished scenario run.
//!
//! Provides three GET endpoints:
//! - `/calendar`: period index with representative years and time steps
//! - `/outcomes`: per-period solve outcomes, technology records and summary
//! - `/trace`: solver trace rows, optionally filtered by period, variable
//!   and market

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::runner::{ScenarioRun, TechnologyRecord};
use crate::sim::calendar::Calendar;
use crate::sim::summary::SummaryReport;
use crate::sim::trace::TraceRow;
use crate::sim::types::SolveOutcome;

pub use types::{CalendarResponse, OutcomesResponse, PeriodRecord, TraceQuery};

/// Immutable application state shared across all request handlers.
///
/// Built once after the scenario is solved and wrapped in `Arc`; every
/// handler only reads it.
pub struct AppState {
    pub scenario: String,
    pub calendar: Calendar,
    pub market_count: usize,
    pub outcomes: Vec<SolveOutcome>,
    pub technologies: Vec<TechnologyRecord>,
    pub summary: SummaryReport,
    pub trace: Vec<TraceRow>,
}

impl From<ScenarioRun> for AppState {
    fn from(run: ScenarioRun) -> Self {
        Self {
            scenario: run.name,
            market_count: run.marketplace.len(),
            calendar: run.calendar,
            outcomes: run.outcomes,
            technologies: run.technologies,
            summary: run.summary,
            trace: run.trace.into_rows(),
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/calendar", get(handlers::get_calendar))
        .route("/outcomes", get(handlers::get_outcomes))
        .route("/trace", get(handlers::get_trace))
        .with_state(state)
}

/// Binds to `addr` and serves the API until the process stops.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
