//! Request handlers for the API endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::AppState;
use super::types::{CalendarResponse, ErrorResponse, OutcomesResponse, TraceQuery, reporting_prices};
use crate::sim::marketplace::MarketId;
use crate::sim::trace::{TraceRow, TraceVariable};

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

/// `GET /calendar` → 200 + `CalendarResponse` JSON
pub async fn get_calendar(State(state): State<Arc<AppState>>) -> Json<CalendarResponse> {
    Json(CalendarResponse::from(&state.calendar))
}

/// `GET /outcomes` → 200 + `OutcomesResponse` JSON
pub async fn get_outcomes(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(OutcomesResponse {
        scenario: &state.scenario,
        summary: &state.summary,
        outcomes: &state.outcomes,
        technologies: &state.technologies,
        reporting_prices: reporting_prices(&state.calendar, &state.outcomes, state.market_count),
    })
    .into_response()
}

/// Returns trace rows matching every given filter.
///
/// `GET /trace` → 200 + `Vec<TraceRow>` JSON
/// `GET /trace?period=2&variable=price&market=0` → filtered rows
/// `GET /trace?period=99` → 400 + `ErrorResponse` (unknown period)
/// `GET /trace?variable=foo` → 400 + `ErrorResponse`
pub async fn get_trace(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TraceQuery>,
) -> impl IntoResponse {
    if let Some(period) = query.period {
        state
            .calendar
            .check_period(period)
            .map_err(|e| bad_request(e.to_string()))?;
    }
    if let Some(market) = query.market
        && market >= state.market_count
    {
        return Err(bad_request(format!(
            "`market` ({market}) must be < {}",
            state.market_count
        )));
    }
    let variable = match query.variable.as_deref() {
        Some(name) => Some(name.parse::<TraceVariable>().map_err(bad_request)?),
        None => None,
    };

    let rows: Vec<TraceRow> = state
        .trace
        .iter()
        .filter(|r| query.period.is_none_or(|p| r.period == p))
        .filter(|r| variable.is_none_or(|v| r.variable == v))
        .filter(|r| query.market.is_none_or(|m| r.mktid == MarketId(m)))
        .copied()
        .collect();

    Ok(Json(rows))
}
