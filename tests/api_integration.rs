#![cfg(feature = "api")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::util::ServiceExt;

use market_equilibrium::api::{AppState, router};

async fn get(state: Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request builds");
    let resp = router(state).oneshot(req).await.expect("router responds");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body reads");
    (status, serde_json::from_slice(&body).expect("json body"))
}

#[tokio::test]
async fn solved_run_is_served() {
    let run = common::run_preset("fixed_carbon");
    let periods = run.calendar.period_count();
    let state = Arc::new(AppState::from(run));

    let (status, calendar) = get(state.clone(), "/calendar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calendar["period_count"], periods);

    let (status, outcomes) = get(state.clone(), "/outcomes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcomes["scenario"], "fixed_carbon");
    assert_eq!(outcomes["outcomes"].as_array().map(Vec::len), Some(periods));
    assert!(
        outcomes["outcomes"]
            .as_array()
            .is_some_and(|o| o.iter().all(|x| x["status"] == "converged"))
    );

    let (status, rows) = get(state, "/trace?period=0&variable=price&market=3").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().cloned().unwrap_or_default();
    assert!(!rows.is_empty());
    assert!(rows.iter().all(|r| r["solvable"] == false && r["value"] == 25.0));
}

#[tokio::test]
async fn bad_trace_queries_return_400() {
    let state = Arc::new(AppState::from(common::run_preset("baseline")));
    for uri in ["/trace?variable=nope", "/trace?market=99", "/trace?period=100"] {
        let (status, body) = get(state.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body.get("error").is_some());
    }
}
