//! HTTP API flows over the in-memory ledger.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use quark_bets::api::{self, ApiState};

use crate::memory_ledger::MemoryLedger;

fn app(ledger: MemoryLedger) -> Router {
    let state = Arc::new(ApiState::new(Arc::new(ledger), Decimal::ZERO));
    api::build_router(state, api::cors_layer("*").unwrap())
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(resp: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_record_settle_and_report() {
    let app = app(MemoryLedger::new());

    let resp = app
        .clone()
        .oneshot(post(
            "/api/bets",
            json!({
                "date": "2026-03-10",
                "sport": "Harness",
                "bet": "Lay Win",
                "selection": "Runner",
                "odds": 4.0,
                "stake": 5,
                "strategy_ref": "S3"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bet = read_json(resp).await;
    assert_eq!(bet["date"], "10/03/2026");
    assert_eq!(bet["commission"].as_f64().unwrap(), 0.0);
    let id = bet["id"].as_i64().unwrap();

    let resp = app
        .clone()
        .oneshot(post(
            &format!("/api/bets/{id}/settle"),
            json!({ "result": "LOSE", "bspOdds": 3.5 }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let settled = read_json(resp).await;
    assert_eq!(settled["return"].as_f64().unwrap(), -15.0);
    assert_eq!(settled["ev_perc"].as_f64().unwrap(), -12.5);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/results?range=custom&from=01/03/2026&to=31/03/2026")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = read_json(resp).await;
    assert_eq!(report["summary"]["bet_count"], 1);
    assert_eq!(report["summary"]["pot"].as_f64().unwrap(), -300.0);
    assert_eq!(report["chart"][0]["date"], "10/03/2026");
}

#[tokio::test]
async fn test_storage_outage_is_500() {
    let ledger = MemoryLedger::new();
    ledger.set_error("database is locked");
    let resp = app(ledger)
        .oneshot(Request::builder().uri("/api/sports").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("database is locked"));
}

#[tokio::test]
async fn test_settle_missing_bet_is_404() {
    let resp = app(MemoryLedger::new())
        .oneshot(post("/api/bets/404/settle", json!({ "result": "WIN" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
