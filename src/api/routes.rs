//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::analytics::{self, BetFilter, DateRange, ResultsReport};
use crate::engine::catalog::{classify, BetClass};
use crate::engine::check_commission;
use crate::engine::ev::estimate_ev;
use crate::storage::BetRepository;
use crate::types::{
    ledger_date, Bet, BetKind, BetResult, BetType, Direction, LedgerError, NewBet, SettleRequest,
};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub repo: Arc<dyn BetRepository>,
    /// Commission used by the live estimator when the request has none.
    pub default_commission: Decimal,
    /// Supplies "today" for relative result ranges.
    pub today: fn() -> NaiveDate,
}

impl ApiState {
    pub fn new(repo: Arc<dyn BetRepository>, default_commission: Decimal) -> Self {
        Self {
            repo,
            default_commission,
            today: local_today,
        }
    }
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A [`LedgerError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LedgerError::InvalidReferencePrice(_)
            | LedgerError::UnrecognizedOutcome(_)
            | LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::AlreadySettled { .. } | LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::Storage(_) | LedgerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct BetListQuery {
    pub sport: Option<String>,
    pub result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SportRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct BetTypeRequest {
    #[serde(default)]
    pub name: String,
    pub kind: Option<String>,
    pub direction: Option<String>,
}

/// Live EV request, sent while a bet is being typed in.
#[derive(Debug, Deserialize)]
pub struct EvEstimateRequest {
    #[serde(default)]
    pub bet: String,
    pub odds: Option<Decimal>,
    pub closing: Option<Decimal>,
    pub stake: Option<Decimal>,
    pub commission: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvEstimateResponse {
    pub available: bool,
    pub kind: BetKind,
    pub direction: Direction,
    pub ev_perc: Option<Decimal>,
    pub ev_val: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub sport: Option<String>,
    pub bet: Option<String>,
    pub strategy: Option<String>,
    pub range: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Blank query values mean "no filter".
fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn query_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, LedgerError> {
    match non_blank(value) {
        None => Ok(None),
        Some(raw) => ledger_date::parse(&raw)
            .map(Some)
            .ok_or_else(|| LedgerError::Validation(format!("Invalid {field} date: {raw}"))),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/bets
pub async fn list_bets(
    State(state): State<AppState>,
    Query(query): Query<BetListQuery>,
) -> ApiResult<Json<Vec<Bet>>> {
    let result = non_blank(query.result)
        .map(|r| r.parse::<BetResult>())
        .transpose()?;
    let sport = non_blank(query.sport);

    let bets = state
        .repo
        .list_bets()
        .await?
        .into_iter()
        .filter(|b| sport.is_none() || b.sport == sport)
        .filter(|b| result.map_or(true, |r| b.result == r))
        .collect();
    Ok(Json(bets))
}

/// POST /api/bets
pub async fn create_bet(
    State(state): State<AppState>,
    Json(bet): Json<NewBet>,
) -> ApiResult<(StatusCode, Json<Bet>)> {
    let bet = state.repo.insert_bet(bet).await?;
    Ok((StatusCode::CREATED, Json(bet)))
}

/// GET /api/bets/:id
pub async fn get_bet(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Bet>> {
    let bet = state.repo.get_bet(id).await?.ok_or(LedgerError::NotFound(id))?;
    Ok(Json(bet))
}

/// PUT /api/bets/:id
pub async fn update_bet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(bet): Json<NewBet>,
) -> ApiResult<Json<Bet>> {
    let bet = state
        .repo
        .update_bet(id, bet)
        .await?
        .ok_or(LedgerError::NotFound(id))?;
    Ok(Json(bet))
}

/// DELETE /api/bets/:id
pub async fn delete_bet(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if state.repo.delete_bet(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LedgerError::NotFound(id).into())
    }
}

/// POST /api/bets/:id/settle
pub async fn settle_bet(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SettleRequest>,
) -> ApiResult<Json<Bet>> {
    let bet = state.repo.settle_bet(id, request).await?;
    Ok(Json(bet))
}

/// GET /api/sports
pub async fn list_sports(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.repo.list_sports().await?))
}

/// POST /api/sports
pub async fn add_sport(
    State(state): State<AppState>,
    Json(request): Json<SportRequest>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let name = request.name.trim().to_string();
    state.repo.add_sport(&name).await?;
    info!(sport = %name, "Sport added");
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "name": name }))))
}

/// GET /api/bet-types
pub async fn list_bet_types(State(state): State<AppState>) -> ApiResult<Json<Vec<BetType>>> {
    Ok(Json(state.repo.list_bet_types().await?))
}

/// POST /api/bet-types
pub async fn add_bet_type(
    State(state): State<AppState>,
    Json(request): Json<BetTypeRequest>,
) -> ApiResult<(StatusCode, Json<BetType>)> {
    let name = request.name.trim();
    let kind = request
        .kind
        .as_deref()
        .map(BetKind::parse_lenient)
        .unwrap_or_default();
    let direction = match non_blank(request.direction) {
        Some(d) => d.parse::<Direction>()?,
        None => Direction::infer_from_name(name),
    };
    let entry = BetType::new(name, kind, direction);
    state.repo.add_bet_type(entry.clone()).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// POST /api/ev/estimate
pub async fn estimate(
    State(state): State<AppState>,
    Json(request): Json<EvEstimateRequest>,
) -> ApiResult<Json<EvEstimateResponse>> {
    let catalog = state.repo.catalog().await?;
    let class: BetClass = classify(request.bet.trim(), &catalog);
    let commission = check_commission(request.commission.unwrap_or(state.default_commission))?;

    let estimate = match (class.is_ev(), request.odds, request.closing) {
        (true, Some(odds), Some(closing)) => estimate_ev(
            class.direction,
            odds,
            closing,
            request.stake.unwrap_or_default(),
            commission,
        ),
        _ => None,
    };

    Ok(Json(EvEstimateResponse {
        available: estimate.is_some(),
        kind: class.kind,
        direction: class.direction,
        ev_perc: estimate.map(|e| e.ev_perc),
        ev_val: estimate.map(|e| e.ev_val),
    }))
}

/// GET /api/results
pub async fn results(
    State(state): State<AppState>,
    Query(query): Query<ResultsQuery>,
) -> ApiResult<Json<ResultsReport>> {
    let from = query_date("from", query.from)?;
    let to = query_date("to", query.to)?;
    let range = DateRange::parse(query.range.as_deref().unwrap_or("all"), from, to)?;
    let filter = BetFilter {
        sport: non_blank(query.sport),
        bet_type: non_blank(query.bet),
        strategy: non_blank(query.strategy),
        range,
    };

    let bets = state.repo.list_bets().await?;
    let catalog = state.repo.catalog().await?;
    let report = analytics::report(&bets, &filter, &catalog, (state.today)());
    debug!(
        bets = bets.len(),
        settled = report.summary.bet_count,
        points = report.chart.len(),
        "Results computed"
    );
    Ok(Json(report))
}
