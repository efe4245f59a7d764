//! Shared types for the Quark Bets ledger.
//!
//! These types form the data model used across all modules: the engine,
//! the store, the analytics and the HTTP API all speak in terms of
//! [`Bet`], [`NewBet`] and the small enums below.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which side of the market a wager takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Profits if the selection wins.
    Back,
    /// Profits if the selection does not win.
    Lay,
}

impl Direction {
    /// Infer direction from a bet-type name: anything containing "lay"
    /// (case-insensitive) is a lay bet.
    ///
    /// Only a fallback for names missing from the catalog and for legacy
    /// catalog rows that predate the explicit direction column.
    pub fn infer_from_name(name: &str) -> Self {
        if name.to_lowercase().contains("lay") {
            Direction::Lay
        } else {
            Direction::Back
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Back => "back",
            Direction::Lay => "lay",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "back" => Ok(Direction::Back),
            "lay" => Ok(Direction::Lay),
            other => Err(LedgerError::Validation(format!("Unknown direction: {other}"))),
        }
    }
}

/// How a bet type is settled and analysed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetKind {
    /// Settled against a points/handicap line. No EV.
    #[default]
    Line,
    /// Settled against a closing price, with EV tracking.
    Ev,
}

impl BetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetKind::Line => "line",
            BetKind::Ev => "ev",
        }
    }

    /// Lenient parse used for catalog input: anything other than "ev" is a
    /// line bet.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("ev") {
            BetKind::Ev
        } else {
            BetKind::Line
        }
    }
}

impl fmt::Display for BetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetResult {
    #[default]
    Pending,
    Win,
    Lose,
    Void,
}

impl BetResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetResult::Pending => "PENDING",
            BetResult::Win => "WIN",
            BetResult::Lose => "LOSE",
            BetResult::Void => "VOID",
        }
    }

    /// Whether the bet has been settled.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BetResult::Pending)
    }
}

impl fmt::Display for BetResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetResult {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(BetResult::Pending),
            other => other
                .parse::<Outcome>()
                .map(BetResult::from)
                .map_err(|_| LedgerError::Validation(format!("Unknown bet result: {s}"))),
        }
    }
}

/// A settlement outcome. Unlike [`BetResult`] this excludes PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Lose,
    Void,
}

impl From<Outcome> for BetResult {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => BetResult::Win,
            Outcome::Lose => BetResult::Lose,
            Outcome::Void => BetResult::Void,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(BetResult::from(*self).as_str())
    }
}

/// Strict parse: only WIN, LOSE and VOID are settlement outcomes.
impl FromStr for Outcome {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WIN" => Ok(Outcome::Win),
            "LOSE" => Ok(Outcome::Lose),
            "VOID" => Ok(Outcome::Void),
            _ => Err(LedgerError::UnrecognizedOutcome(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// A bet-type catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetType {
    pub name: String,
    pub kind: BetKind,
    pub direction: Direction,
}

impl BetType {
    pub fn new(name: &str, kind: BetKind, direction: Direction) -> Self {
        Self {
            name: name.to_string(),
            kind,
            direction,
        }
    }

    /// Build an entry whose direction is inferred from its name.
    pub fn inferred(name: &str, kind: BetKind) -> Self {
        Self::new(name, kind, Direction::infer_from_name(name))
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.name, self.kind, self.direction)
    }
}

// ---------------------------------------------------------------------------
// Reference price
// ---------------------------------------------------------------------------

/// The closing reference supplied at settlement: decimal odds for EV bets,
/// an opaque line (e.g. "2.5") for line bets. Kept as the caller's text so
/// line values are stored exactly as given.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Option<serde_json::Value>", into = "Option<String>")]
pub struct ReferencePrice(Option<String>);

impl ReferencePrice {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self(None)
        } else {
            Self(Some(trimmed.to_string()))
        }
    }

    pub fn missing() -> Self {
        Self(None)
    }

    pub fn odds(value: Decimal) -> Self {
        Self(Some(value.to_string()))
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_none()
    }

    /// The reference as stored for a line bet.
    pub fn as_line(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The reference as decimal odds. Missing → `Ok(None)`; text that is not
    /// a number → `InvalidReferencePrice`.
    pub fn as_odds(&self) -> Result<Option<Decimal>, LedgerError> {
        match &self.0 {
            None => Ok(None),
            Some(text) => Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map(Some)
                .map_err(|_| LedgerError::InvalidReferencePrice(text.clone())),
        }
    }
}

/// Only a number, a string or null is a reference price.
impl TryFrom<Option<serde_json::Value>> for ReferencePrice {
    type Error = String;

    fn try_from(value: Option<serde_json::Value>) -> Result<Self, Self::Error> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(ReferencePrice::missing()),
            Some(serde_json::Value::String(s)) => Ok(ReferencePrice::new(&s)),
            Some(serde_json::Value::Number(n)) => Ok(ReferencePrice::new(&n.to_string())),
            Some(other) => Err(format!(
                "reference price must be a number or a string, got {other}"
            )),
        }
    }
}

impl From<ReferencePrice> for Option<String> {
    fn from(value: ReferencePrice) -> Self {
        value.0
    }
}

impl fmt::Display for ReferencePrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(text) => f.write_str(text),
            None => f.write_str("-"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// A stored wager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: i64,
    #[serde(with = "ledger_date")]
    pub date: Option<NaiveDate>,
    pub sport: Option<String>,
    pub event: Option<String>,
    pub round_race: Option<String>,
    pub selection: Option<String>,
    /// Bet-type name, resolved against the catalog.
    pub bet: Option<String>,
    pub odds: Option<Decimal>,
    pub stake: Option<Decimal>,
    /// Closing price (EV bets).
    pub closing: Option<Decimal>,
    pub line: Option<String>,
    /// Closing line (line bets).
    pub closing_line: Option<String>,
    pub ev_perc: Option<Decimal>,
    pub ev_val: Option<Decimal>,
    pub result: BetResult,
    /// Realized profit/loss; absent while pending.
    #[serde(rename = "return")]
    pub profit: Option<Decimal>,
    /// Commission percentage (0–100).
    pub commission: Option<Decimal>,
    pub bf_market_id: Option<String>,
    pub bf_selection_id: Option<String>,
    pub strategy_ref: Option<String>,
    pub created_at: Option<String>,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} @ {} x {} [{}]",
            self.id,
            self.bet.as_deref().unwrap_or("?"),
            self.selection.as_deref().unwrap_or("?"),
            self.odds.map(|o| o.to_string()).unwrap_or_else(|| "-".into()),
            self.stake.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            self.result,
        )
    }
}

impl Bet {
    /// Whether the bet has a terminal result.
    pub fn is_settled(&self) -> bool {
        self.result.is_terminal()
    }

    /// A pending bet with the given type, odds and stake.
    #[cfg(test)]
    pub fn sample(id: i64, bet_type: &str, odds: Decimal, stake: Decimal) -> Self {
        Bet {
            id,
            date: NaiveDate::from_ymd_opt(2026, 3, 14),
            sport: Some("Horse".to_string()),
            event: Some("Spring Cup".to_string()),
            round_race: Some("R4".to_string()),
            selection: Some("Speedster".to_string()),
            bet: Some(bet_type.to_string()),
            odds: Some(odds),
            stake: Some(stake),
            closing: None,
            line: None,
            closing_line: None,
            ev_perc: None,
            ev_val: None,
            result: BetResult::Pending,
            profit: None,
            commission: Some(Decimal::ZERO),
            bf_market_id: None,
            bf_selection_id: None,
            strategy_ref: Some("S1".to_string()),
            created_at: None,
        }
    }
}

/// A wager as submitted for creation or replacement.
///
/// `kind` and `direction` only matter when the bet type is not yet in the
/// catalog: they describe the entry that gets registered for it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewBet {
    #[serde(with = "ledger_date")]
    pub date: Option<NaiveDate>,
    pub sport: Option<String>,
    pub event: Option<String>,
    pub round_race: Option<String>,
    pub selection: Option<String>,
    pub bet: Option<String>,
    pub odds: Option<Decimal>,
    pub stake: Option<Decimal>,
    pub closing: Option<Decimal>,
    pub line: Option<String>,
    pub closing_line: Option<String>,
    pub ev_perc: Option<Decimal>,
    pub ev_val: Option<Decimal>,
    pub result: BetResult,
    #[serde(rename = "return")]
    pub profit: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub bf_market_id: Option<String>,
    pub bf_selection_id: Option<String>,
    pub strategy_ref: Option<String>,
    pub kind: Option<BetKind>,
    pub direction: Option<Direction>,
}

/// Settlement request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// WIN, LOSE or VOID. Kept as text so unknown values can be rejected
    /// with a precise error.
    pub result: String,
    #[serde(default)]
    pub bsp_odds: ReferencePrice,
    /// Overrides the bet's stored commission when present.
    #[serde(default)]
    pub commission: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Ledger dates travel as `dd/mm/yyyy`; ISO `yyyy-mm-dd` is accepted on input.
pub mod ledger_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%d/%m/%Y";

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        NaiveDate::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .ok()
    }

    pub fn format(date: &NaiveDate) -> String {
        date.format(FORMAT).to_string()
    }

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&format(d)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid reference price: {0:?} is not decimal odds")]
    InvalidReferencePrice(String),

    #[error("Unrecognized settlement outcome: {0:?} (expected WIN, LOSE or VOID)")]
    UnrecognizedOutcome(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Bet not found: {0}")]
    NotFound(i64),

    #[error("Bet {id} is already settled as {result}")]
    AlreadySettled { id: i64, result: BetResult },

    #[error("Bet {0} was modified concurrently; retry the settlement")]
    Conflict(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
