//! Settlement calculator.
//!
//! Turns an outcome into realized profit/loss, then refreshes the closing
//! fields: final EV for EV-kind bets, the closing line for line bets.
//!
//! | direction | WIN               | LOSE               | VOID |
//! |-----------|-------------------|--------------------|------|
//! | Back      | `(odds-1) * stake`| `-stake`           | `0`  |
//! | Lay       | `stake`           | `-(odds-1) * stake`| `0`  |
//!
//! Commission comes off strictly positive returns only.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::catalog::{classify, BetClass, BetTypeCatalog};
use super::ev::estimate_ev;
use super::{check_commission, commission_factor, round_money};
use crate::types::{Bet, BetResult, Direction, LedgerError, Outcome, ReferencePrice};

/// The engine's view of a wager: the fields settlement reads.
#[derive(Debug, Clone, PartialEq)]
pub struct Wager {
    pub class: BetClass,
    pub odds: Decimal,
    pub stake: Decimal,
    pub commission: Decimal,
    pub closing: Option<Decimal>,
    pub closing_line: Option<String>,
    pub ev_perc: Option<Decimal>,
    pub ev_val: Option<Decimal>,
}

impl Wager {
    /// Build a wager from a stored bet. Missing odds, stake or commission
    /// count as zero so legacy rows can always be settled.
    pub fn from_bet(bet: &Bet, catalog: &dyn BetTypeCatalog) -> Self {
        let class = classify(bet.bet.as_deref().unwrap_or_default(), catalog);
        Self {
            class,
            odds: bet.odds.unwrap_or_default(),
            stake: bet.stake.unwrap_or_default(),
            commission: bet.commission.unwrap_or_default(),
            closing: bet.closing,
            closing_line: bet.closing_line.clone(),
            ev_perc: bet.ev_perc,
            ev_val: bet.ev_val,
        }
    }
}

/// Fields produced by settling a wager.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub closing: Option<Decimal>,
    pub closing_line: Option<String>,
    pub ev_perc: Option<Decimal>,
    pub ev_val: Option<Decimal>,
    pub result: BetResult,
    #[serde(rename = "return")]
    pub profit: Decimal,
}

impl Settlement {
    /// Write the settlement fields onto a bet. Nothing else changes.
    pub fn apply_to(&self, bet: &mut Bet) {
        bet.closing = self.closing;
        bet.closing_line = self.closing_line.clone();
        bet.ev_perc = self.ev_perc;
        bet.ev_val = self.ev_val;
        bet.result = self.result;
        bet.profit = Some(self.profit);
    }
}

/// Profit/loss before commission. `None` if it does not fit in a `Decimal`.
pub fn raw_return(
    direction: Direction,
    outcome: Outcome,
    odds: Decimal,
    stake: Decimal,
) -> Option<Decimal> {
    let liability = || odds.checked_sub(Decimal::ONE)?.checked_mul(stake);
    match (direction, outcome) {
        (Direction::Back, Outcome::Win) => liability(),
        (Direction::Back, Outcome::Lose) => Some(-stake),
        (Direction::Lay, Outcome::Win) => Some(stake),
        (Direction::Lay, Outcome::Lose) => liability().map(|l| -l),
        (_, Outcome::Void) => Some(Decimal::ZERO),
    }
}

/// Deduct commission from a positive return; losses and voids pass through.
pub fn apply_commission(raw: Decimal, commission_pct: Decimal) -> Option<Decimal> {
    if raw > Decimal::ZERO {
        raw.checked_mul(commission_factor(commission_pct)?)
    } else {
        Some(raw)
    }
}

/// Settle a wager.
///
/// `commission_pct` is used for both the return and the EV refresh and must
/// lie in `0..=100`. For EV-kind bets the reference must be decimal odds (or
/// missing); a textual reference is rejected. A reference that is not above
/// 1 keeps the previous EV fields. Odds and stake whose return cannot be
/// represented are a validation error.
pub fn settle(
    wager: &Wager,
    outcome: Outcome,
    reference: &ReferencePrice,
    commission_pct: Decimal,
) -> Result<Settlement, LedgerError> {
    check_commission(commission_pct)?;
    let direction = wager.class.direction;
    let raw = raw_return(direction, outcome, wager.odds, wager.stake)
        .and_then(|raw| Some((raw, apply_commission(raw, commission_pct)?)));
    let Some((raw, profit)) = raw else {
        return Err(LedgerError::Validation(format!(
            "return on stake {} at odds {} is out of range",
            wager.stake, wager.odds
        )));
    };
    let profit = round_money(profit);

    let mut settlement = Settlement {
        closing: wager.closing,
        closing_line: wager.closing_line.clone(),
        ev_perc: wager.ev_perc,
        ev_val: wager.ev_val,
        result: outcome.into(),
        profit,
    };

    if wager.class.is_ev() {
        let closing = reference.as_odds()?;
        settlement.closing = closing;

        let estimate = closing.and_then(|price| {
            estimate_ev(direction, wager.odds, price, wager.stake, commission_pct)
        });
        match estimate {
            Some(ev) => {
                settlement.ev_perc = Some(ev.ev_perc);
                settlement.ev_val = Some(ev.ev_val);
            }
            None => debug!(reference = %reference, "Keeping previous EV at settlement"),
        }
    } else {
        settlement.closing_line = reference.as_line().map(str::to_string);
    }

    debug!(
        %direction,
        kind = %wager.class.kind,
        %outcome,
        raw = %raw,
        profit = %settlement.profit,
        ev_perc = ?settlement.ev_perc,
        "Wager settled"
    );

    Ok(settlement)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
