//! Expected-value estimation.
//!
//! Compares the price a wager was taken at with a reference (fair or
//! closing) price. Used live while a bet is being entered, with the current
//! closing estimate, and again at settlement with the final closing price.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{commission_factor, round_money};
use crate::types::Direction;

/// EV of a wager against a reference price, rounded to 2 dp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvEstimate {
    /// EV as a percentage of stake.
    pub ev_perc: Decimal,
    /// EV in money.
    pub ev_val: Decimal,
}

/// Unrounded EV percentage.
fn ev_percent(
    direction: Direction,
    taken_odds: Decimal,
    reference_price: Decimal,
    commission_pct: Decimal,
) -> Option<Decimal> {
    let factor = commission_factor(commission_pct)?;

    match direction {
        Direction::Back => {
            // Payout multiplier per unit stake once commission is taken off winnings.
            let adjusted_odds = (taken_odds - Decimal::ONE)
                .checked_mul(factor)?
                .checked_add(Decimal::ONE)?;
            let ratio = adjusted_odds.checked_div(reference_price)?;
            (ratio - Decimal::ONE).checked_mul(dec!(100))
        }
        Direction::Lay => {
            // Ratio of implied probabilities, (1 / taken) / (1 / reference).
            // Laying at a higher implied probability than fair is favourable.
            let edge = reference_price.checked_div(taken_odds)? - Decimal::ONE;
            edge.checked_mul(dec!(100))?.checked_mul(factor)
        }
    }
}

/// Estimate the EV of a wager.
///
/// Returns `None` when no EV is computable: either price is not above 1,
/// e.g. a closing price that has not been recorded yet, or the result does
/// not fit in a `Decimal`.
/// Callers must surface that as "EV not available", not as zero.
pub fn estimate_ev(
    direction: Direction,
    taken_odds: Decimal,
    reference_price: Decimal,
    stake: Decimal,
    commission_pct: Decimal,
) -> Option<EvEstimate> {
    if reference_price <= Decimal::ONE || taken_odds <= Decimal::ONE {
        debug!(
            %direction,
            taken_odds = %taken_odds,
            reference_price = %reference_price,
            "EV not computable"
        );
        return None;
    }

    // Money value comes from the unrounded percentage.
    let estimate = ev_percent(direction, taken_odds, reference_price, commission_pct)
        .and_then(|perc| Some((perc, (perc / dec!(100)).checked_mul(stake)?)));
    let Some((ev_perc, ev_val)) = estimate else {
        debug!(
            %direction,
            taken_odds = %taken_odds,
            stake = %stake,
            "EV out of range"
        );
        return None;
    };

    Some(EvEstimate {
        ev_perc: round_money(ev_perc),
        ev_val: round_money(ev_val),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
