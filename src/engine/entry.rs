//! Entry preparation for new and edited bets.
//!
//! Normalizes the submitted record, rejects values the ledger cannot hold,
//! and runs the EV estimator live against the closing estimate so stored EV
//! fields always match the odds they were computed from.

use rust_decimal::Decimal;
use tracing::debug;

use super::catalog::BetClass;
use super::check_commission;
use super::ev::estimate_ev;
use super::settlement::raw_return;
use crate::types::{Direction, LedgerError, NewBet, Outcome};

/// Trim a text field; blank becomes absent.
fn clean(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Validate and normalize a bet before it is stored.
///
/// * text fields are trimmed, blanks dropped
/// * missing commission takes `default_commission`
/// * stake must not be negative, commission must be within 0–100
/// * odds × stake must be representable
/// * PENDING bets carry no return; settled bets must carry one
/// * line bets carry no EV; EV bets get EV recomputed from `closing`
///   when the estimator can, keeping supplied values otherwise
pub fn prepare_entry(
    bet: NewBet,
    class: BetClass,
    default_commission: Decimal,
) -> Result<NewBet, LedgerError> {
    let mut bet = NewBet {
        sport: clean(bet.sport),
        event: clean(bet.event),
        round_race: clean(bet.round_race),
        selection: clean(bet.selection),
        bet: clean(bet.bet),
        line: clean(bet.line),
        closing_line: clean(bet.closing_line),
        bf_market_id: clean(bet.bf_market_id),
        bf_selection_id: clean(bet.bf_selection_id),
        strategy_ref: clean(bet.strategy_ref),
        ..bet
    };

    let commission = check_commission(bet.commission.unwrap_or(default_commission))?;
    bet.commission = Some(commission);

    if let Some(stake) = bet.stake {
        if stake < Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "stake must not be negative, got {stake}"
            )));
        }
    }

    // The liability must be representable or the bet could never settle.
    if let (Some(odds), Some(stake)) = (bet.odds, bet.stake) {
        if raw_return(Direction::Back, Outcome::Win, odds, stake).is_none() {
            return Err(LedgerError::Validation(format!(
                "stake {stake} at odds {odds} is out of range"
            )));
        }
    }

    if bet.result.is_terminal() {
        if bet.profit.is_none() {
            return Err(LedgerError::Validation(format!(
                "a {} bet needs a return",
                bet.result
            )));
        }
    } else {
        bet.profit = None;
    }

    if class.is_ev() {
        let live = match (bet.odds, bet.closing) {
            (Some(odds), Some(closing)) => estimate_ev(
                class.direction,
                odds,
                closing,
                bet.stake.unwrap_or_default(),
                commission,
            ),
            _ => None,
        };
        if let Some(ev) = live {
            debug!(ev_perc = %ev.ev_perc, ev_val = %ev.ev_val, "Live EV computed");
            bet.ev_perc = Some(ev.ev_perc);
            bet.ev_val = Some(ev.ev_val);
        }
    } else {
        bet.ev_perc = None;
        bet.ev_val = None;
    }

    Ok(bet)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
