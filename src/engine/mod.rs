//! Core engine: EV estimation, settlement and bet classification.
//!
//! Everything in here is a pure function over values the caller has
//! already fetched. Persistence and the catalog live with the caller.

pub mod catalog;
pub mod entry;
pub mod ev;
pub mod settlement;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::types::LedgerError;

/// Round a money/percentage value to 2 dp, halves away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Share of winnings kept after commission: `1 - pct / 100`.
/// `None` if the percentage is too large to represent.
pub fn commission_factor(commission_pct: Decimal) -> Option<Decimal> {
    Decimal::ONE.checked_sub(commission_pct.checked_div(dec!(100))?)
}

/// Commission is a percentage in `0..=100`.
pub fn check_commission(commission_pct: Decimal) -> Result<Decimal, LedgerError> {
    if commission_pct < Decimal::ZERO || commission_pct > Decimal::ONE_HUNDRED {
        return Err(LedgerError::Validation(format!(
            "commission must be between 0 and 100, got {commission_pct}"
        )));
    }
    Ok(commission_pct)
}
