//! Results analytics.
//!
//! Filters the ledger and condenses settled bets into summary metrics and
//! a cumulative profit/EV series. Pure functions; the caller supplies the
//! bets, the catalog and today's date.

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::catalog::{classify, BetTypeCatalog};
use crate::engine::round_money;
use crate::types::{ledger_date, Bet, LedgerError};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Date window for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    All,
    Week,
    Month,
    ThreeMonths,
    SixMonths,
    Year,
    Custom {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl DateRange {
    /// Parse a range name (`all`, `week`, `month`, `3months`, `6months`,
    /// `year`, `custom`). Custom bounds come separately.
    pub fn parse(
        name: &str,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Self, LedgerError> {
        match name.trim().to_lowercase().as_str() {
            "" | "all" => Ok(DateRange::All),
            "week" => Ok(DateRange::Week),
            "month" => Ok(DateRange::Month),
            "3months" => Ok(DateRange::ThreeMonths),
            "6months" => Ok(DateRange::SixMonths),
            "year" => Ok(DateRange::Year),
            "custom" => Ok(DateRange::Custom { from, to }),
            other => Err(LedgerError::Validation(format!("Unknown date range: {other}"))),
        }
    }

    /// Look-back window for the relative ranges.
    fn lookback_days(&self) -> Option<i64> {
        match self {
            DateRange::Week => Some(7),
            DateRange::Month => Some(30),
            DateRange::ThreeMonths => Some(90),
            DateRange::SixMonths => Some(180),
            DateRange::Year => Some(365),
            DateRange::All | DateRange::Custom { .. } => None,
        }
    }

    /// Whether a bet dated `date` falls inside the range as of `today`.
    /// Undated bets only pass [`DateRange::All`].
    pub fn contains(&self, date: Option<NaiveDate>, today: NaiveDate) -> bool {
        if let DateRange::All = self {
            return true;
        }
        let Some(date) = date else {
            return false;
        };
        match self {
            DateRange::Custom { from, to } => {
                from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t)
            }
            _ => match self.lookback_days() {
                Some(days) => date >= today - Duration::days(days),
                None => true,
            },
        }
    }
}

/// Filter over the ledger. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct BetFilter {
    pub sport: Option<String>,
    pub bet_type: Option<String>,
    pub strategy: Option<String>,
    pub range: DateRange,
}

impl BetFilter {
    pub fn matches(&self, bet: &Bet, today: NaiveDate) -> bool {
        fn field_matches(wanted: &Option<String>, actual: &Option<String>) -> bool {
            match wanted.as_deref() {
                None | Some("") => true,
                Some(w) => actual.as_deref() == Some(w),
            }
        }

        field_matches(&self.sport, &bet.sport)
            && field_matches(&self.bet_type, &bet.bet)
            && field_matches(&self.strategy, &bet.strategy_ref)
            && self.range.contains(bet.date, today)
    }

    pub fn apply<'a>(&self, bets: &'a [Bet], today: NaiveDate) -> Vec<&'a Bet> {
        bets.iter().filter(|b| self.matches(b, today)).collect()
    }
}

// ---------------------------------------------------------------------------
// Summary metrics
// ---------------------------------------------------------------------------

/// Headline numbers over settled bets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub bet_count: usize,
    pub avg_stake: Decimal,
    pub total_stake: Decimal,
    pub total_profit: Decimal,
    pub avg_profit: Decimal,
    pub avg_odds: Decimal,
    pub highest_odds: Decimal,
    pub lowest_odds: Decimal,
    /// Profit on turnover, as a percentage.
    pub pot: Decimal,
    /// Present only when at least one settled bet is EV-kind.
    pub avg_ev: Option<Decimal>,
    pub total_ev: Option<Decimal>,
    pub has_ev_bets: bool,
}

impl ResultsSummary {
    fn empty() -> Self {
        Self {
            bet_count: 0,
            avg_stake: Decimal::ZERO,
            total_stake: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            avg_profit: Decimal::ZERO,
            avg_odds: Decimal::ZERO,
            highest_odds: Decimal::ZERO,
            lowest_odds: Decimal::ZERO,
            pot: Decimal::ZERO,
            avg_ev: None,
            total_ev: None,
            has_ev_bets: false,
        }
    }
}

/// Sum that clamps at the `Decimal` bounds instead of overflowing.
fn total(values: impl Iterator<Item = Decimal>) -> Decimal {
    values.fold(Decimal::ZERO, Decimal::saturating_add)
}

fn mean(total: Decimal, count: usize) -> Decimal {
    if count == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(count)
    }
}

/// Summarise the settled bets among `bets`.
pub fn summarize(bets: &[&Bet], catalog: &dyn BetTypeCatalog) -> ResultsSummary {
    let settled: Vec<&Bet> = bets.iter().copied().filter(|b| b.is_settled()).collect();
    if settled.is_empty() {
        return ResultsSummary::empty();
    }

    let total_stake = total(settled.iter().map(|b| b.stake.unwrap_or_default()));
    let total_profit = total(settled.iter().map(|b| b.profit.unwrap_or_default()));

    let odds: Vec<Decimal> = settled
        .iter()
        .filter_map(|b| b.odds)
        .filter(|o| *o > Decimal::ZERO)
        .collect();
    let avg_odds = mean(total(odds.iter().copied()), odds.len());
    let highest_odds = odds.iter().copied().max().unwrap_or_default();
    let lowest_odds = odds.iter().copied().min().unwrap_or_default();

    let pot = if total_stake > Decimal::ZERO {
        match total_profit.checked_div(total_stake) {
            Some(ratio) => ratio.saturating_mul(Decimal::ONE_HUNDRED),
            None if total_profit.is_sign_negative() => Decimal::MIN,
            None => Decimal::MAX,
        }
    } else {
        Decimal::ZERO
    };

    let ev_values: Vec<Decimal> = settled
        .iter()
        .filter(|b| is_ev_bet(b, catalog))
        .map(|b| b.ev_val.unwrap_or_default())
        .collect();
    let has_ev_bets = !ev_values.is_empty();
    let (avg_ev, total_ev) = if has_ev_bets {
        let total_ev = total(ev_values.iter().copied());
        (
            Some(round_money(mean(total_ev, ev_values.len()))),
            Some(round_money(total_ev)),
        )
    } else {
        (None, None)
    };

    ResultsSummary {
        bet_count: settled.len(),
        avg_stake: round_money(mean(total_stake, settled.len())),
        total_stake: round_money(total_stake),
        total_profit: round_money(total_profit),
        avg_profit: round_money(mean(total_profit, settled.len())),
        avg_odds: round_money(avg_odds),
        highest_odds: round_money(highest_odds),
        lowest_odds: round_money(lowest_odds),
        pot: round_money(pot),
        avg_ev,
        total_ev,
        has_ev_bets,
    }
}

fn is_ev_bet(bet: &Bet, catalog: &dyn BetTypeCatalog) -> bool {
    bet.bet
        .as_deref()
        .map(|name| classify(name, catalog).is_ev())
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Profit curve
// ---------------------------------------------------------------------------

/// One point of the cumulative profit series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitPoint {
    #[serde(with = "ledger_date")]
    pub date: Option<NaiveDate>,
    pub profit: Decimal,
    /// Cumulative EV value; absent when no settled bet is EV-kind.
    pub ev: Option<Decimal>,
}

/// Cumulative profit (and EV) over settled bets in date order.
///
/// Undated bets sort first; ties keep ledger order.
pub fn profit_curve(bets: &[&Bet], catalog: &dyn BetTypeCatalog) -> Vec<ProfitPoint> {
    let mut settled: Vec<&Bet> = bets.iter().copied().filter(|b| b.is_settled()).collect();
    settled.sort_by_key(|b| b.date);

    let track_ev = settled.iter().any(|b| is_ev_bet(b, catalog));

    let mut profit = Decimal::ZERO;
    let mut ev = Decimal::ZERO;
    settled
        .into_iter()
        .map(|bet| {
            profit = profit.saturating_add(bet.profit.unwrap_or_default());
            if is_ev_bet(bet, catalog) {
                ev = ev.saturating_add(bet.ev_val.unwrap_or_default());
            }
            ProfitPoint {
                date: bet.date,
                profit: round_money(profit),
                ev: track_ev.then(|| round_money(ev)),
            }
        })
        .collect()
}

/// Summary plus curve, as served to the results view.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsReport {
    pub summary: ResultsSummary,
    pub chart: Vec<ProfitPoint>,
}

/// Filter, summarise and chart in one pass.
pub fn report(
    bets: &[Bet],
    filter: &BetFilter,
    catalog: &dyn BetTypeCatalog,
    today: NaiveDate,
) -> ResultsReport {
    let selected = filter.apply(bets, today);
    ResultsReport {
        summary: summarize(&selected, catalog),
        chart: profit_curve(&selected, catalog),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
