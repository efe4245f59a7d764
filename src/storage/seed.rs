//! Demo data for a fresh ledger.
//!
//! Two pending bets (one EV, one line) and two settled ones (a winning back
//! and a losing lay), dated relative to `today` so every range filter has
//! something to show.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use super::BetRepository;
use crate::types::{BetResult, LedgerError, NewBet};

pub const DEMO_SPORTS: [&str; 3] = ["Horse", "Greyhound", "Harness"];

#[allow(clippy::too_many_arguments)]
fn demo_bet(
    date: NaiveDate,
    sport: &str,
    event: &str,
    round_race: Option<&str>,
    selection: &str,
    bet_type: &str,
    odds: Decimal,
    stake: Decimal,
    commission: Decimal,
    strategy: &str,
) -> NewBet {
    NewBet {
        date: Some(date),
        sport: Some(sport.into()),
        event: Some(event.into()),
        round_race: round_race.map(str::to_string),
        selection: Some(selection.into()),
        bet: Some(bet_type.into()),
        odds: Some(odds),
        stake: Some(stake),
        commission: Some(commission),
        strategy_ref: Some(strategy.into()),
        ..Default::default()
    }
}

/// The four demo wagers. EV fields are left for the store to compute.
pub fn demo_bets(today: NaiveDate) -> Vec<NewBet> {
    let mut pending_ev = demo_bet(
        today,
        "Horse",
        "Spring Cup",
        Some("Final"),
        "Speedster",
        "Win",
        dec!(3.5),
        dec!(10),
        dec!(8),
        "S1",
    );
    pending_ev.closing = Some(dec!(4.0));

    let mut pending_line = demo_bet(
        today,
        "Greyhound",
        "Final Dash",
        None,
        "Flash",
        "Line",
        dec!(2.0),
        dec!(20),
        Decimal::ZERO,
        "S2",
    );
    pending_line.line = Some("2.5".into());
    pending_line.closing_line = Some("2.5".into());

    let mut settled_back = demo_bet(
        today - Duration::days(3),
        "Horse",
        "Autumn Stakes",
        Some("Heat 1"),
        "Thunder",
        "Win",
        dec!(2.5),
        dec!(10),
        dec!(8),
        "S1",
    );
    settled_back.closing = Some(dec!(2.8));
    settled_back.result = BetResult::Win;
    settled_back.profit = Some(dec!(13.80));

    let mut settled_lay = demo_bet(
        today - Duration::days(20),
        "Harness",
        "Night Cup",
        None,
        "Runner",
        "Lay Win",
        dec!(4.0),
        dec!(5),
        Decimal::ZERO,
        "S3",
    );
    settled_lay.closing = Some(dec!(3.5));
    settled_lay.result = BetResult::Lose;
    settled_lay.profit = Some(dec!(-15.00));

    vec![pending_ev, pending_line, settled_back, settled_lay]
}

/// Insert the demo sports and bets. Returns the number of bets written.
pub async fn seed_demo(repo: &dyn BetRepository, today: NaiveDate) -> Result<usize, LedgerError> {
    for sport in DEMO_SPORTS {
        repo.add_sport(sport).await?;
    }

    let bets = demo_bets(today);
    let count = bets.len();
    for bet in bets {
        repo.insert_bet(bet).await?;
    }

    info!(bets = count, sports = DEMO_SPORTS.len(), "Demo ledger seeded");
    Ok(count)
}
