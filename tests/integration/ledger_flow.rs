//! End-to-end ledger flows: record, settle, re-read and report, against
//! both the in-memory ledger and an in-memory SQLite store.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use quark_bets::analytics::{self, BetFilter, DateRange};
use quark_bets::storage::seed::seed_demo;
use quark_bets::storage::sqlite::{SqliteStore, StoreSettings};
use quark_bets::storage::BetRepository;
use quark_bets::types::*;

use crate::memory_ledger::MemoryLedger;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

fn wager(bet_type: &str, odds: Decimal, stake: Decimal, commission: Decimal) -> NewBet {
    NewBet {
        date: Some(today()),
        sport: Some("Horse".into()),
        selection: Some("Thunder".into()),
        bet: Some(bet_type.into()),
        odds: Some(odds),
        stake: Some(stake),
        commission: Some(commission),
        strategy_ref: Some("S1".into()),
        ..Default::default()
    }
}

fn settle_with(result: &str, bsp: ReferencePrice) -> SettleRequest {
    SettleRequest {
        result: result.into(),
        bsp_odds: bsp,
        commission: None,
    }
}

/// Record, settle and re-read on any repository.
async fn settle_round_trip(repo: &dyn BetRepository) {
    let bet = repo.insert_bet(wager("Lay Win", dec!(4), dec!(5), dec!(0))).await.unwrap();
    let settled = repo
        .settle_bet(bet.id, settle_with("LOSE", ReferencePrice::new("3.5")))
        .await
        .unwrap();

    assert_eq!(settled.result, BetResult::Lose);
    assert_eq!(settled.profit, Some(dec!(-15)));
    assert_eq!(settled.closing, Some(dec!(3.5)));
    assert_eq!(settled.ev_perc, Some(dec!(-12.5)));
    assert_eq!(settled.ev_val, Some(dec!(-0.63)));

    let reread = repo.get_bet(bet.id).await.unwrap().unwrap();
    assert_eq!(reread.result, settled.result);
    assert_eq!(reread.profit, settled.profit);
    assert_eq!(reread.closing, settled.closing);
    assert_eq!(reread.closing_line, settled.closing_line);
    assert_eq!(reread.ev_perc, settled.ev_perc);
    assert_eq!(reread.ev_val, settled.ev_val);
}

#[tokio::test]
async fn test_round_trip_memory_ledger() {
    settle_round_trip(&MemoryLedger::new()).await;
}

#[tokio::test]
async fn test_round_trip_sqlite() {
    let store = SqliteStore::in_memory(StoreSettings::default()).await.unwrap();
    settle_round_trip(&store).await;
}

#[tokio::test]
async fn test_void_returns_exactly_zero() {
    let repo = MemoryLedger::new();
    let bet = repo.insert_bet(wager("Win", dec!(7.5), dec!(12.34), dec!(5))).await.unwrap();
    let settled = repo
        .settle_bet(bet.id, settle_with("void", ReferencePrice::missing()))
        .await
        .unwrap();
    assert_eq!(settled.result, BetResult::Void);
    assert_eq!(settled.profit, Some(Decimal::ZERO));
}

#[tokio::test]
async fn test_missing_reference_keeps_ev() {
    let repo = MemoryLedger::new();
    let mut nb = wager("Win", dec!(2.5), dec!(10), dec!(8));
    nb.closing = Some(dec!(2.2));
    let bet = repo.insert_bet(nb).await.unwrap();
    assert_eq!(bet.ev_perc, Some(dec!(8.18)));

    let settled = repo
        .settle_bet(bet.id, settle_with("WIN", ReferencePrice::missing()))
        .await
        .unwrap();
    assert_eq!(settled.closing, None);
    assert_eq!(settled.ev_perc, Some(dec!(8.18)));
    assert_eq!(settled.profit, Some(dec!(13.8)));
}

#[tokio::test]
async fn test_line_bet_stores_textual_reference() {
    let repo = MemoryLedger::new();
    let mut nb = wager("Total Over", dec!(1.9), dec!(20), dec!(0));
    nb.line = Some("45.5".into());
    let bet = repo.insert_bet(nb).await.unwrap();

    let settled = repo
        .settle_bet(bet.id, settle_with("LOSE", ReferencePrice::new("47.5")))
        .await
        .unwrap();
    assert_eq!(settled.closing_line.as_deref(), Some("47.5"));
    assert_eq!(settled.closing, None);
    assert_eq!(settled.ev_perc, None);
    assert_eq!(settled.profit, Some(dec!(-20)));
}

#[tokio::test]
async fn test_resettle_policy() {
    let strict = MemoryLedger::new();
    let bet = strict.insert_bet(wager("Place", dec!(1.8), dec!(10), dec!(0))).await.unwrap();
    strict.settle_bet(bet.id, settle_with("WIN", ReferencePrice::missing())).await.unwrap();
    let err = strict
        .settle_bet(bet.id, settle_with("LOSE", ReferencePrice::missing()))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadySettled { .. }));

    let lenient = MemoryLedger::allowing_resettle();
    let bet = lenient.insert_bet(wager("Place", dec!(1.8), dec!(10), dec!(0))).await.unwrap();
    lenient.settle_bet(bet.id, settle_with("WIN", ReferencePrice::missing())).await.unwrap();
    let again = lenient
        .settle_bet(bet.id, settle_with("LOSE", ReferencePrice::missing()))
        .await
        .unwrap();
    assert_eq!(again.profit, Some(dec!(-10)));
}

#[tokio::test]
async fn test_concurrent_settlements_write_once() {
    let store = SqliteStore::in_memory(StoreSettings::default()).await.unwrap();
    let bet = store.insert_bet(wager("Win", dec!(3), dec!(10), dec!(0))).await.unwrap();

    let (a, b) = tokio::join!(
        store.settle_bet(bet.id, settle_with("WIN", ReferencePrice::missing())),
        store.settle_bet(bet.id, settle_with("LOSE", ReferencePrice::missing())),
    );
    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1);

    let stored = store.get_bet(bet.id).await.unwrap().unwrap();
    let expected = if stored.result == BetResult::Win { dec!(20) } else { dec!(-10) };
    assert_eq!(stored.profit, Some(expected));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_racing_resettles_on_file_store() {
    let mut path = std::env::temp_dir();
    path.push(format!("quark_bets_race_{}.db", uuid::Uuid::new_v4()));
    let settings = StoreSettings {
        allow_resettle: true,
        ..Default::default()
    };
    let store = SqliteStore::open(&path, 2, settings).await.unwrap();
    let bet = store.insert_bet(wager("Win", dec!(3), dec!(10), dec!(0))).await.unwrap();

    let id = bet.id;
    let mut handles = Vec::new();
    for result in ["WIN", "LOSE", "WIN", "LOSE"] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.settle_bet(id, settle_with(result, ReferencePrice::missing())).await
        }));
    }

    let mut written = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(settled) => written.push(settled.result),
            Err(err) => assert!(matches!(err, LedgerError::Conflict(c) if c == id)),
        }
    }
    assert!(!written.is_empty());

    // last writer wins, and every write was whole
    let stored = store.get_bet(bet.id).await.unwrap().unwrap();
    assert!(written.contains(&stored.result));
    let expected = if stored.result == BetResult::Win { dec!(20) } else { dec!(-10) };
    assert_eq!(stored.profit, Some(expected));

    store.close().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_seeded_results_report() {
    let store = SqliteStore::in_memory(StoreSettings::default()).await.unwrap();
    seed_demo(&store, today()).await.unwrap();

    let bets = store.list_bets().await.unwrap();
    let catalog = store.catalog().await.unwrap();
    let report = analytics::report(&bets, &BetFilter::default(), &catalog, today());

    // settled: Thunder WIN +13.80 (stake 10, odds 2.5), Runner LOSE -15.00 (stake 5, odds 4)
    let summary = &report.summary;
    assert_eq!(summary.bet_count, 2);
    assert_eq!(summary.total_stake, dec!(15));
    assert_eq!(summary.total_profit, dec!(-1.2));
    assert_eq!(summary.pot, dec!(-8));
    assert_eq!(summary.highest_odds, dec!(4));
    assert_eq!(summary.lowest_odds, dec!(2.5));
    assert!(summary.has_ev_bets);

    // oldest first: the lay (20 days ago) then the back (3 days ago)
    assert_eq!(report.chart.len(), 2);
    assert_eq!(report.chart[0].profit, dec!(-15));
    assert_eq!(report.chart[1].profit, dec!(-1.2));

    let week = BetFilter {
        range: DateRange::Week,
        ..Default::default()
    };
    let report = analytics::report(&bets, &week, &catalog, today());
    assert_eq!(report.summary.bet_count, 1);
    assert_eq!(report.summary.total_profit, dec!(13.8));

    let s3 = BetFilter {
        strategy: Some("S3".into()),
        ..Default::default()
    };
    let report = analytics::report(&bets, &s3, &catalog, today());
    assert_eq!(report.summary.bet_count, 1);
    assert_eq!(report.summary.total_profit, dec!(-15));
}

#[tokio::test]
async fn test_forced_storage_error_propagates() {
    let repo = MemoryLedger::new();
    repo.set_error("disk full");
    let err = repo.list_bets().await.unwrap_err();
    assert!(matches!(err, LedgerError::Storage(msg) if msg == "disk full"));
}
