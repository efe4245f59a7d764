//! In-memory ledger for integration testing.
//!
//! A deterministic `BetRepository` built on the engine functions alone,
//! with no database. Errors can be forced to exercise failure paths.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use quark_bets::engine::catalog::{classify, Catalog};
use quark_bets::engine::entry::prepare_entry;
use quark_bets::engine::settlement::{settle, Wager};
use quark_bets::storage::BetRepository;
use quark_bets::types::*;

#[derive(Default)]
struct Ledger {
    next_id: i64,
    bets: BTreeMap<i64, Bet>,
    sports: Vec<String>,
    catalog: Catalog,
}

/// An in-memory bet repository.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<Mutex<Ledger>>,
    allow_resettle: bool,
    /// If set, all operations will return this storage error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ledger {
                catalog: Catalog::defaults(),
                ..Default::default()
            })),
            allow_resettle: false,
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn allowing_resettle() -> Self {
        Self {
            allow_resettle: true,
            ..Self::new()
        }
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    fn check(&self) -> Result<(), LedgerError> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(LedgerError::Storage(msg.clone())),
            None => Ok(()),
        }
    }

    fn prepare(ledger: &mut Ledger, bet: NewBet) -> Result<NewBet, LedgerError> {
        let name = bet.bet.as_deref().map(str::trim).unwrap_or_default().to_string();
        let mut class = classify(&name, &ledger.catalog);
        let known = ledger.catalog.entries().iter().any(|t| t.name == name);
        if !name.is_empty() && !known {
            let entry = BetType::new(
                &name,
                bet.kind.unwrap_or_default(),
                bet.direction.unwrap_or_else(|| Direction::infer_from_name(&name)),
            );
            class.kind = entry.kind;
            class.direction = entry.direction;
            ledger.catalog.insert(entry);
        }
        let bet = prepare_entry(bet, class, Decimal::ZERO)?;
        if let Some(sport) = &bet.sport {
            if !ledger.sports.contains(sport) {
                ledger.sports.push(sport.clone());
            }
        }
        Ok(bet)
    }

    fn to_bet(id: i64, bet: NewBet) -> Bet {
        Bet {
            id,
            date: bet.date,
            sport: bet.sport,
            event: bet.event,
            round_race: bet.round_race,
            selection: bet.selection,
            bet: bet.bet,
            odds: bet.odds,
            stake: bet.stake,
            closing: bet.closing,
            line: bet.line,
            closing_line: bet.closing_line,
            ev_perc: bet.ev_perc,
            ev_val: bet.ev_val,
            result: bet.result,
            profit: bet.profit,
            commission: bet.commission,
            bf_market_id: bet.bf_market_id,
            bf_selection_id: bet.bf_selection_id,
            strategy_ref: bet.strategy_ref,
            created_at: None,
        }
    }
}

#[async_trait]
impl BetRepository for MemoryLedger {
    async fn list_bets(&self) -> Result<Vec<Bet>, LedgerError> {
        self.check()?;
        let ledger = self.inner.lock().unwrap();
        Ok(ledger.bets.values().rev().cloned().collect())
    }

    async fn get_bet(&self, id: i64) -> Result<Option<Bet>, LedgerError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().bets.get(&id).cloned())
    }

    async fn insert_bet(&self, bet: NewBet) -> Result<Bet, LedgerError> {
        self.check()?;
        let mut ledger = self.inner.lock().unwrap();
        let bet = Self::prepare(&mut ledger, bet)?;
        ledger.next_id += 1;
        let id = ledger.next_id;
        let stored = Self::to_bet(id, bet);
        ledger.bets.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_bet(&self, id: i64, bet: NewBet) -> Result<Option<Bet>, LedgerError> {
        self.check()?;
        let mut ledger = self.inner.lock().unwrap();
        if !ledger.bets.contains_key(&id) {
            return Ok(None);
        }
        let bet = Self::prepare(&mut ledger, bet)?;
        let stored = Self::to_bet(id, bet);
        ledger.bets.insert(id, stored.clone());
        Ok(Some(stored))
    }

    async fn delete_bet(&self, id: i64) -> Result<bool, LedgerError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().bets.remove(&id).is_some())
    }

    async fn settle_bet(&self, id: i64, request: SettleRequest) -> Result<Bet, LedgerError> {
        self.check()?;
        let outcome: Outcome = request.result.parse()?;
        let mut ledger = self.inner.lock().unwrap();
        let catalog = ledger.catalog.clone();
        let bet = ledger.bets.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        if bet.is_settled() && !self.allow_resettle {
            return Err(LedgerError::AlreadySettled {
                id,
                result: bet.result,
            });
        }
        let wager = Wager::from_bet(bet, &catalog);
        let commission = request.commission.unwrap_or(wager.commission);
        let settlement = settle(&wager, outcome, &request.bsp_odds, commission)?;
        settlement.apply_to(bet);
        Ok(bet.clone())
    }

    async fn list_sports(&self) -> Result<Vec<String>, LedgerError> {
        self.check()?;
        let mut sports = self.inner.lock().unwrap().sports.clone();
        sports.sort_by_key(|s| s.to_lowercase());
        Ok(sports)
    }

    async fn add_sport(&self, name: &str) -> Result<(), LedgerError> {
        self.check()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("Invalid sport name".into()));
        }
        let mut ledger = self.inner.lock().unwrap();
        if !ledger.sports.iter().any(|s| s == name) {
            ledger.sports.push(name.to_string());
        }
        Ok(())
    }

    async fn list_bet_types(&self) -> Result<Vec<BetType>, LedgerError> {
        self.check()?;
        let ledger = self.inner.lock().unwrap();
        Ok(ledger.catalog.entries().into_iter().cloned().collect())
    }

    async fn add_bet_type(&self, bet_type: BetType) -> Result<(), LedgerError> {
        self.check()?;
        if bet_type.name.trim().is_empty() {
            return Err(LedgerError::Validation("Invalid bet type name".into()));
        }
        let mut ledger = self.inner.lock().unwrap();
        let known = ledger.catalog.entries().iter().any(|t| t.name == bet_type.name);
        if !known {
            ledger.catalog.insert(bet_type);
        }
        Ok(())
    }

    async fn catalog(&self) -> Result<Catalog, LedgerError> {
        self.check()?;
        Ok(self.inner.lock().unwrap().catalog.clone())
    }
}
