//! Persistence layer.
//!
//! [`BetRepository`] is the seam between the HTTP API and storage. The
//! production implementation is [`sqlite::SqliteStore`]; tests swap in
//! mocks or in-memory doubles.

pub mod seed;
pub mod sqlite;

use async_trait::async_trait;

use crate::engine::catalog::Catalog;
use crate::types::{Bet, BetType, LedgerError, NewBet, SettleRequest};

pub use sqlite::SqliteStore;

/// CRUD over bets plus the sports and bet-type catalogs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetRepository: Send + Sync {
    /// All bets, newest id first.
    async fn list_bets(&self) -> Result<Vec<Bet>, LedgerError>;

    async fn get_bet(&self, id: i64) -> Result<Option<Bet>, LedgerError>;

    /// Validate, store and return a new bet. Registers its sport and, if
    /// unknown, its bet type.
    async fn insert_bet(&self, bet: NewBet) -> Result<Bet, LedgerError>;

    /// Replace a bet. `None` if the id does not exist.
    async fn update_bet(&self, id: i64, bet: NewBet) -> Result<Option<Bet>, LedgerError>;

    /// Remove a bet. `false` if the id does not exist.
    async fn delete_bet(&self, id: i64) -> Result<bool, LedgerError>;

    /// Settle a bet as one consistent read-modify-write.
    async fn settle_bet(&self, id: i64, request: SettleRequest) -> Result<Bet, LedgerError>;

    /// Sport names, case-insensitive order.
    async fn list_sports(&self) -> Result<Vec<String>, LedgerError>;

    async fn add_sport(&self, name: &str) -> Result<(), LedgerError>;

    /// Bet types, case-insensitive order.
    async fn list_bet_types(&self) -> Result<Vec<BetType>, LedgerError>;

    /// Register a bet type. Existing names are left untouched.
    async fn add_bet_type(&self, bet_type: BetType) -> Result<(), LedgerError>;

    /// Snapshot of the bet-type catalog.
    async fn catalog(&self) -> Result<Catalog, LedgerError>;
}
