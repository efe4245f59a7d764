//! SQLite-backed bet store.
//!
//! Schema is created on open. Older databases get the `commission` and
//! `direction` columns added, and catalog rows without a direction get one
//! inferred from their name. Money and odds are stored as REAL.

use async_trait::async_trait;
use rust_decimal::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, SqliteExecutor};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::BetRepository;
use crate::engine::catalog::{classify, default_bet_types, BetClass, Catalog};
use crate::engine::check_commission;
use crate::engine::entry::prepare_entry;
use crate::engine::settlement::{settle, Settlement, Wager};
use crate::types::{
    ledger_date, Bet, BetKind, BetResult, BetType, Direction, LedgerError, NewBet, Outcome,
    SettleRequest,
};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const CREATE_BETS: &str = r#"
CREATE TABLE IF NOT EXISTS bets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT,
    sport TEXT,
    event TEXT,
    round_race TEXT,
    selection TEXT,
    bet TEXT,
    odds REAL,
    stake REAL,
    closing REAL,
    line TEXT,
    closing_line TEXT,
    ev_perc REAL,
    ev_val REAL,
    result TEXT DEFAULT 'PENDING',
    "return" REAL,
    commission REAL DEFAULT 0,
    bf_market_id TEXT,
    bf_selection_id TEXT,
    strategy_ref TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
)"#;

const CREATE_SPORTS: &str = r#"
CREATE TABLE IF NOT EXISTS sports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
)"#;

const CREATE_BET_TYPES: &str = r#"
CREATE TABLE IF NOT EXISTS bet_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE,
    kind TEXT DEFAULT 'line',
    direction TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
)"#;

const BET_COLUMNS: &str = r#"id, date, sport, event, round_race, selection, bet, odds, stake,
    closing, line, closing_line, ev_perc, ev_val, result, "return", commission,
    bf_market_id, bf_selection_id, strategy_ref, created_at"#;

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct BetRow {
    id: i64,
    date: Option<String>,
    sport: Option<String>,
    event: Option<String>,
    round_race: Option<String>,
    selection: Option<String>,
    bet: Option<String>,
    odds: Option<f64>,
    stake: Option<f64>,
    closing: Option<f64>,
    line: Option<String>,
    closing_line: Option<String>,
    ev_perc: Option<f64>,
    ev_val: Option<f64>,
    result: Option<String>,
    #[sqlx(rename = "return")]
    profit: Option<f64>,
    commission: Option<f64>,
    bf_market_id: Option<String>,
    bf_selection_id: Option<String>,
    strategy_ref: Option<String>,
    created_at: Option<String>,
}

fn to_decimal(value: Option<f64>) -> Option<Decimal> {
    value.and_then(Decimal::from_f64)
}

fn to_real(value: Option<Decimal>) -> Option<f64> {
    value.and_then(|d| d.to_f64())
}

impl TryFrom<BetRow> for Bet {
    type Error = LedgerError;

    fn try_from(row: BetRow) -> Result<Self, Self::Error> {
        let result = match row.result.as_deref() {
            None | Some("") => BetResult::Pending,
            Some(raw) => raw.parse().map_err(|_| {
                LedgerError::Storage(format!("bet {} has unknown result {raw:?}", row.id))
            })?,
        };
        let date = row.date.as_deref().and_then(ledger_date::parse);
        if date.is_none() && row.date.as_deref().is_some_and(|d| !d.trim().is_empty()) {
            warn!(id = row.id, date = ?row.date, "Unparseable bet date");
        }

        Ok(Bet {
            id: row.id,
            date,
            sport: row.sport,
            event: row.event,
            round_race: row.round_race,
            selection: row.selection,
            bet: row.bet,
            odds: to_decimal(row.odds),
            stake: to_decimal(row.stake),
            closing: to_decimal(row.closing),
            line: row.line,
            closing_line: row.closing_line,
            ev_perc: to_decimal(row.ev_perc),
            ev_val: to_decimal(row.ev_val),
            result,
            profit: to_decimal(row.profit),
            commission: to_decimal(row.commission),
            bf_market_id: row.bf_market_id,
            bf_selection_id: row.bf_selection_id,
            strategy_ref: row.strategy_ref,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BetTypeRow {
    name: String,
    kind: Option<String>,
    direction: Option<String>,
}

impl From<BetTypeRow> for BetType {
    fn from(row: BetTypeRow) -> Self {
        let kind = row.kind.as_deref().map(BetKind::parse_lenient).unwrap_or_default();
        let direction = row
            .direction
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or_else(|| Direction::infer_from_name(&row.name));
        BetType {
            name: row.name,
            kind,
            direction,
        }
    }
}

/// SQLite busy/locked errors mean another writer got there first.
fn is_lock_contention(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .map(|code| matches!(code.as_ref(), "5" | "6" | "517"))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Ledger rules the store applies on every write.
#[derive(Debug, Clone, Default)]
pub struct StoreSettings {
    /// Commission applied to bets submitted without one.
    pub default_commission: Decimal,
    /// Allow settling a bet that already has a terminal result.
    pub allow_resettle: bool,
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    settings: StoreSettings,
}

impl SqliteStore {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(
        path: &Path,
        max_connections: u32,
        settings: StoreSettings,
    ) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self { pool, settings };
        store.init().await?;
        info!(path = %path.display(), "Bet store opened");
        Ok(store)
    }

    /// A private in-memory database. One connection, kept alive for the
    /// life of the pool, so every query sees the same data.
    pub async fn in_memory(settings: StoreSettings) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool, settings };
        store.init().await?;
        Ok(store)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create tables, upgrade old layouts and seed the default catalog.
    async fn init(&self) -> Result<(), LedgerError> {
        for ddl in [CREATE_BETS, CREATE_SPORTS, CREATE_BET_TYPES] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        self.ensure_column("bets", "commission", "REAL DEFAULT 0").await?;
        self.ensure_column("bet_types", "direction", "TEXT").await?;

        for bet_type in default_bet_types() {
            insert_bet_type(&self.pool, &bet_type).await?;
        }
        self.backfill_directions().await?;
        Ok(())
    }

    async fn ensure_column(&self, table: &str, column: &str, decl: &str) -> Result<(), LedgerError> {
        let columns: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT name FROM pragma_table_info('{table}')"))
                .fetch_all(&self.pool)
                .await?;
        if columns.iter().any(|(name,)| name == column) {
            return Ok(());
        }
        sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))
            .execute(&self.pool)
            .await?;
        info!(table, column, "Added missing column");
        Ok(())
    }

    /// Legacy catalog rows have no direction; derive it from the name once.
    async fn backfill_directions(&self) -> Result<(), LedgerError> {
        let names: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM bet_types WHERE direction IS NULL")
                .fetch_all(&self.pool)
                .await?;
        for (name,) in names {
            let direction = Direction::infer_from_name(&name);
            sqlx::query("UPDATE bet_types SET direction = ?1 WHERE name = ?2")
                .bind(direction.as_str())
                .bind(&name)
                .execute(&self.pool)
                .await?;
            debug!(name = %name, %direction, "Back-filled bet type direction");
        }
        Ok(())
    }

    /// Classify a submitted bet. Unknown names describe a catalog entry
    /// to register, built from the submission's kind and direction.
    async fn resolve_class(&self, bet: &NewBet) -> Result<(BetClass, Option<BetType>), LedgerError> {
        let name = bet.bet.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Ok((classify(name, &Catalog::default()), None));
        }
        let known = fetch_bet_type(&self.pool, name).await?;
        match known {
            Some(entry) => Ok((
                BetClass {
                    kind: entry.kind,
                    direction: entry.direction,
                },
                None,
            )),
            None => {
                let entry = BetType::new(
                    name,
                    bet.kind.unwrap_or_default(),
                    bet.direction.unwrap_or_else(|| Direction::infer_from_name(name)),
                );
                Ok((
                    BetClass {
                        kind: entry.kind,
                        direction: entry.direction,
                    },
                    Some(entry),
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Query helpers (usable on the pool or inside a transaction)
// ---------------------------------------------------------------------------

async fn fetch_row<'e, E: SqliteExecutor<'e>>(exec: E, id: i64) -> Result<Option<BetRow>, LedgerError> {
    let row = sqlx::query_as::<_, BetRow>(&format!("SELECT {BET_COLUMNS} FROM bets WHERE id = ?1"))
        .bind(id)
        .fetch_optional(exec)
        .await?;
    Ok(row)
}

async fn fetch_bet_type<'e, E: SqliteExecutor<'e>>(
    exec: E,
    name: &str,
) -> Result<Option<BetType>, LedgerError> {
    let row = sqlx::query_as::<_, BetTypeRow>(
        "SELECT name, kind, direction FROM bet_types WHERE name = ?1",
    )
    .bind(name)
    .fetch_optional(exec)
    .await?;
    Ok(row.map(BetType::from))
}

async fn insert_bet_type<'e, E: SqliteExecutor<'e>>(exec: E, bet_type: &BetType) -> Result<(), LedgerError> {
    sqlx::query("INSERT OR IGNORE INTO bet_types (name, kind, direction) VALUES (?1, ?2, ?3)")
        .bind(&bet_type.name)
        .bind(bet_type.kind.as_str())
        .bind(bet_type.direction.as_str())
        .execute(exec)
        .await?;
    Ok(())
}

async fn insert_sport<'e, E: SqliteExecutor<'e>>(exec: E, name: &str) -> Result<(), LedgerError> {
    sqlx::query("INSERT OR IGNORE INTO sports (name) VALUES (?1)")
        .bind(name)
        .execute(exec)
        .await?;
    Ok(())
}

/// Busy or stale-snapshot writes mean another writer got to the bet first.
fn write_error(id: i64, err: sqlx::Error) -> LedgerError {
    if is_lock_contention(&err) {
        LedgerError::Conflict(id)
    } else {
        LedgerError::from(err)
    }
}

/// Write a settlement, but only over the `result`/`return` pair read at the
/// start of the transaction. Anything else is a lost race.
async fn write_settlement(
    conn: &mut SqliteConnection,
    id: i64,
    settlement: &Settlement,
    read_result: Option<String>,
    read_return: Option<f64>,
) -> Result<(), LedgerError> {
    let written = sqlx::query(
        r#"UPDATE bets SET closing = ?1, closing_line = ?2, ev_perc = ?3, ev_val = ?4,
            result = ?5, "return" = ?6
           WHERE id = ?7 AND result IS ?8 AND "return" IS ?9"#,
    )
    .bind(to_real(settlement.closing))
    .bind(&settlement.closing_line)
    .bind(to_real(settlement.ev_perc))
    .bind(to_real(settlement.ev_val))
    .bind(settlement.result.as_str())
    .bind(to_real(Some(settlement.profit)))
    .bind(id)
    .bind(read_result)
    .bind(read_return)
    .execute(conn)
    .await
    .map_err(|e| write_error(id, e))?
    .rows_affected();

    if written == 0 {
        warn!(id, "Settlement lost a race with another writer");
        return Err(LedgerError::Conflict(id));
    }
    Ok(())
}

/// Bind the 19 writable bet columns in table order.
macro_rules! bind_bet {
    ($query:expr, $bet:expr) => {
        $query
            .bind($bet.date.as_ref().map(ledger_date::format))
            .bind(&$bet.sport)
            .bind(&$bet.event)
            .bind(&$bet.round_race)
            .bind(&$bet.selection)
            .bind(&$bet.bet)
            .bind(to_real($bet.odds))
            .bind(to_real($bet.stake))
            .bind(to_real($bet.closing))
            .bind(&$bet.line)
            .bind(&$bet.closing_line)
            .bind(to_real($bet.ev_perc))
            .bind(to_real($bet.ev_val))
            .bind($bet.result.as_str())
            .bind(to_real($bet.profit))
            .bind(to_real($bet.commission))
            .bind(&$bet.bf_market_id)
            .bind(&$bet.bf_selection_id)
            .bind(&$bet.strategy_ref)
    };
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

#[async_trait]
impl BetRepository for SqliteStore {
    async fn list_bets(&self) -> Result<Vec<Bet>, LedgerError> {
        let rows = sqlx::query_as::<_, BetRow>(&format!(
            "SELECT {BET_COLUMNS} FROM bets ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Bet::try_from).collect()
    }

    async fn get_bet(&self, id: i64) -> Result<Option<Bet>, LedgerError> {
        fetch_row(&self.pool, id).await?.map(Bet::try_from).transpose()
    }

    async fn insert_bet(&self, bet: NewBet) -> Result<Bet, LedgerError> {
        let (class, new_type) = self.resolve_class(&bet).await?;
        let bet = prepare_entry(bet, class, self.settings.default_commission)?;

        let mut tx = self.pool.begin().await?;
        let query = sqlx::query(
            r#"INSERT INTO bets (date, sport, event, round_race, selection, bet, odds, stake,
                closing, line, closing_line, ev_perc, ev_val, result, "return", commission,
                bf_market_id, bf_selection_id, strategy_ref)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"#,
        );
        let id = bind_bet!(query, bet).execute(&mut *tx).await?.last_insert_rowid();

        if let Some(sport) = &bet.sport {
            insert_sport(&mut *tx, sport).await?;
        }
        if let Some(entry) = &new_type {
            insert_bet_type(&mut *tx, entry).await?;
        }

        let row = fetch_row(&mut *tx, id)
            .await?
            .ok_or_else(|| LedgerError::Storage(format!("bet {id} vanished after insert")))?;
        tx.commit().await?;

        info!(id, bet_type = ?bet.bet, kind = %class.kind, result = %bet.result, "Bet recorded");
        Bet::try_from(row)
    }

    async fn update_bet(&self, id: i64, bet: NewBet) -> Result<Option<Bet>, LedgerError> {
        let (class, new_type) = self.resolve_class(&bet).await?;
        let bet = prepare_entry(bet, class, self.settings.default_commission)?;

        let mut tx = self.pool.begin().await?;
        let query = sqlx::query(
            r#"UPDATE bets SET date = ?1, sport = ?2, event = ?3, round_race = ?4, selection = ?5,
                bet = ?6, odds = ?7, stake = ?8, closing = ?9, line = ?10, closing_line = ?11,
                ev_perc = ?12, ev_val = ?13, result = ?14, "return" = ?15, commission = ?16,
                bf_market_id = ?17, bf_selection_id = ?18, strategy_ref = ?19
               WHERE id = ?20"#,
        );
        let changed = bind_bet!(query, bet)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if changed == 0 {
            debug!(id, "Update of missing bet");
            return Ok(None);
        }

        if let Some(sport) = &bet.sport {
            insert_sport(&mut *tx, sport).await?;
        }
        if let Some(entry) = &new_type {
            insert_bet_type(&mut *tx, entry).await?;
        }

        let row = fetch_row(&mut *tx, id).await?;
        tx.commit().await?;

        info!(id, result = %bet.result, "Bet updated");
        row.map(Bet::try_from).transpose()
    }

    async fn delete_bet(&self, id: i64) -> Result<bool, LedgerError> {
        let deleted = sqlx::query("DELETE FROM bets WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if deleted > 0 {
            info!(id, "Bet deleted");
        }
        Ok(deleted > 0)
    }

    async fn settle_bet(&self, id: i64, request: SettleRequest) -> Result<Bet, LedgerError> {
        let outcome: Outcome = request.result.parse()?;
        if let Some(pct) = request.commission {
            check_commission(pct)?;
        }

        let mut tx = self.pool.begin().await?;
        let row = fetch_row(&mut *tx, id).await?.ok_or(LedgerError::NotFound(id))?;
        let (read_result, read_return) = (row.result.clone(), row.profit);
        let bet = Bet::try_from(row)?;

        if bet.is_settled() && !self.settings.allow_resettle {
            return Err(LedgerError::AlreadySettled {
                id,
                result: bet.result,
            });
        }

        let catalog = match bet.bet.as_deref() {
            Some(name) => Catalog::new(fetch_bet_type(&mut *tx, name).await?),
            None => Catalog::default(),
        };
        let wager = Wager::from_bet(&bet, &catalog);
        let commission = request.commission.unwrap_or(wager.commission);
        let settlement = settle(&wager, outcome, &request.bsp_odds, commission)?;

        write_settlement(&mut *tx, id, &settlement, read_result, read_return).await?;

        let row = fetch_row(&mut *tx, id).await?.ok_or(LedgerError::NotFound(id))?;
        tx.commit().await.map_err(|e| write_error(id, e))?;

        info!(
            id,
            %outcome,
            profit = %settlement.profit,
            closing = ?settlement.closing,
            closing_line = ?settlement.closing_line,
            ev_perc = ?settlement.ev_perc,
            "Bet settled"
        );
        Bet::try_from(row)
    }

    async fn list_sports(&self) -> Result<Vec<String>, LedgerError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM sports ORDER BY name COLLATE NOCASE")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn add_sport(&self, name: &str) -> Result<(), LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("Invalid sport name".into()));
        }
        insert_sport(&self.pool, name).await
    }

    async fn list_bet_types(&self) -> Result<Vec<BetType>, LedgerError> {
        let rows = sqlx::query_as::<_, BetTypeRow>(
            "SELECT name, kind, direction FROM bet_types ORDER BY name COLLATE NOCASE",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BetType::from).collect())
    }

    async fn add_bet_type(&self, bet_type: BetType) -> Result<(), LedgerError> {
        let name = bet_type.name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("Invalid bet type name".into()));
        }
        let entry = BetType::new(name, bet_type.kind, bet_type.direction);
        insert_bet_type(&self.pool, &entry).await?;
        info!(bet_type = %entry, "Bet type registered");
        Ok(())
    }

    async fn catalog(&self) -> Result<Catalog, LedgerError> {
        Ok(Catalog::new(self.list_bet_types().await?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
