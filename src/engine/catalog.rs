//! Bet-type classification.
//!
//! Resolves a wager's bet-type name to its kind (line/ev) and direction
//! (back/lay). The catalog is passed in by the caller; the engine never
//! reaches for it on its own.

use std::collections::HashMap;

use crate::types::{BetKind, BetType, Direction};

/// Read-only view of the bet-type catalog.
pub trait BetTypeCatalog {
    /// Look up a bet type by exact name.
    fn lookup(&self, name: &str) -> Option<&BetType>;
}

/// The catalog entries a fresh ledger starts with.
pub fn default_bet_types() -> Vec<BetType> {
    vec![
        BetType::new("Total Over", BetKind::Line, Direction::Back),
        BetType::new("Total Under", BetKind::Line, Direction::Back),
        BetType::new("Line", BetKind::Line, Direction::Back),
        BetType::new("Disposals", BetKind::Line, Direction::Back),
        BetType::new("Win", BetKind::Ev, Direction::Back),
        BetType::new("Place", BetKind::Ev, Direction::Back),
        BetType::new("Lay Win", BetKind::Ev, Direction::Lay),
        BetType::new("Lay Place", BetKind::Ev, Direction::Lay),
    ]
}

/// In-memory catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: HashMap<String, BetType>,
}

impl Catalog {
    pub fn new(types: impl IntoIterator<Item = BetType>) -> Self {
        Self {
            types: types.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Catalog holding [`default_bet_types`].
    pub fn defaults() -> Self {
        Self::new(default_bet_types())
    }

    pub fn insert(&mut self, bet_type: BetType) {
        self.types.insert(bet_type.name.clone(), bet_type);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Entries sorted by name, case-insensitively.
    pub fn entries(&self) -> Vec<&BetType> {
        let mut entries: Vec<_> = self.types.values().collect();
        entries.sort_by_key(|t| t.name.to_lowercase());
        entries
    }
}

impl BetTypeCatalog for Catalog {
    fn lookup(&self, name: &str) -> Option<&BetType> {
        self.types.get(name)
    }
}

/// Resolved classification of a wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetClass {
    pub kind: BetKind,
    pub direction: Direction,
}

impl BetClass {
    pub fn is_ev(&self) -> bool {
        self.kind == BetKind::Ev
    }
}

/// Classify a bet-type name against the catalog.
///
/// Known names use the catalog's kind and direction. Unknown names are
/// line bets whose direction is inferred from the name.
pub fn classify(name: &str, catalog: &dyn BetTypeCatalog) -> BetClass {
    match catalog.lookup(name) {
        Some(entry) => BetClass {
            kind: entry.kind,
            direction: entry.direction,
        },
        None => BetClass {
            kind: BetKind::Line,
            direction: Direction::infer_from_name(name),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
