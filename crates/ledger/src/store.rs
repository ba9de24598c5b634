//! Ledger storage abstraction.
//!
//! `commit` is the single write path: one compare-and-swap on the level's
//! version plus the movement append, atomic together. A database adapter
//! would implement this over a real transaction; the in-memory
//! implementation does it under one write lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::level::{StockKey, StockLevel};
use crate::movement::{MovementFilter, StockMovement};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// The level's version moved underneath the writer; re-read and retry.
    #[error("version conflict (expected {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },

    /// Backend failure; not retryable.
    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}

/// Storage contract for the stock ledger.
pub trait LedgerStore: Send + Sync {
    fn level(&self, key: &StockKey) -> Option<StockLevel>;
    fn levels(&self) -> Vec<StockLevel>;

    /// Atomically write `level` and append `movement`.
    ///
    /// `expected_version` is the version the writer read (0 for a key with
    /// no row yet). The store must reject the commit if the stored version
    /// differs rather than blindly overwrite.
    fn commit(
        &self,
        expected_version: u64,
        level: StockLevel,
        movement: StockMovement,
    ) -> Result<(), CommitError>;

    /// All movements for one key, in creation order.
    fn movements_for_key(&self, key: &StockKey) -> Vec<StockMovement>;

    /// Filtered movement query, in creation order.
    fn movements(&self, filter: &MovementFilter) -> Vec<StockMovement>;

    /// Issue the next unique movement number.
    fn next_movement_number(&self) -> String;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn level(&self, key: &StockKey) -> Option<StockLevel> {
        (**self).level(key)
    }

    fn levels(&self) -> Vec<StockLevel> {
        (**self).levels()
    }

    fn commit(
        &self,
        expected_version: u64,
        level: StockLevel,
        movement: StockMovement,
    ) -> Result<(), CommitError> {
        (**self).commit(expected_version, level, movement)
    }

    fn movements_for_key(&self, key: &StockKey) -> Vec<StockMovement> {
        (**self).movements_for_key(key)
    }

    fn movements(&self, filter: &MovementFilter) -> Vec<StockMovement> {
        (**self).movements(filter)
    }

    fn next_movement_number(&self) -> String {
        (**self).next_movement_number()
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    levels: HashMap<StockKey, StockLevel>,
    // Append-only; never truncated or rewritten.
    movements: Vec<StockMovement>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
    sequence: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn level(&self, key: &StockKey) -> Option<StockLevel> {
        self.state.read().ok()?.levels.get(key).cloned()
    }

    fn levels(&self) -> Vec<StockLevel> {
        self.state
            .read()
            .map(|s| s.levels.values().cloned().collect())
            .unwrap_or_default()
    }

    fn commit(
        &self,
        expected_version: u64,
        level: StockLevel,
        movement: StockMovement,
    ) -> Result<(), CommitError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| CommitError::Unavailable("lock poisoned".to_string()))?;

        let found = state.levels.get(&level.key).map(|l| l.version).unwrap_or(0);
        if found != expected_version {
            return Err(CommitError::VersionConflict {
                expected: expected_version,
                found,
            });
        }

        state.levels.insert(level.key, level);
        state.movements.push(movement);
        Ok(())
    }

    fn movements_for_key(&self, key: &StockKey) -> Vec<StockMovement> {
        self.state
            .read()
            .map(|s| {
                s.movements
                    .iter()
                    .filter(|m| m.key() == *key)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn movements(&self, filter: &MovementFilter) -> Vec<StockMovement> {
        self.state
            .read()
            .map(|s| {
                s.movements
                    .iter()
                    .filter(|m| filter.matches(m))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn next_movement_number(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("MOV-{n:06}")
    }
}
