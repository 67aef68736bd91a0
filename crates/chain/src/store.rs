//! Ordered keyed store with block-scoped transactions.
//!
//! The engine never touches a real database; it sees this trait. Iteration
//! is lexicographic on raw key bytes, always — an unordered map is never
//! observable from consensus code.
//!
//! ## Transaction model
//!
//! A block runs against a [`TxnStore`]: a write overlay over a borrowed base
//! store. Reads fall through to the base, writes buffer in the overlay, and
//! prefix iteration merges both sides in key order with the overlay winning.
//! On success the caller applies the overlay's [`WriteSet`] to the base in
//! one step; on a fatal error the overlay is simply dropped. Either way the
//! base store is never left half-written.
//!
//! ## Determinism Guarantee
//!
//! Urutan iterasi mengikuti urutan byte key, SELALU. Input yang sama
//! menghasilkan urutan entry yang identik, tidak bergantung pada platform
//! atau runtime state.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::error::ChainError;

/// Store-level failure. The in-memory store cannot fail; the type exists so
/// the engine's propagation paths are real and testable with faulty stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl From<StoreError> for ChainError {
    fn from(err: StoreError) -> Self {
        ChainError::Store(err.0)
    }
}

/// Ordered keyed byte store.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;
    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;
    /// All entries whose key starts with `prefix`, ascending by key bytes.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Buffered writes of one block. `None` marks a deletion.
pub type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// In-memory ordered store backing tests and the transaction overlay.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemStore {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    /// Apply a committed write set atomically (in-memory, so atomicity is
    /// just "no fallible step in between").
    ///
    /// Commit menerapkan SEMUA write dalam satu langkah.
    pub fn apply(&mut self, writes: WriteSet) {
        for (key, value) in writes {
            match value {
                Some(bytes) => {
                    self.map.insert(key, bytes);
                }
                None => {
                    self.map.remove(&key);
                }
            }
        }
    }

    /// Full ordered dump. The determinism tests compare these transcripts.
    pub fn dump(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.map.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.map.remove(key);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

/// Write overlay over a borrowed base store.
///
/// Transaksi yang di-drop TIDAK menyimpan apapun (rollback otomatis).
pub struct TxnStore<'a, S: KvStore> {
    base: &'a S,
    overlay: WriteSet,
}

impl<'a, S: KvStore> TxnStore<'a, S> {
    pub fn new(base: &'a S) -> Self {
        TxnStore { base, overlay: WriteSet::new() }
    }

    /// Consume the transaction, yielding the buffered writes for commit.
    pub fn into_writes(self) -> WriteSet {
        self.overlay
    }
}

impl<'a, S: KvStore> KvStore for TxnStore<'a, S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        match self.overlay.get(key) {
            Some(Some(value)) => Ok(Some(value.clone())),
            Some(None) => Ok(None),
            None => self.base.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.overlay.insert(key, Some(value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.overlay.insert(key.to_vec(), None);
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let base_entries = self.base.iter_prefix(prefix)?;
        let overlay_entries: Vec<(&Vec<u8>, &Option<Vec<u8>>)> = self
            .overlay
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .collect();

        // Ordered two-way merge; the overlay wins on key collisions and its
        // deletions mask base entries.
        let mut merged = Vec::new();
        let mut base_iter = base_entries.into_iter().peekable();
        let mut over_iter = overlay_entries.into_iter().peekable();
        loop {
            match (base_iter.peek(), over_iter.peek()) {
                (Some((bk, _)), Some((ok, _))) => {
                    if bk < *ok {
                        let (k, v) = base_iter.next().expect("peeked");
                        merged.push((k, v));
                    } else if bk == *ok {
                        base_iter.next();
                        let (k, v) = over_iter.next().expect("peeked");
                        if let Some(value) = v {
                            merged.push((k.clone(), value.clone()));
                        }
                    } else {
                        let (k, v) = over_iter.next().expect("peeked");
                        if let Some(value) = v {
                            merged.push((k.clone(), value.clone()));
                        }
                    }
                }
                (Some(_), None) => {
                    let (k, v) = base_iter.next().expect("peeked");
                    merged.push((k, v));
                }
                (None, Some(_)) => {
                    let (k, v) = over_iter.next().expect("peeked");
                    if let Some(value) = v {
                        merged.push((k.clone(), value.clone()));
                    }
                }
                (None, None) => break,
            }
        }
        Ok(merged)
    }
}
