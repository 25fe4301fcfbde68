//! Credential Pool Implementation
//!
//! This module provides the `CredentialPool`: an ordered set of API keys plus
//! a "last known good" cursor that wraps modulo the pool size.

use super::credential::Credential;
use super::cursor_store::{CursorStore, CursorStoreError, MemoryCursorStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Credential configuration problems, surfaced before any remote call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("No API keys configured. Add at least one key in the settings.")]
    EmptyPool,
}

// ============================================================================
// Pool Snapshot
// ============================================================================

/// Immutable view of the pool taken at the start of one invocation
///
/// Replacing the pool while an invocation is in flight does not change the
/// credentials that invocation iterates over.
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    credentials: Arc<[Credential]>,
    cursor: usize,
    generation: u64,
}

impl PoolSnapshot {
    /// Cursor value when the snapshot was taken
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    /// `(from + 1) mod size`
    pub fn advance(&self, from: usize) -> usize {
        advance(from, self.credentials.len())
    }

    pub fn credential_at(&self, index: usize) -> Option<&Credential> {
        self.credentials.get(index)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

// ============================================================================
// Credential Pool
// ============================================================================

#[derive(Debug)]
struct PoolState {
    credentials: Arc<[Credential]>,
    generation: u64,
}

/// An ordered, rotating set of credentials
///
/// The pool is shared behind an `Arc` between concurrent invocations. The
/// only mutation an invocation performs is `mark_good`, a single integer
/// store (last writer wins). Replacement swaps the whole list and bumps a
/// generation counter so that late `mark_good` calls against the old list
/// are dropped.
pub struct CredentialPool {
    state: RwLock<PoolState>,
    cursor: AtomicUsize,
    store: Arc<dyn CursorStore>,
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPool")
            .field("len", &self.len())
            .field("cursor", &self.current_index())
            .finish()
    }
}

impl CredentialPool {
    /// Create a pool starting at index 0
    ///
    /// An empty list is accepted here; invoking against it fails fast with
    /// `ConfigurationError::EmptyPool`.
    pub fn new(credentials: Vec<Credential>, store: Arc<dyn CursorStore>) -> Self {
        Self {
            state: RwLock::new(PoolState {
                credentials: credentials.into(),
                generation: 0,
            }),
            cursor: AtomicUsize::new(0),
            store,
        }
    }

    /// Create a pool whose cursor only lives in memory
    pub fn in_memory(credentials: Vec<Credential>) -> Self {
        Self::new(credentials, Arc::new(MemoryCursorStore::new()))
    }

    /// Create a pool and seed the cursor from the store
    ///
    /// A missing, unreadable or out-of-range persisted cursor starts at 0.
    pub async fn restore(credentials: Vec<Credential>, store: Arc<dyn CursorStore>) -> Self {
        let len = credentials.len();
        let cursor = match store.load().await {
            Ok(Some(index)) if index < len => index,
            Ok(Some(index)) => {
                tracing::warn!(
                    persisted = index,
                    pool_size = len,
                    "Persisted key cursor out of range, starting from the first key"
                );
                0
            }
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load key cursor, starting from the first key");
                0
            }
        };

        let pool = Self::new(credentials, store);
        pool.cursor.store(cursor, Ordering::SeqCst);
        pool
    }

    /// Install a new credential list and reset the cursor to 0
    ///
    /// Fails with `ConfigurationError::EmptyPool` on an empty list, leaving
    /// the current pool untouched.
    pub async fn replace(&self, credentials: Vec<Credential>) -> Result<(), ConfigurationError> {
        if credentials.is_empty() {
            return Err(ConfigurationError::EmptyPool);
        }

        let len = credentials.len();
        {
            let mut state = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.credentials = credentials.into();
            state.generation += 1;
            self.cursor.store(0, Ordering::SeqCst);
        }

        tracing::info!(key_count = len, "Replaced credential pool");

        if let Err(e) = self.store.save(0).await {
            tracing::warn!(error = %e, "Failed to persist reset key cursor");
        }
        Ok(())
    }

    /// Take an immutable snapshot for one invocation
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.read_state();
        PoolSnapshot {
            credentials: Arc::clone(&state.credentials),
            cursor: self.cursor.load(Ordering::SeqCst),
            generation: state.generation,
        }
    }

    /// Current "last known good" index
    pub fn current_index(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// `(from + 1) mod size`, no mutation
    pub fn advance(&self, from: usize) -> usize {
        advance(from, self.len())
    }

    /// Record `index` as the last credential that worked and persist it
    pub async fn mark_good(&self, index: usize) -> Result<(), CursorStoreError> {
        let generation = self.read_state().generation;
        self.mark_good_in(generation, index).await
    }

    /// `mark_good` scoped to a pool generation
    ///
    /// Ignored when the pool has been replaced since `generation` or when the
    /// index no longer fits.
    pub async fn mark_good_in(&self, generation: u64, index: usize) -> Result<(), CursorStoreError> {
        {
            let state = self.read_state();
            if state.generation != generation || index >= state.credentials.len() {
                tracing::debug!(
                    index,
                    generation,
                    current_generation = state.generation,
                    "Dropping stale key cursor update"
                );
                return Ok(());
            }
            self.cursor.store(index, Ordering::SeqCst);
        }

        self.store.save(index).await
    }

    /// Get a credential by index
    pub fn credential_at(&self, index: usize) -> Option<Credential> {
        self.read_state().credentials.get(index).cloned()
    }

    /// Get the number of credentials
    pub fn len(&self) -> usize {
        self.read_state().credentials.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = self.read_state();
        PoolStats {
            total: state.credentials.len(),
            cursor: self.cursor.load(Ordering::SeqCst),
            generation: state.generation,
            masked_keys: state.credentials.iter().map(Credential::masked).collect(),
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PoolState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn advance(from: usize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (from + 1) % len
}

// ============================================================================
// Pool Statistics
// ============================================================================

/// Statistics about a credential pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total number of credentials
    pub total: usize,
    /// Last known good index
    pub cursor: usize,
    /// Number of replacements since creation
    pub generation: u64,
    /// Keys in pool order, masked
    pub masked_keys: Vec<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_credentials() -> Vec<Credential> {
        vec![
            Credential::new("k1"),
            Credential::new("k2"),
            Credential::new("k3"),
        ]
    }

    #[test]
    fn test_new_pool_starts_at_zero() {
        let pool = CredentialPool::in_memory(create_test_credentials());
        assert_eq!(pool.len(), 3);
        assert!(!pool.is_empty());
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn test_advance_wraps() {
        let pool = CredentialPool::in_memory(create_test_credentials());
        assert_eq!(pool.advance(0), 1);
        assert_eq!(pool.advance(1), 2);
        assert_eq!(pool.advance(2), 0);
        // Pure: the cursor does not move
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn test_advance_on_empty_pool() {
        let pool = CredentialPool::in_memory(Vec::new());
        assert_eq!(pool.advance(0), 0);
    }

    #[tokio::test]
    async fn test_mark_good_persists() {
        let store = Arc::new(MemoryCursorStore::new());
        let pool = CredentialPool::new(create_test_credentials(), store.clone());

        pool.mark_good(2).await.unwrap();
        assert_eq!(pool.current_index(), 2);
        assert_eq!(store.get(), Some(2));
    }

    #[tokio::test]
    async fn test_replace_resets_cursor() {
        let store = Arc::new(MemoryCursorStore::new());
        let pool = CredentialPool::new(create_test_credentials(), store.clone());
        pool.mark_good(2).await.unwrap();

        pool.replace(vec![Credential::new("n1"), Credential::new("n2")])
            .await
            .unwrap();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.current_index(), 0);
        assert_eq!(store.get(), Some(0));
        assert_eq!(pool.credential_at(0).unwrap().api_key(), "n1");
    }

    #[tokio::test]
    async fn test_replace_with_empty_list_fails() {
        let pool = CredentialPool::in_memory(create_test_credentials());
        pool.mark_good(1).await.unwrap();

        let err = pool.replace(Vec::new()).await.unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyPool);

        // Existing pool untouched
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.current_index(), 1);
    }

    #[tokio::test]
    async fn test_stale_mark_good_is_dropped() {
        let pool = CredentialPool::in_memory(create_test_credentials());
        let snapshot = pool.snapshot();

        pool.replace(vec![Credential::new("n1"), Credential::new("n2")])
            .await
            .unwrap();
        pool.mark_good_in(snapshot.generation(), 1).await.unwrap();

        assert_eq!(pool.current_index(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_replace() {
        let pool = CredentialPool::in_memory(create_test_credentials());
        let snapshot = pool.snapshot();

        pool.replace(vec![Credential::new("n1")]).await.unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.credential_at(2).unwrap().api_key(), "k3");
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_restore_uses_persisted_cursor() {
        let store = Arc::new(MemoryCursorStore::with_value(1));
        let pool = CredentialPool::restore(create_test_credentials(), store).await;
        assert_eq!(pool.current_index(), 1);
    }

    #[tokio::test]
    async fn test_restore_out_of_range_cursor_falls_back() {
        let store = Arc::new(MemoryCursorStore::with_value(7));
        let pool = CredentialPool::restore(create_test_credentials(), store).await;
        assert_eq!(pool.current_index(), 0);
    }

    #[test]
    fn test_pool_stats() {
        let pool = CredentialPool::in_memory(vec![Credential::new("AIzaSyDwTSvkH1mvEuXw3DbK")]);
        let stats = pool.stats();

        assert_eq!(stats.total, 1);
        assert_eq!(stats.cursor, 0);
        assert_eq!(stats.generation, 0);
        assert_eq!(stats.masked_keys, vec!["AIza…3DbK".to_string()]);
    }
}
