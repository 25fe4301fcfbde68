//! Persistence for the last-known-good credential index
//!
//! The pool writes the cursor through a `CursorStore` whenever a call
//! succeeds, so the next session starts from the key that last worked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading or saving the cursor
#[derive(Error, Debug)]
pub enum CursorStoreError {
    #[error("Cursor file I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cursor file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Store Trait
// ============================================================================

/// Durable storage for the pool cursor
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the persisted cursor, `None` if nothing was saved yet
    async fn load(&self) -> Result<Option<usize>, CursorStoreError>;

    /// Persist the cursor
    async fn save(&self, index: usize) -> Result<(), CursorStoreError>;
}

// ============================================================================
// In-memory Store
// ============================================================================

/// Cursor store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    value: Mutex<Option<usize>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a cursor
    pub fn with_value(index: usize) -> Self {
        Self {
            value: Mutex::new(Some(index)),
        }
    }

    /// Current value, without going through the async trait
    pub fn get(&self) -> Option<usize> {
        self.value.lock().ok().and_then(|v| *v)
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<usize>, CursorStoreError> {
        Ok(self.get())
    }

    async fn save(&self, index: usize) -> Result<(), CursorStoreError> {
        if let Ok(mut value) = self.value.lock() {
            *value = Some(index);
        }
        Ok(())
    }
}

// ============================================================================
// File Store
// ============================================================================

/// On-disk representation of the cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CursorRecord {
    last_good_index: usize,
    updated_at: DateTime<Utc>,
}

/// Cursor store backed by a small JSON file
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path unique to this save, so concurrent saves never share one
    fn temp_path(&self) -> PathBuf {
        static SAVE_SEQ: AtomicU64 = AtomicU64::new(0);

        let seq = SAVE_SEQ.fetch_add(1, Ordering::Relaxed);
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "cursor".to_string());
        self.path
            .with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), seq))
    }

    fn io_error(&self, source: std::io::Error) -> CursorStoreError {
        CursorStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Option<usize>, CursorStoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let record: CursorRecord =
            serde_json::from_str(&contents).map_err(|source| CursorStoreError::Parse {
                path: self.path.clone(),
                source,
            })?;

        Ok(Some(record.last_good_index))
    }

    async fn save(&self, index: usize) -> Result<(), CursorStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        let record = CursorRecord {
            last_good_index: index,
            updated_at: Utc::now(),
        };
        let body = serde_json::to_string_pretty(&record).map_err(|source| {
            CursorStoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;

        // Write then rename: readers see the old record or the new one, never a partial file
        let temp = self.temp_path();
        if let Err(e) = tokio::fs::write(&temp, body).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(self.io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(self.io_error(e));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
