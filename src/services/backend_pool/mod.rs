//! Backend Pool Module
//!
//! This module manages an ordered pool of interchangeable API keys with a
//! persisted "last known good" cursor.
//!
//! # Example
//! ```ignore
//! use keytube::services::backend_pool::{Credential, CredentialPool, FileCursorStore};
//! use std::sync::Arc;
//!
//! let keys = vec![Credential::new("key1"), Credential::new("key2")];
//! let store = Arc::new(FileCursorStore::new(".keytube/key_cursor.json"));
//! let pool = CredentialPool::restore(keys, store).await;
//!
//! println!("Starting from key #{}", pool.current_index());
//! ```

mod credential;
mod cursor_store;
mod pool;

pub use credential::Credential;
pub use cursor_store::{CursorStore, CursorStoreError, FileCursorStore, MemoryCursorStore};
pub use pool::{ConfigurationError, CredentialPool, PoolSnapshot, PoolStats};
