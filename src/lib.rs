//! KeyTube core library
//!
//! Multi-key Gemini failover and trending-keyword extraction for YouTube SEO
//! tooling.

// Public modules
pub mod config;
pub mod error;
pub mod schemas;
pub mod services;
pub mod trends;

// Re-export commonly used types
pub use config::Settings;
pub use error::AppError;
pub use services::{CredentialPool, FailoverInvoker, InvokeError};
pub use trends::{extract_keywords, Language};
