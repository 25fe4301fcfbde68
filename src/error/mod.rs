//! Application-level error types

mod types;

pub use types::AppError;
