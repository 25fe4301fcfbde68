//! Wire schemas for the remote services

pub mod gemini;

pub use gemini::{
    GeminiContent, GeminiError, GeminiErrorDetail, GeminiRequest, GeminiResponse,
    GenerationConfig, InlineData, Part,
};
