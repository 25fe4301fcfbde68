//! Trending keyword extraction
//!
//! Turns a batch of video titles into a ranked list of repeated, non-trivial
//! keywords that the UI renders as clickable tags.

mod keywords;
mod language;
mod stop_words;

pub use keywords::{extract_keywords, extract_keywords_with, KeywordOptions};
pub use language::Language;
