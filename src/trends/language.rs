//! Title language tag

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language of a title batch, selecting the stop-word set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Vi,
    En,
}

impl Language {
    /// Language used for a trending region: Vietnamese for `VN`, English elsewhere
    pub fn for_region(region_code: &str) -> Self {
        if region_code.trim().eq_ignore_ascii_case("VN") {
            Language::Vi
        } else {
            Language::En
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Vi => "vi",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vi" => Ok(Language::Vi),
            "en" => Ok(Language::En),
            _ => anyhow::bail!("Invalid language: {}. Expected: vi or en", s),
        }
    }
}
