//! SEO analysis report
//!
//! Builds the `GenerateText` request for the "analyze" operation: a Markdown
//! SEO report on one video, written in the requested output language.

use super::gemini::TextRequest;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output language of the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportLanguage {
    #[default]
    Vi,
    En,
    Es,
    Fr,
    De,
    Ja,
    Ko,
}

impl ReportLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            ReportLanguage::Vi => "vi",
            ReportLanguage::En => "en",
            ReportLanguage::Es => "es",
            ReportLanguage::Fr => "fr",
            ReportLanguage::De => "de",
            ReportLanguage::Ja => "ja",
            ReportLanguage::Ko => "ko",
        }
    }

    /// Name of the language in that language, as the model should read it
    pub fn native_name(&self) -> &'static str {
        match self {
            ReportLanguage::Vi => "Tiếng Việt",
            ReportLanguage::En => "English",
            ReportLanguage::Es => "Español",
            ReportLanguage::Fr => "Français",
            ReportLanguage::De => "Deutsch",
            ReportLanguage::Ja => "日本語",
            ReportLanguage::Ko => "한국어",
        }
    }
}

impl fmt::Display for ReportLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for ReportLanguage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vi" => Ok(ReportLanguage::Vi),
            "en" => Ok(ReportLanguage::En),
            "es" => Ok(ReportLanguage::Es),
            "fr" => Ok(ReportLanguage::Fr),
            "de" => Ok(ReportLanguage::De),
            "ja" => Ok(ReportLanguage::Ja),
            "ko" => Ok(ReportLanguage::Ko),
            _ => anyhow::bail!(
                "Invalid report language: {}. Expected one of: vi, en, es, fr, de, ja, ko",
                s
            ),
        }
    }
}

/// Video and channel metadata the report is written about
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    /// ISO 8601 duration as reported by YouTube, e.g. `PT12M3S`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl VideoDetails {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }

    pub fn channel_url(&self) -> String {
        format!("https://www.youtube.com/channel/{}", self.channel_id)
    }
}

fn or_none(value: Option<String>) -> String {
    value.unwrap_or_else(|| "none".to_string())
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

/// Prompt for the SEO analysis report
pub fn analysis_prompt(video: &VideoDetails, lang: ReportLanguage) -> String {
    let language = lang.native_name();
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are a YouTube SEO assistant. Write an in-depth SEO analysis report in \
         Markdown for the video below. The report MUST be written in **{}**.\n\n",
        language
    ));

    prompt.push_str("Video and channel data:\n");
    prompt.push_str(&format!("- Video URL: {}\n", video.watch_url()));
    prompt.push_str(&format!("- Original title: \"{}\"\n", video.title));
    prompt.push_str(&format!("- Channel: \"{}\"\n", video.channel_title));
    if !video.channel_id.is_empty() {
        prompt.push_str(&format!("- Channel URL: {}\n", video.channel_url()));
    }
    prompt.push_str(&format!("- Original description: \"{}\"\n", video.description));
    prompt.push_str(&format!("- Original tags: {}\n", join_or_none(&video.tags)));
    prompt.push_str(&format!(
        "- Views: {}\n",
        or_none(video.view_count.map(|n| n.to_string()))
    ));
    prompt.push_str(&format!(
        "- Likes: {}\n",
        or_none(video.like_count.map(|n| n.to_string()))
    ));
    prompt.push_str(&format!("- Duration: {}\n", or_none(video.duration.clone())));
    prompt.push_str(&format!(
        "- Published: {}\n",
        or_none(video.published_at.map(|t| t.format("%Y-%m-%d").to_string()))
    ));
    prompt.push_str(&format!("- Topics: {}\n\n", join_or_none(&video.topics)));

    prompt.push_str(&format!("Required report structure (in {}):\n\n", language));
    prompt.push_str(
        "## I. Raw SEO\n\
         A table with the main keyword inferred from the original title and \
         description (kept in the original language), the channel name and the \
         channel URL.\n\n\
         ## II. SEO on top\n\
         1. An optimized title based on the original, containing the main keyword.\n\
         2. A rewritten description that mentions the main keyword exactly 5 times, \
         timestamps that fit the duration (at least one containing the main \
         keyword), and hashtags led by the main keyword without spaces or accents.\n\
         3. A tag set: the main keyword, 4 related keywords and the channel name.\n\n\
         ## III. Thumbnail\n\
         A short description of how to recreate a competing thumbnail for this video.\n",
    );

    prompt
}

/// `GenerateText` request for the analysis report on `video`
pub fn analysis_request(
    video: &VideoDetails,
    lang: ReportLanguage,
    model: impl Into<String>,
) -> TextRequest {
    TextRequest::new(analysis_prompt(video, lang)).with_model(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video() -> VideoDetails {
        VideoDetails {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Du lịch Sapa mùa đông".to_string(),
            channel_title: "Kênh Du Lịch".to_string(),
            channel_id: "UC123".to_string(),
            description: "Khám phá Sapa".to_string(),
            tags: vec!["sapa".to_string(), "du lịch".to_string()],
            view_count: Some(12345),
            ..Default::default()
        }
    }

    #[test]
    fn test_prompt_names_output_language() {
        let prompt = analysis_prompt(&sample_video(), ReportLanguage::Ja);
        assert!(prompt.contains("**日本語**"));
        assert!(prompt.contains("(in 日本語)"));

        let prompt = analysis_prompt(&sample_video(), ReportLanguage::Vi);
        assert!(prompt.contains("**Tiếng Việt**"));
    }

    #[test]
    fn test_prompt_carries_video_data() {
        let prompt = analysis_prompt(&sample_video(), ReportLanguage::En);

        assert!(prompt.contains("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(prompt.contains("\"Du lịch Sapa mùa đông\""));
        assert!(prompt.contains("https://www.youtube.com/channel/UC123"));
        assert!(prompt.contains("- Original tags: sapa, du lịch"));
        assert!(prompt.contains("- Views: 12345"));
        assert!(prompt.contains("- Likes: none"));
        assert!(prompt.contains("- Topics: none"));
    }

    #[test]
    fn test_prompt_without_channel_id_skips_channel_url() {
        let video = VideoDetails {
            channel_id: String::new(),
            tags: Vec::new(),
            ..sample_video()
        };
        let prompt = analysis_prompt(&video, ReportLanguage::En);

        assert!(!prompt.contains("Channel URL"));
        assert!(prompt.contains("- Original tags: none"));
    }

    #[test]
    fn test_analysis_request_uses_model() {
        let request = analysis_request(&sample_video(), ReportLanguage::En, "gemini-test");
        assert_eq!(request.model, "gemini-test");
        assert!(request.prompt.contains("**English**"));
    }

    #[test]
    fn test_report_language_parsing() {
        assert_eq!("ko".parse::<ReportLanguage>().unwrap(), ReportLanguage::Ko);
        assert_eq!(" FR ".parse::<ReportLanguage>().unwrap(), ReportLanguage::Fr);
        assert!("pt".parse::<ReportLanguage>().is_err());
        assert_eq!(ReportLanguage::default(), ReportLanguage::Vi);
    }

    #[test]
    fn test_video_details_from_json() {
        let video: VideoDetails = serde_json::from_str(
            r#"{
                "videoId": "abc",
                "title": "Minecraft castle",
                "channelTitle": "Builder",
                "viewCount": 42,
                "publishedAt": "2025-03-01T10:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(video.video_id, "abc");
        assert_eq!(video.view_count, Some(42));
        assert!(video.tags.is_empty());

        let prompt = analysis_prompt(&video, ReportLanguage::En);
        assert!(prompt.contains("- Published: 2025-03-01"));
    }
}
