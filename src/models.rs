//! Data models for scraped headlines and digest artifacts.
//!
//! This module defines the core data structures used throughout the application:
//! - [`NewsStory`]: A single scraped headline with its analysis metadata
//! - [`StoryRef`]: One entry of the model's categorization response
//! - [`DigestArtifact`]: The manifest describing one finished digest run
//!
//! A `NewsStory` starts out as a bare headline and picks up `theme` and
//! `significance` once the analysis step has categorized it. A
//! `DigestArtifact` is created once per run and never mutated; the next
//! day's run supersedes it without deleting the old files.

use serde::{Deserialize, Serialize};

/// A headline scraped from one of a region's configured sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewsStory {
    /// The headline text as it appeared on the page.
    pub title: String,
    /// Display name of the source the headline came from.
    pub source: String,
    /// Absolute link to the story, when one could be resolved.
    pub link: Option<String>,
    /// When the headline was scraped, RFC 3339.
    pub fetched_at: String,
    /// Theme assigned by the analysis step.
    pub theme: Option<String>,
    /// Significance score (1-10) assigned by the analysis step.
    pub significance: Option<f64>,
}

impl NewsStory {
    /// The lowercased keywords used for duplicate detection: alphabetic
    /// title words longer than three characters.
    pub fn keywords(&self) -> std::collections::BTreeSet<String> {
        self.title
            .split_whitespace()
            .filter(|w| w.len() > 3 && w.chars().all(char::is_alphabetic))
            .map(str::to_lowercase)
            .collect()
    }
}

/// One story reference inside the analysis response.
///
/// The model returns a JSON object mapping each theme to a list of these;
/// `index` is 1-based, matching the numbered headline list it was shown.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct StoryRef {
    pub index: usize,
    pub significance: f64,
}

/// The manifest for one finished digest run.
///
/// Serialized next to the text and audio files it describes, and pointed at
/// by `latest.json`. Artifacts are superseded, never deleted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DigestArtifact {
    /// Region code the digest was generated for.
    pub region: String,
    /// Generation timestamp, RFC 3339.
    pub generated_at: String,
    /// Path to the digest text file.
    pub text_path: String,
    /// Path to the audio file; absent when the run was text-only.
    pub audio_path: Option<String>,
    /// Number of words in the spoken text.
    pub word_count: usize,
    /// Estimated audio duration in seconds.
    pub duration_estimate_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(title: &str) -> NewsStory {
        NewsStory {
            title: title.to_string(),
            source: "BBC News".to_string(),
            link: None,
            fetched_at: "2026-08-04T06:00:00Z".to_string(),
            theme: None,
            significance: None,
        }
    }

    #[test]
    fn test_keywords_skip_short_and_nonalphabetic_words() {
        let s = story("PM to cut NHS waiting lists by 40% this year");
        let kw = s.keywords();
        assert!(kw.contains("waiting"));
        assert!(kw.contains("lists"));
        assert!(!kw.contains("pm"));
        assert!(!kw.contains("40%"));
    }

    #[test]
    fn test_story_ref_parses_integer_significance() {
        let r: StoryRef = serde_json::from_str(r#"{"index": 3, "significance": 8}"#).unwrap();
        assert_eq!(r.index, 3);
        assert_eq!(r.significance, 8.0);
    }

    #[test]
    fn test_artifact_round_trips() {
        let artifact = DigestArtifact {
            region: "en_GB".to_string(),
            generated_at: "2026-08-04T06:30:00Z".to_string(),
            text_path: "docs/en_GB/2026-08-04.txt".to_string(),
            audio_path: Some("docs/en_GB/audio/2026-08-04.mp3".to_string()),
            word_count: 412,
            duration_estimate_secs: 206,
        };

        let json = serde_json::to_string(&artifact).unwrap();
        let back: DigestArtifact = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region, "en_GB");
        assert_eq!(back.word_count, 412);
        assert_eq!(back.audio_path.as_deref(), Some("docs/en_GB/audio/2026-08-04.mp3"));
    }

    #[test]
    fn test_artifact_without_audio() {
        let json = r#"{
            "region": "fr_FR",
            "generated_at": "2026-08-04T06:30:00Z",
            "text_path": "docs/fr_FR/2026-08-04.txt",
            "audio_path": null,
            "word_count": 300,
            "duration_estimate_secs": 150
        }"#;
        let artifact: DigestArtifact = serde_json::from_str(json).unwrap();
        assert!(artifact.audio_path.is_none());
    }
}
