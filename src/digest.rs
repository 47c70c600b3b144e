//! Digest analysis, synthesis prompts, and assembly.
//!
//! The model is asked twice per run: once to categorize the numbered
//! headline list into the region's themes (returning JSON), then once per
//! theme to synthesize a short spoken section. Everything in this module is
//! pure: prompt construction, response parsing, de-duplication, and final
//! assembly all operate on values, leaving the network calls to the caller.
//!
//! When analysis fails entirely the run falls back to keyword
//! categorization rather than aborting; a digest with rougher grouping
//! beats no digest.

use crate::api::strip_code_fences;
use crate::models::{NewsStory, StoryRef};
use crate::region::RegionConfig;
use crate::utils::upcase;
use itertools::Itertools;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use tracing::{debug, info, instrument};

/// Neural voices average about two words per second at default rate.
const WORDS_PER_SECOND: f64 = 2.0;
/// Keyword overlap above this marks a story as a duplicate of one already
/// placed in the theme.
const DUPLICATE_OVERLAP: f64 = 0.4;
/// The fallback categorizer is stricter because it has no significance
/// scores to break ties with.
const FALLBACK_OVERLAP: f64 = 0.5;
/// Headlines shown to the synthesis prompt per theme.
const SYNTHESIS_HEADLINES: usize = 3;
/// A fallback theme needs at least this many stories to earn a section.
const FALLBACK_MIN_STORIES: usize = 2;

/// Model settings for the two call kinds.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub analysis_max_tokens: u32,
    pub analysis_temperature: f32,
    pub synthesis_max_tokens: u32,
    pub synthesis_temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisPrompt {
    /// Template with `{region}` and `{headlines}` placeholders.
    pub template: String,
    /// Spoken region names keyed by region code.
    pub region_names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisPrompt {
    /// Template with `{theme}` and `{headlines}` placeholders.
    pub template: String,
}

/// The prompt library loaded from `config/prompts.json`.
///
/// Every per-region table falls back to the `en_GB` entry, which load-time
/// validation therefore requires.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptLibrary {
    pub ai_model: ModelConfig,
    pub analysis_prompt: AnalysisPrompt,
    pub synthesis_prompts: BTreeMap<String, SynthesisPrompt>,
    pub system_messages: BTreeMap<String, String>,
    /// Intro templates with `{greeting}`, `{service}` and `{date}` placeholders.
    pub intros: BTreeMap<String, String>,
    pub closings: BTreeMap<String, String>,
}

const FALLBACK_REGION: &str = "en_GB";

impl PromptLibrary {
    /// Load and validate the prompt library from a JSON file.
    #[instrument(level = "info", skip_all, fields(path = %path))]
    pub async fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let lib: PromptLibrary = serde_json::from_str(&raw)?;

        for (table, name) in [
            (lib.synthesis_prompts.contains_key(FALLBACK_REGION), "synthesis_prompts"),
            (lib.system_messages.contains_key(FALLBACK_REGION), "system_messages"),
            (lib.intros.contains_key(FALLBACK_REGION), "intros"),
            (lib.closings.contains_key(FALLBACK_REGION), "closings"),
            (
                lib.analysis_prompt.region_names.contains_key(FALLBACK_REGION),
                "analysis_prompt.region_names",
            ),
        ] {
            if !table {
                return Err(format!("prompt library `{name}` has no {FALLBACK_REGION} entry").into());
            }
        }

        info!(
            model = %lib.ai_model.name,
            synthesis_prompts = lib.synthesis_prompts.len(),
            "Loaded prompt library"
        );
        Ok(lib)
    }

    fn for_region<'a, T>(table: &'a BTreeMap<String, T>, code: &str) -> &'a T {
        table
            .get(code)
            .unwrap_or_else(|| &table[FALLBACK_REGION])
    }
}

/// The numbered headline list shown to the analysis prompt. Indices are
/// 1-based; the response refers back to them.
pub fn number_headlines(stories: &[NewsStory]) -> String {
    stories
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} (Source: {})", i + 1, s.title, s.source))
        .join("\n")
}

/// Build the analysis prompt for a region's headline batch.
pub fn analysis_prompt(lib: &PromptLibrary, region_code: &str, stories: &[NewsStory]) -> String {
    let region_name = PromptLibrary::for_region(&lib.analysis_prompt.region_names, region_code);
    lib.analysis_prompt
        .template
        .replace("{region}", region_name)
        .replace("{headlines}", &number_headlines(stories))
}

/// Parse the analysis response into theme -> story references.
///
/// Strips markdown fences, tolerates a double-nested theme list (the model
/// sometimes wraps each theme's entries in an extra array), and skips
/// individual entries that don't look like `{index, significance}`. Fails
/// only when the document as a whole isn't valid JSON, which the caller
/// treats as a signal to re-ask or fall back.
pub fn parse_analysis(raw: &str) -> Result<BTreeMap<String, Vec<StoryRef>>, serde_json::Error> {
    let clean = strip_code_fences(raw);
    let document: BTreeMap<String, serde_json::Value> = serde_json::from_str(clean)?;

    let mut themes = BTreeMap::new();
    for (theme, value) in document {
        let entries = match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .flat_map(|item| match item {
                    serde_json::Value::Array(nested) => nested,
                    other => vec![other],
                })
                .collect::<Vec<_>>(),
            _ => continue,
        };

        let refs: Vec<StoryRef> = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<StoryRef>(entry) {
                Ok(r) => Some(r),
                Err(e) => {
                    debug!(theme = %theme, error = %e, "Skipping malformed analysis entry");
                    None
                }
            })
            .collect();

        if !refs.is_empty() {
            themes.insert(theme, refs);
        }
    }
    Ok(themes)
}

/// Apply an analysis to the scraped stories: resolve indices, drop
/// near-duplicate headlines within each theme, and order by significance.
pub fn assign_themes(
    stories: &[NewsStory],
    analysis: &BTreeMap<String, Vec<StoryRef>>,
) -> BTreeMap<String, Vec<NewsStory>> {
    let mut themes = BTreeMap::new();

    for (theme, refs) in analysis {
        let mut placed: Vec<NewsStory> = Vec::new();
        let mut seen_keywords: Vec<BTreeSet<String>> = Vec::new();

        for r in refs {
            let Some(story) = r.index.checked_sub(1).and_then(|i| stories.get(i)) else {
                debug!(theme = %theme, index = r.index, "Analysis index out of range");
                continue;
            };

            let keywords = story.keywords();
            if seen_keywords.iter().any(|k| jaccard(k, &keywords) > DUPLICATE_OVERLAP) {
                debug!(theme = %theme, title = %story.title, "Skipping near-duplicate story");
                continue;
            }

            let mut story = story.clone();
            story.theme = Some(theme.clone());
            story.significance = Some(r.significance);
            placed.push(story);
            seen_keywords.push(keywords);
        }

        if !placed.is_empty() {
            placed.sort_by(|a, b| {
                b.significance
                    .partial_cmp(&a.significance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            themes.insert(theme.clone(), placed);
        }
    }

    themes
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// English keyword table used when analysis fails. Regional theme names
/// themselves always count as a keyword, so localized themes still collect
/// the stories that mention them.
const THEME_KEYWORDS: [(&str, &[&str]); 7] = [
    (
        "politics",
        &["government", "minister", "parliament", "election", "policy", "labour", "conservative"],
    ),
    (
        "economy",
        &["economy", "inflation", "bank", "interest", "market", "business", "financial", "gdp"],
    ),
    ("health", &["health", "nhs", "medical", "hospital", "covid", "vaccine", "doctor"]),
    (
        "international",
        &["ukraine", "russia", "china", "europe", "war", "conflict"],
    ),
    ("climate", &["climate", "environment", "green", "carbon", "renewable", "energy"]),
    ("technology", &["technology", "tech", "digital", "cyber", "internet"]),
    ("crime", &["police", "court", "crime", "arrest", "investigation", "trial"]),
];

/// Keyword categorization used when the analysis call fails entirely.
///
/// Stories match a theme when the title contains one of the theme's
/// keywords (or the theme name itself). Duplicates are filtered at a
/// stricter threshold, and themes that collect fewer than two stories are
/// dropped.
pub fn fallback_categorization(
    stories: &[NewsStory],
    themes: &[String],
) -> BTreeMap<String, Vec<NewsStory>> {
    let mut result = BTreeMap::new();

    for theme in themes {
        let table: Vec<&str> = THEME_KEYWORDS
            .iter()
            .find(|(name, _)| name == theme)
            .map(|(_, kw)| kw.to_vec())
            .unwrap_or_default();

        let mut placed: Vec<NewsStory> = Vec::new();
        let mut seen_keywords: Vec<BTreeSet<String>> = Vec::new();

        for story in stories {
            let lower = story.title.to_lowercase();
            let matches =
                lower.contains(theme.as_str()) || table.iter().any(|kw| lower.contains(kw));
            if !matches {
                continue;
            }

            let keywords = story.keywords();
            if seen_keywords.iter().any(|k| jaccard(k, &keywords) > FALLBACK_OVERLAP) {
                continue;
            }

            let mut story = story.clone();
            story.theme = Some(theme.clone());
            placed.push(story);
            seen_keywords.push(keywords);
        }

        if placed.len() >= FALLBACK_MIN_STORIES {
            result.insert(theme.clone(), placed);
        }
    }

    result
}

/// Build the synthesis prompt for one theme, prefixed with the region's
/// system message. Regions without their own template use the `en_GB` one.
pub fn synthesis_prompt(
    lib: &PromptLibrary,
    region_code: &str,
    theme: &str,
    stories: &[NewsStory],
) -> String {
    let headlines = stories
        .iter()
        .take(SYNTHESIS_HEADLINES)
        .map(|s| format!("- {}", s.title))
        .join("\n");

    let template = &PromptLibrary::for_region(&lib.synthesis_prompts, region_code).template;
    let system = PromptLibrary::for_region(&lib.system_messages, region_code);
    let prompt = template
        .replace("{theme}", theme)
        .replace("{headlines}", &headlines);
    format!("{system} {prompt}")
}

/// Plain spoken section built straight from the headlines, used when the
/// synthesis call for a theme fails.
pub fn fallback_section(theme: &str, stories: &[NewsStory]) -> String {
    let titles = stories
        .iter()
        .take(SYNTHESIS_HEADLINES)
        .map(|s| s.title.trim_end_matches(['.', '!', '?']).to_string())
        .join(". ");
    format!("In {} news: {}.", upcase(theme), titles)
}

/// Assemble the full digest: spoken intro, one paragraph per theme, and the
/// region's closing.
pub fn assemble(
    region: &RegionConfig,
    lib: &PromptLibrary,
    spoken_date: &str,
    sections: &[String],
) -> String {
    let intro = PromptLibrary::for_region(&lib.intros, &region.code)
        .replace("{greeting}", &region.greeting)
        .replace("{service}", &region.service_name)
        .replace("{date}", spoken_date);
    let closing = PromptLibrary::for_region(&lib.closings, &region.code);

    let mut digest = intro;
    for section in sections {
        digest.push_str("\n\n");
        digest.push_str(section);
    }
    digest.push_str("\n\n");
    digest.push_str(closing);
    digest
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated audio duration from the word count and a typical neural
/// speaking rate.
pub fn estimate_duration_secs(words: usize) -> u64 {
    (words as f64 / WORDS_PER_SECOND).round() as u64
}
