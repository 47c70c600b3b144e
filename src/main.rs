//! # AudioNews
//!
//! A daily audio news digest generator for visually impaired listeners:
//! scrapes headlines from each region's configured sources, asks a hosted
//! LLM to categorize them and synthesize spoken prose, normalizes the text
//! for speech synthesis, and publishes text, audio, and manifest artifacts.
//!
//! ## Features
//!
//! - Region catalog with a deterministic fallback chain (exact match,
//!   parent region, country default, global default)
//! - Config-driven headline scraping with CSS selectors per source
//! - LLM analysis with keyword-categorization fallback, so a digest is
//!   always produced
//! - Pause-free text normalization before speech synthesis
//! - Date-named text/audio/manifest outputs plus a `latest.json` pointer
//!
//! ## Usage
//!
//! ```sh
//! audionews --region en_GB
//! audionews --all-regions --max-chars 6000
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture, per region:
//! 1. **Resolve**: pick the region configuration (CLI flag, saved
//!    preference, country hint, or global default)
//! 2. **Scrape**: collect headlines from the region's sources in priority order
//! 3. **Analyze**: categorize headlines into themes with significance scores
//! 4. **Synthesize**: generate one spoken section per theme
//! 5. **Normalize**: strip everything the speech engine reads as a pause
//! 6. **Publish**: write text, audio, and the artifact manifest

use clap::Parser;
use std::collections::BTreeMap;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod api;
mod cli;
mod digest;
mod models;
mod normalize;
mod outputs;
mod region;
mod scrapers;
mod tts;
mod utils;

use api::{ask_with_backoff, ChatClient};
use cli::Cli;
use digest::PromptLibrary;
use models::{DigestArtifact, NewsStory};
use normalize::RuleSet;
use region::{RegionCatalog, RegionConfig};
use tts::SpeechClient;
use utils::{ensure_writable_dir, looks_truncated, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("audionews starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.region, ?args.country, args.all_regions, args.text_only, "Parsed CLI arguments");

    // ---- Load configuration ----
    let catalog = RegionCatalog::load(&args.regions_config).await?;
    let rules = RuleSet::load(&args.speech_rules).await?;
    let prompts = PromptLibrary::load(&args.prompts).await?;

    // Both clients are configuration-checked before any scraping: a missing
    // API key must fail the run up front, not after the network work.
    let chat = ChatClient::new(&prompts.ai_model.name)?;
    let speech = if args.text_only {
        None
    } else {
        Some(SpeechClient::from_env()?)
    };

    // ---- Select regions ----
    let regions: Vec<&RegionConfig> = if args.all_regions {
        catalog.iter().collect()
    } else {
        let (resolved, kind) = catalog.resolve(args.region.as_deref(), args.country.as_deref());
        info!(
            requested = ?args.region,
            country = ?args.country,
            resolved = %resolved.code,
            matched = %kind,
            "Resolved region"
        );
        vec![resolved]
    };

    // Regions run sequentially; the speech API is rate-limited and a daily
    // batch gains nothing from hitting it concurrently.
    let total = regions.len();
    let mut generated = 0usize;
    for region in regions {
        info!(region = %region.code, name = %region.display_name, "Starting digest run");
        match run_region(region, &rules, &prompts, &chat, speech.as_ref(), &args).await {
            Ok(artifact) => {
                generated += 1;
                info!(
                    region = %region.code,
                    text = %artifact.text_path,
                    audio = ?artifact.audio_path,
                    words = artifact.word_count,
                    est_secs = artifact.duration_estimate_secs,
                    "Digest complete"
                );
            }
            Err(e) => {
                error!(region = %region.code, error = %e, "Digest run failed");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        generated,
        failed = total - generated,
        "Execution complete"
    );

    if generated == 0 {
        return Err("no digests were generated".into());
    }
    Ok(())
}

/// Run the full pipeline for one region.
async fn run_region(
    region: &RegionConfig,
    rules: &RuleSet,
    prompts: &PromptLibrary,
    chat: &ChatClient,
    speech: Option<&SpeechClient>,
    args: &Cli,
) -> Result<DigestArtifact, Box<dyn Error>> {
    // Early check: output directories must be writable before network work
    ensure_writable_dir(&region.output_dir).await?;
    if speech.is_some() {
        ensure_writable_dir(&region.audio_dir).await?;
    }

    // ---- Scrape ----
    let stories = scrapers::headlines::fetch_all(region).await;
    if stories.is_empty() {
        return Err(format!("no stories found for region {}", region.code).into());
    }

    // ---- Analyze ----
    let themes = analyze_stories(chat, prompts, region, &stories).await;
    if themes.is_empty() {
        return Err(format!("no news themes identified for region {}", region.code).into());
    }
    info!(themes = themes.len(), "Stories categorized");

    // ---- Synthesize one section per theme ----
    let mut sections = Vec::new();
    for (theme, theme_stories) in &themes {
        let prompt = digest::synthesis_prompt(prompts, &region.code, theme, theme_stories);
        match ask_with_backoff(
            chat,
            &prompt,
            prompts.ai_model.synthesis_max_tokens,
            prompts.ai_model.synthesis_temperature,
        )
        .await
        {
            Ok(text) => sections.push(text.trim().to_string()),
            Err(e) => {
                warn!(theme = %theme, error = %e, "Synthesis failed; using headline fallback");
                sections.push(digest::fallback_section(theme, theme_stories));
            }
        }
    }

    // ---- Normalize for speech ----
    let digest_text = digest::assemble(region, prompts, &utils::spoken_date(), &sections);
    let speech_text = normalize::normalize(&digest_text, &rules.rules, args.max_chars);
    let words = digest::word_count(&speech_text);
    debug!(words, chars = speech_text.chars().count(), "Digest normalized");

    // ---- Publish ----
    let date = utils::date_stamp();
    let text_path = outputs::media::write_digest_text(&region.output_dir, &date, &speech_text).await?;

    let audio_path = match speech {
        Some(client) => {
            let bytes = client.synthesize(&speech_text, &region.voice).await?;
            Some(outputs::media::write_audio(&region.audio_dir, &date, &bytes).await?)
        }
        None => None,
    };

    let artifact = DigestArtifact {
        region: region.code.clone(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        text_path,
        audio_path,
        word_count: words,
        duration_estimate_secs: digest::estimate_duration_secs(words),
    };
    outputs::json::write_artifact(&artifact, &region.output_dir, &date).await?;

    Ok(artifact)
}

/// Categorize the scraped stories into themes.
///
/// A truncated analysis response is re-asked exactly once; any other
/// failure drops to keyword categorization so the digest still runs.
async fn analyze_stories(
    chat: &ChatClient,
    prompts: &PromptLibrary,
    region: &RegionConfig,
    stories: &[NewsStory],
) -> BTreeMap<String, Vec<NewsStory>> {
    let prompt = digest::analysis_prompt(prompts, &region.code, stories);
    let model = &prompts.ai_model;

    let raw = match ask_with_backoff(chat, &prompt, model.analysis_max_tokens, model.analysis_temperature).await
    {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Analysis call failed; falling back to keyword categorization");
            return digest::fallback_categorization(stories, &region.themes);
        }
    };

    let mut parsed = digest::parse_analysis(&raw);

    // If the parse failed due to EOF (truncation), re-ask ONCE
    if let Err(ref e) = parsed {
        if looks_truncated(e) {
            warn!(error = %e, "EOF while parsing analysis; re-asking once");
            match ask_with_backoff(chat, &prompt, model.analysis_max_tokens, model.analysis_temperature).await
            {
                Ok(r2) => parsed = digest::parse_analysis(&r2),
                Err(e2) => warn!(error = %e2, "Re-ask failed; will fall back"),
            }
        }
    }

    match parsed {
        Ok(analysis) => {
            let themes = digest::assign_themes(stories, &analysis);
            if themes.is_empty() {
                warn!("Analysis matched no stories; falling back to keyword categorization");
                digest::fallback_categorization(stories, &region.themes)
            } else {
                themes
            }
        }
        Err(e) => {
            warn!(
                error = %e,
                response_preview = %truncate_for_log(&raw, 300),
                "Model returned non-conforming JSON; falling back to keyword categorization"
            );
            digest::fallback_categorization(stories, &region.themes)
        }
    }
}
