//! Command-line interface definitions for AudioNews.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Region selection can come from a flag or from environment variables, and
//! the flag always wins: an explicit `--region` outranks the saved
//! `AUDIONEWS_REGION` preference, which outranks the `--country` geolocation
//! hint. Whatever survives is handed to the resolver, which always picks a
//! region.

use clap::Parser;

/// Command-line arguments for the AudioNews digest generator.
///
/// # Examples
///
/// ```sh
/// # Digest for one region
/// audionews --region en_GB
///
/// # Geolocation hint only; the resolver picks the country default
/// audionews --country ES
///
/// # Every configured region, text only (no speech synthesis)
/// audionews --all-regions --text-only
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Region code to generate a digest for (e.g. en_GB, en_GB_LON)
    #[arg(short, long, env = "AUDIONEWS_REGION")]
    pub region: Option<String>,

    /// ISO country code hint used when no region matches (e.g. from geolocation)
    #[arg(short, long, env = "AUDIONEWS_COUNTRY")]
    pub country: Option<String>,

    /// Generate digests for every configured region
    #[arg(long, conflicts_with = "region")]
    pub all_regions: bool,

    /// Skip speech synthesis and write only the text artifact
    #[arg(long)]
    pub text_only: bool,

    /// Maximum digest length in characters; truncation only ever cuts at a
    /// sentence boundary
    #[arg(long)]
    pub max_chars: Option<usize>,

    /// Path to the region catalog
    #[arg(long, default_value = "config/regions.json")]
    pub regions_config: String,

    /// Path to the speech normalization rules
    #[arg(long, default_value = "config/speech_rules.json")]
    pub speech_rules: String,

    /// Path to the prompt library
    #[arg(long, default_value = "config/prompts.json")]
    pub prompts: String,
}
