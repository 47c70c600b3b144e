//! Regional configuration: the catalog of per-region settings and the
//! resolver that picks exactly one region for a digest run.
//!
//! The catalog is loaded once at startup from `config/regions.json` and
//! validated against the invariants that keep a run from silently producing
//! empty audio: every region needs at least one source and a voice, codes
//! are unique, and the global default must exist. After that, resolution is
//! a pure function of its inputs; any requested code, however malformed,
//! lands on *some* region. A digest with a slightly wrong regional flavor
//! beats no digest at all.
//!
//! Fallback order, first match wins:
//! 1. Exact code match (`en_GB_LON`)
//! 2. Parent region, dropping trailing sub-region segments (`en_GB`)
//! 3. The requested country's default region (code country segment or a
//!    configured alias)
//! 4. The global default

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use tracing::{debug, info, instrument};

/// One headline source: where to fetch and which selectors find headlines.
/// Catalog order is scrape priority.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub name: String,
    pub url: String,
    pub selectors: Vec<String>,
}

/// All settings for one region. Immutable for the duration of a run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionConfig {
    /// Stable unique key, e.g. `en_GB` or `en_GB_LON`.
    pub code: String,
    pub display_name: String,
    pub native_name: String,
    /// Extra ISO country codes served by this region (e.g. `de_DE` also
    /// covers `AT` and `CH`). The code's own country segment always counts.
    #[serde(default)]
    pub country_codes: Vec<String>,
    /// Voice identifier passed to the speech synthesis API.
    pub voice: String,
    /// Spoken greeting that opens the digest.
    pub greeting: String,
    pub service_name: String,
    /// Topic tags the analysis step may assign.
    pub themes: Vec<String>,
    pub output_dir: String,
    pub audio_dir: String,
    pub sources: Vec<SourceConfig>,
}

/// Which branch of the fallback chain selected the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    ParentFallback,
    CountryDefault,
    GlobalDefault,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchKind::Exact => "exact",
            MatchKind::ParentFallback => "parent-fallback",
            MatchKind::CountryDefault => "country-default",
            MatchKind::GlobalDefault => "global-default",
        };
        f.write_str(s)
    }
}

/// Catalog validation failures. All of these abort startup; a digest run
/// must never begin against a broken catalog.
#[derive(Debug, PartialEq, Eq)]
pub enum CatalogError {
    Empty,
    UnknownDefault(String),
    DuplicateCode(String),
    NoSources(String),
    NoVoice(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "region catalog contains no regions"),
            CatalogError::UnknownDefault(code) => {
                write!(f, "default region `{code}` is not in the catalog")
            }
            CatalogError::DuplicateCode(code) => {
                write!(f, "region code `{code}` appears more than once")
            }
            CatalogError::NoSources(code) => {
                write!(f, "region `{code}` has no headline sources")
            }
            CatalogError::NoVoice(code) => {
                write!(f, "region `{code}` has no voice identifier")
            }
        }
    }
}

impl Error for CatalogError {}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    default_region: String,
    regions: Vec<RegionConfig>,
}

/// The validated region catalog. Construction enforces the invariants that
/// make [`RegionCatalog::resolve`] total.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<RegionConfig>,
    by_code: BTreeMap<String, usize>,
    default_code: String,
}

impl RegionCatalog {
    /// Build and validate a catalog from parsed parts.
    pub fn new(
        regions: Vec<RegionConfig>,
        default_region: &str,
    ) -> Result<Self, CatalogError> {
        if regions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut by_code = BTreeMap::new();
        for (idx, region) in regions.iter().enumerate() {
            if region.sources.is_empty() {
                return Err(CatalogError::NoSources(region.code.clone()));
            }
            if region.voice.trim().is_empty() {
                return Err(CatalogError::NoVoice(region.code.clone()));
            }
            if by_code.insert(region.code.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateCode(region.code.clone()));
            }
        }

        if !by_code.contains_key(default_region) {
            return Err(CatalogError::UnknownDefault(default_region.to_string()));
        }

        Ok(Self {
            regions,
            by_code,
            default_code: default_region.to_string(),
        })
    }

    /// Load and validate the catalog from a JSON file.
    #[instrument(level = "info", skip_all, fields(path = %path))]
    pub async fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let file: CatalogFile = serde_json::from_str(&raw)?;
        let catalog = Self::new(file.regions, &file.default_region)?;
        info!(
            regions = catalog.regions.len(),
            default = %catalog.default_code,
            "Loaded region catalog"
        );
        Ok(catalog)
    }

    pub fn get(&self, code: &str) -> Option<&RegionConfig> {
        self.by_code.get(code).map(|&idx| &self.regions[idx])
    }

    pub fn default_region(&self) -> &RegionConfig {
        self.get(&self.default_code)
            .expect("default region validated at construction")
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionConfig> {
        self.regions.iter()
    }

    /// Select a region for a run. Pure and deterministic: the same inputs
    /// against the same catalog always yield the same `(region, kind)`.
    pub fn resolve(
        &self,
        requested: Option<&str>,
        country: Option<&str>,
    ) -> (&RegionConfig, MatchKind) {
        if let Some(code) = requested.map(str::trim).filter(|c| !c.is_empty()) {
            if let Some(region) = self.get(code) {
                return (region, MatchKind::Exact);
            }

            let mut segments: Vec<&str> = code.split('_').collect();
            while segments.len() > 2 {
                segments.pop();
                let parent = segments.join("_");
                if let Some(region) = self.get(&parent) {
                    debug!(requested = %code, parent = %parent, "Falling back to parent region");
                    return (region, MatchKind::ParentFallback);
                }
            }
        }

        if let Some(cc) = country.map(str::trim).filter(|c| !c.is_empty()) {
            if let Some(region) = self.country_default(cc) {
                return (region, MatchKind::CountryDefault);
            }
        }

        (self.default_region(), MatchKind::GlobalDefault)
    }

    /// The designated default region for a country: among matching regions
    /// the one with the fewest code segments wins (the bare `lang_CC`
    /// entry), ties broken by code so the choice is deterministic.
    fn country_default(&self, country: &str) -> Option<&RegionConfig> {
        self.regions
            .iter()
            .filter(|r| {
                r.code
                    .split('_')
                    .nth(1)
                    .is_some_and(|seg| seg.eq_ignore_ascii_case(country))
                    || r.country_codes
                        .iter()
                        .any(|alias| alias.eq_ignore_ascii_case(country))
            })
            .min_by_key(|r| (r.code.split('_').count(), r.code.clone()))
    }
}
