//! Config-driven headline extraction.
//!
//! [`extract_headlines`] is a pure function from an HTML document to a list
//! of [`NewsStory`] values; the async fetch loop around it downloads each
//! source sequentially with a polite pause between requests.

use crate::models::NewsStory;
use crate::region::{RegionConfig, SourceConfig};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const SOURCE_PAUSE: Duration = Duration::from_secs(1);

/// Headlines shorter than this are navigation labels, longer ones are
/// article standfirsts; both get skipped.
const MIN_TITLE_LEN: usize = 15;
const MAX_TITLE_LEN: usize = 200;
/// At most this many stories per source.
const MAX_STORIES: usize = 12;
/// At most this many elements inspected per selector.
const MAX_ELEMENTS_PER_SELECTOR: usize = 15;

/// Consent and marketing furniture that matches headline selectors on most
/// front pages.
const BOILERPLATE_PREFIXES: [&str; 5] = ["cookie", "accept", "subscribe", "sign up", "follow us"];

/// Extract headlines from one source's front-page HTML.
///
/// Selectors are tried in catalog order and the first one that yields
/// stories wins, so a site-specific selector can sit ahead of generic
/// `h1, h2, h3` fallbacks. Relative links are resolved against the source
/// URL. Pure: no network, deterministic for a given document.
pub fn extract_headlines(html: &str, source: &SourceConfig, fetched_at: &str) -> Vec<NewsStory> {
    let document = Html::parse_document(html);
    let base_url = Url::parse(&source.url).ok();

    for raw_selector in &source.selectors {
        let selector = match Selector::parse(raw_selector) {
            Ok(s) => s,
            Err(_) => {
                debug!(selector = %raw_selector, source = %source.name, "Skipping unparseable selector");
                continue;
            }
        };

        let mut seen = HashSet::new();
        let mut stories = Vec::new();

        for element in document.select(&selector).take(MAX_ELEMENTS_PER_SELECTOR) {
            let title = element.text().collect::<Vec<_>>().join(" ");
            let title = title.split_whitespace().join(" ");
            if !plausible_headline(&title) || !seen.insert(title.clone()) {
                continue;
            }

            let link = find_link(&element, base_url.as_ref());
            stories.push(NewsStory {
                title,
                source: source.name.clone(),
                link,
                fetched_at: fetched_at.to_string(),
                theme: None,
                significance: None,
            });

            if stories.len() >= MAX_STORIES {
                break;
            }
        }

        if !stories.is_empty() {
            debug!(
                selector = %raw_selector,
                count = stories.len(),
                source = %source.name,
                "Selector matched"
            );
            return stories;
        }
    }

    Vec::new()
}

fn plausible_headline(title: &str) -> bool {
    if title.len() <= MIN_TITLE_LEN || title.len() >= MAX_TITLE_LEN {
        return false;
    }
    let lower = title.to_lowercase();
    !BOILERPLATE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// The story link: the element's own `href`, or the first descendant
/// anchor's, resolved to an absolute URL.
fn find_link(element: &scraper::ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    let anchor = Selector::parse("a[href]").unwrap();
    let href = element
        .value()
        .attr("href")
        .or_else(|| {
            element
                .select(&anchor)
                .next()
                .and_then(|a| a.value().attr("href"))
        })?
        .to_string();

    if href.starts_with("http") {
        Some(href)
    } else {
        base.and_then(|b| b.join(&href).ok()).map(String::from)
    }
}

/// Fetch one source's front page and extract its headlines.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn fetch_source(
    http: &reqwest::Client,
    source: &SourceConfig,
) -> Result<Vec<NewsStory>, Box<dyn Error>> {
    let html = http
        .get(&source.url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let fetched_at = chrono::Utc::now().to_rfc3339();
    let stories = extract_headlines(&html, source, &fetched_at);
    info!(count = stories.len(), source = %source.name, "Extracted headlines");
    Ok(stories)
}

/// Fetch every source configured for a region, in catalog order.
///
/// Sources are visited sequentially with a short pause between requests.
/// A source that fails or yields nothing is logged and skipped.
#[instrument(level = "info", skip_all, fields(region = %region.code))]
pub async fn fetch_all(region: &RegionConfig) -> Vec<NewsStory> {
    let http = match reqwest::Client::builder().user_agent(USER_AGENT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client");
            return Vec::new();
        }
    };

    let stories: Vec<NewsStory> = stream::iter(region.sources.iter())
        .then(|source| {
            let http = http.clone();
            async move {
                let result = fetch_source(&http, source).await;
                tokio::time::sleep(SOURCE_PAUSE).await;
                match result {
                    Ok(stories) if stories.is_empty() => {
                        warn!(source = %source.name, "Source yielded no headlines");
                        Vec::new()
                    }
                    Ok(stories) => stories,
                    Err(e) => {
                        warn!(source = %source.name, error = %e, "Source fetch failed; skipping");
                        Vec::new()
                    }
                }
            }
        })
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    info!(
        count = stories.len(),
        sources = region.sources.len(),
        "Collected headlines for region"
    );
    stories
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(selectors: &[&str]) -> SourceConfig {
        SourceConfig {
            name: "Example News".to_string(),
            url: "https://news.example.org".to_string(),
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
        }
    }

    const STAMP: &str = "2026-08-04T06:00:00Z";

    #[test]
    fn test_extracts_headlines_with_links() {
        let html = r#"
            <div class="headline"><a href="/politics/vote">Parliament votes on the new housing bill</a></div>
            <div class="headline"><a href="https://other.example.org/a">Rail strikes suspended after late-night talks</a></div>
        "#;
        let stories = extract_headlines(html, &source(&[".headline"]), STAMP);
        assert_eq!(stories.len(), 2);
        assert_eq!(
            stories[0].link.as_deref(),
            Some("https://news.example.org/politics/vote")
        );
        assert_eq!(stories[1].link.as_deref(), Some("https://other.example.org/a"));
        assert_eq!(stories[0].source, "Example News");
    }

    #[test]
    fn test_first_matching_selector_wins() {
        let html = r#"
            <h2 class="site-specific">Chancellor outlines autumn budget priorities</h2>
            <h3>Generic fallback headline that is long enough</h3>
        "#;
        let stories = extract_headlines(html, &source(&[".site-specific", "h3"]), STAMP);
        assert_eq!(stories.len(), 1);
        assert!(stories[0].title.starts_with("Chancellor"));
    }

    #[test]
    fn test_falls_through_to_later_selector() {
        let html = r#"<h3>Generic fallback headline that is long enough</h3>"#;
        let stories = extract_headlines(html, &source(&[".missing", "h3"]), STAMP);
        assert_eq!(stories.len(), 1);
    }

    #[test]
    fn test_filters_short_long_and_boilerplate() {
        let long = "x".repeat(250);
        let html = format!(
            r#"
            <p class="headline">Too short</p>
            <p class="headline">{long}</p>
            <p class="headline">Cookie settings for this site and partners</p>
            <p class="headline">Subscribe now for unlimited digital access</p>
            <p class="headline">Flood defences approved for coastal towns</p>
        "#
        );
        let stories = extract_headlines(&html, &source(&[".headline"]), STAMP);
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].title, "Flood defences approved for coastal towns");
    }

    #[test]
    fn test_deduplicates_repeated_titles() {
        let html = r#"
            <p class="headline">Flood defences approved for coastal towns</p>
            <p class="headline">Flood defences approved for coastal towns</p>
        "#;
        let stories = extract_headlines(html, &source(&[".headline"]), STAMP);
        assert_eq!(stories.len(), 1);
    }

    #[test]
    fn test_caps_story_count() {
        let mut html = String::new();
        for i in 0..14 {
            html.push_str(&format!(
                "<p class=\"headline\">Story number {i} about a reasonably long event</p>"
            ));
        }
        let stories = extract_headlines(&html, &source(&[".headline"]), STAMP);
        assert_eq!(stories.len(), MAX_STORIES);
    }

    #[test]
    fn test_collapses_internal_whitespace_in_titles() {
        let html = "<p class=\"headline\">Flood   defences\n approved for coastal towns</p>";
        let stories = extract_headlines(html, &source(&[".headline"]), STAMP);
        assert_eq!(stories[0].title, "Flood defences approved for coastal towns");
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let html = "<p class=\"headline\">Flood defences approved for coastal towns</p>";
        let stories = extract_headlines(html, &source(&["[[broken", ".headline"]), STAMP);
        assert_eq!(stories.len(), 1);
    }

    #[test]
    fn test_no_match_yields_empty() {
        let stories = extract_headlines("<p>nothing here</p>", &source(&[".headline"]), STAMP);
        assert!(stories.is_empty());
    }
}
