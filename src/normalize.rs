//! Text normalization for speech synthesis.
//!
//! Neural TTS engines read raw line feeds, tabs, and stray Unicode spacing
//! as pause directives, which produces audible mid-sentence gaps. Everything
//! handed to the speech API goes through [`normalize`] first:
//!
//! 1. Control characters and exotic Unicode spaces become plain spaces
//! 2. Smart quotes and em/en dashes become speech-friendly ASCII
//! 3. The configured phrase rules run in order (data, not logic)
//! 4. Whitespace collapses to single spaces and the ends are trimmed
//! 5. If a length limit is set, the text is cut at a sentence boundary
//!
//! The function is total: it never fails, and a broken substitution rule is
//! skipped rather than aborting the run. It is also idempotent, so already
//! clean text passes through unchanged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::error::Error;
use tracing::{debug, instrument};

/// One ordered substitution step from the speech rules file.
///
/// Rules rewrite constructions known to trip the synthesizer (listening
/// tests keep finding new ones) and live in `config/speech_rules.json` so
/// additions never require a code change.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhraseRule {
    /// Literal text replacement.
    Literal { pattern: String, replacement: String },
    /// Regex replacement. An invalid pattern disables the rule at
    /// application time; it never fails the pipeline.
    Regex { pattern: String, replacement: String },
}

/// The ordered rule list loaded from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<PhraseRule>,
}

impl RuleSet {
    /// Load rules from a JSON file. Order in the file is application order;
    /// later rules may assume earlier ones already ran.
    #[instrument(level = "info", skip_all, fields(path = %path))]
    pub async fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let raw = tokio::fs::read_to_string(path).await?;
        let set: RuleSet = serde_json::from_str(&raw)?;
        debug!(count = set.rules.len(), "Loaded speech rules");
        Ok(set)
    }
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());

/// Normalize `text` for speech synthesis.
///
/// The output contains no `\n`, `\r`, or `\t`, has single internal spaces,
/// and is trimmed. When `max_chars` is set and the text is longer, it is
/// truncated at the last `.`, `!`, or `?` within the limit; if no sentence
/// ends inside the limit the full text is kept rather than leaving a
/// dangling fragment.
pub fn normalize(text: &str, rules: &[PhraseRule], max_chars: Option<usize>) -> String {
    let mut out = sweep_control_chars(text);
    out = ascii_punctuation(&out);

    for rule in rules {
        out = apply_rule(&out, rule);
    }

    out = RE_WHITESPACE.replace_all(&out, " ").to_string();
    out = RE_SPACE_BEFORE_PUNCT.replace_all(&out, "$1").to_string();
    out = out.trim().to_string();

    if let Some(limit) = max_chars {
        out = truncate_at_sentence(&out, limit);
    }

    out
}

/// Replace control characters and non-breaking/zero-width spacing with
/// ordinary spaces. These are the characters that measurably caused
/// synthesizer pauses in scraped article text.
fn sweep_control_chars(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c if c.is_control() => ' ',
            '\u{00A0}' | '\u{1680}' | '\u{2000}'..='\u{200B}' | '\u{202F}' | '\u{205F}'
            | '\u{3000}' | '\u{FEFF}' => ' ',
            c => c,
        })
        .collect()
}

/// Map curly quotes and dashes to speech-friendly ASCII. Em and en dashes
/// become a comma pause, which neural voices render far more naturally than
/// the dash glyphs themselves.
fn ascii_punctuation(text: &str) -> String {
    text.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2013}', '\u{2014}'], ", ")
}

fn apply_rule(text: &str, rule: &PhraseRule) -> String {
    match rule {
        PhraseRule::Literal {
            pattern,
            replacement,
        } => text.replace(pattern.as_str(), replacement),
        PhraseRule::Regex {
            pattern,
            replacement,
        } => match Regex::new(pattern) {
            Ok(re) => re.replace_all(text, replacement.as_str()).to_string(),
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "Skipping unparseable speech rule");
                text.to_string()
            }
        },
    }
}

/// Cut `text` to at most `limit` characters, ending on a sentence
/// terminator. Returns the text unchanged when it fits, or when no sentence
/// ends inside the limit.
fn truncate_at_sentence(text: &str, limit: usize) -> String {
    let cutoff = match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => byte_idx,
        None => return text.to_string(),
    };

    match text[..cutoff].rfind(['.', '!', '?']) {
        Some(end) => text[..=end].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_rules() -> Vec<PhraseRule> {
        vec![
            PhraseRule::Regex {
                pattern: r"https?://\S+".to_string(),
                replacement: String::new(),
            },
            PhraseRule::Literal {
                pattern: "is being subjected to".to_string(),
                replacement: "faces".to_string(),
            },
        ]
    }

    #[test]
    fn test_line_breaks_collapse_to_spaces() {
        assert_eq!(
            normalize("Line one\nLine two\r\n\tindented", &[], None),
            "Line one Line two indented"
        );
    }

    #[test]
    fn test_no_control_characters_survive() {
        let inputs = [
            "a\nb\rc\td",
            "\u{0000}x\u{001F}y",
            "plain text",
            "mixed\u{00A0}spaces\u{2009}here\u{FEFF}!",
        ];
        for input in inputs {
            let out = normalize(input, &[], None);
            assert!(
                !out.contains(['\n', '\r', '\t']),
                "control char survived in {out:?}"
            );
        }
    }

    #[test]
    fn test_idempotence() {
        let samples = [
            "She said, \u{201C}hello\u{201D}\u{2014}then left.",
            "Multiple    spaces\n\nand\tlines",
            "Caf\u{e9} au lait \u{2013} tr\u{e8}s bien",
            "Visit https://example.com/page now.",
            "already clean text.",
        ];
        let rules = default_rules();
        for s in samples {
            let once = normalize(s, &rules, Some(500));
            let twice = normalize(&once, &rules, Some(500));
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_smart_quotes_and_dashes() {
        assert_eq!(
            normalize("\u{2018}yes\u{2019} \u{201C}no\u{201D}\u{2014}maybe", &[], None),
            "'yes' \"no\", maybe"
        );
    }

    #[test]
    fn test_empty_and_whitespace_only() {
        assert_eq!(normalize("", &[], None), "");
        assert_eq!(normalize("   \n\t\r  ", &[], None), "");
        assert_eq!(normalize("\u{00A0}\u{200B}", &[], None), "");
    }

    #[test]
    fn test_accented_text_passes_through() {
        assert_eq!(
            normalize("R\u{e9}sum\u{e9} f\u{fc}r Se\u{f1}or G\u{f6}del", &[], None),
            "R\u{e9}sum\u{e9} f\u{fc}r Se\u{f1}or G\u{f6}del"
        );
    }

    #[test]
    fn test_literal_phrase_rule() {
        let rules = default_rules();
        assert_eq!(
            normalize("she is being subjected to harsh treatment", &rules, None),
            "she faces harsh treatment"
        );
    }

    #[test]
    fn test_regex_rule_strips_urls() {
        let rules = default_rules();
        assert_eq!(
            normalize("Read more at https://news.example.org/a/b today.", &rules, None),
            "Read more at today."
        );
    }

    #[test]
    fn test_invalid_regex_rule_is_skipped() {
        let rules = vec![
            PhraseRule::Regex {
                pattern: "([unclosed".to_string(),
                replacement: "x".to_string(),
            },
            PhraseRule::Literal {
                pattern: "bad".to_string(),
                replacement: "good".to_string(),
            },
        ];
        assert_eq!(normalize("a bad day", &rules, None), "a good day");
    }

    #[test]
    fn test_truncates_at_sentence_boundary() {
        let text = "First sentence. Second sentence is much longer than the limit.";
        let out = normalize(text, &[], Some(20));
        assert_eq!(out, "First sentence.");
    }

    #[test]
    fn test_truncation_skipped_without_boundary() {
        // The only period is past the limit, so the full text is kept.
        let out = normalize("She said, \u{201C}hello\u{201D}\u{2014}then left.", &[], Some(20));
        assert_eq!(out, "She said, \"hello\", then left.");
    }

    #[test]
    fn test_truncation_not_applied_when_text_fits() {
        assert_eq!(normalize("Short. Done.", &[], Some(100)), "Short. Done.");
    }

    #[test]
    fn test_truncation_respects_multibyte_chars() {
        let text = "D\u{e9}j\u{e0} vu encore! And then a very long tail without end";
        let out = normalize(text, &[], Some(20));
        assert_eq!(out, "D\u{e9}j\u{e0} vu encore!");
    }

    #[test]
    fn test_short_string_only_whitespace_normalized() {
        let rules = vec![PhraseRule::Literal {
            pattern: "a pattern far longer than the input".to_string(),
            replacement: "n/a".to_string(),
        }];
        assert_eq!(normalize("  tiny  input ", &rules, None), "tiny input");
    }

    #[test]
    fn test_ruleset_parses_rule_file_format() {
        let raw = r#"{
            "rules": [
                {"kind": "literal", "pattern": "is being subjected to", "replacement": "faces"},
                {"kind": "regex", "pattern": "https?://\\S+", "replacement": ""}
            ]
        }"#;
        let set: RuleSet = serde_json::from_str(raw).unwrap();
        assert_eq!(set.rules.len(), 2);
        assert!(matches!(set.rules[0], PhraseRule::Literal { .. }));
        assert!(matches!(set.rules[1], PhraseRule::Regex { .. }));
    }
}
