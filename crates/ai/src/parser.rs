//! Best-effort decoding of model output into an allocation candidate.
//!
//! Stages, first success wins:
//! 1. strict JSON parse of the `{ ... }` span,
//! 2. cleanup (single → double quotes, cut after the matching brace, drop trailing commas) and reparse,
//! 3. regex scrape of `"name": number` pairs, only when a brace span was found,
//! 4. empty candidate.
//!
//! An empty result means "no usable recommendation", never an error.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use relief_core::AllocationCandidate;

static PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]+)"\s*:\s*(-?\d+(?:\.\d+)?)"#).expect("pair pattern is valid")
});

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma pattern is valid"));

/// Which stage produced the candidate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStage {
    Strict,
    Cleaned,
    Scraped,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecommendation {
    pub candidate: AllocationCandidate,
    pub stage: DecodeStage,
}

impl ParsedRecommendation {
    fn empty() -> Self {
        Self {
            candidate: AllocationCandidate::new(),
            stage: DecodeStage::Empty,
        }
    }
}

#[derive(Debug, Default, Copy, Clone)]
pub struct RecommendationParser;

impl RecommendationParser {
    pub fn new() -> Self {
        Self
    }

    /// Decode `response`, removing an echoed copy of `prompt` first.
    pub fn parse(&self, response: &str, prompt: &str) -> ParsedRecommendation {
        let text = strip_echoed_prompt(response, prompt);

        let Some(span) = object_span(&text) else {
            warn!("model output contained no JSON object");
            return ParsedRecommendation::empty();
        };

        if let Some(object) = parse_object(span) {
            return finish(AllocationCandidate::from_json_object(&object), DecodeStage::Strict);
        }

        let cleaned = cleanup(span);
        if let Some(object) = parse_object(&cleaned) {
            return finish(AllocationCandidate::from_json_object(&object), DecodeStage::Cleaned);
        }
        debug!("model output has a brace span but no parseable object; scraping pairs");

        let scraped = scrape_pairs(&text.replace('\'', "\""));
        if !scraped.is_empty() {
            return finish(scraped, DecodeStage::Scraped);
        }

        warn!("model output contained no usable recommendation");
        ParsedRecommendation::empty()
    }
}

fn finish(candidate: AllocationCandidate, stage: DecodeStage) -> ParsedRecommendation {
    debug!(?stage, entries = candidate.len(), "decoded model recommendation");
    ParsedRecommendation { candidate, stage }
}

fn strip_echoed_prompt(response: &str, prompt: &str) -> String {
    if prompt.is_empty() {
        return response.trim().to_string();
    }
    match response.strip_prefix(prompt) {
        Some(rest) => rest.trim().to_string(),
        None => response.replacen(prompt, "", 1).trim().to_string(),
    }
}

/// From the first `{` to the last `}`.
fn object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_object(candidate: &str) -> Option<Map<String, JsonValue>> {
    match serde_json::from_str::<JsonValue>(candidate) {
        Ok(JsonValue::Object(map)) => Some(map),
        _ => None,
    }
}

fn cleanup(span: &str) -> String {
    let normalized = span.replace('\'', "\"");
    let cut = truncate_after_matching_brace(&normalized);
    TRAILING_COMMA.replace_all(cut, "$1").into_owned()
}

/// Cut everything after the brace that closes the opening `{` (string-aware).
fn truncate_after_matching_brace(text: &str) -> &str {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &text[..=idx];
                }
            }
            _ => {}
        }
    }
    text
}

fn scrape_pairs(text: &str) -> AllocationCandidate {
    let mut candidate = AllocationCandidate::new();
    for caps in PAIR.captures_iter(text) {
        let (Some(name), Some(qty)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        candidate.insert(name.as_str().to_string(), qty.as_str().parse::<i64>().ok());
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_core::CandidateEntry;

    fn parse(response: &str) -> ParsedRecommendation {
        RecommendationParser::new().parse(response, "")
    }

    fn entry(name: &str, qty: Option<i64>) -> CandidateEntry {
        CandidateEntry { name: name.to_string(), quantity: qty }
    }

    #[test]
    fn clean_json_is_parsed_strictly() {
        let p = parse(r#"{"Medical Kit": 5, "Water Bottles": 30}"#);
        assert_eq!(p.stage, DecodeStage::Strict);
        assert_eq!(
            p.candidate.entries(),
            &[entry("Medical Kit", Some(5)), entry("Water Bottles", Some(30))]
        );
    }

    #[test]
    fn prose_around_json_is_ignored() {
        let p = parse("Sure! Here is the allocation:\n{\"Tents\": 4}\nStay safe.");
        assert_eq!(p.stage, DecodeStage::Strict);
        assert_eq!(p.candidate.entries(), &[entry("Tents", Some(4))]);
    }

    #[test]
    fn echoed_prompt_is_stripped() {
        let prompt = "Example format: {\"Medical Kit\": 5, \"Water Bottles\": 30}\n\nRECOMMENDATION:";
        let response = format!("{prompt} {{\"Blankets\": 12}}");
        let p = RecommendationParser::new().parse(&response, prompt);
        assert_eq!(p.candidate.entries(), &[entry("Blankets", Some(12))]);
    }

    #[test]
    fn single_quotes_and_trailing_text_are_cleaned() {
        let p = parse("{'Blankets': 10, 'Tents': 2,} and then {'extra': 1}");
        assert_eq!(p.stage, DecodeStage::Cleaned);
        assert_eq!(p.candidate.entries(), &[entry("Blankets", Some(10)), entry("Tents", Some(2))]);
    }

    #[test]
    fn broken_json_falls_back_to_scraping() {
        let p = parse(r#"{"Water Bottles": 30, "Medical Kit": 5 "Tents": 2"#);
        assert_eq!(p.stage, DecodeStage::Scraped);
        assert_eq!(p.candidate.len(), 3);
        assert_eq!(p.candidate.entries()[2], entry("Tents", Some(2)));
    }

    #[test]
    fn scraped_fractional_quantities_are_kept_as_invalid() {
        let p = parse(r#"{"Blankets": 2.5, "Tents": 3 "Rope": }"#);
        assert_eq!(p.stage, DecodeStage::Scraped);
        assert_eq!(p.candidate.entries(), &[entry("Blankets", None), entry("Tents", Some(3))]);
    }

    #[test]
    fn quoted_pairs_without_braces_are_not_scraped() {
        let p = parse(r#"I suggest "Water Bottles": 30 and "Tents": 3"#);
        assert_eq!(p.stage, DecodeStage::Empty);
        assert!(p.candidate.is_empty());
    }

    #[test]
    fn text_without_braces_or_pairs_is_empty() {
        let p = parse("I cannot help with that request.");
        assert_eq!(p.stage, DecodeStage::Empty);
        assert!(p.candidate.is_empty());
    }

    #[test]
    fn non_integer_values_survive_as_none() {
        let p = parse(r#"{"Tents": "four", "Blankets": 3}"#);
        assert_eq!(p.candidate.entries(), &[entry("Tents", None), entry("Blankets", Some(3))]);
    }

    #[test]
    fn braces_inside_strings_do_not_end_the_object() {
        assert_eq!(truncate_after_matching_brace(r#"{"a}": 1} tail"#), r#"{"a}": 1}"#);
        assert_eq!(truncate_after_matching_brace(r#"{"a": {"b": 1}} x"#), r#"{"a": {"b": 1}}"#);
    }
}
