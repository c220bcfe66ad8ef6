/// Text-feature extraction: residue tags and insight sentences.
///
/// Both extractors are traits so callers can swap in their own analysis.
/// The defaults here are plain keyword and sentence-length heuristics.
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Terms that mark a sentence as carrying an argument.
const MARKER_TERMS: &[&str] = &[
    "because",
    "therefore",
    "however",
    "suggests",
    "indicates",
    "shows",
    "reveals",
    "means",
];

/// Minimum length, in characters, for a marked sentence to count as an insight.
const MIN_INSIGHT_CHARS: usize = 30;

/// Minimum length of a word picked as a fallback topic.
const MIN_TOPIC_WORD_CHARS: usize = 6;

/// Detects residue tags in a completed prompt/response pair.
///
/// Implementations must be total: an exchange with nothing to report
/// yields an empty set.
pub trait ResidueExtractor {
    fn extract(&self, prompt: &str, response: &str) -> FxHashSet<String>;
}

/// Pulls a topic and salient sentences out of free text.
pub trait InsightExtractor {
    /// Best guess at what `prompt` is about.
    fn topic(&self, prompt: &str) -> Option<String>;

    /// Up to `max` sentences from `response` worth building on.
    fn insights(&self, response: &str, max: usize) -> Vec<String>;
}

/// A residue tag and the keywords that signal it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueSignature {
    pub tag: String,
    pub keywords: Vec<String>,
}

impl ResidueSignature {
    pub fn new(tag: &str, keywords: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// The built-in residue catalog.
pub fn default_catalog() -> Vec<ResidueSignature> {
    vec![
        ResidueSignature::new("RECURSION-ITSELF", &["recursi", "loop", "layer"]),
        ResidueSignature::new("META-REFLECTION", &["reflect", "itself", "our process"]),
        ResidueSignature::new("EMERGENCE", &["emerg"]),
        ResidueSignature::new("FEEDBACK-LOOP", &["feedback"]),
        ResidueSignature::new("CONTRADICTION", &["however", "contradict", "paradox"]),
        ResidueSignature::new("PATTERN", &["pattern"]),
    ]
}

/// Tags a response with every catalog entry whose keyword it contains.
#[derive(Debug, Clone)]
pub struct KeywordResidueExtractor {
    catalog: Vec<ResidueSignature>,
}

impl KeywordResidueExtractor {
    pub fn new(catalog: Vec<ResidueSignature>) -> Self {
        let catalog = catalog
            .into_iter()
            .map(|sig| ResidueSignature {
                keywords: sig.keywords.iter().map(|k| k.to_lowercase()).collect(),
                tag: sig.tag,
            })
            .collect();
        Self { catalog }
    }

    pub fn catalog(&self) -> &[ResidueSignature] {
        &self.catalog
    }
}

impl Default for KeywordResidueExtractor {
    fn default() -> Self {
        Self::new(default_catalog())
    }
}

impl ResidueExtractor for KeywordResidueExtractor {
    fn extract(&self, _prompt: &str, response: &str) -> FxHashSet<String> {
        let haystack = response.to_lowercase();
        self.catalog
            .iter()
            .filter(|sig| {
                sig.keywords
                    .iter()
                    .any(|k| !k.is_empty() && haystack.contains(k.as_str()))
            })
            .map(|sig| sig.tag.clone())
            .collect()
    }
}

fn topic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"concept of ([^.]+)").expect("topic pattern compiles"))
}

fn sentence_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[.!?]").expect("sentence pattern compiles"))
}

/// Split text into trimmed, non-empty sentences.
pub fn sentences(text: &str) -> Vec<&str> {
    sentence_boundary()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Regex and sentence-length heuristics.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicExtractor;

impl InsightExtractor for HeuristicExtractor {
    fn topic(&self, prompt: &str) -> Option<String> {
        if let Some(caps) = topic_pattern().captures(prompt) {
            let topic = caps[1].trim();
            if !topic.is_empty() {
                return Some(topic.to_string());
            }
        }

        prompt
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .find(|w| w.chars().count() >= MIN_TOPIC_WORD_CHARS)
            .map(str::to_string)
    }

    fn insights(&self, response: &str, max: usize) -> Vec<String> {
        let all = sentences(response);

        let mut picked: Vec<&str> = all
            .iter()
            .copied()
            .filter(|s| {
                if s.chars().count() <= MIN_INSIGHT_CHARS {
                    return false;
                }
                let lower = s.to_lowercase();
                MARKER_TERMS.iter().any(|t| lower.contains(t))
            })
            .collect();

        // Too few marked sentences: fall back to the longest ones.
        if picked.len() < 2 {
            picked = all;
            picked.sort_by_key(|s| std::cmp::Reverse(s.chars().count()));
        }

        picked.into_iter().take(max).map(str::to_string).collect()
    }
}
