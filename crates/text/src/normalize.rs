use once_cell::sync::Lazy;
use regex::Regex;

static DEFAULT_NORMALIZER: Lazy<Normalizer> = Lazy::new(Normalizer::standard);

/// A single named regex substitution applied to the whole text.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    name: String,
    pattern: Regex,
    replacement: String,
}

impl RewriteRule {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }
}

/// Ordered rewrite pipeline for text coming out of PDF extraction.
///
/// Rules run in sequence over the full text and the result is trimmed. Later
/// rules assume earlier ones already collapsed horizontal whitespace.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<RewriteRule>,
}

impl Normalizer {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self { rules }
    }

    fn standard() -> Self {
        let rules = [
            ("collapse_spaces", r" {2,}", " "),
            ("sentence_breaks", r"([.!?])\s+([A-Z])", "${1}\n\n${2}"),
            ("speaker_labels", r"([A-Z][A-Za-z\s]+:)\s*", "${1}\n"),
            ("collapse_blank_lines", r"\n{4,}", "\n\n\n"),
        ]
        .into_iter()
        .map(|(name, pattern, replacement)| {
            RewriteRule::new(name, pattern, replacement).expect("valid built-in rewrite rule")
        })
        .collect();

        Self { rules }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn normalize(&self, text: &str) -> String {
        let rewritten = self
            .rules
            .iter()
            .fold(text.to_string(), |acc, rule| rule.apply(&acc));
        rewritten.trim().to_string()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        DEFAULT_NORMALIZER.clone()
    }
}

pub fn normalize(text: &str) -> String {
    DEFAULT_NORMALIZER.normalize(text)
}
