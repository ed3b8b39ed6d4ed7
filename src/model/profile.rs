//! The style profile: a fixed set of descriptive fields about how someone writes.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Placeholder for a field the model did not describe.
pub const UNKNOWN: &str = "unknown";

/// Every profile field, in prompt order, with a short description used when
/// asking the model to fill it in.
pub const FIELDS: [(&str, &str); 16] = [
    ("tone", "overall emotional tone (e.g. formal, casual, sarcastic, warm, blunt, diplomatic)"),
    ("formality_level", "1-10 where 1 is extremely casual and 10 is extremely formal"),
    ("sentence_structure", "short/punchy, long/complex, or mixed"),
    ("vocabulary_level", "simple everyday words vs. sophisticated/technical vocabulary"),
    ("greeting_patterns", "how they open messages, with examples from the text"),
    ("closing_patterns", "how they sign off, with examples from the text"),
    ("unique_phrases", "recurring phrases, pet expressions or catchphrases"),
    ("terminology", "domain-specific or preferred terms used repeatedly"),
    ("emotional_expression", "how they express agreement, disagreement, urgency and humor"),
    ("punctuation_habits", "use of exclamation marks, ellipses, dashes, parentheses, emoji"),
    ("paragraph_style", "short paragraphs, long blocks, bullet points, numbered lists"),
    ("language_quirks", "spelling preferences, abbreviations, unconventional usage"),
    ("response_patterns", "how they structure a reply (acknowledge then answer, jump straight in, ...)"),
    ("temper_indicators", "how they handle frustration, pressure or disagreement"),
    ("persuasion_style", "how they make arguments or push for action"),
    ("representative_snippets", "3-5 short quotes that best represent the author's voice"),
];

/// Derived "stylistic DNA" of one author.
///
/// Each field is a short free-text description or [`UNKNOWN`]; none is ever
/// empty. A profile is a snapshot: re-extraction replaces it wholesale.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StyleProfile {
    pub tone: String,
    pub formality_level: String,
    pub sentence_structure: String,
    pub vocabulary_level: String,
    pub greeting_patterns: String,
    pub closing_patterns: String,
    pub unique_phrases: String,
    pub terminology: String,
    pub emotional_expression: String,
    pub punctuation_habits: String,
    pub paragraph_style: String,
    pub language_quirks: String,
    pub response_patterns: String,
    pub temper_indicators: String,
    pub persuasion_style: String,
    pub representative_snippets: String,
    /// How many samples the profile was derived from.
    pub sample_count: usize,
    pub created_at: DateTime<Utc>,
}

impl StyleProfile {
    /// A profile with every field set to [`UNKNOWN`].
    pub fn unknown(sample_count: usize) -> Self {
        let u = || UNKNOWN.to_string();
        Self {
            tone: u(),
            formality_level: u(),
            sentence_structure: u(),
            vocabulary_level: u(),
            greeting_patterns: u(),
            closing_patterns: u(),
            unique_phrases: u(),
            terminology: u(),
            emotional_expression: u(),
            punctuation_habits: u(),
            paragraph_style: u(),
            language_quirks: u(),
            response_patterns: u(),
            temper_indicators: u(),
            persuasion_style: u(),
            representative_snippets: u(),
            sample_count,
            created_at: Utc::now(),
        }
    }

    /// Look up a field by its key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "tone" => &self.tone,
            "formality_level" => &self.formality_level,
            "sentence_structure" => &self.sentence_structure,
            "vocabulary_level" => &self.vocabulary_level,
            "greeting_patterns" => &self.greeting_patterns,
            "closing_patterns" => &self.closing_patterns,
            "unique_phrases" => &self.unique_phrases,
            "terminology" => &self.terminology,
            "emotional_expression" => &self.emotional_expression,
            "punctuation_habits" => &self.punctuation_habits,
            "paragraph_style" => &self.paragraph_style,
            "language_quirks" => &self.language_quirks,
            "response_patterns" => &self.response_patterns,
            "temper_indicators" => &self.temper_indicators,
            "persuasion_style" => &self.persuasion_style,
            "representative_snippets" => &self.representative_snippets,
            _ => return None,
        };
        Some(value)
    }

    fn slot(&mut self, key: &str) -> Option<&mut String> {
        let slot = match key {
            "tone" => &mut self.tone,
            "formality_level" => &mut self.formality_level,
            "sentence_structure" => &mut self.sentence_structure,
            "vocabulary_level" => &mut self.vocabulary_level,
            "greeting_patterns" => &mut self.greeting_patterns,
            "closing_patterns" => &mut self.closing_patterns,
            "unique_phrases" => &mut self.unique_phrases,
            "terminology" => &mut self.terminology,
            "emotional_expression" => &mut self.emotional_expression,
            "punctuation_habits" => &mut self.punctuation_habits,
            "paragraph_style" => &mut self.paragraph_style,
            "language_quirks" => &mut self.language_quirks,
            "response_patterns" => &mut self.response_patterns,
            "temper_indicators" => &mut self.temper_indicators,
            "persuasion_style" => &mut self.persuasion_style,
            "representative_snippets" => &mut self.representative_snippets,
            _ => return None,
        };
        Some(slot)
    }

    /// Set a field, normalising blank values to [`UNKNOWN`].
    ///
    /// Returns `false` for keys outside the fixed field set.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        let value = value.trim();
        match self.slot(key) {
            Some(slot) => {
                *slot = if value.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    value.to_string()
                };
                true
            }
            None => false,
        }
    }

    /// All `(key, value)` pairs in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        FIELDS
            .iter()
            .map(move |(key, _)| (*key, self.get(key).unwrap_or(UNKNOWN)))
    }

    /// Number of fields holding something other than [`UNKNOWN`].
    pub fn known_fields(&self) -> usize {
        self.fields().filter(|(_, v)| *v != UNKNOWN).count()
    }

    /// Build a profile from a decoded JSON object, flattening lists and
    /// nested objects into text. Unrecognised keys are ignored.
    pub fn from_json_object(object: &Map<String, Value>, sample_count: usize) -> Self {
        let mut profile = Self::unknown(sample_count);
        for (key, value) in object {
            let key = normalize_key(key);
            profile.set(&key, &flatten_value(value));
        }
        profile
    }

    /// Render the profile as a labeled list for embedding in a prompt.
    pub fn to_prompt_block(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.fields() {
            out.push_str(&format!("- {key}: {value}\n"));
        }
        out
    }

    /// Re-establish the no-empty-field invariant after deserialising a
    /// profile that may have been edited by hand.
    pub fn normalized(mut self) -> Self {
        for (key, _) in FIELDS {
            let current = self.get(key).unwrap_or_default().to_string();
            self.set(key, &current);
        }
        self
    }
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self::unknown(0)
    }
}

/// Map loosely formatted labels ("Tone", "greeting patterns") onto field keys.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '*' || c == '"' || c == '`' || c == '#')
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_")
}

/// Flatten a JSON value into a single line of text.
fn flatten_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k, flatten_value(v)))
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; "),
    }
}
