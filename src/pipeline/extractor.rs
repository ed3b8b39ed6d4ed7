//! Style extraction: turn the stored samples into a [`StyleProfile`].

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{Result, ScribeError};
use crate::llm::{CompletionRequest, TextModel};
use crate::model::profile::{normalize_key, StyleProfile, FIELDS};
use crate::model::sample::WritingSample;
use crate::store::{ProfileStore, SampleStore};

/// Low temperature keeps repeated analyses of the same corpus consistent.
pub const ANALYSIS_TEMPERATURE: f32 = 0.3;
pub const ANALYSIS_MAX_TOKENS: u32 = 4096;
/// Model calls per extraction (the first try plus one retry).
const ATTEMPTS: usize = 2;

/// The corpus actually sent for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub text: String,
    /// Samples that contributed at least part of their body.
    pub samples_used: usize,
    /// The character budget cut something off.
    pub truncated: bool,
}

/// Concatenate samples into one analysis corpus of at most `max_chars`
/// characters.
///
/// `samples` are expected oldest first. The most recent samples win when the
/// budget runs out; the sample that crosses the limit is cut on a char
/// boundary. The result lists samples in chronological order.
pub fn build_corpus(samples: &[WritingSample], max_chars: usize) -> Corpus {
    let mut blocks: Vec<String> = Vec::new();
    let mut used = 0usize;
    let mut truncated = false;

    for (i, sample) in samples.iter().enumerate().rev() {
        let mut block = format!("\n=== SAMPLE {} ===\n", i + 1);
        if let Some(subject) = sample.subject.as_deref().filter(|s| !s.is_empty()) {
            block.push_str(&format!("Subject: {subject}\n"));
        }
        let header_len = block.chars().count();
        block.push_str(sample.body.trim());
        block.push('\n');

        let len = block.chars().count();
        let remaining = max_chars.saturating_sub(used);
        if len <= remaining {
            used += len;
            blocks.push(block);
            continue;
        }
        truncated = true;
        // A cut block must keep some of its body.
        if remaining > header_len {
            blocks.push(block.chars().take(remaining).collect());
        }
        break;
    }

    blocks.reverse();
    Corpus {
        samples_used: blocks.len(),
        text: blocks.concat(),
        truncated,
    }
}

/// The instruction asking the model for a JSON style profile.
pub fn analysis_prompt(corpus: &str) -> String {
    let mut prompt = String::from(
        "You are a linguistic analyst. Analyze the following writing samples from a \
         single author and produce a comprehensive style profile.\n\n\
         The profile MUST describe every one of these dimensions:\n\n",
    );
    for (n, (key, description)) in FIELDS.iter().enumerate() {
        prompt.push_str(&format!("{}. {key}: {description}\n", n + 1));
    }
    prompt.push_str(
        "\nReturn ONLY one valid JSON object. No markdown fences. No extra text.\n\
         Use exactly these keys, each with a string value (lists may be arrays of strings):\n",
    );
    let skeleton: Map<String, Value> = FIELDS
        .iter()
        .map(|(key, _)| (key.to_string(), Value::String("...".to_string())))
        .collect();
    prompt.push_str(&serde_json::to_string_pretty(&Value::Object(skeleton)).unwrap_or_default());
    prompt.push_str("\n\n--- WRITING SAMPLES ---\n");
    prompt.push_str(corpus);
    prompt
}

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(nl) => &text[nl + 1..],
            None => "",
        };
    }
    if let Some(stripped) = text.trim_end().strip_suffix("```") {
        text = stripped;
    }
    text.trim()
}

/// Parse model output into a profile.
///
/// Accepts a bare JSON object, one wrapped in fences or prose, or, failing
/// that, labeled `key: value` lines. Returns `None` when no profile field
/// could be recognised at all.
pub fn parse_profile(raw: &str, sample_count: usize) -> Option<StyleProfile> {
    let text = strip_code_fences(raw);

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            match serde_json::from_str::<Value>(&text[start..=end]) {
                Ok(Value::Object(object)) => {
                    let profile = StyleProfile::from_json_object(&object, sample_count);
                    if profile.known_fields() > 0 {
                        return Some(profile);
                    }
                    debug!("JSON object held no profile fields");
                }
                Ok(_) => debug!("Model output is JSON but not an object"),
                Err(e) => debug!(error = %e, "Model output is not valid JSON"),
            }
        }
    }

    let profile = parse_labeled_lines(text, sample_count);
    (profile.known_fields() > 0).then_some(profile)
}

/// Fallback: read `key: value` lines such as `- **Tone**: blunt`.
fn parse_labeled_lines(text: &str, sample_count: usize) -> StyleProfile {
    let mut profile = StyleProfile::unknown(sample_count);
    for line in text.lines() {
        let line = line
            .trim()
            .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•' || c.is_ascii_digit() || c == '.')
            .trim();
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let key = normalize_key(label);
        let value = value.trim().trim_matches(|c: char| c == '*' || c == '"' || c == ',');
        if profile.get(&key).is_some() {
            profile.set(&key, value);
        }
    }
    profile
}

/// Derives a style profile from the sample store and commits it to the
/// profile store.
pub struct StyleExtractor<'a> {
    samples: &'a dyn SampleStore,
    profiles: &'a mut dyn ProfileStore,
    model: &'a dyn TextModel,
    max_corpus_chars: usize,
}

impl<'a> StyleExtractor<'a> {
    pub fn new(
        samples: &'a dyn SampleStore,
        profiles: &'a mut dyn ProfileStore,
        model: &'a dyn TextModel,
        max_corpus_chars: usize,
    ) -> Self {
        Self {
            samples,
            profiles,
            model,
            max_corpus_chars,
        }
    }

    /// Analyse every stored sample and replace the stored profile.
    ///
    /// On any failure the previously stored profile is left as it was.
    pub fn extract(&mut self) -> Result<StyleProfile> {
        let samples = self.samples.read_all()?;
        if samples.is_empty() {
            return Err(ScribeError::InsufficientSamples(self.samples.location()));
        }

        let corpus = build_corpus(&samples, self.max_corpus_chars);
        if corpus.samples_used == 0 {
            warn!(max_chars = self.max_corpus_chars, "No sample fits the corpus budget");
            return Err(ScribeError::InsufficientSamples(self.samples.location()));
        }
        if corpus.truncated {
            warn!(
                total = samples.len(),
                used = corpus.samples_used,
                max_chars = self.max_corpus_chars,
                "Sample corpus exceeds the budget; keeping the most recent samples"
            );
        }
        info!(
            samples = corpus.samples_used,
            chars = corpus.text.len(),
            model = %self.model.describe(),
            "Analyzing writing style"
        );

        let request = CompletionRequest::new(analysis_prompt(&corpus.text))
            .with_temperature(ANALYSIS_TEMPERATURE)
            .with_max_output_tokens(ANALYSIS_MAX_TOKENS);

        let mut last_error = String::new();
        for attempt in 1..=ATTEMPTS {
            match self.model.complete(&request) {
                Ok(raw) => match parse_profile(&raw, corpus.samples_used) {
                    Some(profile) => {
                        self.profiles.write_profile(&profile)?;
                        info!(
                            known_fields = profile.known_fields(),
                            attempt, "Style profile extracted"
                        );
                        return Ok(profile);
                    }
                    None => {
                        let head: String = raw.chars().take(200).collect();
                        warn!(attempt, output = %head, "Could not parse a style profile");
                        last_error = "model output contained no recognisable profile".to_string();
                    }
                },
                Err(e) => {
                    warn!(attempt, error = %e, "Style analysis request failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(ScribeError::StyleExtractionFailed(last_error))
    }
}
