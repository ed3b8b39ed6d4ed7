//! Reply generation in the user's voice.

use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ScribeError};
use crate::llm::{CompletionRequest, TextModel};
use crate::model::message::{GeneratedReply, IncomingMessage};
use crate::model::profile::StyleProfile;
use crate::store::ProfileStore;

/// Some variation keeps replies from sounding canned.
pub const REPLY_TEMPERATURE: f32 = 0.7;
pub const REPLY_MAX_TOKENS: u32 = 2048;

/// Standing ghostwriter instruction; `{profile}` and `{formality}` are filled in.
const SYSTEM_TEMPLATE: &str = "\
You are a ghostwriter. Your only job is to write email replies that mimic one \
specific person's writing style. You must sound exactly like them: not like an \
assistant, not like a generic professional, but like this person.

Their style profile:
{profile}
Rules:
1. Match their tone exactly. If they are blunt, be blunt. If they are warm, be warm.
2. Use their greeting and closing patterns naturally.
3. Work in their unique phrases and terminology where they fit.
4. Match their punctuation habits (exclamation marks, ellipses, dashes, emoji).
5. Match their paragraph style and sentence structure.
6. Match their formality level ({formality}).
7. Use humor only if they do.
8. Never add corporate filler unless that is how they write.
9. Keep the reply about as long as their usual replies.
10. Write in the same language as the incoming email.

You will receive an email to reply to. Write ONLY the reply body. \
No subject line, no \"Subject:\" prefix, just the reply text.
";

/// Load the persisted profile, or fail with [`ScribeError::NoStyleProfile`].
pub fn load_profile(profiles: &dyn ProfileStore) -> Result<StyleProfile> {
    profiles
        .read_profile()?
        .ok_or_else(|| ScribeError::NoStyleProfile(profiles.location()))
}

/// The system instruction embedding the whole profile.
pub fn system_prompt(profile: &StyleProfile) -> String {
    SYSTEM_TEMPLATE
        .replace("{profile}", &profile.to_prompt_block())
        .replace("{formality}", &profile.formality_level)
}

/// The per-message prompt.
pub fn reply_prompt(message: &IncomingMessage, instructions: Option<&str>) -> String {
    let mut prompt = format!(
        "Reply to this email:\n\nFROM: {}\nSUBJECT: {}\n\n--- EMAIL BODY ---\n{}\n--- END ---\n",
        message.sender,
        message.subject,
        message.body.trim()
    );
    if let Some(extra) = instructions.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("\nADDITIONAL INSTRUCTIONS: {extra}\n"));
    }
    prompt
}

/// Tidy raw model output: drop a stray `Subject:` line and surrounding blanks.
pub fn clean_reply(raw: &str) -> String {
    let text = raw.trim();
    let text = match text.split_once('\n') {
        Some((first, rest)) if first.trim().to_ascii_lowercase().starts_with("subject:") => rest,
        None if text.to_ascii_lowercase().starts_with("subject:") => "",
        _ => text,
    };
    text.trim().to_string()
}

/// Writes replies with the model, conditioned on a style profile.
pub struct ReplyGenerator<'a> {
    model: &'a dyn TextModel,
}

impl<'a> ReplyGenerator<'a> {
    pub fn new(model: &'a dyn TextModel) -> Self {
        Self { model }
    }

    /// Generate a reply to `message` in the style of `profile`.
    pub fn generate(
        &self,
        message: &IncomingMessage,
        profile: &StyleProfile,
    ) -> Result<GeneratedReply> {
        self.generate_with(message, profile, None)
    }

    /// Like [`ReplyGenerator::generate`], with extra per-reply instructions.
    #[instrument(skip_all, fields(message = %message.id))]
    pub fn generate_with(
        &self,
        message: &IncomingMessage,
        profile: &StyleProfile,
        instructions: Option<&str>,
    ) -> Result<GeneratedReply> {
        let request = CompletionRequest::new(reply_prompt(message, instructions))
            .with_system(system_prompt(profile))
            .with_temperature(REPLY_TEMPERATURE)
            .with_max_output_tokens(REPLY_MAX_TOKENS);

        debug!(model = %self.model.describe(), "Generating reply");
        let raw = self.model.complete(&request).map_err(|e| {
            warn!(error = %e, "Reply generation failed");
            ScribeError::GenerationFailed {
                message_id: message.id.clone(),
                reason: e.to_string(),
            }
        })?;

        let body = clean_reply(&raw);
        if body.is_empty() {
            warn!("Model returned an empty reply");
            return Err(ScribeError::GenerationFailed {
                message_id: message.id.clone(),
                reason: "model returned an empty reply".to_string(),
            });
        }
        info!(chars = body.chars().count(), "Reply generated");
        Ok(GeneratedReply {
            message_id: message.id.clone(),
            body,
        })
    }

    /// Load the stored profile, then generate. Fails with
    /// [`ScribeError::NoStyleProfile`] before any model call when none exists.
    pub fn generate_with_store(
        &self,
        message: &IncomingMessage,
        profiles: &dyn ProfileStore,
    ) -> Result<GeneratedReply> {
        let profile = load_profile(profiles)?;
        self.generate(message, &profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedModel;
    use crate::model::address::EmailAddress;
    use crate::store::memory::MemoryProfileStore;
    use chrono::Utc;

    fn message() -> IncomingMessage {
        IncomingMessage {
            id: "INBOX/new/1".to_string(),
            sender: EmailAddress::new("Ana Costa", "ana@example.com"),
            subject: "Lunch?".to_string(),
            body: "Are you free for lunch on Thursday?".to_string(),
            received: Utc::now(),
            message_id: Some("abc@example.com".to_string()),
        }
    }

    #[test]
    fn test_system_prompt_embeds_profile() {
        let mut profile = StyleProfile::unknown(3);
        profile.tone = "breezy".to_string();
        profile.formality_level = "2".to_string();
        let prompt = system_prompt(&profile);
        assert!(prompt.contains("- tone: breezy"));
        assert!(prompt.contains("formality level (2)"));
        assert!(prompt.contains("- representative_snippets: unknown"));
    }

    #[test]
    fn test_reply_prompt_includes_instructions_only_when_given() {
        let msg = message();
        let plain = reply_prompt(&msg, Some("  "));
        assert!(plain.contains("FROM: Ana Costa <ana@example.com>"));
        assert!(!plain.contains("ADDITIONAL"));
        let extra = reply_prompt(&msg, Some("say yes"));
        assert!(extra.contains("ADDITIONAL INSTRUCTIONS: say yes"));
    }

    #[test]
    fn test_clean_reply_drops_subject_line() {
        assert_eq!(clean_reply("Subject: Re: Lunch\n\nSure!\n"), "Sure!");
        assert_eq!(clean_reply("  Sure!  "), "Sure!");
        assert_eq!(clean_reply("Subject: only"), "");
    }

    #[test]
    fn test_generate_uses_model_settings() {
        let model = ScriptedModel::always("Sure thing!");
        let reply = ReplyGenerator::new(&model)
            .generate(&message(), &StyleProfile::unknown(1))
            .unwrap();
        assert_eq!(reply.message_id, "INBOX/new/1");
        assert_eq!(reply.body, "Sure thing!");
        let call = &model.calls()[0];
        assert_eq!(call.max_output_tokens, REPLY_MAX_TOKENS);
        assert!(call.system.as_deref().unwrap().contains("ghostwriter"));
    }

    #[test]
    fn test_empty_output_is_failure() {
        let model = ScriptedModel::always("   ");
        let err = ReplyGenerator::new(&model)
            .generate(&message(), &StyleProfile::unknown(1))
            .unwrap_err();
        assert!(matches!(err, ScribeError::GenerationFailed { .. }));
    }

    #[test]
    fn test_missing_profile_skips_model() {
        let model = ScriptedModel::always("unused");
        let profiles = MemoryProfileStore::new();
        let err = ReplyGenerator::new(&model)
            .generate_with_store(&message(), &profiles)
            .unwrap_err();
        assert!(matches!(err, ScribeError::NoStyleProfile(_)));
        assert_eq!(model.call_count(), 0);
    }
}
