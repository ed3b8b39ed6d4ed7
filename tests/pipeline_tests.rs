//! End-to-end behavior of the reply pipeline against in-memory stores and a
//! scripted model.

use chrono::{Duration, TimeZone, Utc};

use replyscribe::llm::scripted::ScriptedModel;
use replyscribe::llm::CompletionRequest;
use replyscribe::model::address::EmailAddress;
use replyscribe::model::message::{GeneratedReply, IncomingMessage};
use replyscribe::model::profile::{StyleProfile, UNKNOWN};
use replyscribe::model::sample::WritingSample;
use replyscribe::pipeline::collector::SampleCollector;
use replyscribe::pipeline::drafts::DraftWriter;
use replyscribe::pipeline::extractor::StyleExtractor;
use replyscribe::pipeline::generator::ReplyGenerator;
use replyscribe::pipeline::respond::Responder;
use replyscribe::pipeline::{CancelToken, ItemOutcome};
use replyscribe::config::StyleConfig;
use replyscribe::store::memory::{MemoryMailStore, MemoryProfileStore, MemorySampleStore};
use replyscribe::store::profile::ProfileFile;
use replyscribe::store::{ProfileStore, SampleStore};
use replyscribe::ScribeError;

fn sample(day: i64, body: &str) -> WritingSample {
    let ts = Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap() + Duration::days(day);
    WritingSample::new(body, ts).with_subject(format!("Thread {day}"))
}

fn incoming(n: i64) -> IncomingMessage {
    IncomingMessage {
        id: format!("INBOX/new/{n}"),
        sender: EmailAddress::new("Robin Park", "robin@example.com"),
        subject: format!("Question {n}"),
        body: format!("Hi! Could you take a look at item {n} today?"),
        received: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + Duration::minutes(n),
        message_id: Some(format!("q{n}@example.com")),
    }
}

fn stored_profile() -> StyleProfile {
    let mut profile = StyleProfile::unknown(5);
    profile.tone = "casual".to_string();
    profile.closing_patterns = "cheers!".to_string();
    profile
}

// ─── Extraction ─────────────────────────────────────────────────────

#[test]
fn test_extracted_fields_are_never_empty() {
    let samples = MemorySampleStore::with_samples(vec![sample(0, "Thanks, will do.")]);
    let mut profiles = MemoryProfileStore::new();
    let model = ScriptedModel::always(
        r#"{"tone": "direct", "greeting_patterns": [], "closing_patterns": "",
            "unique_phrases": null, "emotional_expression": {"humor": ""}}"#,
    );

    let profile = StyleExtractor::new(&samples, &mut profiles, &model, 60_000)
        .extract()
        .unwrap();

    for (key, value) in profile.fields() {
        assert!(!value.trim().is_empty(), "{key} is empty");
    }
    assert_eq!(profile.tone, "direct");
    assert_eq!(profile.greeting_patterns, UNKNOWN);
    assert_eq!(profile.closing_patterns, UNKNOWN);
    assert_eq!(profile.unique_phrases, UNKNOWN);
    assert_eq!(profile.emotional_expression, UNKNOWN);
}

#[test]
fn test_casual_emoji_samples_give_informal_tone() {
    let samples = MemorySampleStore::with_samples(vec![
        sample(0, "lol yes!! see u there 😂🎉"),
        sample(1, "omg thank uuu 🙏 ur the best"),
        sample(2, "haha nope, maybe next week? 🤷"),
    ]);
    let mut profiles = MemoryProfileStore::new();
    // Stands in for a model that actually reads the corpus.
    let model = ScriptedModel::from_fn(|req: &CompletionRequest| {
        let playful = ["😂", "🎉", "lol", "haha"]
            .iter()
            .any(|marker| req.prompt.contains(marker));
        Ok(if playful {
            r#"{"tone": "casual, playful", "formality_level": 2,
                "punctuation_habits": "lots of emoji and double exclamation marks"}"#
        } else {
            r#"{"tone": "formal", "formality_level": 9}"#
        }
        .to_string())
    });

    let profile = StyleExtractor::new(&samples, &mut profiles, &model, 60_000)
        .extract()
        .unwrap();

    assert!(profile.tone.contains("casual"));
    let formality: u32 = profile.formality_level.parse().unwrap();
    assert!(formality <= 3);
    assert_eq!(profile.sample_count, 3);
}

#[test]
fn test_no_samples_is_insufficient_and_profile_unchanged() {
    let samples = MemorySampleStore::new();
    let mut profiles = MemoryProfileStore::with_profile(stored_profile());
    let model = ScriptedModel::always(r#"{"tone": "new"}"#);

    let err = StyleExtractor::new(&samples, &mut profiles, &model, 60_000)
        .extract()
        .unwrap_err();

    assert!(matches!(err, ScribeError::InsufficientSamples(_)));
    assert_eq!(model.call_count(), 0);
    assert_eq!(profiles.writes(), 0);
    assert_eq!(profiles.read_profile().unwrap(), Some(stored_profile()));
}

#[test]
fn test_reextraction_replaces_profile_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("style_profile.json");
    let samples = MemorySampleStore::with_samples(vec![sample(0, "Noted, thanks.")]);
    let mut profiles = ProfileFile::new(&path);

    let first = ScriptedModel::always(r#"{"tone": "terse"}"#);
    StyleExtractor::new(&samples, &mut profiles, &first, 60_000)
        .extract()
        .unwrap();
    let second = ScriptedModel::always(r#"{"tone": "warm", "paragraph_style": "short"}"#);
    StyleExtractor::new(&samples, &mut profiles, &second, 60_000)
        .extract()
        .unwrap();

    let stored = profiles.read_profile().unwrap().unwrap();
    assert_eq!(stored.tone, "warm");
    assert_eq!(stored.paragraph_style, "short");
    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["style_profile.json".to_string()]);
}

// ─── Generation ─────────────────────────────────────────────────────

#[test]
fn test_generate_leaves_inputs_untouched() {
    let message = incoming(1);
    let profile = stored_profile();
    let (message_before, profile_before) = (message.clone(), profile.clone());
    let model = ScriptedModel::always("Sure, on it. cheers!");

    let reply = ReplyGenerator::new(&model)
        .generate(&message, &profile)
        .unwrap();

    assert_eq!(reply.message_id, message.id);
    assert_eq!(message, message_before);
    assert_eq!(profile, profile_before);
    let prompt = &model.calls()[0];
    assert!(prompt.prompt.contains(&message.body));
    assert!(prompt.system.as_deref().unwrap().contains("- closing_patterns: cheers!"));
}

#[test]
fn test_missing_profile_never_calls_model() {
    let model = ScriptedModel::always("unused");
    let profiles = MemoryProfileStore::new();

    let err = ReplyGenerator::new(&model)
        .generate_with_store(&incoming(1), &profiles)
        .unwrap_err();

    assert!(matches!(err, ScribeError::NoStyleProfile(_)));
    assert_eq!(model.call_count(), 0);
}

#[test]
fn test_one_failing_message_does_not_stop_the_rest() {
    let mut mail = (0..4).fold(MemoryMailStore::new(), |m, n| m.with_unread("INBOX", incoming(n)));
    let profiles = MemoryProfileStore::with_profile(stored_profile());
    let model = ScriptedModel::from_fn(|req: &CompletionRequest| {
        if req.prompt.contains("Question 2") {
            Err(ScribeError::ModelTimeout(60))
        } else {
            Ok("Will do! cheers!".to_string())
        }
    });

    let report = Responder::new(&mut mail, &model, &profiles)
        .unwrap()
        .respond("INBOX", 10, &CancelToken::new())
        .unwrap();

    assert_eq!(report.items.len(), 4);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    let failed = report
        .items
        .iter()
        .find(|i| matches!(i.outcome, ItemOutcome::Failed(_)))
        .unwrap();
    assert_eq!(failed.subject, "Question 2");
    assert_eq!(mail.drafts().len(), 3);
}

#[test]
fn test_respond_handles_newest_first() {
    let mut mail = (0..3).fold(MemoryMailStore::new(), |m, n| m.with_unread("INBOX", incoming(n)));
    let model = ScriptedModel::always("ok");

    let report = Responder::with_profile(&mut mail, &model, stored_profile())
        .respond("INBOX", 2, &CancelToken::new())
        .unwrap();

    let subjects: Vec<&str> = report.items.iter().map(|i| i.subject.as_str()).collect();
    assert_eq!(subjects, vec!["Question 2", "Question 1"]);
}

// ─── Drafts ─────────────────────────────────────────────────────────

#[test]
fn test_two_saves_make_two_drafts() {
    let mut mail = MemoryMailStore::new().with_unread("INBOX", incoming(7));
    let reply = GeneratedReply {
        message_id: incoming(7).id,
        body: "Yep, looks good.".to_string(),
    };

    let mut writer = DraftWriter::new(&mut mail);
    let first = writer.save_draft(&reply).unwrap();
    let second = writer.save_draft(&reply).unwrap();

    assert_ne!(first, second);
    assert_eq!(mail.drafts().len(), 2);
}

// ─── Collection ─────────────────────────────────────────────────────

#[test]
fn test_disconnect_midway_keeps_fetched_samples() {
    let mut mail = (0..10).fold(MemoryMailStore::new().fail_after(4), |m, n| {
        m.with_sent(sample(n, &format!("Authored message number {n}, long enough to keep.")))
    });
    let mut samples = MemorySampleStore::new();

    let mut collector = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default());
    let err = collector.collect(10).unwrap_err();
    let report = collector.report();
    drop(collector);

    assert!(matches!(err, ScribeError::MailStoreUnavailable(_)));
    assert_eq!(report.stored, 4);
    assert_eq!(samples.len(), 4);
    assert_eq!(samples.read_all().unwrap().len(), 4);
}

#[test]
fn test_unreachable_store_fails_collection() {
    let mut mail = MemoryMailStore::new().disconnected();
    let mut samples = MemorySampleStore::new();

    let err = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
        .collect(10)
        .unwrap_err();

    assert!(matches!(err, ScribeError::MailStoreUnavailable(_)));
    assert!(samples.is_empty());
}
