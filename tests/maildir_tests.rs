//! Integration tests for the on-disk stores: Maildir, sample directory and
//! profile file.

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use replyscribe::config::{MailConfig, StyleConfig};
use replyscribe::llm::scripted::ScriptedModel;
use replyscribe::pipeline::collector::SampleCollector;
use replyscribe::pipeline::extractor::StyleExtractor;
use replyscribe::pipeline::respond::Responder;
use replyscribe::pipeline::CancelToken;
use replyscribe::store::maildir::MaildirStore;
use replyscribe::store::profile::ProfileFile;
use replyscribe::store::samples::SampleDir;
use replyscribe::store::{MailStore, ProfileStore, SampleStore};
use replyscribe::ScribeError;

const UNREAD_OLD: &str = "From: Dana Levi <dana@example.com>\n\
To: Sam Ortiz <sam@example.com>\n\
Subject: Budget review\n\
Date: Mon, 1 Jan 2024 09:00:00 +0000\n\
Message-ID: <budget@example.com>\n\
\n\
Can you send the Q1 numbers before Friday?\n";

const UNREAD_NEW: &str = "From: Lee <lee@example.com>\n\
To: sam@example.com\n\
Subject: Lunch?\n\
Date: Wed, 3 Jan 2024 12:30:00 +0000\n\
Message-ID: <lunch@example.com>\n\
\n\
Free for lunch tomorrow?\n";

const SEEN: &str = "From: Dana Levi <dana@example.com>\n\
To: sam@example.com\n\
Subject: Old thread\n\
Date: Sun, 31 Dec 2023 08:00:00 +0000\n\
\n\
Already handled.\n";

const SENT_REPLY: &str = "From: Sam Ortiz <sam@example.com>\n\
To: Dana Levi <dana@example.com>\n\
Subject: Re: Old thread\n\
Date: Sun, 31 Dec 2023 09:15:00 +0000\n\
\n\
Hey Dana!! All sorted, no worries at all :)\n\
\n\
Cheers,\n\
Sam\n\
\n\
On Sun, 31 Dec 2023 08:00, Dana Levi wrote:\n\
> Already handled.\n";

const SENT_SHORT: &str = "From: Sam Ortiz <sam@example.com>\n\
To: lee@example.com\n\
Subject: Re: ping\n\
Date: Sat, 30 Dec 2023 10:00:00 +0000\n\
\n\
ok!\n";

/// Build a Maildir++ tree with an inbox, a Sent folder and an empty Trash.
fn maildir() -> TempDir {
    let temp = TempDir::new().unwrap();
    for dir in ["cur", "new", "tmp", ".Sent/cur", ".Sent/new", ".Sent/tmp", ".Trash/cur"] {
        temp.child(dir).create_dir_all().unwrap();
    }
    temp.child("new/1704099600.M1P1.host").write_str(UNREAD_OLD).unwrap();
    temp.child("cur/1704285000.M2P1.host:2,").write_str(UNREAD_NEW).unwrap();
    temp.child("cur/1704009600.M3P1.host:2,S").write_str(SEEN).unwrap();
    temp.child(".Sent/cur/1704014100.M4P1.host:2,S")
        .write_str(SENT_REPLY)
        .unwrap();
    temp.child(".Sent/cur/1703930400.M5P1.host:2,S")
        .write_str(SENT_SHORT)
        .unwrap();
    temp
}

fn store(root: &Path) -> MaildirStore {
    MaildirStore::new(root, &MailConfig::default())
}

fn drafts_in(root: &Path) -> Vec<PathBuf> {
    let dir = root.join(".Drafts").join("cur");
    if !dir.exists() {
        return Vec::new();
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

// ─── Maildir store ──────────────────────────────────────────────────

#[test]
fn test_list_folders_counts_unread() {
    let temp = maildir();
    let folders = store(temp.path()).list_folders().unwrap();
    let summary: Vec<(&str, usize)> = folders.iter().map(|f| (f.name.as_str(), f.unread)).collect();
    assert_eq!(summary, vec![("INBOX", 2), ("Sent", 0), ("Trash", 0)]);
}

#[test]
fn test_list_unread_newest_first() {
    let temp = maildir();
    let unread = store(temp.path()).list_unread("INBOX", 10).unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0].subject, "Lunch?");
    assert_eq!(unread[1].subject, "Budget review");
    assert_eq!(unread[1].sender.name, "Dana Levi");
    assert_eq!(unread[1].message_id.as_deref(), Some("budget@example.com"));
    assert!(unread[1].body.contains("Q1 numbers"));

    let limited = store(temp.path()).list_unread("INBOX", 1).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].subject, "Lunch?");
}

#[test]
fn test_unknown_folder_lists_alternatives() {
    let temp = maildir();
    let err = store(temp.path()).list_unread("Archive", 10).unwrap_err();
    match err {
        ScribeError::FolderNotFound { name, available } => {
            assert_eq!(name, "Archive");
            assert!(available.contains("Sent"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_maildir_is_unavailable() {
    let temp = TempDir::new().unwrap();
    let mut mail = store(&temp.path().join("nowhere"));
    assert!(matches!(
        mail.list_folders(),
        Err(ScribeError::MailStoreUnavailable(_))
    ));
    assert!(matches!(
        mail.list_sent(10, &mut |_| true),
        Err(ScribeError::MailStoreUnavailable(_))
    ));
}

#[test]
fn test_list_sent_strips_quoted_history() {
    let temp = maildir();
    let mut bodies = Vec::new();
    let kept = store(temp.path())
        .list_sent(10, &mut |s| {
            bodies.push(s.body);
            true
        })
        .unwrap();
    assert_eq!(kept, 2);
    let reply = bodies.iter().find(|b| b.contains("All sorted")).unwrap();
    assert!(reply.ends_with("Cheers,\nSam"));
    assert!(!reply.contains("Already handled"));
}

#[test]
fn test_list_from_sender_reads_inbox() {
    let temp = maildir();
    let mut subjects = Vec::new();
    store(temp.path())
        .list_from_sender("DANA@example.com", 10, &mut |s| {
            subjects.push(s.subject.unwrap_or_default());
            true
        })
        .unwrap();
    subjects.sort();
    assert_eq!(subjects, vec!["Budget review", "Old thread"]);
}

#[test]
fn test_draft_reply_is_threaded_and_flagged() {
    let temp = maildir();
    let mut mail = store(temp.path());
    let original = mail.list_unread("INBOX", 10).unwrap().pop().unwrap();

    let draft = mail
        .create_draft_reply(&original.id, "Sure, sending them Thursday.")
        .unwrap();

    assert!(draft.id.starts_with(".Drafts/cur/"));
    assert!(draft.id.ends_with(":2,D"));
    let file = temp.child(&draft.id);
    file.assert(predicate::path::is_file());
    file.assert(predicate::str::contains("To: \"Dana Levi\" <dana@example.com>"));
    file.assert(predicate::str::contains("Subject: Re: Budget review"));
    file.assert(predicate::str::contains("In-Reply-To: <budget@example.com>"));
    file.assert(predicate::str::contains("Sure, sending them Thursday."));
    file.assert(predicate::str::contains("> Can you send the Q1 numbers before Friday?"));
    temp.child(".Drafts/tmp").assert(predicate::path::is_dir());
    assert!(std::fs::read_dir(temp.path().join(".Drafts/tmp")).unwrap().next().is_none());

    // The original stays unread and in place.
    temp.child(&original.id).assert(predicate::path::exists());
    assert_eq!(mail.list_unread("INBOX", 10).unwrap().len(), 2);
}

#[test]
fn test_every_draft_call_adds_a_file() {
    let temp = maildir();
    let mut mail = store(temp.path());
    let target = mail.list_unread("INBOX", 1).unwrap().remove(0);
    mail.create_draft_reply(&target.id, "one").unwrap();
    mail.create_draft_reply(&target.id, "two").unwrap();
    assert_eq!(drafts_in(temp.path()).len(), 2);
}

#[test]
fn test_draft_for_unknown_message_fails() {
    let temp = maildir();
    let err = store(temp.path())
        .create_draft_reply("cur/does-not-exist", "hi")
        .unwrap_err();
    assert!(matches!(err, ScribeError::MessageNotFound(_)));
    assert!(drafts_in(temp.path()).is_empty());
}

// ─── Sample directory and profile file ──────────────────────────────

#[test]
fn test_collect_into_sample_dir() {
    let temp = maildir();
    let samples_root = TempDir::new().unwrap();
    let mut mail = store(temp.path());
    let mut samples = SampleDir::new(samples_root.path());

    let report = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
        .collect(10)
        .unwrap();
    assert_eq!(report.stored, 1);
    assert_eq!(report.skipped_short, 1);

    let stored = samples.read_all().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].subject.as_deref(), Some("Re: Old thread"));
    assert!(stored[0].body.starts_with("Hey Dana!!"));

    let again = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
        .collect(10)
        .unwrap();
    assert_eq!(again.stored, 0);
    assert_eq!(again.duplicates, 1);
    assert_eq!(samples.read_all().unwrap().len(), 1);
}

#[test]
fn test_hand_written_samples_are_read() {
    let root = TempDir::new().unwrap();
    root.child("notes").create_dir_all().unwrap();
    root.child("notes/reply.md")
        .write_str("Honestly? Just ship it. We'll fix forward.")
        .unwrap();
    root.child("old.html")
        .write_str("<p>Thanks &amp; talk soon!</p>")
        .unwrap();
    root.child(".hidden.txt").write_str("ignore me").unwrap();

    let samples = SampleDir::new(root.path()).read_all().unwrap();
    let mut bodies: Vec<String> = samples.into_iter().map(|s| s.body).collect();
    bodies.sort();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].contains("Just ship it"));
    assert!(bodies[1].contains("Thanks & talk soon!"));
}

#[test]
fn test_profile_file_written_as_json() {
    let root = TempDir::new().unwrap();
    let samples_root = TempDir::new().unwrap();
    samples_root
        .child("a.txt")
        .write_str("Cheers mate, speak soon!")
        .unwrap();
    let samples = SampleDir::new(samples_root.path());
    let mut profiles = ProfileFile::new(root.child("style_profile.json").path());
    let model = ScriptedModel::always("```json\n{\"tone\": \"friendly\"}\n```");

    StyleExtractor::new(&samples, &mut profiles, &model, 60_000)
        .extract()
        .unwrap();

    root.child("style_profile.json")
        .assert(predicate::str::contains("\"tone\": \"friendly\""))
        .assert(predicate::str::contains("\"sample_count\": 1"));
    assert!(profiles.read_profile().unwrap().is_some());
}

// ─── Full flow ──────────────────────────────────────────────────────

#[test]
fn test_collect_extract_respond_on_disk() {
    let temp = maildir();
    let data = TempDir::new().unwrap();
    let mut mail = store(temp.path());
    let mut samples = SampleDir::new(data.child("samples").path());
    let mut profiles = ProfileFile::new(data.child("style_profile.json").path());

    SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
        .collect(10)
        .unwrap();

    let analyst = ScriptedModel::always(r#"{"tone": "upbeat", "closing_patterns": "Cheers, Sam"}"#);
    StyleExtractor::new(&samples, &mut profiles, &analyst, 60_000)
        .extract()
        .unwrap();

    let writer = ScriptedModel::always("Hey! Sounds good.\n\nCheers,\nSam");
    let report = Responder::new(&mut mail, &writer, &profiles)
        .unwrap()
        .respond("INBOX", 10, &CancelToken::new())
        .unwrap();

    assert_eq!(report.succeeded(), 2);
    assert!(!report.has_failures());
    assert_eq!(drafts_in(temp.path()).len(), 2);
    assert!(writer.calls()[0]
        .system
        .as_deref()
        .unwrap()
        .contains("- closing_patterns: Cheers, Sam"));
}
