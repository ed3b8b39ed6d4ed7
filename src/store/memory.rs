//! In-memory stores for tests and dry runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{MailStore, ProfileStore, SampleStore};
use crate::error::{Result, ScribeError};
use crate::model::message::{DraftRef, FolderRef, IncomingMessage};
use crate::model::profile::StyleProfile;
use crate::model::sample::WritingSample;

/// A draft recorded by [`MemoryMailStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDraft {
    pub reply_to: String,
    pub body: String,
}

/// Mail store held entirely in memory.
///
/// Can be told to drop its "connection" up front or after delivering a
/// number of authored messages, to exercise partial-failure paths.
#[derive(Debug, Default)]
pub struct MemoryMailStore {
    folders: BTreeMap<String, Vec<(IncomingMessage, bool)>>,
    sent: Vec<WritingSample>,
    drafts: Vec<MemoryDraft>,
    disconnected: bool,
    fail_after: Option<usize>,
    delivered: usize,
}

impl MemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unread message to `folder`.
    pub fn with_unread(mut self, folder: &str, message: IncomingMessage) -> Self {
        self.folders
            .entry(folder.to_string())
            .or_default()
            .push((message, false));
        self
    }

    /// Add an already-read message to `folder`.
    pub fn with_read(mut self, folder: &str, message: IncomingMessage) -> Self {
        self.folders
            .entry(folder.to_string())
            .or_default()
            .push((message, true));
        self
    }

    /// Add a message to the user's sent mail.
    pub fn with_sent(mut self, sample: WritingSample) -> Self {
        self.sent.push(sample);
        self
    }

    /// Make every call fail as if the mail client were not running.
    pub fn disconnected(mut self) -> Self {
        self.disconnected = true;
        self
    }

    /// Drop the connection after `count` authored messages were streamed.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    pub fn drafts(&self) -> &[MemoryDraft] {
        &self.drafts
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.disconnected {
            Err(ScribeError::MailStoreUnavailable(
                "memory store disconnected".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn stream(
        &mut self,
        pool: Vec<WritingSample>,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize> {
        self.ensure_connected()?;
        let mut kept = 0;
        for sample in pool {
            if kept >= max_count {
                break;
            }
            if self.fail_after.is_some_and(|limit| self.delivered >= limit) {
                self.disconnected = true;
                return Err(ScribeError::MailStoreUnavailable(format!(
                    "connection lost after {} messages",
                    self.delivered
                )));
            }
            self.delivered += 1;
            if sink(sample) {
                kept += 1;
            }
        }
        Ok(kept)
    }

    fn newest_first(mut samples: Vec<WritingSample>) -> Vec<WritingSample> {
        samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        samples
    }
}

impl MailStore for MemoryMailStore {
    fn list_folders(&mut self) -> Result<Vec<FolderRef>> {
        self.ensure_connected()?;
        Ok(self
            .folders
            .iter()
            .map(|(name, messages)| FolderRef {
                name: name.clone(),
                unread: messages.iter().filter(|(_, seen)| !seen).count(),
            })
            .collect())
    }

    fn list_unread(&mut self, folder: &str, max_count: usize) -> Result<Vec<IncomingMessage>> {
        self.ensure_connected()?;
        let messages = self
            .folders
            .get(folder)
            .ok_or_else(|| ScribeError::FolderNotFound {
                name: folder.to_string(),
                available: self.folders.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;
        let mut unread: Vec<IncomingMessage> = messages
            .iter()
            .filter(|(_, seen)| !seen)
            .map(|(m, _)| m.clone())
            .collect();
        unread.sort_by(|a, b| b.received.cmp(&a.received));
        unread.truncate(max_count);
        Ok(unread)
    }

    fn list_sent(
        &mut self,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize> {
        let pool = Self::newest_first(self.sent.clone());
        self.stream(pool, max_count, sink)
    }

    fn list_from_sender(
        &mut self,
        sender: &str,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize> {
        let pool = self
            .folders
            .values()
            .flatten()
            .filter(|(m, _)| m.sender.is(sender))
            .map(|(m, _)| {
                WritingSample::new(m.body.clone(), m.received)
                    .with_subject(m.subject.clone())
                    .with_sender(m.sender.clone())
                    .with_source(m.id.clone())
            })
            .collect();
        let pool = Self::newest_first(pool);
        self.stream(pool, max_count, sink)
    }

    fn create_draft_reply(&mut self, message_id: &str, body: &str) -> Result<DraftRef> {
        self.ensure_connected()?;
        let known = self
            .folders
            .values()
            .flatten()
            .any(|(m, _)| m.id == message_id);
        if !known {
            return Err(ScribeError::MessageNotFound(message_id.to_string()));
        }
        self.drafts.push(MemoryDraft {
            reply_to: message_id.to_string(),
            body: body.to_string(),
        });
        Ok(DraftRef {
            id: format!("draft-{}", self.drafts.len()),
        })
    }
}

/// Sample store held in memory.
#[derive(Debug, Default)]
pub struct MemorySampleStore {
    samples: Vec<WritingSample>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_samples(samples: Vec<WritingSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleStore for MemorySampleStore {
    fn append(&mut self, sample: &WritingSample) -> Result<bool> {
        let key = sample.record_key();
        if self.samples.iter().any(|s| s.record_key() == key) {
            return Ok(false);
        }
        self.samples.push(sample.clone());
        Ok(true)
    }

    fn read_all(&self) -> Result<Vec<WritingSample>> {
        let mut all = self.samples.clone();
        all.sort_by_key(|s| s.timestamp);
        Ok(all)
    }

    fn clear(&mut self) -> Result<usize> {
        let n = self.samples.len();
        self.samples.clear();
        Ok(n)
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}

/// Profile store held in memory; counts writes so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profile: Option<StyleProfile>,
    writes: usize,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: StyleProfile) -> Self {
        Self {
            profile: Some(profile),
            writes: 0,
        }
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ProfileStore for MemoryProfileStore {
    fn write_profile(&mut self, profile: &StyleProfile) -> Result<()> {
        self.profile = Some(profile.clone());
        self.writes += 1;
        Ok(())
    }

    fn read_profile(&self) -> Result<Option<StyleProfile>> {
        Ok(self.profile.clone())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("<memory>")
    }
}
