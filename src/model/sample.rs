//! Writing samples: past authored text used as style input.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::address::EmailAddress;

/// A single past message written by the person being imitated.
///
/// Samples are immutable once collected. `source` records where the text
/// came from (a mail-store id, or a file name for hand-added samples).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WritingSample {
    pub body: String,
    pub subject: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub sender: Option<EmailAddress>,
    pub source: String,
}

impl WritingSample {
    pub fn new(body: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            body: body.into(),
            subject: None,
            timestamp,
            sender: None,
            source: String::new(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_sender(mut self, sender: EmailAddress) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Stable key identifying this sample's content.
    ///
    /// Two samples with the same timestamp, subject and body share a key, so
    /// re-collecting the same mailbox does not duplicate records.
    pub fn record_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.timestamp.timestamp().to_be_bytes());
        hasher.update(self.subject.as_deref().unwrap_or_default().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.body.trim().as_bytes());
        let digest = hasher.finalize();
        digest[..6].iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Number of characters in the trimmed body.
    pub fn body_chars(&self) -> usize {
        self.body.trim().chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_record_key_ignores_source_and_whitespace() {
        let a = WritingSample::new("hey there\n", at(100)).with_source("a.txt");
        let b = WritingSample::new("  hey there", at(100)).with_source("b.txt");
        assert_eq!(a.record_key(), b.record_key());
        assert_eq!(a.record_key().len(), 12);
    }

    #[test]
    fn test_record_key_distinguishes_subject_and_time() {
        let base = WritingSample::new("same body", at(100));
        let later = WritingSample::new("same body", at(101));
        let titled = base.clone().with_subject("Re: lunch");
        assert_ne!(base.record_key(), later.record_key());
        assert_ne!(base.record_key(), titled.record_key());
    }
}
