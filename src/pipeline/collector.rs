//! Sample collection: copy authored messages out of the mail store into the
//! sample store, one record per message.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StyleConfig;
use crate::error::Result;
use crate::model::sample::WritingSample;
use crate::store::{MailStore, SampleStore};

/// Counters for one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    /// New records written.
    pub stored: usize,
    /// Messages whose record already existed.
    pub duplicates: usize,
    /// Messages below the minimum body length.
    pub skipped_short: usize,
    /// Messages that could not be written.
    pub failed: usize,
}

impl CollectReport {
    /// Messages looked at so far.
    pub fn seen(&self) -> usize {
        self.stored + self.duplicates + self.skipped_short + self.failed
    }
}

type Progress<'a> = Box<dyn FnMut(&CollectReport) + 'a>;

/// Pulls writing samples from a [`MailStore`] into a [`SampleStore`].
///
/// Samples are appended as they stream in, so a mail store that drops out
/// halfway leaves everything fetched before the drop on disk. The counters
/// of the most recent run stay available through [`SampleCollector::report`]
/// even when the run returned an error.
pub struct SampleCollector<'a> {
    mail: &'a mut dyn MailStore,
    samples: &'a mut dyn SampleStore,
    min_body_chars: usize,
    progress: Option<Progress<'a>>,
    report: CollectReport,
}

impl<'a> SampleCollector<'a> {
    pub fn new(
        mail: &'a mut dyn MailStore,
        samples: &'a mut dyn SampleStore,
        style: &StyleConfig,
    ) -> Self {
        Self {
            mail,
            samples,
            min_body_chars: style.min_body_chars,
            progress: None,
            report: CollectReport::default(),
        }
    }

    /// Call `f` after every message handled.
    pub fn on_progress(mut self, f: impl FnMut(&CollectReport) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Counters of the last run.
    pub fn report(&self) -> CollectReport {
        self.report
    }

    /// Collect up to `max_count` of the user's own sent messages.
    pub fn collect(&mut self, max_count: usize) -> Result<CollectReport> {
        info!(max_count, "Collecting sent messages");
        self.run(None, max_count)
    }

    /// Collect up to `max_count` messages received from `sender`.
    pub fn collect_from(&mut self, sender: &str, max_count: usize) -> Result<CollectReport> {
        info!(sender, max_count, "Collecting messages from sender");
        self.run(Some(sender), max_count)
    }

    fn run(&mut self, sender: Option<&str>, max_count: usize) -> Result<CollectReport> {
        self.report = CollectReport::default();
        let Self {
            mail,
            samples,
            min_body_chars,
            progress,
            report,
        } = self;
        let min_body_chars = *min_body_chars;

        let mut sink = |sample: WritingSample| -> bool {
            let kept = if sample.body_chars() < min_body_chars {
                debug!(source = %sample.source, chars = sample.body_chars(), "Skipping short message");
                report.skipped_short += 1;
                false
            } else {
                match samples.append(&sample) {
                    Ok(true) => {
                        report.stored += 1;
                        true
                    }
                    Ok(false) => {
                        debug!(source = %sample.source, "Sample already stored");
                        report.duplicates += 1;
                        true
                    }
                    Err(e) => {
                        warn!(source = %sample.source, error = %e, "Failed to store sample");
                        report.failed += 1;
                        false
                    }
                }
            };
            if let Some(f) = progress.as_mut() {
                f(&*report);
            }
            kept
        };

        let result = match sender {
            Some(sender) => mail.list_from_sender(sender, max_count, &mut sink),
            None => mail.list_sent(max_count, &mut sink),
        };

        match result {
            Ok(_) => {
                info!(
                    stored = self.report.stored,
                    duplicates = self.report.duplicates,
                    skipped = self.report.skipped_short,
                    failed = self.report.failed,
                    "Collection complete"
                );
                Ok(self.report)
            }
            Err(e) => {
                warn!(
                    stored = self.report.stored,
                    error = %e,
                    "Collection interrupted; samples fetched so far were kept"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScribeError;
    use crate::model::address::EmailAddress;
    use crate::model::message::IncomingMessage;
    use crate::store::memory::{MemoryMailStore, MemorySampleStore};
    use chrono::{Duration, TimeZone, Utc};

    fn sent(i: i64, body: &str) -> WritingSample {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::hours(i);
        WritingSample::new(body, ts)
            .with_subject(format!("Subject {i}"))
            .with_source(format!("sent-{i}"))
    }

    #[test]
    fn test_collect_stores_and_counts() {
        let mut mail = MemoryMailStore::new()
            .with_sent(sent(1, "Thanks for the update, will look at it tomorrow."))
            .with_sent(sent(2, "ok"))
            .with_sent(sent(3, "Sounds good to me, let's ship it on Friday."));
        let mut samples = MemorySampleStore::new();
        let report = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
            .collect(10)
            .unwrap();
        assert_eq!(report.stored, 2);
        assert_eq!(report.skipped_short, 1);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_recollect_counts_duplicates() {
        let mut mail = MemoryMailStore::new()
            .with_sent(sent(1, "Thanks for the update, will look at it tomorrow."));
        let mut samples = MemorySampleStore::new();
        let style = StyleConfig::default();
        SampleCollector::new(&mut mail, &mut samples, &style)
            .collect(10)
            .unwrap();
        let report = SampleCollector::new(&mut mail, &mut samples, &style)
            .collect(10)
            .unwrap();
        assert_eq!(report.stored, 0);
        assert_eq!(report.duplicates, 1);
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_max_count_bounds_kept_samples() {
        let mut mail = MemoryMailStore::new();
        for i in 0..5 {
            mail = mail.with_sent(sent(i, "A reasonably long authored message body."));
        }
        let mut samples = MemorySampleStore::new();
        let report = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
            .collect(3)
            .unwrap();
        assert_eq!(report.stored, 3);
    }

    #[test]
    fn test_interrupted_run_keeps_fetched_samples() {
        let mut mail = MemoryMailStore::new().fail_after(2);
        for i in 0..5 {
            mail = mail.with_sent(sent(i, "A reasonably long authored message body."));
        }
        let mut samples = MemorySampleStore::new();
        let mut collector = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default());
        let err = collector.collect(5).unwrap_err();
        assert!(matches!(err, ScribeError::MailStoreUnavailable(_)));
        assert_eq!(collector.report().stored, 2);
        drop(collector);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn test_collect_from_sender_filters() {
        let msg = |id: &str, from: &str| IncomingMessage {
            id: id.to_string(),
            sender: EmailAddress::new("", from),
            subject: "Hello".to_string(),
            body: "Here is a long enough message from someone.".to_string(),
            received: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            message_id: None,
        };
        let mut mail = MemoryMailStore::new()
            .with_read("INBOX", msg("a", "Boss@Example.com"))
            .with_read("INBOX", msg("b", "other@example.com"));
        let mut samples = MemorySampleStore::new();
        let mut seen = 0;
        let report = SampleCollector::new(&mut mail, &mut samples, &StyleConfig::default())
            .on_progress(|r| seen = r.seen())
            .collect_from("boss@example.com", 10)
            .unwrap();
        assert_eq!(report.stored, 1);
        assert_eq!(seen, 1);
    }
}
