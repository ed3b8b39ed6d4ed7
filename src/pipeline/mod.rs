//! The reply pipeline: collect samples, extract a style, generate and file
//! draft replies, and probe the external dependencies.
//!
//! Components borrow their collaborators (mail store, sample store, profile
//! store, model) for the duration of one operation; nothing here owns global
//! state. Per-item loops record outcomes in a [`RunReport`] and keep going.

pub mod check;
pub mod collector;
pub mod drafts;
pub mod extractor;
pub mod generator;
pub mod respond;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Cooperative cancellation flag, checked between messages.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// What happened to one item of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum ItemOutcome {
    /// Handled; carries a short result such as the draft id.
    Done(String),
    /// Deliberately left alone.
    Skipped(String),
    /// Failed; carries the error text.
    Failed(String),
}

/// Outcome for one message of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub subject: String,
    pub outcome: ItemOutcome,
}

/// Summary of a batch run over several messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub items: Vec<ItemReport>,
    /// The run stopped early because the cancel token was tripped.
    pub cancelled: bool,
}

impl RunReport {
    pub fn record(&mut self, id: &str, subject: &str, outcome: ItemOutcome) {
        self.items.push(ItemReport {
            id: id.to_string(),
            subject: subject.to_string(),
            outcome,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Done(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}
