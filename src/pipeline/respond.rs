//! The batch reply loop: one draft per unread message, reviewed or not.

use tracing::{info, warn};

use super::drafts::DraftWriter;
use super::generator::{load_profile, ReplyGenerator};
use super::{CancelToken, ItemOutcome, RunReport};
use crate::error::Result;
use crate::llm::TextModel;
use crate::model::message::{GeneratedReply, IncomingMessage};
use crate::model::profile::StyleProfile;
use crate::store::{MailStore, ProfileStore};

/// What to do with a freshly generated reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Review {
    /// File it as a draft.
    Accept,
    /// Generate again with the same instructions.
    Retry,
    /// Generate again with these instructions instead.
    Edit(String),
    /// Leave this message without a draft.
    Skip,
    /// Stop the whole run after this message.
    Quit,
}

type Reviewer<'a> = Box<dyn FnMut(&IncomingMessage, &GeneratedReply) -> Review + 'a>;
type Progress<'a> = Box<dyn FnMut(usize, usize, &IncomingMessage) + 'a>;

/// Walks the unread messages of a folder and files a draft reply for each.
///
/// Without a reviewer every reply is accepted. A failure on one message is
/// recorded and the loop moves on to the next.
pub struct Responder<'a> {
    mail: &'a mut dyn MailStore,
    generator: ReplyGenerator<'a>,
    profile: StyleProfile,
    instructions: Option<String>,
    reviewer: Option<Reviewer<'a>>,
    progress: Option<Progress<'a>>,
}

impl<'a> Responder<'a> {
    /// Fails with [`crate::ScribeError::NoStyleProfile`] before touching the
    /// mail store or the model when no profile was extracted yet.
    pub fn new(
        mail: &'a mut dyn MailStore,
        model: &'a dyn TextModel,
        profiles: &dyn ProfileStore,
    ) -> Result<Self> {
        let profile = load_profile(profiles)?;
        Ok(Self::with_profile(mail, model, profile))
    }

    pub fn with_profile(
        mail: &'a mut dyn MailStore,
        model: &'a dyn TextModel,
        profile: StyleProfile,
    ) -> Self {
        Self {
            mail,
            generator: ReplyGenerator::new(model),
            profile,
            instructions: None,
            reviewer: None,
            progress: None,
        }
    }

    /// Instructions added to every reply of the run.
    pub fn instructions(mut self, text: Option<String>) -> Self {
        self.instructions = text.filter(|t| !t.trim().is_empty());
        self
    }

    /// Ask `f` about every generated reply before filing it.
    pub fn reviewer(
        mut self,
        f: impl FnMut(&IncomingMessage, &GeneratedReply) -> Review + 'a,
    ) -> Self {
        self.reviewer = Some(Box::new(f));
        self
    }

    /// Call `f(index, total, message)` before each message is handled.
    pub fn on_progress(mut self, f: impl FnMut(usize, usize, &IncomingMessage) + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    /// Reply to up to `max_count` unread messages in `folder`.
    ///
    /// Only listing the folder can fail the whole run. `cancel` is checked
    /// between messages; drafts filed before cancellation stay.
    pub fn respond(
        &mut self,
        folder: &str,
        max_count: usize,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let messages = self.mail.list_unread(folder, max_count)?;
        info!(folder, count = messages.len(), "Replying to unread messages");

        let mut report = RunReport::default();
        let total = messages.len();
        for (index, message) in messages.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(handled = index, total, "Run cancelled");
                report.cancelled = true;
                break;
            }
            if let Some(f) = self.progress.as_mut() {
                f(index, total, message);
            }
            let outcome = self.handle(message, cancel);
            if let ItemOutcome::Failed(reason) = &outcome {
                warn!(message = %message.id, reason = %reason, "Message failed; continuing");
            }
            report.record(&message.id, &message.subject, outcome);
        }
        if cancel.is_cancelled() {
            report.cancelled = true;
        }

        info!(
            drafted = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Reply run finished"
        );
        Ok(report)
    }

    fn handle(&mut self, message: &IncomingMessage, cancel: &CancelToken) -> ItemOutcome {
        let mut instructions = self.instructions.clone();
        loop {
            let reply = match self.generator.generate_with(
                message,
                &self.profile,
                instructions.as_deref(),
            ) {
                Ok(reply) => reply,
                Err(e) => return ItemOutcome::Failed(e.to_string()),
            };

            let decision = match self.reviewer.as_mut() {
                Some(review) => review(message, &reply),
                None => Review::Accept,
            };
            match decision {
                Review::Accept => {
                    return match DraftWriter::new(&mut *self.mail).save_draft(&reply) {
                        Ok(draft) => ItemOutcome::Done(draft.id),
                        Err(e) => ItemOutcome::Failed(e.to_string()),
                    };
                }
                Review::Retry => continue,
                Review::Edit(text) => {
                    instructions = Some(text).filter(|t| !t.trim().is_empty());
                }
                Review::Skip => return ItemOutcome::Skipped("skipped by user".to_string()),
                Review::Quit => {
                    cancel.cancel();
                    return ItemOutcome::Skipped("run stopped by user".to_string());
                }
            }
        }
    }
}
