//! Filing generated replies as drafts.

use tracing::info;

use crate::error::Result;
use crate::model::message::{DraftRef, GeneratedReply};
use crate::store::MailStore;

/// Saves replies as new drafts in the mail store. Never sends.
pub struct DraftWriter<'a> {
    mail: &'a mut dyn MailStore,
}

impl<'a> DraftWriter<'a> {
    pub fn new(mail: &'a mut dyn MailStore) -> Self {
        Self { mail }
    }

    /// Create one new draft replying to the reply's target message.
    pub fn save_draft(&mut self, reply: &GeneratedReply) -> Result<DraftRef> {
        let draft = self.mail.create_draft_reply(&reply.message_id, &reply.body)?;
        info!(message = %reply.message_id, draft = %draft.id, "Draft saved");
        Ok(draft)
    }
}
