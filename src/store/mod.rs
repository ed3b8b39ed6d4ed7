//! Storage seams: the mail store, the sample store and the profile store.
//!
//! Every collaborator the pipeline touches sits behind one of the traits in
//! this module, with a file-backed implementation for real use and an
//! in-memory one for tests.

pub mod maildir;
pub mod memory;
pub mod profile;
pub mod samples;

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScribeError};
use crate::model::message::{DraftRef, FolderRef, IncomingMessage};
use crate::model::profile::StyleProfile;
use crate::model::sample::WritingSample;

/// Access to the user's mailbox.
///
/// Mail sessions are not shared between callers, so every operation takes
/// `&mut self`. All operations fail with
/// [`ScribeError::MailStoreUnavailable`] when the store cannot be reached.
pub trait MailStore {
    /// List the folders available for reading.
    fn list_folders(&mut self) -> Result<Vec<FolderRef>>;

    /// Unread messages in `folder`, newest first, at most `max_count`.
    fn list_unread(&mut self, folder: &str, max_count: usize) -> Result<Vec<IncomingMessage>>;

    /// Stream the user's own sent messages, newest first, into `sink`.
    ///
    /// `sink` returns `true` when it kept the sample; the store stops once
    /// `max_count` samples were kept. Samples delivered before an error stay
    /// delivered. Returns the number of kept samples.
    fn list_sent(
        &mut self,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize>;

    /// Like [`MailStore::list_sent`], but streams messages received *from*
    /// `sender` (case-insensitive on the bare address) out of the inbox.
    fn list_from_sender(
        &mut self,
        sender: &str,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize>;

    /// Create a new draft replying to `message_id`. Never sends anything and
    /// never touches existing drafts.
    fn create_draft_reply(&mut self, message_id: &str, body: &str) -> Result<DraftRef>;
}

/// Persistent collection of writing samples.
pub trait SampleStore {
    /// Store one sample as its own record. Returns `false` when an identical
    /// record already exists.
    fn append(&mut self, sample: &WritingSample) -> Result<bool>;

    /// Every stored sample, oldest first.
    fn read_all(&self) -> Result<Vec<WritingSample>>;

    /// Remove every record. Returns how many were removed.
    fn clear(&mut self) -> Result<usize>;

    /// Where the samples live, for messages.
    fn location(&self) -> PathBuf;
}

/// Persistent home of the single current style profile.
pub trait ProfileStore {
    /// Replace the stored profile atomically.
    fn write_profile(&mut self, profile: &StyleProfile) -> Result<()>;

    /// The stored profile, if one was ever written.
    fn read_profile(&self) -> Result<Option<StyleProfile>>;

    /// Where the profile lives, for messages.
    fn location(&self) -> PathBuf;
}

/// Write `contents` to `path` by writing a sibling temp file and renaming it
/// over the target, so readers see either the old or the new file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| ScribeError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "replyscribe".to_string());
    let tmp = parent.join(format!(".{file_name}.tmp-{}", std::process::id()));

    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(ScribeError::io(path, e));
    }
    Ok(())
}
