//! Maildir++ mail store.
//!
//! Layout: the root directory is `INBOX`; every other folder is a
//! dot-prefixed subdirectory (`.Sent`, `.Drafts`, `.Work.Clients`), each with
//! `tmp/`, `new/` and `cur/`. Flags live after `:2,` in file names:
//! `S` seen, `D` draft, `T` trashed.
//!
//! Message identifiers are paths relative to the root, e.g.
//! `cur/1704189600.M12P34.host:2,S` or `.Sent/cur/...`.

use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::MailStore;
use crate::config::{self, Config, MailConfig};
use crate::error::{Result, ScribeError};
use crate::model::address::EmailAddress;
use crate::model::message::{DraftRef, FolderRef, IncomingMessage};
use crate::model::sample::WritingSample;
use crate::parser::mime::{self, ParsedMail};

/// Name under which the root folder is listed.
const INBOX: &str = "INBOX";

/// Mail store over a local Maildir++ tree.
#[derive(Debug)]
pub struct MaildirStore {
    root: PathBuf,
    inbox: String,
    sent: String,
    drafts: String,
    deliveries: u64,
}

/// A message file plus the flags encoded in its name.
#[derive(Debug, Clone)]
struct MailFile {
    path: PathBuf,
    flags: String,
    in_new: bool,
    modified: SystemTime,
}

impl MailFile {
    fn is_unread(&self) -> bool {
        self.in_new || !self.flags.contains('S')
    }

    fn is_trashed(&self) -> bool {
        self.flags.contains('T')
    }
}

impl MaildirStore {
    /// Open a Maildir rooted at `root` with folder names from `mail`.
    ///
    /// Nothing is touched on disk until the first operation.
    pub fn new(root: impl AsRef<Path>, mail: &MailConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            inbox: mail.inbox_folder.clone(),
            sent: mail.sent_folder.clone(),
            drafts: mail.drafts_folder.clone(),
            deliveries: 0,
        }
    }

    /// Open the Maildir configured in `config`.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config::maildir_root(config), &config.mail)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.root.join("cur").is_dir() || self.root.join("new").is_dir() {
            Ok(())
        } else {
            Err(ScribeError::MailStoreUnavailable(format!(
                "'{}' is not a Maildir (missing cur/ and new/)",
                self.root.display()
            )))
        }
    }

    fn is_inbox(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(INBOX) || name.eq_ignore_ascii_case(&self.inbox)
    }

    fn folder_path(&self, name: &str) -> PathBuf {
        if self.is_inbox(name) {
            self.root.clone()
        } else {
            self.root.join(format!(".{name}"))
        }
    }

    /// Resolve a folder name to an existing directory.
    fn folder_dir(&mut self, name: &str) -> Result<PathBuf> {
        let dir = self.folder_path(name);
        if dir.join("cur").is_dir() || dir.join("new").is_dir() {
            return Ok(dir);
        }
        let available = self
            .list_folders()?
            .into_iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ");
        Err(ScribeError::FolderNotFound {
            name: name.to_string(),
            available,
        })
    }

    /// All message files in a folder, newest first by modification time.
    fn scan(&self, dir: &Path) -> Result<Vec<MailFile>> {
        let mut files = Vec::new();
        for sub in ["new", "cur"] {
            let subdir = dir.join(sub);
            if !subdir.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(&subdir).map_err(|e| unavailable(&subdir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| unavailable(&subdir, e))?;
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') {
                    continue;
                }
                let flags = name
                    .split_once(":2,")
                    .map(|(_, f)| f.to_string())
                    .unwrap_or_default();
                let modified = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files.push(MailFile {
                    path,
                    flags,
                    in_new: sub == "new",
                    modified,
                });
            }
        }
        files.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(files)
    }

    /// Read and parse one message. `Ok(None)` when it vanished or is not a message.
    fn load(&self, file: &MailFile) -> Result<Option<ParsedMail>> {
        let raw = match std::fs::read(&file.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %file.path.display(), "Message moved away during scan");
                return Ok(None);
            }
            Err(e) => return Err(unavailable(&file.path, e)),
        };
        let parsed = mime::parse_message(&raw);
        if parsed.is_none() {
            warn!(path = %file.path.display(), "Skipping unparseable message");
        }
        Ok(parsed)
    }

    fn id_for(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Map a message identifier back to its file, refusing paths that
    /// escape the Maildir root.
    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let rel = Path::new(id);
        let escapes = rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        let path = self.root.join(rel);
        if escapes || !path.is_file() {
            return Err(ScribeError::MessageNotFound(id.to_string()));
        }
        Ok(path)
    }

    /// Stream authored messages from `folder` into `sink`.
    fn stream_samples(
        &mut self,
        folder: &str,
        from: Option<&str>,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize> {
        self.ensure_connected()?;
        let dir = self.folder_dir(folder)?;
        let files = self.scan(&dir)?;

        let mut kept = 0;
        let mut scanned = 0;
        for file in files.iter().filter(|f| !f.is_trashed()) {
            if kept >= max_count {
                break;
            }
            scanned += 1;
            let Some(mail) = self.load(file)? else {
                continue;
            };
            if let Some(sender) = from {
                if !mail.from.is(sender) {
                    continue;
                }
            }
            let timestamp = mail
                .date
                .unwrap_or_else(|| DateTime::<Utc>::from(file.modified));
            let mut sample = WritingSample::new(mime::strip_quoted_reply(&mail.text), timestamp)
                .with_sender(mail.from)
                .with_source(self.id_for(&file.path));
            if !mail.subject.is_empty() {
                sample = sample.with_subject(mail.subject);
            }
            if sink(sample) {
                kept += 1;
            }
        }
        debug!(folder, scanned, kept, "Streamed samples");
        Ok(kept)
    }

    fn next_unique(&mut self) -> String {
        self.deliveries += 1;
        let now = Utc::now();
        format!(
            "{}.M{}P{}Q{}.replyscribe",
            now.timestamp(),
            now.timestamp_subsec_micros(),
            std::process::id(),
            self.deliveries
        )
    }
}

impl MailStore for MaildirStore {
    fn list_folders(&mut self) -> Result<Vec<FolderRef>> {
        self.ensure_connected()?;
        let mut folders = vec![FolderRef {
            name: INBOX.to_string(),
            unread: self.scan(&self.root)?.iter().filter(|f| f.is_unread() && !f.is_trashed()).count(),
        }];

        let entries = std::fs::read_dir(&self.root).map_err(|e| unavailable(&self.root, e))?;
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().join("cur").is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_prefix('.')
                    .filter(|n| !n.is_empty() && *n != ".")
                    .map(String::from)
            })
            .collect();
        names.sort();

        for name in names {
            let dir = self.folder_path(&name);
            let unread = self
                .scan(&dir)?
                .iter()
                .filter(|f| f.is_unread() && !f.is_trashed())
                .count();
            folders.push(FolderRef { name, unread });
        }
        Ok(folders)
    }

    fn list_unread(&mut self, folder: &str, max_count: usize) -> Result<Vec<IncomingMessage>> {
        self.ensure_connected()?;
        let dir = self.folder_dir(folder)?;
        let files = self.scan(&dir)?;

        let mut messages = Vec::new();
        for file in files.iter().filter(|f| f.is_unread() && !f.is_trashed()) {
            let Some(mail) = self.load(file)? else {
                continue;
            };
            let received = mail
                .date
                .unwrap_or_else(|| DateTime::<Utc>::from(file.modified));
            messages.push(IncomingMessage {
                id: self.id_for(&file.path),
                sender: mail.from,
                subject: if mail.subject.is_empty() {
                    "(No Subject)".to_string()
                } else {
                    mail.subject
                },
                body: mail.text,
                received,
                message_id: mail.message_id,
            });
        }
        messages.sort_by(|a, b| b.received.cmp(&a.received));
        messages.truncate(max_count);
        Ok(messages)
    }

    fn list_sent(
        &mut self,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize> {
        let folder = self.sent.clone();
        self.stream_samples(&folder, None, max_count, sink)
    }

    fn list_from_sender(
        &mut self,
        sender: &str,
        max_count: usize,
        sink: &mut dyn FnMut(WritingSample) -> bool,
    ) -> Result<usize> {
        let folder = self.inbox.clone();
        self.stream_samples(&folder, Some(sender), max_count, sink)
    }

    fn create_draft_reply(&mut self, message_id: &str, body: &str) -> Result<DraftRef> {
        self.ensure_connected()?;
        let original_path = self.resolve(message_id)?;
        let raw = std::fs::read(&original_path).map_err(|e| unavailable(&original_path, e))?;
        let original = mime::parse_message(&raw)
            .ok_or_else(|| ScribeError::MessageNotFound(format!("{message_id} (unreadable)")))?;

        let drafts_dir = self.folder_path(&self.drafts.clone());
        for sub in ["tmp", "new", "cur"] {
            let dir = drafts_dir.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| ScribeError::io(&dir, e))?;
        }

        let unique = self.next_unique();
        let draft = compose_reply(&original, body, Utc::now(), &unique);

        // Maildir delivery: write into tmp/, then rename into cur/ with the draft flag.
        let tmp_path = drafts_dir.join("tmp").join(&unique);
        std::fs::write(&tmp_path, draft.as_bytes()).map_err(|e| ScribeError::io(&tmp_path, e))?;
        let final_path = drafts_dir.join("cur").join(format!("{unique}:2,D"));
        if let Err(e) = std::fs::rename(&tmp_path, &final_path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(ScribeError::io(&final_path, e));
        }

        let id = self.id_for(&final_path);
        info!(draft = %id, reply_to = message_id, subject = %original.subject, "Draft reply created");
        Ok(DraftRef { id })
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> ScribeError {
    ScribeError::MailStoreUnavailable(format!("{}: {e}", path.display()))
}

/// `Re:`-prefixed subject, without stacking prefixes.
pub fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        return "Re: (No Subject)".to_string();
    }
    let already = subject
        .get(..3)
        .is_some_and(|p| p.eq_ignore_ascii_case("re:"));
    if already {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// Build the RFC 5322 text of a draft replying to `original`.
fn compose_reply(original: &ParsedMail, body: &str, now: DateTime<Utc>, unique: &str) -> String {
    let mut out = String::new();
    if let Some(me) = original.to.first() {
        out.push_str(&format!("From: {}\n", format_mailbox(me)));
    }
    out.push_str(&format!("To: {}\n", format_mailbox(&original.from)));
    out.push_str(&format!(
        "Subject: {}\n",
        encode_header_text(&reply_subject(&original.subject))
    ));
    out.push_str(&format!("Date: {}\n", now.to_rfc2822()));
    out.push_str(&format!("Message-ID: <{unique}@replyscribe.local>\n"));

    if let Some(parent) = &original.message_id {
        out.push_str(&format!("In-Reply-To: <{parent}>\n"));
        let mut refs: Vec<String> = original
            .references
            .iter()
            .map(|r| format!("<{r}>"))
            .collect();
        refs.push(format!("<{parent}>"));
        out.push_str(&format!("References: {}\n", refs.join(" ")));
    }

    out.push_str("MIME-Version: 1.0\n");
    out.push_str("Content-Type: text/plain; charset=utf-8\n");
    out.push_str("Content-Transfer-Encoding: 8bit\n");
    out.push('\n');

    out.push_str(body.trim());
    out.push_str("\n\n");

    // Keep the conversation below the reply
    let when = original
        .date
        .map(|d| d.format("%a, %d %b %Y %H:%M").to_string())
        .unwrap_or_else(|| "an earlier date".to_string());
    out.push_str(&format!("On {when}, {} wrote:\n", original.from));
    for line in original.text.trim_end().lines() {
        if line.is_empty() {
            out.push_str(">\n");
        } else {
            out.push_str(&format!("> {line}\n"));
        }
    }
    out
}

fn format_mailbox(addr: &EmailAddress) -> String {
    if addr.name.is_empty() {
        addr.address.clone()
    } else if addr.name.is_ascii() {
        format!("\"{}\" <{}>", addr.name.replace('"', ""), addr.address)
    } else {
        format!("{} <{}>", encode_header_text(&addr.name), addr.address)
    }
}

/// RFC 2047 Q-encode non-ASCII header text, split into short encoded words.
pub fn encode_header_text(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let mut words = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        let mut buf = [0u8; 4];
        let mut encoded = String::new();
        for &b in ch.encode_utf8(&mut buf).as_bytes() {
            match b {
                b' ' => encoded.push('_'),
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                    encoded.push(b as char)
                }
                _ => encoded.push_str(&format!("={b:02X}")),
            }
        }
        if current.len() + encoded.len() > 60 {
            words.push(format!("=?UTF-8?Q?{current}?="));
            current.clear();
        }
        current.push_str(&encoded);
    }
    if !current.is_empty() {
        words.push(format!("=?UTF-8?Q?{current}?="));
    }
    words.join(" ")
}
