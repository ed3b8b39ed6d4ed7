//! Directory-backed sample store.
//!
//! Each collected sample is one `.txt` file with a small header block:
//!
//! ```text
//! Subject: Re: budget
//! From: Dana Levi <dana@example.com>
//! Date: 2024-01-02T10:00:00+00:00
//! Source: .Sent/cur/1704189600.M1P1.host:2,S
//! ==================================================
//!
//! body...
//! ```
//!
//! Hand-written samples can be dropped into the same directory as `.txt`,
//! `.md`, `.eml` or `.html` files; they are read as well,
//! and [`SampleStore::clear`] leaves them alone.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{write_atomic, SampleStore};
use crate::error::{Result, ScribeError};
use crate::model::address::EmailAddress;
use crate::model::sample::WritingSample;
use crate::parser::mime;

/// Separator between the header block and the body.
const RULE: &str = "==================================================";

/// File extensions read as samples.
const SAMPLE_EXTENSIONS: [&str; 4] = ["txt", "md", "eml", "html"];

/// Stores samples as individual files in one directory tree.
#[derive(Debug, Clone)]
pub struct SampleDir {
    root: PathBuf,
}

impl SampleDir {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn file_for(&self, sample: &WritingSample) -> PathBuf {
        let stamp = sample.timestamp.format("%Y%m%d_%H%M%S");
        self.root
            .join(format!("sample_{stamp}_{}.txt", sample.record_key()))
    }
}

impl SampleStore for SampleDir {
    fn append(&mut self, sample: &WritingSample) -> Result<bool> {
        let path = self.file_for(sample);
        if path.exists() {
            debug!(path = %path.display(), "Sample already stored");
            return Ok(false);
        }
        write_atomic(&path, render_record(sample).as_bytes())?;
        Ok(true)
    }

    fn read_all(&self) -> Result<Vec<WritingSample>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;

        let mut samples = Vec::with_capacity(files.len());
        for path in files {
            match read_sample_file(&path) {
                Ok(Some(sample)) => samples.push(sample),
                Ok(None) => debug!(path = %path.display(), "Skipping empty sample"),
                Err(e) => warn!(path = %path.display(), error = %e, "Could not read sample"),
            }
        }
        samples.sort_by_key(|s| s.timestamp);
        Ok(samples)
    }

    fn clear(&mut self) -> Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        // Hand-written notes are never ours to delete.
        files.retain(|path| {
            path.parent() == Some(self.root.as_path()) && is_record_file(path)
        });
        for path in &files {
            std::fs::remove_file(path).map_err(|e| ScribeError::io(path, e))?;
        }
        Ok(files.len())
    }

    fn location(&self) -> PathBuf {
        self.root.clone()
    }
}

/// Render a sample into the on-disk record format.
fn render_record(sample: &WritingSample) -> String {
    let mut out = String::new();
    if let Some(subject) = &sample.subject {
        out.push_str(&format!("Subject: {}\n", one_line(subject)));
    }
    if let Some(sender) = &sample.sender {
        out.push_str(&format!("From: {sender}\n"));
    }
    out.push_str(&format!("Date: {}\n", sample.timestamp.to_rfc3339()));
    if !sample.source.is_empty() {
        out.push_str(&format!("Source: {}\n", one_line(&sample.source)));
    }
    out.push_str(RULE);
    out.push_str("\n\n");
    out.push_str(sample.body.trim());
    out.push('\n');
    out
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recursively gather sample files below `dir`, sorted by path.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| ScribeError::io(dir, e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    paths.sort();
    for path in paths {
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if has_sample_extension(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Whether `path` is named like a record written by [`SampleDir::append`]:
/// `sample_<YYYYMMDD>_<HHMMSS>_<12 hex digits>.txt`.
fn is_record_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let Some(stem) = name
        .strip_prefix("sample_")
        .and_then(|rest| rest.strip_suffix(".txt"))
    else {
        return false;
    };
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        [date, time, key] => {
            date.len() == 8
                && time.len() == 6
                && key.len() == 12
                && date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit())
                && key.bytes().all(|b| b.is_ascii_hexdigit())
        }
        _ => false,
    }
}

fn has_sample_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| SAMPLE_EXTENSIONS.contains(&e.as_str()))
}

/// Read one sample file in whichever format it is in.
fn read_sample_file(path: &Path) -> Result<Option<WritingSample>> {
    let bytes = std::fs::read(path).map_err(|e| ScribeError::io(path, e))?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let sample = match ext.as_str() {
        "eml" => mime::parse_message(&bytes).map(|mail| {
            let mut s = WritingSample::new(mime::strip_quoted_reply(&mail.text), mail.date.unwrap_or(modified))
                .with_sender(mail.from);
            if !mail.subject.is_empty() {
                s = s.with_subject(mail.subject);
            }
            s
        }),
        "html" => Some(WritingSample::new(
            mime::html_to_text(&mime::decode_text(&bytes)),
            modified,
        )),
        _ => Some(parse_record(&mime::decode_text(&bytes), modified)),
    };

    Ok(sample
        .map(|s| s.with_source(source))
        .filter(|s| !s.body.trim().is_empty()))
}

/// Parse our own record format; files without a header block are taken whole.
fn parse_record(text: &str, fallback_time: DateTime<Utc>) -> WritingSample {
    let Some((head, body)) = text.split_once(RULE) else {
        return WritingSample::new(text.trim(), fallback_time);
    };

    let mut sample = WritingSample::new(body.trim(), fallback_time);
    for line in head.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "subject" => sample.subject = Some(value.to_string()),
            "from" => sample.sender = Some(EmailAddress::parse(value)),
            "date" | "received" => {
                if let Ok(date) = DateTime::parse_from_rfc3339(value) {
                    sample.timestamp = date.with_timezone(&Utc);
                }
            }
            _ => {}
        }
    }
    sample
}
