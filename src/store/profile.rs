//! JSON-file profile store.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{write_atomic, ProfileStore};
use crate::error::{Result, ScribeError};
use crate::model::profile::StyleProfile;

/// Keeps the current style profile as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct ProfileFile {
    path: PathBuf,
}

impl ProfileFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileStore for ProfileFile {
    fn write_profile(&mut self, profile: &StyleProfile) -> Result<()> {
        let json = serde_json::to_vec_pretty(profile)?;
        write_atomic(&self.path, &json)?;
        info!(
            path = %self.path.display(),
            known_fields = profile.known_fields(),
            "Saved style profile"
        );
        Ok(())
    }

    fn read_profile(&self) -> Result<Option<StyleProfile>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No style profile yet");
                return Ok(None);
            }
            Err(e) => return Err(ScribeError::io(&self.path, e)),
        };
        let profile: StyleProfile = serde_json::from_slice(&data)?;
        Ok(Some(profile.normalized()))
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}
