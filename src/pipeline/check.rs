//! Connectivity probe for the mail store, the model and the profile.

use serde::Serialize;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, TextModel};
use crate::store::{MailStore, ProfileStore};

const PROBE_PROMPT: &str = "Say 'Hello' in one word.";

/// Result of a connectivity check. Building one never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectivityReport {
    pub mail_store_ok: bool,
    pub model_ok: bool,
    pub profile_present: bool,
    /// `(dependency, detail)` lines for display.
    pub details: Vec<(String, String)>,
}

impl ConnectivityReport {
    /// Mail store and model both answered.
    pub fn all_ok(&self) -> bool {
        self.mail_store_ok && self.model_ok
    }

    fn note(&mut self, what: &str, detail: impl Into<String>) {
        self.details.push((what.to_string(), detail.into()));
    }
}

/// Probes each external dependency once.
pub struct ConnectivityChecker<'a> {
    mail: &'a mut dyn MailStore,
    model: Result<&'a dyn TextModel, String>,
    profiles: Option<&'a dyn ProfileStore>,
}

impl<'a> ConnectivityChecker<'a> {
    pub fn new(mail: &'a mut dyn MailStore, model: &'a dyn TextModel) -> Self {
        Self {
            mail,
            model: Ok(model),
            profiles: None,
        }
    }

    /// For when the model client could not even be built (e.g. missing key).
    pub fn without_model(mail: &'a mut dyn MailStore, reason: impl Into<String>) -> Self {
        Self {
            mail,
            model: Err(reason.into()),
            profiles: None,
        }
    }

    /// Also report whether a profile is stored.
    pub fn with_profiles(mut self, profiles: &'a dyn ProfileStore) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn check(&mut self) -> ConnectivityReport {
        let mut report = ConnectivityReport::default();

        match self.mail.list_folders() {
            Ok(folders) => {
                report.mail_store_ok = true;
                let unread: usize = folders.iter().map(|f| f.unread).sum();
                report.note(
                    "mail",
                    format!("{} folders, {unread} unread messages", folders.len()),
                );
            }
            Err(e) => {
                warn!(error = %e, "Mail store check failed");
                report.note("mail", e.to_string());
            }
        }

        match &self.model {
            Ok(model) => {
                let request = CompletionRequest::new(PROBE_PROMPT)
                    .with_temperature(0.0)
                    .with_max_output_tokens(16);
                match model.complete(&request) {
                    Ok(answer) => {
                        debug!(answer = %answer.trim(), "Model probe answered");
                        report.model_ok = true;
                        report.note(
                            "model",
                            format!("{} answered \"{}\"", model.describe(), answer.trim()),
                        );
                    }
                    Err(e) => {
                        warn!(error = %e, "Model check failed");
                        report.note("model", format!("{}: {e}", model.describe()));
                    }
                }
            }
            Err(reason) => report.note("model", reason.clone()),
        }

        if let Some(profiles) = self.profiles {
            match profiles.read_profile() {
                Ok(Some(profile)) => {
                    report.profile_present = true;
                    report.note(
                        "profile",
                        format!(
                            "{} fields known, from {} samples",
                            profile.known_fields(),
                            profile.sample_count
                        ),
                    );
                }
                Ok(None) => report.note(
                    "profile",
                    format!("none at {}", profiles.location().display()),
                ),
                Err(e) => report.note("profile", e.to_string()),
            }
        }

        report
    }
}
