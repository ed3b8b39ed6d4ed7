//! Sender addresses as they appear in `From:` headers.

/// A mailbox: optional display name plus the bare address.
///
/// `"Dana Levi <dana@example.com>"` parses to `name = "Dana Levi"`,
/// `address = "dana@example.com"`. Anything without angle brackets is taken
/// as the bare address.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EmailAddress {
    pub name: String,
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Parse a single `From:`-style value. Never fails; garbage is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match (raw.rfind('<'), raw.rfind('>')) {
            (Some(open), Some(close)) if close > open => Self {
                name: raw[..open].trim().trim_matches('"').trim().to_string(),
                address: raw[open + 1..close].trim().to_string(),
            },
            _ => Self {
                name: String::new(),
                address: raw.to_string(),
            },
        }
    }

    /// Case-insensitive comparison of the bare address.
    pub fn is(&self, other: &str) -> bool {
        self.address.trim().eq_ignore_ascii_case(other.trim())
    }

    /// The name to greet the sender by: the display name, else the local part.
    pub fn salutation_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.address.split('@').next().unwrap_or(&self.address)
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

impl From<&mail_parser::Addr<'_>> for EmailAddress {
    fn from(addr: &mail_parser::Addr<'_>) -> Self {
        Self {
            name: addr.name().unwrap_or_default().to_string(),
            address: addr.address().unwrap_or_default().to_string(),
        }
    }
}
