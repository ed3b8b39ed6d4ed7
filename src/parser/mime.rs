//! RFC 5322 message parsing: headers we care about plus a plain-text body.

use chrono::{DateTime, TimeZone, Utc};
use mail_parser::MessageParser;

use crate::model::address::EmailAddress;

/// The parts of a message the pipeline uses.
#[derive(Debug, Clone)]
pub struct ParsedMail {
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    /// `Message-ID` without angle brackets.
    pub message_id: Option<String>,
    /// `References` ids without angle brackets, oldest first.
    pub references: Vec<String>,
    /// Plain-text body (from `text/plain`, or stripped from HTML).
    pub text: String,
}

/// Parse a complete raw message (headers + body).
///
/// Uses `mail-parser` internally; returns `None` only when the bytes do not
/// look like a message at all.
pub fn parse_message(raw: &[u8]) -> Option<ParsedMail> {
    let raw = skip_bom(raw);
    let msg = MessageParser::default().parse(raw)?;

    let from = msg
        .from()
        .and_then(|a| a.first())
        .map(EmailAddress::from)
        .unwrap_or_default();
    let to = msg
        .to()
        .map(|a| a.iter().map(EmailAddress::from).collect())
        .unwrap_or_default();

    let date = msg
        .date()
        .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single());

    let text = msg
        .body_text(0)
        .map(|s| s.into_owned())
        .or_else(|| msg.body_html(0).map(|html| html_to_text(&html)))
        .unwrap_or_default();

    let references = msg
        .header_raw("References")
        .map(extract_angle_ids)
        .unwrap_or_default();

    Some(ParsedMail {
        from,
        to,
        subject: msg.subject().unwrap_or_default().trim().to_string(),
        date,
        message_id: msg.message_id().map(|s| s.trim().to_string()),
        references,
        text: text.replace("\r\n", "\n"),
    })
}

/// Decode file contents as UTF-8, falling back to Windows-1252 for legacy
/// exports that are not valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = skip_bom(bytes);
    match encoding_rs::UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
    }
}

/// Remove quoted history from a reply so only the author's own words remain.
///
/// Drops `>`-prefixed lines and everything from an attribution line
/// (`On ... wrote:`) or an Outlook `-----Original Message-----` marker on.
pub fn strip_quoted_reply(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("-----Original Message-----")
            || (trimmed.starts_with("On ") && trimmed.ends_with("wrote:"))
        {
            break;
        }
        if trimmed.starts_with('>') {
            continue;
        }
        kept.push(line.trim_end());
    }
    kept.join("\n").trim().to_string()
}

fn skip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

fn extract_angle_ids(raw: &str) -> Vec<String> {
    raw.split('<')
        .skip(1)
        .filter_map(|part| part.split_once('>').map(|(id, _)| id.trim().to_string()))
        .filter(|id| !id.is_empty())
        .collect()
}

/// Convert HTML to plain text.
///
/// Block elements become line breaks, scripts and styles are removed, tags
/// are stripped and the common entities decoded.
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    for tag in ["<br>", "<br/>", "<br />", "<BR>"] {
        text = text.replace(tag, "\n");
    }
    for tag in ["p", "div", "tr", "li", "h1", "h2", "h3"] {
        text = text.replace(&format!("</{tag}>"), "\n");
        text = text.replace(&format!("</{}>", tag.to_uppercase()), "\n");
    }

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    // Collapse runs of blank lines into one
    let mut cleaned = String::with_capacity(decoded.len());
    let mut prev_blank = false;
    for line in decoded.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !prev_blank {
                cleaned.push('\n');
            }
            prev_blank = true;
        } else {
            cleaned.push_str(line);
            cleaned.push('\n');
            prev_blank = false;
        }
    }
    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    // ASCII lowering keeps byte offsets valid for slicing `html`.
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open).map(|i| pos + i) {
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &[u8] = b"From: Dana Levi <dana@example.com>\r\n\
To: Sam <sam@example.com>\r\n\
Subject: Lunch?\r\n\
Date: Tue, 02 Jan 2024 10:00:00 +0000\r\n\
Message-ID: <abc123@example.com>\r\n\
References: <r1@x> <r2@x>\r\n\
\r\n\
Want to grab lunch tomorrow?\r\n";

    #[test]
    fn test_parse_simple_message() {
        let mail = parse_message(SIMPLE).expect("parses");
        assert_eq!(mail.from.address, "dana@example.com");
        assert_eq!(mail.from.name, "Dana Levi");
        assert_eq!(mail.to[0].address, "sam@example.com");
        assert_eq!(mail.subject, "Lunch?");
        assert_eq!(mail.message_id.as_deref(), Some("abc123@example.com"));
        assert_eq!(mail.references, vec!["r1@x", "r2@x"]);
        assert_eq!(mail.date.unwrap().timestamp(), 1_704_189_600);
        assert!(mail.text.contains("grab lunch"));
        assert!(!mail.text.contains('\r'));
    }

    #[test]
    fn test_decode_text_falls_back_to_windows_1252() {
        assert_eq!(decode_text("café".as_bytes()), "café");
        assert_eq!(decode_text(&[b'c', b'a', b'f', 0xE9]), "café");
        assert_eq!(decode_text(&[0xEF, 0xBB, 0xBF, b'h', b'i']), "hi");
    }

    #[test]
    fn test_strip_quoted_reply() {
        let text = "Sounds good!\n\nOn Tue, Jan 2, 2024, Dana wrote:\n> lunch?\n";
        assert_eq!(strip_quoted_reply(text), "Sounds good!");
        let outlook = "Yes.\n-----Original Message-----\nFrom: x";
        assert_eq!(strip_quoted_reply(outlook), "Yes.");
        let inline = "> question\nanswer";
        assert_eq!(strip_quoted_reply(inline), "answer");
    }

    #[test]
    fn test_html_to_text() {
        let html = "<p>Hello <b>world</b></p><script>x()</script><p>Tom &amp; Jerry</p>";
        assert_eq!(html_to_text(html), "Hello world\nTom & Jerry");
    }

    #[test]
    fn test_html_to_text_keeps_multibyte_text_around_blocks() {
        let html = "<p>Greetings from İstanbul!</p><STYLE>p{}</Style>élan, see you soon";
        assert_eq!(html_to_text(html), "Greetings from İstanbul!\nélan, see you soon");
    }
}
