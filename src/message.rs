//! MIME boundary: reading fetched messages and assembling reply drafts

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TriageError};

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

static REPLY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*re\s*:").unwrap());

static ANGLE_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*([^<>\s@]+@[^<>\s]+?)\s*>").unwrap());

static BARE_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\s<>,;"']+@[^\s<>,;"']+"#).unwrap());

/// Maximum bytes of UTF-8 text per RFC 2047 encoded word
const ENCODED_WORD_CHUNK: usize = 45;

/// Line length for base64 bodies
const BASE64_LINE: usize = 76;

/// Subject and readable body of a fetched message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    pub subject: String,
    pub body: String,
}

/// Parse raw RFC 822 bytes into subject and body text
///
/// The body is the first `text/plain` part, else the first `text/html` part
/// with tags removed, else empty.
pub fn parse_raw_message(raw: &[u8]) -> Result<MessageContent> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| TriageError::InvalidMessageFormat("Unable to parse raw message".to_string()))?;

    let subject = message.subject().unwrap_or_default().to_string();

    let plain = message.parts.iter().find_map(|part| match &part.body {
        PartType::Text(text) if is_plain_text(part) => Some(text.to_string()),
        _ => None,
    });
    let body = match plain {
        Some(text) => text,
        None => message
            .parts
            .iter()
            .find_map(|part| match &part.body {
                PartType::Html(html) => Some(strip_html(html)),
                _ => None,
            })
            .unwrap_or_default(),
    };

    Ok(MessageContent { subject, body })
}

/// `text/plain`, or a text part with no declared content type
fn is_plain_text(part: &MessagePart) -> bool {
    match part.content_type() {
        Some(content_type) => {
            content_type.ctype().eq_ignore_ascii_case("text")
                && content_type
                    .subtype()
                    .map_or(true, |subtype| subtype.eq_ignore_ascii_case("plain"))
        }
        None => true,
    }
}

pub fn strip_html(html: &str) -> String {
    HTML_TAG.replace_all(html, "").into_owned()
}

/// Input text for the classifier
pub fn classification_text(content: &MessageContent) -> String {
    format!("Subject: {}\n{}", content.subject, content.body)
}

/// First email address in a header such as `From` or `To`
///
/// Accepts `Name <a@b>`, bare addresses and comma-separated lists.
pub fn extract_first_address(header_value: &str) -> Option<String> {
    split_address_list(header_value).into_iter().find_map(|entry| {
        ANGLE_ADDRESS
            .captures(entry)
            .and_then(|captures| captures.get(1))
            .or_else(|| BARE_ADDRESS.find(entry))
            .map(|m| m.as_str().trim().to_string())
    })
}

/// Split on commas that are outside quotes and angle brackets
fn split_address_list(header_value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut start = 0;

    for (index, ch) in header_value.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(&header_value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    entries.push(&header_value[start..]);
    entries
}

/// Prefix `Re: ` unless the subject already carries a reply marker
pub fn ensure_reply_subject(subject: &str) -> String {
    if REPLY_PREFIX.is_match(subject) {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// `References` value for a reply to a message with these headers
pub fn build_references(references: Option<&str>, in_reply_to: Option<&str>) -> Option<String> {
    let references = references.map(str::trim).filter(|s| !s.is_empty());
    let in_reply_to = in_reply_to.map(str::trim).filter(|s| !s.is_empty());

    match (references, in_reply_to) {
        (Some(refs), Some(parent)) if !refs.contains(parent) => Some(format!("{} {}", refs, parent)),
        (Some(refs), _) => Some(refs.to_string()),
        (None, Some(parent)) => Some(parent.to_string()),
        (None, None) => None,
    }
}

/// A plain-text reply ready to be stored as a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

impl ReplyMessage {
    /// Build a reply addressed to the first address of the original `From`
    ///
    /// Returns `None` when no address can be found.
    pub fn for_original(
        from_header: &str,
        original_subject: &str,
        body: impl Into<String>,
        message_id: Option<&str>,
        references: Option<&str>,
    ) -> Option<Self> {
        let to = extract_first_address(from_header)?;
        let in_reply_to = message_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(Self {
            to,
            subject: ensure_reply_subject(original_subject),
            body: body.into(),
            references: build_references(references, in_reply_to.as_deref()),
            in_reply_to,
        })
    }

    /// Serialize as an RFC 822 message with a base64 UTF-8 text body
    pub fn to_rfc822(&self) -> Vec<u8> {
        let mut out = String::new();

        push_header(&mut out, "To", &self.to);
        out.push_str("Subject: ");
        out.push_str(&encode_header_value(&sanitize_header(&self.subject)));
        out.push_str("\r\n");
        if let Some(in_reply_to) = &self.in_reply_to {
            push_header(&mut out, "In-Reply-To", in_reply_to);
        }
        if let Some(references) = &self.references {
            push_header(&mut out, "References", references);
        }
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
        out.push_str("Content-Transfer-Encoding: base64\r\n");
        out.push_str("\r\n");

        let encoded = STANDARD.encode(self.body.as_bytes());
        for line in encoded.as_bytes().chunks(BASE64_LINE) {
            // base64 output is ASCII
            out.push_str(&String::from_utf8_lossy(line));
            out.push_str("\r\n");
        }

        out.into_bytes()
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(&sanitize_header(value));
    out.push_str("\r\n");
}

/// Header values must stay on one line
fn sanitize_header(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// RFC 2047 `B` encoding for non-ASCII header text
fn encode_header_value(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in value.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes())));
    }

    words.join("\r\n ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefers_text_plain() {
        let raw = concat!(
            "From: Alice <alice@example.com>\r\n",
            "Subject: Meeting next week\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>HTML version</p>\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Plain version\r\n",
            "--b1--\r\n"
        );

        let content = parse_raw_message(raw.as_bytes()).unwrap();
        assert_eq!(content.subject, "Meeting next week");
        assert!(content.body.contains("Plain version"));
        assert!(!content.body.contains("<p>"));
    }

    #[test]
    fn test_parse_skips_other_text_subtypes() {
        let raw = concat!(
            "Subject: Invitation\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"b2\"\r\n",
            "\r\n",
            "--b2\r\n",
            "Content-Type: text/calendar; charset=utf-8; method=REQUEST\r\n",
            "\r\n",
            "BEGIN:VCALENDAR\r\n",
            "END:VCALENDAR\r\n",
            "--b2\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "You are invited\r\n",
            "--b2--\r\n"
        );

        let content = parse_raw_message(raw.as_bytes()).unwrap();
        assert!(content.body.contains("You are invited"));
        assert!(!content.body.contains("VCALENDAR"));
    }

    #[test]
    fn test_parse_falls_back_to_stripped_html() {
        let raw = concat!(
            "Subject: Newsletter\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<html><body><h1>Big</h1><p>Sale today</p></body></html>\r\n"
        );

        let content = parse_raw_message(raw.as_bytes()).unwrap();
        assert_eq!(content.subject, "Newsletter");
        assert!(content.body.contains("BigSale today"));
        assert!(!content.body.contains('<'));
    }

    #[test]
    fn test_classification_text() {
        let content = MessageContent {
            subject: "Hello".to_string(),
            body: "Body text".to_string(),
        };
        assert_eq!(classification_text(&content), "Subject: Hello\nBody text");
    }

    #[test]
    fn test_extract_first_address() {
        assert_eq!(
            extract_first_address("John Doe <john@example.com>"),
            Some("john@example.com".to_string())
        );
        assert_eq!(
            extract_first_address("\"Doe, John\" <john@example.com>, jane@example.com"),
            Some("john@example.com".to_string())
        );
        assert_eq!(
            extract_first_address("jane@example.com, John <john@example.com>"),
            Some("jane@example.com".to_string())
        );
        assert_eq!(extract_first_address("Undisclosed recipients"), None);
        assert_eq!(extract_first_address(""), None);
    }

    #[test]
    fn test_ensure_reply_subject() {
        assert_eq!(ensure_reply_subject("Meeting"), "Re: Meeting");
        assert_eq!(ensure_reply_subject("Re: Meeting"), "Re: Meeting");
        assert_eq!(ensure_reply_subject("  RE : Meeting"), "  RE : Meeting");
        assert_eq!(ensure_reply_subject(""), "Re: ");
        assert_eq!(ensure_reply_subject("Regarding the plan"), "Re: Regarding the plan");
    }

    #[test]
    fn test_build_references() {
        assert_eq!(
            build_references(Some("<a@x>"), Some("<b@x>")),
            Some("<a@x> <b@x>".to_string())
        );
        assert_eq!(
            build_references(Some("<a@x> <b@x>"), Some("<b@x>")),
            Some("<a@x> <b@x>".to_string())
        );
        assert_eq!(build_references(None, Some("<b@x>")), Some("<b@x>".to_string()));
        assert_eq!(build_references(Some("<a@x>"), None), Some("<a@x>".to_string()));
        assert_eq!(build_references(None, None), None);
        assert_eq!(build_references(Some(" "), Some("")), None);
    }

    #[test]
    fn test_reply_message_for_original() {
        let reply = ReplyMessage::for_original(
            "Alice <alice@example.com>",
            "Quarterly report",
            "Thanks, will do.",
            Some("<m1@example.com>"),
            Some("<m0@example.com>"),
        )
        .unwrap();

        assert_eq!(reply.to, "alice@example.com");
        assert_eq!(reply.subject, "Re: Quarterly report");
        assert_eq!(reply.in_reply_to.as_deref(), Some("<m1@example.com>"));
        assert_eq!(
            reply.references.as_deref(),
            Some("<m0@example.com> <m1@example.com>")
        );

        assert!(ReplyMessage::for_original("nobody", "s", "b", None, None).is_none());
    }

    #[test]
    fn test_to_rfc822_round_trips_through_parser() {
        let reply = ReplyMessage {
            to: "alice@example.com".to_string(),
            subject: "Re: 会議の件".to_string(),
            body: "こんにちは\nThanks".to_string(),
            in_reply_to: Some("<m1@example.com>".to_string()),
            references: Some("<m1@example.com>".to_string()),
        };

        let raw = reply.to_rfc822();
        let text = String::from_utf8(raw.clone()).unwrap();
        assert!(text.starts_with("To: alice@example.com\r\n"));
        assert!(text.contains("Subject: =?UTF-8?B?"));
        assert!(text.contains("In-Reply-To: <m1@example.com>\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: base64\r\n"));

        let parsed = parse_raw_message(&raw).unwrap();
        assert_eq!(parsed.subject, "Re: 会議の件");
        assert_eq!(parsed.body, "こんにちは\nThanks");
    }

    #[test]
    fn test_header_values_cannot_inject_lines() {
        let reply = ReplyMessage {
            to: "alice@example.com\r\nBcc: eve@example.com".to_string(),
            subject: "Hi".to_string(),
            body: "b".to_string(),
            in_reply_to: None,
            references: None,
        };

        let text = String::from_utf8(reply.to_rfc822()).unwrap();
        assert!(!text.contains("\r\nBcc:"));
    }
}
