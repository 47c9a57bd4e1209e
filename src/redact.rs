//! Helpers that keep personal data out of log records

/// Mask an address down to its first and last local character plus the domain
///
/// `alice@example.com` becomes `a***e@example.com`. Anything that does not look
/// like an address is replaced with `redacted`.
pub fn redact_email(address: &str) -> String {
    let address = address.trim();
    let Some((local, domain)) = address.split_once('@') else {
        return "redacted".to_string();
    };

    let mut chars = local.chars();
    let Some(first) = chars.next() else {
        return "redacted".to_string();
    };

    match chars.last() {
        Some(last) => format!("{}***{}@{}", first, last, domain),
        None => format!("{}***@{}", first, domain),
    }
}

/// Truncate to `max_chars` characters, marking the cut with `…`
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push('…');
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_email() {
        assert_eq!(redact_email("alice@example.com"), "a***e@example.com");
        assert_eq!(redact_email("a@example.com"), "a***@example.com");
        assert_eq!(redact_email(" bob@mail.test "), "b***b@mail.test");
    }

    #[test]
    fn test_redact_email_invalid() {
        assert_eq!(redact_email(""), "redacted");
        assert_eq!(redact_email("not-an-address"), "redacted");
        assert_eq!(redact_email("@example.com"), "redacted");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc…");
        assert_eq!(truncate_for_log("", 3), "");
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        assert_eq!(truncate_for_log("日本語のテキスト", 3), "日本語…");
    }
}
