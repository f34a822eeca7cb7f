//! Domain normalization and free-text sanitation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{AppError, AppResult};

/// Longest reason string kept on an edge.
pub const MAX_REASON_LEN: usize = 255;

static DOMAIN_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)+$").ok()
});

/// Normalize a user-supplied domain.
///
/// Accepts bare hostnames as well as URLs and returns the lowercase host.
pub fn normalize_domain(input: &str) -> AppResult<String> {
    let trimmed = input.trim().trim_end_matches('/');
    let host = if trimmed.contains("://") {
        url::Url::parse(trimmed)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| AppError::BadRequest(format!("Invalid domain: {input}")))?
    } else {
        trimmed.to_string()
    };
    let host = host.to_lowercase();

    let valid = DOMAIN_RE.as_ref().is_some_and(|re| re.is_match(&host));
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid domain: {input}")));
    }
    Ok(host)
}

/// Split a comma-separated domain list, normalizing each entry.
pub fn parse_domain_csv(csv: &str) -> AppResult<Vec<String>> {
    csv.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(normalize_domain)
        .collect()
}

/// Clean a free-text field. Returns `None` for blank input.
#[must_use]
pub fn sanitize_text(input: Option<&str>, max_len: Option<usize>) -> Option<String> {
    let cleaned: String = input?
        .chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    Some(match max_len {
        Some(max) => cleaned.chars().take(max).collect(),
        None => cleaned.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("Lemmy.World").unwrap(), "lemmy.world");
        assert_eq!(
            normalize_domain("https://mastodon.social/").unwrap(),
            "mastodon.social"
        );
        assert!(normalize_domain("not a domain").is_err());
        assert!(normalize_domain("localhost").is_err());
    }

    #[test]
    fn test_parse_domain_csv_skips_blanks() {
        let domains = parse_domain_csv("a.example, B.example,,").unwrap();
        assert_eq!(domains, vec!["a.example", "b.example"]);
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text(None, None), None);
        assert_eq!(sanitize_text(Some("   "), None), None);
        assert_eq!(
            sanitize_text(Some(" spam\u{0007} "), None),
            Some("spam".to_string())
        );
        assert_eq!(
            sanitize_text(Some("abcdef"), Some(3)),
            Some("abc".to_string())
        );
    }
}
