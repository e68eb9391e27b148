//! Issue identifier extraction
//!
//! Accepts either a bare numeric id (`12345`) or an issue URL on the
//! platform's domain (`https://acme.sentry.io/issues/12345/events/`) and
//! returns the numeric id.

use crate::config::SENTRY_DOMAIN;
use thiserror::Error;
use url::Url;

/// Why an identifier was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Nothing to parse
    #[error("Missing issue_id_or_url argument")]
    Empty,

    /// Looked like a URL but did not parse
    #[error("Invalid Sentry URL: {0}")]
    MalformedUrl(String),

    /// URL host is not on the platform's domain
    #[error("Invalid Sentry URL. Must be a URL ending with .{0}")]
    ForeignHost(String),

    /// URL path has no `/issues/<id>` segment pair
    #[error("Invalid Sentry issue URL. Path must contain '/issues/{{issue_id}}'")]
    MissingIssuePath,

    /// Candidate id contains something other than decimal digits
    #[error("Invalid Sentry issue ID. Must be a numeric value.")]
    NotNumeric,
}

/// Extract an issue id using the default platform domain
pub fn extract_issue_id(input: &str) -> Result<String, IdentifierError> {
    extract_issue_id_for_domain(input, SENTRY_DOMAIN)
}

/// Extract an issue id, requiring URLs to live under `domain_suffix`
pub fn extract_issue_id_for_domain(
    input: &str,
    domain_suffix: &str,
) -> Result<String, IdentifierError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(IdentifierError::Empty);
    }

    let candidate = if input.starts_with("http://") || input.starts_with("https://") {
        id_from_url(input, domain_suffix)?
    } else {
        input.to_string()
    };

    if candidate.is_empty() || !candidate.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IdentifierError::NotNumeric);
    }

    Ok(candidate)
}

fn id_from_url(input: &str, domain_suffix: &str) -> Result<String, IdentifierError> {
    let url = Url::parse(input).map_err(|e| IdentifierError::MalformedUrl(e.to_string()))?;

    let suffix = domain_suffix.trim_start_matches('.');
    let host = url.host_str().unwrap_or_default();
    if !host_matches(host, suffix) {
        return Err(IdentifierError::ForeignHost(suffix.to_string()));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    segments
        .windows(2)
        .find(|pair| pair[0] == "issues")
        .map(|pair| pair[1].to_string())
        .ok_or(IdentifierError::MissingIssuePath)
}

/// `host` is `suffix` itself or a subdomain of it
fn host_matches(host: &str, suffix: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let suffix = suffix.to_ascii_lowercase();
    host == suffix
        || host
            .strip_suffix(&suffix)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id() {
        assert_eq!(extract_issue_id("12345").unwrap(), "12345");
    }

    #[test]
    fn test_bare_id_with_surrounding_whitespace() {
        assert_eq!(extract_issue_id("  12345\n").unwrap(), "12345");
    }

    #[test]
    fn test_url() {
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/issues/98765").unwrap(),
            "98765"
        );
    }

    #[test]
    fn test_url_with_trailing_slash() {
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/issues/98765/").unwrap(),
            "98765"
        );
    }

    #[test]
    fn test_url_with_trailing_segments() {
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/issues/98765/events/").unwrap(),
            "98765"
        );
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/issues/98765/events/abc123/").unwrap(),
            "98765"
        );
    }

    #[test]
    fn test_url_with_query_and_fragment() {
        assert_eq!(
            extract_issue_id(
                "https://acme.sentry.io/issues/555/?project=1&query=is%3Aunresolved#top",
            )
            .unwrap(),
            "555"
        );
    }

    #[test]
    fn test_url_under_organization_path() {
        assert_eq!(
            extract_issue_id("https://sentry.io/organizations/acme/issues/4242/").unwrap(),
            "4242"
        );
    }

    #[test]
    fn test_http_scheme_accepted() {
        assert_eq!(
            extract_issue_id("http://acme.sentry.io/issues/1").unwrap(),
            "1"
        );
    }

    #[test]
    fn test_foreign_host() {
        assert_eq!(
            extract_issue_id("https://evil.example.com/issues/1"),
            Err(IdentifierError::ForeignHost("sentry.io".to_string()))
        );
    }

    #[test]
    fn test_lookalike_host() {
        assert!(matches!(
            extract_issue_id("https://evilsentry.io/issues/1"),
            Err(IdentifierError::ForeignHost(_))
        ));
        assert!(matches!(
            extract_issue_id("https://sentry.io.evil.com/issues/1"),
            Err(IdentifierError::ForeignHost(_))
        ));
    }

    #[test]
    fn test_host_is_case_insensitive() {
        assert_eq!(
            extract_issue_id("https://ACME.Sentry.IO/issues/77").unwrap(),
            "77"
        );
    }

    #[test]
    fn test_missing_issues_segment() {
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/projects/12345"),
            Err(IdentifierError::MissingIssuePath)
        );
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/"),
            Err(IdentifierError::MissingIssuePath)
        );
    }

    #[test]
    fn test_issues_segment_without_id() {
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/issues/"),
            Err(IdentifierError::MissingIssuePath)
        );
    }

    #[test]
    fn test_url_with_non_numeric_id() {
        assert_eq!(
            extract_issue_id("https://acme.sentry.io/issues/abc"),
            Err(IdentifierError::NotNumeric)
        );
    }

    #[test]
    fn test_non_numeric() {
        assert_eq!(extract_issue_id("abc"), Err(IdentifierError::NotNumeric));
        assert_eq!(extract_issue_id("12a45"), Err(IdentifierError::NotNumeric));
        assert_eq!(extract_issue_id("-12"), Err(IdentifierError::NotNumeric));
        assert_eq!(extract_issue_id("1.5"), Err(IdentifierError::NotNumeric));
    }

    #[test]
    fn test_non_ascii_digits_rejected() {
        assert_eq!(extract_issue_id("١٢٣"), Err(IdentifierError::NotNumeric));
    }

    #[test]
    fn test_empty() {
        assert_eq!(extract_issue_id(""), Err(IdentifierError::Empty));
        assert_eq!(extract_issue_id("   "), Err(IdentifierError::Empty));
    }

    #[test]
    fn test_other_scheme_treated_as_bare_id() {
        assert_eq!(
            extract_issue_id("ftp://acme.sentry.io/issues/1"),
            Err(IdentifierError::NotNumeric)
        );
    }

    #[test]
    fn test_custom_domain() {
        assert_eq!(
            extract_issue_id_for_domain(
                "https://sentry.internal.corp/issues/9",
                "sentry.internal.corp",
            )
            .unwrap(),
            "9"
        );
        assert_eq!(
            extract_issue_id_for_domain("https://acme.sentry.io/issues/9", "sentry.internal.corp"),
            Err(IdentifierError::ForeignHost("sentry.internal.corp".to_string()))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            IdentifierError::MissingIssuePath.to_string(),
            "Invalid Sentry issue URL. Path must contain '/issues/{issue_id}'"
        );
        assert_eq!(
            IdentifierError::ForeignHost("sentry.io".into()).to_string(),
            "Invalid Sentry URL. Must be a URL ending with .sentry.io"
        );
    }
}
