use subtle::ConstantTimeEq;

/// Outcome of checking a request's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayAuthResult {
    /// No token configured; every request is accepted.
    Open,
    Authorized,
    Rejected(&'static str),
}

impl GatewayAuthResult {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, GatewayAuthResult::Rejected(_))
    }
}

/// Check an `Authorization` header value against the configured token.
pub fn authorize_request(expected: Option<&str>, authorization: Option<&str>) -> GatewayAuthResult {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return GatewayAuthResult::Open;
    };

    match authorization.and_then(extract_bearer_token) {
        Some(provided) if safe_equal(expected, provided) => GatewayAuthResult::Authorized,
        Some(_) => GatewayAuthResult::Rejected("Invalid bearer token"),
        None => GatewayAuthResult::Rejected("Missing bearer token"),
    }
}

/// Timing-safe string comparison.
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Extract bearer token from an Authorization header value.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let prefix = header.get(..7)?;
    if header.len() > 7 && prefix.eq_ignore_ascii_case("bearer ") {
        Some(header[7..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_without_configured_token() {
        assert_eq!(authorize_request(None, None), GatewayAuthResult::Open);
        assert_eq!(authorize_request(Some(""), None), GatewayAuthResult::Open);
    }

    #[test]
    fn bearer_token_must_match() {
        assert_eq!(
            authorize_request(Some("s3cret"), Some("Bearer s3cret")),
            GatewayAuthResult::Authorized
        );
        assert_eq!(
            authorize_request(Some("s3cret"), Some("bearer s3cret ")),
            GatewayAuthResult::Authorized
        );
        assert!(!authorize_request(Some("s3cret"), Some("Bearer nope")).is_allowed());
        assert!(!authorize_request(Some("s3cret"), Some("Basic abc")).is_allowed());
        assert!(!authorize_request(Some("s3cret"), None).is_allowed());
    }

    #[test]
    fn extract_handles_short_and_odd_headers() {
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("Béarer abc"), None);
    }
}
