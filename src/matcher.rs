/// Selects message parts for inspection by their declared content type.
pub trait PartPredicate: Send + Sync {
    fn matches(&self, content_type: &str) -> bool;
}

/// Loose "looks like a binary attachment" test: the token (default `octet`)
/// anywhere in the content type, ignoring case. Catches `application/octet-stream`
/// as well as vendor variants such as `application/x-octet-stream`.
#[derive(Debug, Clone)]
pub struct OctetStreamMatcher {
    token: String,
}

pub const DEFAULT_CONTENT_TYPE_TOKEN: &str = "octet";

impl OctetStreamMatcher {
    pub fn new() -> Self {
        Self::with_token(DEFAULT_CONTENT_TYPE_TOKEN)
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: token.to_lowercase(),
        }
    }
}

impl Default for OctetStreamMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PartPredicate for OctetStreamMatcher {
    fn matches(&self, content_type: &str) -> bool {
        if content_type.is_empty() || self.token.is_empty() {
            return false;
        }
        content_type.to_lowercase().contains(&self.token)
    }
}

impl<F> PartPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, content_type: &str) -> bool {
        self(content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octet_variants_match() {
        let matcher = OctetStreamMatcher::new();
        assert!(matcher.matches("application/octet-stream"));
        assert!(matcher.matches("application/x-octet-stream; name=\"a.bin\""));
        assert!(matcher.matches("APPLICATION/OCTET-STREAM"));
    }

    #[test]
    fn test_non_octet_types_do_not_match() {
        let matcher = OctetStreamMatcher::new();
        assert!(!matcher.matches("text/html; charset=utf-8"));
        assert!(!matcher.matches("multipart/mixed; boundary=\"b1\""));
        assert!(!matcher.matches(""));
        assert!(!matcher.matches(";;;=="));
    }

    #[test]
    fn test_closure_predicate() {
        let predicate = |ct: &str| ct.starts_with("text/");
        assert!(predicate.matches("text/plain"));
        assert!(!predicate.matches("image/png"));
    }
}
