//! URL access control for resources referenced by rendered documents.

use regex::Regex;
use tracing::{debug, error};

/// Allow-list first, then block-list, otherwise allow. A pattern that does
/// not compile denies everything.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    allowed: Result<Regex, String>,
    blocked: Result<Regex, String>,
}

impl UrlPolicy {
    pub fn new(allowed_pattern: &str, blocked_pattern: &str) -> Self {
        Self {
            allowed: compile(allowed_pattern),
            blocked: compile(blocked_pattern),
        }
    }

    pub fn is_allowed(&self, url: &str) -> bool {
        let (allowed, blocked) = match (&self.allowed, &self.blocked) {
            (Ok(allowed), Ok(blocked)) => (allowed, blocked),
            (Err(err), _) | (_, Err(err)) => {
                error!(url, error = %err, "URL pattern is invalid, denying access");
                return false;
            }
        };
        if allowed.is_match(url) {
            debug!(url, "URL matches allowed pattern");
            true
        } else if blocked.is_match(url) {
            debug!(url, "URL matches blocked pattern");
            false
        } else {
            true
        }
    }
}

// Patterns match from the start of the URL, not anywhere inside it.
fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_deny_everything() {
        let policy = UrlPolicy::new("^$", "^.*$");
        assert!(!policy.is_allowed("https://example.com/a.png"));
    }

    #[test]
    fn allow_list_wins_over_block_list() {
        let policy = UrlPolicy::new(r"https://cdn\.example\.com/", "^.*$");
        assert!(policy.is_allowed("https://cdn.example.com/logo.png"));
        assert!(!policy.is_allowed("https://evil.example.com/logo.png"));
    }

    #[test]
    fn unmatched_urls_are_allowed() {
        let policy = UrlPolicy::new("^$", r"https://blocked\.");
        assert!(policy.is_allowed("https://fine.example.com/"));
        assert!(!policy.is_allowed("https://blocked.example.com/"));
    }

    #[test]
    fn match_is_anchored_at_start() {
        let policy = UrlPolicy::new("example", "^.*$");
        assert!(!policy.is_allowed("https://example.com"));
        assert!(policy.is_allowed("example.com/x"));
    }

    #[test]
    fn invalid_pattern_fails_closed() {
        let policy = UrlPolicy::new("(", "^$");
        assert!(!policy.is_allowed("https://example.com"));
    }
}
