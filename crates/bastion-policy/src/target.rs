// target.rs — RuntimeTarget: what a phase or a tool call is about to touch.
//
// Derived fresh from a URL, a repo path, and an optional HTTP method every
// time it is needed; never persisted.

use serde::{Deserialize, Serialize};
use url::Url;

/// Normalized request context that rules are matched against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub phase: String,
    /// Lowercased host name.
    pub host: String,
    /// Every label before the registrable domain; empty for hosts with two
    /// labels or fewer.
    pub subdomain: String,
    pub path: String,
    pub repo_path: String,
    /// Uppercased HTTP method, if the action has one.
    pub method: Option<String>,
}

impl RuntimeTarget {
    /// Build a target from raw inputs.
    ///
    /// URLs that fail to parse produce an empty host; if the input looks like
    /// a bare path it is kept as the path, otherwise the path is `/`.
    pub fn from_inputs(phase: &str, url: &str, repo_path: &str, method: Option<&str>) -> Self {
        let (host, path) = match Url::parse(url) {
            Ok(parsed) => {
                let host = parsed.host_str().unwrap_or_default().to_lowercase();
                let path = match parsed.path() {
                    "" => "/".to_string(),
                    p => p.to_string(),
                };
                (host, path)
            }
            Err(_) if url.starts_with('/') => (String::new(), url.to_string()),
            Err(_) => (String::new(), "/".to_string()),
        };

        Self {
            phase: phase.to_string(),
            subdomain: derive_subdomain(&host),
            host,
            path,
            repo_path: repo_path.to_string(),
            method: method
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_uppercase),
        }
    }
}

/// Labels before the last two (`a.b.example.com` → `a.b`).
///
/// The registrable domain is approximated as the final two labels; multi-part
/// public suffixes such as `co.uk` are not special-cased.
fn derive_subdomain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() <= 2 {
        return String::new();
    }
    labels[..labels.len() - 2].join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_host_path_and_method() {
        let target = RuntimeTarget::from_inputs(
            "recon",
            "https://Beta-Admin.Example.com/api/users?id=1",
            "repos/target",
            Some("post"),
        );
        assert_eq!(target.phase, "recon");
        assert_eq!(target.host, "beta-admin.example.com");
        assert_eq!(target.subdomain, "beta-admin");
        assert_eq!(target.path, "/api/users");
        assert_eq!(target.repo_path, "repos/target");
        assert_eq!(target.method.as_deref(), Some("POST"));
    }

    #[test]
    fn two_label_host_has_no_subdomain() {
        let target = RuntimeTarget::from_inputs("recon", "https://example.com", "r", None);
        assert_eq!(target.subdomain, "");
        assert_eq!(target.path, "/");
        assert!(target.method.is_none());
    }

    #[test]
    fn nested_subdomains_are_joined() {
        let target = RuntimeTarget::from_inputs("recon", "http://a.b.example.com/", "r", None);
        assert_eq!(target.subdomain, "a.b");
    }

    #[test]
    fn blank_method_is_dropped() {
        let target = RuntimeTarget::from_inputs("recon", "http://example.com/", "r", Some("  "));
        assert!(target.method.is_none());
    }

    #[test]
    fn unparseable_url_keeps_bare_path() {
        let target = RuntimeTarget::from_inputs("recon", "/admin/login", "r", None);
        assert_eq!(target.host, "");
        assert_eq!(target.path, "/admin/login");

        let garbage = RuntimeTarget::from_inputs("recon", "not a url", "r", None);
        assert_eq!(garbage.path, "/");
    }
}
