// scope.rs — Scope guards checked before any phase starts.
//
// 1. The repository under assessment must resolve inside the configured
//    repos root (symlinks and `..` are resolved first).
// 2. The target URL must be a plain http(s) URL with a host, no embedded
//    credentials, and no path traversal.
//
// Either failure is a ScopeError; the workflow layer treats it as fatal.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::ScopeError;

/// Resolve `repo_path` and require it to live under `repos_root`.
pub fn ensure_repo_in_repos_root(repo_path: &Path, repos_root: &Path) -> Result<PathBuf, ScopeError> {
    let repo = canonical(repo_path)?;
    let root = canonical(repos_root)?;
    if repo.starts_with(&root) {
        Ok(repo)
    } else {
        Err(ScopeError::RepoOutsideRoot { repo, root })
    }
}

/// Parse `raw` and reject URLs that are unsafe to hand to an agent.
pub fn ensure_safe_target_url(raw: &str) -> Result<Url, ScopeError> {
    let unsafe_url = |reason: &str| ScopeError::UnsafeUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|e| unsafe_url(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(unsafe_url("only http and https targets are allowed"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(unsafe_url("missing host"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(unsafe_url("credentials must not be embedded in the URL"));
    }
    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("/../") || lowered.ends_with("/..") || lowered.contains("%2e%2e") {
        return Err(unsafe_url("path traversal detected"));
    }
    Ok(url)
}

fn canonical(path: &Path) -> Result<PathBuf, ScopeError> {
    path.canonicalize().map_err(|source| ScopeError::Unresolvable {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn repo_inside_root_is_accepted() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("repos");
        let repo = root.join("target");
        fs::create_dir_all(&repo).unwrap();

        let resolved = ensure_repo_in_repos_root(&repo, &root).unwrap();
        assert!(resolved.ends_with("repos/target"));
    }

    #[test]
    fn repo_escaping_root_is_rejected() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("repos");
        let outside = dir.path().join("elsewhere");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&outside).unwrap();

        let escaped = root.join("..").join("elsewhere");
        let err = ensure_repo_in_repos_root(&escaped, &root).unwrap_err();
        assert!(matches!(err, ScopeError::RepoOutsideRoot { .. }));
        assert!(err.to_string().contains("Repository must be inside"));
    }

    #[test]
    fn missing_repo_is_unresolvable() {
        let dir = tempdir().unwrap();
        let err = ensure_repo_in_repos_root(&dir.path().join("nope"), dir.path()).unwrap_err();
        assert!(matches!(err, ScopeError::Unresolvable { .. }));
    }

    #[test]
    fn plain_https_url_is_safe() {
        let url = ensure_safe_target_url("https://staging.example.com/app").unwrap();
        assert_eq!(url.host_str(), Some("staging.example.com"));
    }

    #[test]
    fn unsafe_urls_are_rejected() {
        for raw in [
            "ftp://example.com/",
            "file:///etc/passwd",
            "https://user:pw@example.com/",
            "https://example.com/a/%2E%2E/secret",
            "not a url",
        ] {
            assert!(ensure_safe_target_url(raw).is_err(), "{}", raw);
        }
    }
}
