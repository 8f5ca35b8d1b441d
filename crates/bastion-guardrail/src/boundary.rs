// boundary.rs — Turn a raw tool call into the runtime surface it touches.
//
// Agents describe tool calls with loosely named arguments. Before policy can
// judge a call, the arguments are normalized:
//
//   path | url_path | endpoint   → request URL (joined to the base URL
//                                   unless already absolute http(s))
//   repo_path | pathspec         → repository path (default: context repo)
//   method                       → HTTP method
//
// The filesystem check is separate: it confines file-oriented tools to a
// virtual repo prefix.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use bastion_policy::RuntimeTarget;

use crate::context::GuardrailContext;

/// A tool invocation proposed by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
        }
    }

    /// First non-empty argument among `keys`, rendered as text.
    pub fn arg(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.args.get(*key)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }
}

/// The normalized surface of one tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedToolBoundary {
    pub tool: String,
    pub host: String,
    pub subdomain: String,
    pub path: String,
    pub repo_path: String,
    pub method: Option<String>,
    pub url: String,
}

impl NormalizedToolBoundary {
    /// Normalize `call` against the context's base URL and repo path.
    /// Returns the boundary together with the target used for evaluation.
    pub fn from_call(context: &GuardrailContext, call: &ToolCall) -> (Self, RuntimeTarget) {
        let raw_path = call
            .arg(&["path", "url_path", "endpoint"])
            .unwrap_or_else(|| "/".to_string());
        let url = if raw_path.starts_with("http://") || raw_path.starts_with("https://") {
            raw_path
        } else {
            join_url(&context.url, &raw_path)
        };
        let repo_path = call
            .arg(&["repo_path", "pathspec"])
            .unwrap_or_else(|| context.repo_path.clone());
        let method = call.arg(&["method"]);

        let target =
            RuntimeTarget::from_inputs(context.phase.as_str(), &url, &repo_path, method.as_deref());
        let boundary = Self {
            tool: call.name.clone(),
            host: target.host.clone(),
            subdomain: target.subdomain.clone(),
            path: target.path.clone(),
            repo_path: target.repo_path.clone(),
            method: target.method.clone(),
            url,
        };
        (boundary, target)
    }
}

/// Resolve `path` relative to `base`, treating `base` as a directory.
fn join_url(base: &str, path: &str) -> String {
    let base_dir = format!("{}/", base.trim_end_matches('/'));
    let relative = path.trim_start_matches('/');
    match Url::parse(&base_dir).and_then(|b| b.join(relative)) {
        Ok(joined) => joined.to_string(),
        Err(_) => format!("{}{}", base_dir, relative),
    }
}

/// Check the path-like arguments of a file tool against `prefix`.
///
/// Returns the denial reason for the first candidate outside the prefix.
/// `glob` tools also have `pattern` checked, `grep` tools `glob`.
pub fn check_filesystem_boundary(prefix: &str, call: &ToolCall) -> Option<String> {
    let mut keys = vec!["file_path", "path", "target_file"];
    match call.name.as_str() {
        "glob" => keys.push("pattern"),
        "grep" => keys.push("glob"),
        _ => {}
    }

    keys.into_iter()
        .filter_map(|key| call.arg(&[key]))
        .find(|candidate| !is_inside_prefix(prefix, candidate))
        .map(|candidate| {
            format!(
                "Tool '{}' path '{}' is outside the authorized repo prefix '{}'.",
                call.name, candidate, prefix
            )
        })
}

/// Component-wise containment of a virtual path in `prefix`.
///
/// Relative candidates are anchored at `/`. Leading wildcards and `..`
/// components are never inside.
fn is_inside_prefix(prefix: &str, candidate: &str) -> bool {
    if candidate.starts_with('*') {
        return false;
    }
    let Some(candidate) = components(candidate) else {
        return false;
    };
    let Some(prefix) = components(prefix) else {
        return false;
    };
    candidate.starts_with(&prefix)
}

fn components(path: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            other => parts.push(other),
        }
    }
    Some(parts)
}
