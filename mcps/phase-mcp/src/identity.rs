//! Session identity resolution
//!
//! A session is identified by project path + git branch. Branch detection
//! never fails: anything that is not a readable git repository gets
//! [`DEFAULT_BRANCH`].

use git2::Repository;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Branch used when no git branch can be detected
pub const DEFAULT_BRANCH: &str = "default";

/// How session keys are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// `<project>-<branch>-<sha256 prefix>`
    #[default]
    Hashed,
    /// `<project>-<branch>`, for test runs
    Plain,
}

/// Resolved identity of the calling session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub project_path: PathBuf,
    pub branch: String,
    pub session_key: String,
}

impl SessionIdentity {
    /// Resolve project, branch and key in one go
    pub fn resolve(explicit: Option<&str>, fallback: Option<&Path>, mode: KeyMode) -> Self {
        let project_path = resolve_project_path(explicit, fallback);
        let branch = detect_branch(&project_path);
        let session_key = session_key(&project_path, &branch, mode);
        Self {
            project_path,
            branch,
            session_key,
        }
    }
}

/// Explicit override, then the configured fallback, then the working directory
pub fn resolve_project_path(explicit: Option<&str>, fallback: Option<&Path>) -> PathBuf {
    let path = match explicit.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => PathBuf::from(p),
        None => match fallback {
            Some(p) => p.to_path_buf(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        },
    };
    std::fs::canonicalize(&path).unwrap_or(path)
}

/// Current branch of the repository containing `project_path`
pub fn detect_branch(project_path: &Path) -> String {
    match Repository::discover(project_path) {
        Ok(repo) => head_branch(&repo).unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        Err(e) => {
            tracing::debug!("No git repository at {:?}: {}", project_path, e.message());
            DEFAULT_BRANCH.to_string()
        }
    }
}

// Reads HEAD directly so unborn branches still resolve
fn head_branch(repo: &Repository) -> Option<String> {
    let head = repo.find_reference("HEAD").ok()?;
    if let Some(target) = head.symbolic_target() {
        return Some(target.strip_prefix("refs/heads/").unwrap_or(target).to_string());
    }
    let oid = head.target()?.to_string();
    Some(format!("detached-{}", &oid[..7]))
}

/// Deterministic key for `(project_path, branch)`
///
/// The hash is the first 12 hex characters of SHA-256 over
/// `"<project_path>\n<branch>"`, so keys survive restarts.
pub fn session_key(project_path: &Path, branch: &str, mode: KeyMode) -> String {
    let project = project_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string());
    let prefix = format!("{}-{}", sanitize(&project), sanitize(branch));

    match mode {
        KeyMode::Plain => prefix,
        KeyMode::Hashed => {
            let digest = short_digest(&format!("{}\n{}", project_path.to_string_lossy(), branch));
            format!("{}-{}", prefix, digest)
        }
    }
}

/// First 12 hex characters of the SHA-256 of `input`
pub fn short_digest(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
