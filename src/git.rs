use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Source-repository identity attached to a queue entry.
///
/// Every field is best effort and serializes as `null` when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitInfo {
    pub remote: Option<String>,
    pub branch: Option<String>,
    pub repo_name: Option<String>,
    pub org: Option<String>,
}

impl GitInfo {
    /// Build from a raw remote URL and branch, deriving `org`/`repo_name`
    /// from the URL when it has an `org/repo` tail.
    pub fn from_parts(remote: Option<String>, branch: Option<String>) -> Self {
        let (org, repo_name) = remote
            .as_deref()
            .and_then(parse_remote_url)
            .map_or((None, None), |(org, repo)| (Some(org), Some(repo)));
        Self {
            remote,
            branch,
            repo_name,
            org,
        }
    }
}

/// Maps a working directory to the repository it belongs to.
pub trait RepositoryInfoProvider {
    /// `None` when `dir` isn't inside a repository or it can't be inspected.
    fn repository_info(&self, dir: &Path) -> Option<GitInfo>;
}

// ===================================================================
// Remote URL parsing
// ===================================================================

static REMOTE_RE: OnceLock<Regex> = OnceLock::new();

fn remote_re() -> &'static Regex {
    REMOTE_RE.get_or_init(|| {
        Regex::new(r"[:/]([^/]+)/([^/]+?)(\.git)?$").expect("remote URL pattern is valid")
    })
}

/// Extract `(org, repo_name)` from a remote URL.
///
/// Handles `https://host/org/repo.git` as well as the SSH shorthand
/// `git@host:org/repo.git`. Returns `None` when the URL has no `org/repo`
/// tail.
pub fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let caps = remote_re().captures(url.trim())?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

// ===================================================================
// git2-backed provider
// ===================================================================

/// Reads `origin` and the current branch straight from the repository with
/// libgit2, so no `git` binary is needed and nothing can hang on a child
/// process.
pub struct Git2Provider;

impl RepositoryInfoProvider for Git2Provider {
    fn repository_info(&self, dir: &Path) -> Option<GitInfo> {
        let repo = git2::Repository::discover(dir).ok()?;
        let remote = repo
            .find_remote("origin")
            .ok()
            .and_then(|r| r.url().map(String::from));
        // Unborn HEAD (fresh repo, no commits) has no branch to report.
        let branch = repo
            .head()
            .ok()
            .and_then(|h| h.shorthand().map(String::from));
        Some(GitInfo::from_parts(remote, branch))
    }
}

// ===================================================================
// Fixed provider for tests
// ===================================================================

/// Returns the same answer for every directory.
#[cfg(test)]
pub struct FixedProvider(pub Option<GitInfo>);

#[cfg(test)]
impl RepositoryInfoProvider for FixedProvider {
    fn repository_info(&self, _dir: &Path) -> Option<GitInfo> {
        self.0.clone()
    }
}
