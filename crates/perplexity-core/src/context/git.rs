//! Thin async wrapper over the `git` CLI

use std::path::Path;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

/// Run `git <args>` in `root` and return stdout
///
/// A non-zero exit yields stderr (or the exit status when stderr is empty).
pub async fn run_git(root: &Path, args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("Failed to run git: {}", e))?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        Err(format!("git {} exited with {}", args.join(" "), output.status))
    } else {
        Err(stderr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub hash: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

/// Repository summary for the workspace root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitContext {
    pub branch: String,
    /// `Changes: N` with N the number of porcelain status lines
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<CommitInfo>,
}

/// Collect branch, change count, remote, and last commit; `None` outside a repo
pub async fn git_context(root: &Path) -> Option<GitContext> {
    let branch = run_git(root, &["rev-parse", "--abbrev-ref", "HEAD"]).await.ok()?;
    let changes = run_git(root, &["status", "--porcelain"])
        .await
        .map(|out| out.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0);
    let remote_url = run_git(root, &["remote", "get-url", "origin"])
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let last_commit = run_git(root, &["log", "-1", "--pretty=format:%H%x1f%s%x1f%an%x1f%aI"])
        .await
        .ok()
        .and_then(|out| parse_commit(&out));

    Some(GitContext {
        branch: match branch.trim() {
            "" => "unknown".to_string(),
            b => b.to_string(),
        },
        status: format!("Changes: {}", changes),
        remote_url,
        last_commit,
    })
}

fn parse_commit(line: &str) -> Option<CommitInfo> {
    let mut parts = line.trim_end().split('\u{1f}');
    Some(CommitInfo {
        hash: parts.next().filter(|h| !h.is_empty())?.to_string(),
        message: parts.next().unwrap_or("No commit message").to_string(),
        author: parts.next().unwrap_or("unknown").to_string(),
        date: parts.next().unwrap_or("unknown").to_string(),
    })
}
