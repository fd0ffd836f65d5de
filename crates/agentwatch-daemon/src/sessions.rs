//! Session-directory scan: walk `<projects>/<encoded-dir>/*.jsonl` and
//! build one Agent per live session file.
//!
//! The walk is deliberately shallow (one directory level of project dirs,
//! session files directly inside) and every per-file failure is logged and
//! skipped so one bad file never aborts its siblings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agentwatch_core::paths::{decode_project_dir, project_name};
use agentwatch_core::session::{StatusInputs, infer_status, is_stale_session, parse_session_tail};
use agentwatch_core::types::{Agent, AgentType};
use chrono::{DateTime, Utc};

/// Cap for the git branch lookup.
const GIT_TIMEOUT: Duration = Duration::from_secs(2);

/// `~/.claude/projects`, overridable via `CLAUDE_PROJECTS_DIR`.
pub fn default_projects_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CLAUDE_PROJECTS_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_owned());
    Path::new(&home).join(".claude").join("projects")
}

/// Scan every session file under the projects directory.
///
/// A missing or unreadable projects directory yields an empty result.
pub async fn scan_sessions(projects_dir: &Path, pid_by_cwd: &HashMap<String, u32>) -> Vec<Agent> {
    let mut agents = Vec::new();
    let mut dirs = match tokio::fs::read_dir(projects_dir).await {
        Ok(dirs) => dirs,
        Err(e) => {
            tracing::debug!(path = %projects_dir.display(), error = %e, "projects directory not readable");
            return agents;
        }
    };

    loop {
        let entry = match dirs.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read projects directory entry");
                break;
            }
        };
        if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let encoded_dir = entry.file_name().to_string_lossy().into_owned();
        scan_project_dir(&entry.path(), &encoded_dir, pid_by_cwd, &mut agents).await;
    }
    agents
}

async fn scan_project_dir(
    dir: &Path,
    encoded_dir: &str,
    pid_by_cwd: &HashMap<String, u32>,
    agents: &mut Vec<Agent>,
) {
    let mut files = match tokio::fs::read_dir(dir).await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable project directory");
            return;
        }
    };
    loop {
        let entry = match files.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "failed to read session entry");
                break;
            }
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        match scan_session_file(&path, encoded_dir, pid_by_cwd).await {
            Ok(Some(agent)) => agents.push(agent),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping session file");
            }
        }
    }
}

/// Build the Agent for one session file.
///
/// Returns `Ok(None)` for files too stale to re-parse or with no records.
/// `started_at` is seeded from the file's creation time; the orchestrator
/// preserves the first-observed value across updates regardless.
async fn scan_session_file(
    path: &Path,
    encoded_dir: &str,
    pid_by_cwd: &HashMap<String, u32>,
) -> std::io::Result<Option<Agent>> {
    let meta = tokio::fs::metadata(path).await?;
    let now = Utc::now();
    let modified_at: DateTime<Utc> = meta.modified()?.into();
    if is_stale_session(modified_at, now) {
        return Ok(None);
    }

    let content = tokio::fs::read_to_string(path).await?;
    let Some(tail) = parse_session_tail(&content, now) else {
        return Ok(None);
    };

    let session_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_owned();
    let working_dir = tail
        .working_dir
        .unwrap_or_else(|| decode_project_dir(encoded_dir));

    let (status, waiting_for_permission) = infer_status(StatusInputs {
        modified_at,
        last_tool_use: tail.last_tool_use,
        saw_result: tail.saw_result,
        now,
    });

    let started_at = meta
        .created()
        .map(DateTime::<Utc>::from)
        .unwrap_or(modified_at);
    let git_branch = git_branch(&working_dir).await;
    let pid = pid_by_cwd.get(&working_dir).copied();

    Ok(Some(Agent {
        id: format!("claude-{session_id}"),
        agent_type: AgentType::Claude,
        name: AgentType::Claude.display_name().to_owned(),
        project_name: project_name(&working_dir),
        git_branch,
        working_directory: working_dir,
        status,
        current_activity: Some(tail.current_activity),
        activities: tail.activities,
        started_at,
        progress: None,
        session_id: Some(session_id),
        waiting_for_permission,
        pid,
        is_subagent: tail.is_subagent,
    }))
}

/// Current branch of the repository at `dir`, or `None` on any failure.
pub async fn git_branch(dir: &str) -> Option<String> {
    let result = tokio::time::timeout(
        GIT_TIMEOUT,
        tokio::process::Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(dir)
            .output(),
    )
    .await;
    match result {
        Ok(Ok(output)) if output.status.success() => {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            (!branch.is_empty()).then_some(branch)
        }
        _ => None,
    }
}

// ─── Tests ───────────────────────────────────────────────────────
