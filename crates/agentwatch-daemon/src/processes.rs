//! Process-table scans: the claude pid-by-cwd map and the peer-tool scan.
//!
//! Both consume external tools (`lsof`, `ps`) with a hard time cap. Tool
//! absence, timeouts, and unexpected output all degrade to empty results.

use std::collections::HashMap;
use std::time::Duration;

use agentwatch_core::peers::scan_peer_lines;
use agentwatch_core::types::Agent;
use chrono::Utc;
use tokio::process::Command;

/// Cap for external enumeration commands.
const EXEC_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an external command and return its stdout, or `None` on any failure.
///
/// A timeout counts as a failure for this tick; the command is not awaited
/// further.
pub(crate) async fn run_command(program: &str, args: &[&str]) -> Option<String> {
    let result = tokio::time::timeout(EXEC_TIMEOUT, Command::new(program).args(args).output()).await;
    match result {
        Ok(Ok(output)) => Some(String::from_utf8_lossy(&output.stdout).into_owned()),
        Ok(Err(e)) => {
            tracing::debug!(program, error = %e, "command failed");
            None
        }
        Err(_) => {
            tracing::warn!(program, "command timed out");
            None
        }
    }
}

/// Map each claude process's working directory to its pid.
///
/// Uses `lsof -c claude -d cwd -Fn`. Failure (lsof absent, no matching
/// processes, timeout) yields an empty map.
pub async fn claude_pid_by_cwd() -> HashMap<String, u32> {
    match run_command("lsof", &["-c", "claude", "-d", "cwd", "-Fn"]).await {
        Some(stdout) => parse_cwd_map(&stdout),
        None => HashMap::new(),
    }
}

/// Parse `lsof -Fn` field output: `p<pid>` lines announce a process and the
/// following `n<path>` line carries its cwd. First pid wins per directory.
fn parse_cwd_map(stdout: &str) -> HashMap<String, u32> {
    let mut map = HashMap::new();
    let mut current_pid: Option<u32> = None;
    for line in stdout.lines() {
        if let Some(pid) = line.strip_prefix('p') {
            current_pid = pid.parse().ok();
        } else if let Some(dir) = line.strip_prefix('n')
            && let Some(pid) = current_pid
            && !dir.is_empty()
        {
            map.entry(dir.to_owned()).or_insert(pid);
        }
    }
    map
}

/// Scan `ps aux` output for peer coding-assistant processes.
pub async fn scan_peers() -> Vec<Agent> {
    match run_command("ps", &["aux"]).await {
        Some(stdout) => scan_peer_lines(&stdout, Utc::now()),
        None => Vec::new(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────
