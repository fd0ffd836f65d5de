//! Heuristic detection of peer coding-assistant processes.
//!
//! Matching is best-effort substring probing of process-table lines. Rules
//! are data: each names the substrings that must all appear, the substrings
//! that must not (guards against lookalike names), and the resulting agent
//! type. New tools are new rows.

use chrono::{DateTime, Utc};

use crate::types::{Agent, AgentStatus, AgentType};

pub struct PeerRule {
    pub required: &'static [&'static str],
    pub excluded: &'static [&'static str],
    pub agent_type: AgentType,
}

pub static PEER_RULES: &[PeerRule] = &[
    PeerRule {
        required: &["cursor", "agent"],
        excluded: &[],
        agent_type: AgentType::Cursor,
    },
    PeerRule {
        // "raider" would otherwise read as aider.
        required: &["aider"],
        excluded: &["raider"],
        agent_type: AgentType::Aider,
    },
    PeerRule {
        required: &["gh", "copilot"],
        excluded: &[],
        agent_type: AgentType::Copilot,
    },
];

impl PeerRule {
    fn matches(&self, lowered: &str) -> bool {
        self.required.iter().all(|s| lowered.contains(s))
            && !self.excluded.iter().any(|s| lowered.contains(s))
    }
}

/// Scan `ps aux` output for peer-tool processes.
///
/// One line can satisfy several rules; each match yields its own agent.
/// Lines without a parseable pid in column 1 are dropped.
pub fn scan_peer_lines(ps_output: &str, now: DateTime<Utc>) -> Vec<Agent> {
    let mut found = Vec::new();
    for line in ps_output.lines() {
        let lowered = line.to_lowercase();
        for rule in PEER_RULES {
            if rule.matches(&lowered)
                && let Some(pid) = parse_pid_column(line)
            {
                found.push(peer_agent(rule.agent_type, pid, now));
            }
        }
    }
    found
}

fn parse_pid_column(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Minimal agent record for a process discovered only by name matching.
///
/// No session log backs these, so metadata stays coarse and the status is
/// pinned at running; the registry keeps the first observation per id.
pub fn peer_agent(agent_type: AgentType, pid: u32, now: DateTime<Utc>) -> Agent {
    Agent {
        id: format!("{}-{pid}", type_key(agent_type)),
        agent_type,
        name: agent_type.display_name().to_owned(),
        project_name: "Unknown".to_owned(),
        git_branch: None,
        working_directory: "~".to_owned(),
        status: AgentStatus::Running,
        current_activity: Some("Active".to_owned()),
        activities: Vec::new(),
        started_at: now,
        progress: None,
        session_id: None,
        waiting_for_permission: false,
        pid: Some(pid),
        is_subagent: false,
    }
}

fn type_key(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Claude => "claude",
        AgentType::Cursor => "cursor",
        AgentType::Chatgpt => "chatgpt",
        AgentType::Copilot => "copilot",
        AgentType::Aider => "aider",
        AgentType::V0 => "v0",
        AgentType::Codex => "codex",
        AgentType::Unknown => "unknown",
    }
}

// ─── Tests ───────────────────────────────────────────────────────
