//! Human-readable rendering for the status and list subcommands.

use agentwatch_core::types::{Agent, AgentStatus, PortInfo};
use chrono::{DateTime, Utc};

use crate::server::StatusSummary;

/// State indicator symbols used in status output.
pub const INDICATOR_RUNNING: &str = "●";
pub const INDICATOR_APPROVAL: &str = "◉";
pub const INDICATOR_WAITING: &str = "◈";
pub const INDICATOR_IDLE: &str = "○";
pub const INDICATOR_DONE: &str = "◌";
pub const INDICATOR_ERROR: &str = "✖";

/// Map an agent's state to its indicator symbol.
pub fn state_indicator(agent: &Agent) -> &'static str {
    match agent.status {
        AgentStatus::Running => INDICATOR_RUNNING,
        AgentStatus::Waiting if agent.waiting_for_permission => INDICATOR_APPROVAL,
        AgentStatus::Waiting => INDICATOR_WAITING,
        AgentStatus::Idle => INDICATOR_IDLE,
        AgentStatus::Completed => INDICATOR_DONE,
        AgentStatus::Error => INDICATOR_ERROR,
    }
}

/// Human-friendly status label.
fn format_state(agent: &Agent) -> &'static str {
    match agent.status {
        AgentStatus::Running => "Running",
        AgentStatus::Waiting if agent.waiting_for_permission => "Approval",
        AgentStatus::Waiting => "Waiting",
        AgentStatus::Idle => "Idle",
        AgentStatus::Completed => "Done",
        AgentStatus::Error => "Error",
    }
}

/// Compact elapsed time like "45s", "5m" or "2h3m".
fn format_age(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Build a summary line like "2 running, 1 approval".
fn format_summary(agents: &[Agent]) -> String {
    let labels = ["error", "approval", "waiting", "running", "idle", "done"];
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        let count = agents
            .iter()
            .filter(|a| format_state(a).eq_ignore_ascii_case(label))
            .count();
        if count > 0 {
            counts.push((label, count));
        }
    }

    if counts.is_empty() {
        return "no agents".to_string();
    }

    counts
        .iter()
        .map(|(name, count)| format!("{count} {name}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Format the agent table for `agentwatch agents`.
///
/// Example output:
/// ```text
/// ● proj       Claude        Running   Editing src/a.ts         main    5m
/// ◉ api        Claude        Approval  Running npm test         dev     12m
/// ```
pub fn format_agents(agents: &[Agent], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    if agents.is_empty() {
        out.push_str("  No active agents.\n");
        return out;
    }
    for agent in agents {
        let activity = agent.current_activity.as_deref().unwrap_or("");
        let branch = agent.git_branch.as_deref().unwrap_or("—");
        out.push_str(&format!(
            "{} {:<12} {:<14} {:<9} {:<28} {:<10} {}\n",
            state_indicator(agent),
            agent.project_name,
            agent.name,
            format_state(agent),
            activity,
            branch,
            format_age(agent.started_at, now),
        ));
    }
    out
}

/// Format the port table for `agentwatch ports`.
pub fn format_ports(ports: &[PortInfo]) -> String {
    let mut out = String::new();
    if ports.is_empty() {
        out.push_str("  No listening ports.\n");
        return out;
    }
    for info in ports {
        out.push_str(&format!(
            "  :{:<6} {:<16} pid {}\n",
            info.port, info.process_name, info.pid
        ));
    }
    out
}

/// Format the full output for `agentwatch status`.
pub fn format_status(summary: &StatusSummary, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    out.push_str("AGENTWATCH Status\n");
    out.push_str("─────────────────────────────────────────────────────────────\n");
    out.push_str(&format_agents(&summary.agents, now));

    if !summary.ports.is_empty() {
        out.push_str("\nPorts:\n");
        out.push_str(&format_ports(&summary.ports));
    }

    out.push('\n');
    out.push_str(&format!("Summary: {}\n", format_summary(&summary.agents)));
    if summary.pending > 0 {
        out.push_str(&format!("Pending notifications: {}\n", summary.pending));
    }
    if let Some(tick) = summary.last_tick {
        out.push_str(&format!("Last scan: {}s ago\n", (now - tick).num_seconds().max(0)));
    }

    out
}
