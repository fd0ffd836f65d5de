use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActivityItem;

/// Kind of coding-assistant tool backing an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Cursor,
    Chatgpt,
    Copilot,
    Aider,
    V0,
    Codex,
    Unknown,
}

impl AgentType {
    /// Human-readable tool name shown next to the agent.
    pub fn display_name(self) -> &'static str {
        match self {
            AgentType::Claude => "Claude",
            AgentType::Cursor => "Cursor Agent",
            AgentType::Chatgpt => "ChatGPT",
            AgentType::Copilot => "GitHub Copilot",
            AgentType::Aider => "Aider",
            AgentType::V0 => "v0",
            AgentType::Codex => "Codex",
            AgentType::Unknown => "Unknown",
        }
    }
}

/// Agent lifecycle status, ordered by display priority.
/// Derive Ord so `Running` sorts before `Waiting` and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running = 0,
    Waiting = 1,
    Idle = 2,
    Completed = 3,
    Error = 4,
}

impl AgentStatus {
    pub fn sort_priority(self) -> u8 {
        self as u8
    }

    /// Only running/waiting agents appear in the published list.
    pub fn is_visible(self) -> bool {
        matches!(self, AgentStatus::Running | AgentStatus::Waiting)
    }

    /// Idle and completed agents are eligible for staleness expiry.
    pub fn is_expirable(self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Completed)
    }
}

/// One tracked coding-assistant session or detected peer-tool process.
///
/// `id` is the sole identity across scan ticks: `claude-{sessionId}` for
/// log-derived sessions, `{type}-{pid}` for peer processes. Updates replace
/// the registry entry wholesale; `started_at` survives replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub name: String,
    pub project_name: String,
    pub git_branch: Option<String>,
    pub working_directory: String,
    pub status: AgentStatus,
    pub current_activity: Option<String>,
    pub activities: Vec<ActivityItem>,
    pub started_at: DateTime<Utc>,
    /// Reserved; `None` means indeterminate.
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub waiting_for_permission: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default)]
    pub is_subagent: bool,
}

impl Agent {
    /// Timestamp of the most recent recorded activity, if any.
    pub fn last_activity_at(&self) -> Option<DateTime<Utc>> {
        self.activities.first().map(|a| a.timestamp)
    }
}

/// Filter to externally-visible agents and order them for display.
///
/// Callers pass agents in registry insertion order; the stable sort keeps
/// that order as the tie-break within each status band.
pub fn visible_sorted(agents: Vec<Agent>) -> Vec<Agent> {
    let mut visible: Vec<Agent> = agents
        .into_iter()
        .filter(|a| a.status.is_visible())
        .collect();
    visible.sort_by_key(|a| a.status.sort_priority());
    visible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_priority_order() {
        assert!(AgentStatus::Running < AgentStatus::Waiting);
        assert!(AgentStatus::Waiting < AgentStatus::Idle);
        assert!(AgentStatus::Idle < AgentStatus::Completed);
        assert!(AgentStatus::Completed < AgentStatus::Error);
        assert_eq!(AgentStatus::Running.sort_priority(), 0);
        assert_eq!(AgentStatus::Error.sort_priority(), 4);
    }

    #[test]
    fn only_active_statuses_visible() {
        assert!(AgentStatus::Running.is_visible());
        assert!(AgentStatus::Waiting.is_visible());
        assert!(!AgentStatus::Idle.is_visible());
        assert!(!AgentStatus::Completed.is_visible());
        assert!(!AgentStatus::Error.is_visible());
    }

    #[test]
    fn expirable_statuses() {
        assert!(AgentStatus::Idle.is_expirable());
        assert!(AgentStatus::Completed.is_expirable());
        assert!(!AgentStatus::Running.is_expirable());
        assert!(!AgentStatus::Waiting.is_expirable());
        assert!(!AgentStatus::Error.is_expirable());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&AgentStatus::Waiting).unwrap();
        assert_eq!(json, "\"waiting\"");
        let back: AgentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(back, AgentStatus::Completed);
    }

    fn make(id: &str, status: AgentStatus) -> Agent {
        Agent {
            id: id.into(),
            agent_type: AgentType::Claude,
            name: "Claude".into(),
            project_name: "proj".into(),
            git_branch: None,
            working_directory: "/p".into(),
            status,
            current_activity: None,
            activities: vec![],
            started_at: Utc::now(),
            progress: None,
            session_id: None,
            waiting_for_permission: false,
            pid: None,
            is_subagent: false,
        }
    }

    #[test]
    fn visible_sorted_filters_and_orders() {
        let agents = vec![
            make("w1", AgentStatus::Waiting),
            make("r1", AgentStatus::Running),
            make("done", AgentStatus::Completed),
            make("idle", AgentStatus::Idle),
            make("w2", AgentStatus::Waiting),
            make("r2", AgentStatus::Running),
        ];
        let visible = visible_sorted(agents);
        let ids: Vec<&str> = visible.iter().map(|a| a.id.as_str()).collect();
        // Running band first, then waiting; insertion order within bands.
        assert_eq!(ids, vec!["r1", "r2", "w1", "w2"]);
    }

    #[test]
    fn agent_wire_shape_is_camel_case() {
        let agent = Agent {
            id: "claude-abc123".into(),
            agent_type: AgentType::Claude,
            name: "Claude".into(),
            project_name: "proj".into(),
            git_branch: Some("main".into()),
            working_directory: "/Users/x/proj".into(),
            status: AgentStatus::Running,
            current_activity: Some("Active session".into()),
            activities: vec![],
            started_at: Utc::now(),
            progress: None,
            session_id: Some("abc123".into()),
            waiting_for_permission: false,
            pid: Some(4242),
            is_subagent: false,
        };
        let v: serde_json::Value = serde_json::to_value(&agent).unwrap();
        assert_eq!(v["type"], "claude");
        assert_eq!(v["projectName"], "proj");
        assert_eq!(v["gitBranch"], "main");
        assert_eq!(v["workingDirectory"], "/Users/x/proj");
        assert_eq!(v["waitingForPermission"], false);
        assert_eq!(v["sessionId"], "abc123");
        assert!(v.get("agent_type").is_none());
    }
}
