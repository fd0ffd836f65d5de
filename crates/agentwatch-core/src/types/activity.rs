use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of an inferred tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Read,
    Edit,
    Write,
    Bash,
    Search,
    Other,
}

/// One inferred action, derived from a single tool-use log record.
///
/// Never mutated after creation; the owning agent's activity list is rebuilt
/// from scratch on every scan of its session file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    /// `{toolName}-{timestampMillis}`; uniqueness is best-effort.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub timestamp: DateTime<Utc>,
}
