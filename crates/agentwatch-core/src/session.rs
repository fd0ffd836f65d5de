//! Pure inference over a session log tail.
//!
//! A session file is newline-delimited JSON, one record per line, appended
//! by the assistant as it works. Nothing here touches the filesystem: the
//! caller supplies the file content plus the timestamps it observed, and
//! gets back everything status inference derived from the tail.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::tools::activity_for_tool;
use crate::types::{ActivityItem, Agent, AgentStatus};

/// Sessions whose file mtime is older than this are dead; idle/completed
/// agents whose newest activity is older than this are expired.
pub const STALE_SESSION_MS: i64 = 10 * 60 * 1000;
/// Waiting-for-permission window: both the file mtime and the latest
/// tool-use must be stale by more than this...
pub const WAITING_MIN_MS: i64 = 5_000;
/// ...and less than this.
pub const WAITING_MAX_MS: i64 = 60_000;
/// Past this much mtime staleness the session is idle, whatever else the
/// tail says. Keeps legitimate long thinking pauses from flapping.
pub const IDLE_AFTER_MS: i64 = 2 * 60 * 1000;

/// Records probed for sub-agent markers.
pub const SUBAGENT_PROBE_RECORDS: usize = 10;
/// Bounded tail window for activity extraction.
pub const TAIL_WINDOW_RECORDS: usize = 50;
/// Activity items retained per agent.
pub const MAX_ACTIVITIES: usize = 10;

/// Everything extracted from one pass over a session file's records.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTail {
    pub is_subagent: bool,
    /// Last `cwd` seen in the tail, when any record carried one.
    pub working_dir: Option<String>,
    /// Newest-first, bounded to [`MAX_ACTIVITIES`].
    pub activities: Vec<ActivityItem>,
    /// Text of the most recent relevant record ("Active session" when the
    /// tail held no tool use and no result).
    pub current_activity: String,
    pub last_tool_use: Option<DateTime<Utc>>,
    pub saw_result: bool,
}

/// Parse the session content and fold its tail into a [`SessionTail`].
///
/// Returns `None` for a file with no non-empty lines. Lines that fail to
/// parse as JSON are skipped; a corrupt line never aborts the file.
pub fn parse_session_tail(content: &str, scanned_at: DateTime<Utc>) -> Option<SessionTail> {
    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let is_subagent = probe_subagent(&lines);

    let mut working_dir = None;
    let mut current_activity = "Active session".to_owned();
    let mut last_tool_use = None;
    let mut saw_result = false;
    let mut activities: Vec<ActivityItem> = Vec::new();

    let tail_start = lines.len().saturating_sub(TAIL_WINDOW_RECORDS);
    for line in &lines[tail_start..] {
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let timestamp = record_timestamp(&record, scanned_at);

        if let Some(cwd) = record.get("cwd").and_then(Value::as_str) {
            working_dir = Some(cwd.to_owned());
        }

        // Tool invocations nested in the message content list.
        if let Some(blocks) = record
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_array)
        {
            for block in blocks {
                if block.get("type").and_then(Value::as_str) == Some("tool_use")
                    && let Some(name) = block.get("name").and_then(Value::as_str)
                {
                    let item = activity_for_tool(name, block.get("input"), timestamp);
                    current_activity = item.description.clone();
                    last_tool_use = Some(timestamp);
                    activities.push(item);
                }
            }
        }

        // Some records carry the invocation at the top level instead.
        if let Some(tool_use) = record.get("tool_use")
            && let Some(name) = tool_use.get("name").and_then(Value::as_str)
        {
            let item = activity_for_tool(name, tool_use.get("input"), timestamp);
            current_activity = item.description.clone();
            last_tool_use = Some(timestamp);
            activities.push(item);
        }

        if record.get("type").and_then(Value::as_str) == Some("result") {
            saw_result = true;
            current_activity = "Task completed".to_owned();
        }
    }

    // Records were walked oldest-first; flip so the newest leads, then bound.
    activities.reverse();
    activities.truncate(MAX_ACTIVITIES);

    Some(SessionTail {
        is_subagent,
        working_dir,
        activities,
        current_activity,
        last_tool_use,
        saw_result,
    })
}

/// Sub-agent sessions announce themselves near the top of the file.
///
/// Only the first [`SUBAGENT_PROBE_RECORDS`] records are inspected; a hit
/// short-circuits.
fn probe_subagent(lines: &[&str]) -> bool {
    for line in lines.iter().take(SUBAGENT_PROBE_RECORDS) {
        let Ok(record) = serde_json::from_str::<Value>(line) else {
            continue;
        };
        let record_type = record.get("type").and_then(Value::as_str);
        if matches!(record_type, Some("init") | Some("system"))
            && (line.contains("subagent") || line.contains("parent_session"))
        {
            return true;
        }
    }
    false
}

fn record_timestamp(record: &Value, fallback: DateTime<Utc>) -> DateTime<Utc> {
    record
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback)
}

/// Timestamps observed for a session file, as inputs to status inference.
#[derive(Debug, Clone, Copy)]
pub struct StatusInputs {
    pub modified_at: DateTime<Utc>,
    pub last_tool_use: Option<DateTime<Utc>>,
    pub saw_result: bool,
    pub now: DateTime<Utc>,
}

/// Infer the session status from the tail plus file timestamps.
///
/// Rules apply in order, later overriding earlier:
/// running by default; completed when a result record was seen; waiting when
/// both the file and the latest tool use went quiet inside the 5..60s
/// window (a tool call with no subsequent log growth for a bounded window
/// implies a pending approval prompt); idle when the file has been silent
/// for over two minutes.
///
/// Returns the status plus the waiting-for-permission flag.
pub fn infer_status(inputs: StatusInputs) -> (AgentStatus, bool) {
    let mut status = AgentStatus::Running;
    if inputs.saw_result {
        status = AgentStatus::Completed;
    }

    let mut waiting_for_permission = false;
    let since_modified = (inputs.now - inputs.modified_at).num_milliseconds();
    if since_modified > WAITING_MIN_MS
        && since_modified < WAITING_MAX_MS
        && let Some(last_tool) = inputs.last_tool_use
    {
        let since_tool = (inputs.now - last_tool).num_milliseconds();
        if since_tool > WAITING_MIN_MS && since_tool < WAITING_MAX_MS {
            status = AgentStatus::Waiting;
            waiting_for_permission = true;
        }
    }

    if since_modified > IDLE_AFTER_MS {
        status = AgentStatus::Idle;
    }

    (status, waiting_for_permission)
}

/// Whether a session file last modified at `last_seen` is too stale to
/// re-parse at all.
pub fn is_stale_session(last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    (now - last_seen).num_milliseconds() > STALE_SESSION_MS
}

/// Whether an idle or completed agent has gone stale enough to drop from
/// the registry. Agents with no recorded activities are never expired.
pub fn is_expired_agent(agent: &Agent, now: DateTime<Utc>) -> bool {
    agent.status.is_expirable()
        && agent
            .last_activity_at()
            .is_some_and(|last| is_stale_session(last, now))
}

// ─── Tests ───────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn arb_tool() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("Read"),
            Just("Edit"),
            Just("Write"),
            Just("Bash"),
            Just("Grep"),
            Just("Task"),
            Just("MysteryTool"),
        ]
    }

    /// One record line: a tool use at a second offset, a result marker, a
    /// cwd update, or garbage that should be skipped.
    fn arb_record(offset_secs: i64, tool: &str, variant: u8) -> String {
        let ts = (base_time() + chrono::Duration::seconds(offset_secs)).to_rfc3339();
        match variant % 4 {
            0 => format!(
                r#"{{"type":"assistant","timestamp":"{ts}","message":{{"content":[{{"type":"tool_use","name":"{tool}","input":{{"file_path":"/p/q/r.rs","command":"ls","pattern":"x"}}}}]}}}}"#
            ),
            1 => r#"{"type":"result"}"#.to_owned(),
            2 => format!(r#"{{"type":"system","timestamp":"{ts}","cwd":"/p/q"}}"#),
            _ => "{broken json".to_owned(),
        }
    }

    fn arb_session() -> impl Strategy<Value = String> {
        proptest::collection::vec((0i64..600, arb_tool(), any::<u8>()), 1..120).prop_map(
            |mut specs| {
                // Session logs are append-only; offsets arrive sorted.
                specs.sort_by_key(|(offset, _, _)| *offset);
                specs
                    .into_iter()
                    .map(|(offset, tool, variant)| arb_record(offset, tool, variant))
                    .collect::<Vec<_>>()
                    .join("\n")
            },
        )
    }

    proptest! {
        /// The activity list never exceeds its bound and is newest-first.
        #[test]
        fn activities_bounded_and_ordered(content in arb_session()) {
            let now = base_time() + chrono::Duration::seconds(700);
            if let Some(tail) = parse_session_tail(&content, now) {
                prop_assert!(tail.activities.len() <= MAX_ACTIVITIES);
                for pair in tail.activities.windows(2) {
                    prop_assert!(pair[0].timestamp >= pair[1].timestamp);
                }
            }
        }

        /// Re-parsing unchanged content is byte-for-byte identical.
        #[test]
        fn parse_is_idempotent(content in arb_session()) {
            let now = base_time();
            prop_assert_eq!(
                parse_session_tail(&content, now),
                parse_session_tail(&content, now)
            );
        }

        /// Waiting only ever engages inside the 5..60s double window, and
        /// over two minutes of silence always lands on idle.
        #[test]
        fn status_windows_hold(
            modified_ms_ago in 0i64..300_000,
            tool_ms_ago in proptest::option::of(0i64..300_000),
            saw_result in any::<bool>(),
        ) {
            let now = base_time();
            let (status, waiting) = infer_status(StatusInputs {
                modified_at: now - Duration::milliseconds(modified_ms_ago),
                last_tool_use: tool_ms_ago.map(|ms| now - Duration::milliseconds(ms)),
                saw_result,
                now,
            });

            let in_window = |ms: i64| ms > WAITING_MIN_MS && ms < WAITING_MAX_MS;
            let expect_waiting =
                in_window(modified_ms_ago) && tool_ms_ago.is_some_and(in_window);
            prop_assert_eq!(waiting, expect_waiting);

            if modified_ms_ago > IDLE_AFTER_MS {
                prop_assert_eq!(status, AgentStatus::Idle);
            } else if expect_waiting {
                prop_assert_eq!(status, AgentStatus::Waiting);
            } else if saw_result {
                prop_assert_eq!(status, AgentStatus::Completed);
            } else {
                prop_assert_eq!(status, AgentStatus::Running);
            }
        }
    }
}
