//! End-to-end inference over a realistic session tail: records in, status
//! and activities out, with the project name derived from the log itself.

use agentwatch_core::paths::{decode_project_dir, project_name};
use agentwatch_core::session::{StatusInputs, infer_status, parse_session_tail};
use agentwatch_core::types::{ActivityKind, AgentStatus};
use chrono::{DateTime, Duration, Utc};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

#[test]
fn completed_session_with_edit() {
    // Three records: a system record naming the cwd, an Edit tool use at T,
    // and a result record at T+2s. The file's mtime is T+2s and the scan
    // happens at T+3s.
    let t = t0();
    let content = format!(
        "{}\n{}\n{}",
        r#"{"type":"system","cwd":"/Users/x/proj"}"#,
        format!(
            r#"{{"type":"assistant","timestamp":"{}","message":{{"content":[{{"type":"tool_use","name":"Edit","input":{{"file_path":"/Users/x/proj/src/a.ts"}}}}]}}}}"#,
            t.to_rfc3339()
        ),
        format!(r#"{{"type":"result","timestamp":"{}"}}"#, (t + Duration::seconds(2)).to_rfc3339()),
    );

    let scanned_at = t + Duration::seconds(3);
    let tail = parse_session_tail(&content, scanned_at).expect("records present");

    assert_eq!(tail.working_dir.as_deref(), Some("/Users/x/proj"));
    assert_eq!(tail.current_activity, "Task completed");
    assert!(tail.saw_result);
    assert_eq!(tail.activities.len(), 1);
    assert_eq!(tail.activities[0].kind, ActivityKind::Edit);
    assert_eq!(tail.activities[0].description, "Editing src/a.ts");
    assert_eq!(tail.activities[0].timestamp, t);

    let (status, waiting) = infer_status(StatusInputs {
        modified_at: t + Duration::seconds(2),
        last_tool_use: tail.last_tool_use,
        saw_result: tail.saw_result,
        now: scanned_at,
    });
    assert_eq!(status, AgentStatus::Completed);
    assert!(!waiting);

    assert_eq!(project_name(tail.working_dir.as_deref().unwrap()), "proj");
}

#[test]
fn encoded_dir_fallback_when_no_cwd_record() {
    // Without a cwd record the working directory comes from the encoded
    // project directory name.
    let content = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","name":"Bash","input":{"command":"cargo check"}}]}}"#;
    let tail = parse_session_tail(content, t0()).expect("records present");
    assert_eq!(tail.working_dir, None);

    let fallback = decode_project_dir("-Users-x-proj");
    assert_eq!(fallback, "/Users/x/proj");
    assert_eq!(project_name(&fallback), "proj");
    assert_eq!(tail.current_activity, "Running cargo check");
}

#[test]
fn stuck_tool_call_reads_as_waiting() {
    // A tool call eight seconds ago with no log growth since lands inside
    // the waiting window on both clocks.
    let t = t0();
    let tool_at = t - Duration::seconds(8);
    let content = format!(
        r#"{{"type":"assistant","timestamp":"{}","message":{{"content":[{{"type":"tool_use","name":"Bash","input":{{"command":"rm -rf build"}}}}]}}}}"#,
        tool_at.to_rfc3339()
    );
    let tail = parse_session_tail(&content, t).expect("records present");

    let (status, waiting) = infer_status(StatusInputs {
        modified_at: tool_at,
        last_tool_use: tail.last_tool_use,
        saw_result: tail.saw_result,
        now: t,
    });
    assert_eq!(status, AgentStatus::Waiting);
    assert!(waiting);
    assert_eq!(tail.current_activity, "Running rm -rf build");
}
