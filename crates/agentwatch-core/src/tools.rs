//! Maps tool-use log records to human-readable activity items.
//!
//! Dispatch is a closed lookup table: each row names the tools it covers,
//! the activity kind, and a pure description builder. New tools are new
//! rows, not new branches in the parser.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{ActivityItem, ActivityKind};

const BASH_PREVIEW_CHARS: usize = 40;
const PATTERN_PREVIEW_CHARS: usize = 30;

type DescribeFn = fn(&str, Option<&Value>) -> (String, Option<String>);

struct ToolRule {
    names: &'static [&'static str],
    kind: ActivityKind,
    describe: DescribeFn,
}

static TOOL_TABLE: &[ToolRule] = &[
    ToolRule {
        names: &["Read"],
        kind: ActivityKind::Read,
        describe: |_, input| describe_file_op("Reading", input),
    },
    ToolRule {
        names: &["Edit"],
        kind: ActivityKind::Edit,
        describe: |_, input| describe_file_op("Editing", input),
    },
    ToolRule {
        names: &["Write"],
        kind: ActivityKind::Write,
        describe: |_, input| describe_file_op("Creating", input),
    },
    ToolRule {
        names: &["Bash"],
        kind: ActivityKind::Bash,
        describe: |_, input| describe_command(input),
    },
    ToolRule {
        names: &["Glob", "Grep"],
        kind: ActivityKind::Search,
        describe: |_, input| describe_search(input),
    },
    ToolRule {
        names: &["Task"],
        kind: ActivityKind::Other,
        describe: |_, input| {
            let desc = input_str(input, "description")
                .map(str::to_owned)
                .unwrap_or_else(|| "Running task...".to_owned());
            (desc, None)
        },
    },
    ToolRule {
        names: &["WebFetch"],
        kind: ActivityKind::Other,
        describe: |_, _| ("Fetching web content".to_owned(), None),
    },
    ToolRule {
        names: &["WebSearch"],
        kind: ActivityKind::Other,
        describe: |_, _| ("Searching the web".to_owned(), None),
    },
];

/// Build an [`ActivityItem`] for one tool invocation.
///
/// Unknown tool names fall through to a generic "Using <name>" entry, so
/// every invocation yields an item.
pub fn activity_for_tool(
    name: &str,
    input: Option<&Value>,
    timestamp: DateTime<Utc>,
) -> ActivityItem {
    let (kind, (description, target)) = match TOOL_TABLE
        .iter()
        .find(|rule| rule.names.contains(&name))
    {
        Some(rule) => (rule.kind, (rule.describe)(name, input)),
        None => (ActivityKind::Other, (format!("Using {name}"), None)),
    };

    ActivityItem {
        id: format!("{name}-{}", timestamp.timestamp_millis()),
        kind,
        description,
        target,
        timestamp,
    }
}

fn describe_file_op(verb: &str, input: Option<&Value>) -> (String, Option<String>) {
    let path = input_str(input, "file_path");
    let description = format!("{verb} {}", shorten_path(path));
    (description, path.map(str::to_owned))
}

fn describe_command(input: Option<&Value>) -> (String, Option<String>) {
    let command = input_str(input, "command").filter(|c| !c.is_empty());
    let preview = command
        .and_then(|c| c.lines().next())
        .map(|line| take_chars(line, BASH_PREVIEW_CHARS))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "command".to_owned());
    // The ellipsis keys off the whole command, not just the first line.
    let truncated = command.is_some_and(|c| c.chars().count() > BASH_PREVIEW_CHARS);
    let description = format!("Running {preview}{}", if truncated { "..." } else { "" });
    (description, command.map(str::to_owned))
}

fn describe_search(input: Option<&Value>) -> (String, Option<String>) {
    let pattern = input_str(input, "pattern").filter(|p| !p.is_empty());
    let preview = pattern
        .map(|p| take_chars(p, PATTERN_PREVIEW_CHARS))
        .unwrap_or_else(|| "files".to_owned());
    (format!("Searching for {preview}"), pattern.map(str::to_owned))
}

fn input_str<'a>(input: Option<&'a Value>, key: &str) -> Option<&'a str> {
    input.and_then(|v| v.get(key)).and_then(Value::as_str)
}

/// Show short paths whole; otherwise only the last two segments.
pub fn shorten_path(path: Option<&str>) -> String {
    let Some(path) = path.filter(|p| !p.is_empty()) else {
        return "file".to_owned();
    };
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        return path.to_owned();
    }
    parts[parts.len() - 2..].join("/")
}

fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
    }

    #[test]
    fn read_maps_to_shortened_path() {
        let input = json!({"file_path": "/Users/x/proj/src/a.ts"});
        let item = activity_for_tool("Read", Some(&input), ts());
        assert_eq!(item.kind, ActivityKind::Read);
        assert_eq!(item.description, "Reading src/a.ts");
        assert_eq!(item.target.as_deref(), Some("/Users/x/proj/src/a.ts"));
        assert_eq!(item.id, "Read-1700000000000");
    }

    #[test]
    fn edit_and_write_verbs() {
        let input = json!({"file_path": "/tmp/notes.md"});
        let edit = activity_for_tool("Edit", Some(&input), ts());
        assert_eq!(edit.description, "Editing tmp/notes.md");
        let write = activity_for_tool("Write", Some(&input), ts());
        assert_eq!(write.kind, ActivityKind::Write);
        assert_eq!(write.description, "Creating tmp/notes.md");
    }

    #[test]
    fn missing_file_path_falls_back() {
        let item = activity_for_tool("Read", None, ts());
        assert_eq!(item.description, "Reading file");
        assert_eq!(item.target, None);
    }

    #[test]
    fn bash_short_command_untruncated() {
        let input = json!({"command": "ls -la"});
        let item = activity_for_tool("Bash", Some(&input), ts());
        assert_eq!(item.kind, ActivityKind::Bash);
        assert_eq!(item.description, "Running ls -la");
    }

    #[test]
    fn bash_long_command_truncated_with_ellipsis() {
        let long = "a".repeat(41);
        let input = json!({ "command": long });
        let item = activity_for_tool("Bash", Some(&input), ts());
        assert_eq!(item.description, format!("Running {}...", "a".repeat(40)));
    }

    #[test]
    fn bash_exactly_forty_chars_no_ellipsis() {
        let cmd = "b".repeat(40);
        let input = json!({ "command": cmd });
        let item = activity_for_tool("Bash", Some(&input), ts());
        assert_eq!(item.description, format!("Running {}", "b".repeat(40)));
    }

    #[test]
    fn bash_multiline_shows_first_line_but_counts_whole() {
        // First line is short; the ellipsis still appears because the whole
        // command is longer than the preview budget.
        let input = json!({"command": "make build\n&& make test && make deploy && make verify"});
        let item = activity_for_tool("Bash", Some(&input), ts());
        assert_eq!(item.description, "Running make build...");
    }

    #[test]
    fn bash_missing_command_placeholder() {
        let item = activity_for_tool("Bash", None, ts());
        assert_eq!(item.description, "Running command");
        let empty = json!({"command": ""});
        let item = activity_for_tool("Bash", Some(&empty), ts());
        assert_eq!(item.description, "Running command");
    }

    #[test]
    fn glob_and_grep_share_search_kind() {
        let input = json!({"pattern": "**/*.rs"});
        for tool in ["Glob", "Grep"] {
            let item = activity_for_tool(tool, Some(&input), ts());
            assert_eq!(item.kind, ActivityKind::Search);
            assert_eq!(item.description, "Searching for **/*.rs");
        }
    }

    #[test]
    fn search_pattern_truncated_at_thirty() {
        let pattern = "x".repeat(35);
        let input = json!({ "pattern": pattern });
        let item = activity_for_tool("Grep", Some(&input), ts());
        assert_eq!(
            item.description,
            format!("Searching for {}", "x".repeat(30))
        );
    }

    #[test]
    fn search_without_pattern_defaults_to_files() {
        let item = activity_for_tool("Glob", None, ts());
        assert_eq!(item.description, "Searching for files");
    }

    #[test]
    fn task_uses_own_description() {
        let input = json!({"description": "Explore the repo"});
        let item = activity_for_tool("Task", Some(&input), ts());
        assert_eq!(item.description, "Explore the repo");
        assert_eq!(item.kind, ActivityKind::Other);

        let item = activity_for_tool("Task", None, ts());
        assert_eq!(item.description, "Running task...");
    }

    #[test]
    fn web_tools_fixed_text() {
        assert_eq!(
            activity_for_tool("WebFetch", None, ts()).description,
            "Fetching web content"
        );
        assert_eq!(
            activity_for_tool("WebSearch", None, ts()).description,
            "Searching the web"
        );
    }

    #[test]
    fn unknown_tool_generic_entry() {
        let item = activity_for_tool("NotebookEdit", None, ts());
        assert_eq!(item.kind, ActivityKind::Other);
        assert_eq!(item.description, "Using NotebookEdit");
        assert_eq!(item.id, "NotebookEdit-1700000000000");
    }

    #[test]
    fn shorten_path_rules() {
        assert_eq!(shorten_path(Some("a.ts")), "a.ts");
        assert_eq!(shorten_path(Some("src/a.ts")), "src/a.ts");
        assert_eq!(shorten_path(Some("/a.ts")), "/a.ts");
        assert_eq!(shorten_path(Some("/Users/x/proj/src/a.ts")), "src/a.ts");
        assert_eq!(shorten_path(None), "file");
        assert_eq!(shorten_path(Some("")), "file");
    }
}
