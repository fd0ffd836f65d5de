//! Filesystem watch on the projects directory.
//!
//! Session log appends arrive in bursts, so the watcher only nudges the
//! orchestrator through a capacity-1 channel; a nudge that finds the
//! channel full coalesces into the scan already pending.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Keeps the underlying watcher alive; dropping this stops the watch.
pub struct ProjectsWatcher {
    _watcher: RecommendedWatcher,
}

/// Start watching `dir` recursively, nudging `trigger_tx` on session-file
/// changes.
pub fn spawn_watcher(
    dir: &Path,
    trigger_tx: mpsc::Sender<()>,
) -> notify::Result<ProjectsWatcher> {
    let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
        match result {
            Ok(event) if is_session_change(&event) => {
                // Full channel means a scan is already queued.
                let _ = trigger_tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "watch error");
            }
        }
    })?;
    watcher.watch(dir, RecursiveMode::Recursive)?;
    tracing::info!(path = %dir.display(), "watching projects directory");
    Ok(ProjectsWatcher { _watcher: watcher })
}

/// Creation or modification touching at least one `.jsonl` file.
fn is_session_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.extension().and_then(|e| e.to_str()) == Some("jsonl"))
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(path.into())
    }

    #[test]
    fn session_file_create_and_modify_trigger() {
        assert!(is_session_change(&event(
            EventKind::Create(CreateKind::File),
            "/p/-Users-x-proj/abc.jsonl",
        )));
        assert!(is_session_change(&event(
            EventKind::Modify(ModifyKind::Any),
            "/p/-Users-x-proj/abc.jsonl",
        )));
    }

    #[test]
    fn non_session_paths_ignored() {
        assert!(!is_session_change(&event(
            EventKind::Modify(ModifyKind::Any),
            "/p/-Users-x-proj/notes.txt",
        )));
        assert!(!is_session_change(&Event::new(EventKind::Modify(
            ModifyKind::Any
        ))));
    }

    #[test]
    fn removals_ignored() {
        assert!(!is_session_change(&event(
            EventKind::Remove(RemoveKind::File),
            "/p/-Users-x-proj/abc.jsonl",
        )));
    }

    #[test]
    fn full_trigger_channel_coalesces() {
        let (tx, mut rx) = mpsc::channel::<()>(1);
        tx.try_send(()).unwrap();
        // A second nudge is dropped rather than queued.
        assert!(tx.try_send(()).is_err());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
