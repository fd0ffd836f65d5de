//! Notification policy: decides when a registry diff warrants a
//! user-visible alert and how the pending badge moves.
//!
//! Pure, testable state machine with no IO or async dependencies. The
//! daemon owns delivery; this module only produces requests.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Agent, AgentStatus};

/// Minimum gap between permission alerts for the same agent.
pub const PERMISSION_COOLDOWN_MS: i64 = 30_000;
/// Minimum gap between completion alerts for the same agent.
pub const COMPLETION_COOLDOWN_MS: i64 = 60_000;
/// A completion alert releases one pending-badge slot after this delay.
pub const COMPLETION_BADGE_DECAY_MS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Permission,
    Completion,
}

/// One alert the daemon should surface to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub kind: NotificationKind,
    pub agent_id: String,
    pub title: String,
    pub body: String,
    /// Completions are silent; permission requests play a sound.
    pub silent: bool,
}

/// Per-agent cooldown tracking plus the pending badge counter.
///
/// Cooldown entries are purged when the orchestrator expires the agent, so
/// the maps track only live ids.
#[derive(Debug, Default)]
pub struct NotificationPolicy {
    last_permission: HashMap<String, DateTime<Utc>>,
    last_completion: HashMap<String, DateTime<Utc>>,
    pending: u32,
    /// Due times for scheduled badge decrements from completion alerts.
    decrements_due: Vec<DateTime<Utc>>,
}

impl NotificationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the current registry snapshot against the previous one and
    /// emit the alerts the transitions warrant.
    ///
    /// Permission: `waiting_for_permission` rose from false/absent to true.
    /// Completion: previous status was running or waiting, current is
    /// completed. Both are gated by per-agent cooldowns.
    pub fn evaluate(
        &mut self,
        current: &[Agent],
        previous: &HashMap<String, Agent>,
        now: DateTime<Utc>,
    ) -> Vec<NotificationRequest> {
        self.apply_due_decrements(now);

        let mut requests = Vec::new();
        for agent in current {
            let prev = previous.get(&agent.id);

            if agent.waiting_for_permission
                && prev.is_none_or(|p| !p.waiting_for_permission)
                && self.cooldown_open(&self.last_permission, &agent.id, PERMISSION_COOLDOWN_MS, now)
            {
                self.last_permission.insert(agent.id.clone(), now);
                self.pending += 1;
                requests.push(permission_request(agent));
            }

            if prev.is_some_and(|p| p.status.is_visible())
                && agent.status == AgentStatus::Completed
                && self.cooldown_open(&self.last_completion, &agent.id, COMPLETION_COOLDOWN_MS, now)
            {
                self.last_completion.insert(agent.id.clone(), now);
                self.decrements_due
                    .push(now + Duration::milliseconds(COMPLETION_BADGE_DECAY_MS));
                requests.push(completion_request(agent));
            }
        }
        requests
    }

    fn cooldown_open(
        &self,
        fired: &HashMap<String, DateTime<Utc>>,
        id: &str,
        cooldown_ms: i64,
        now: DateTime<Utc>,
    ) -> bool {
        fired
            .get(id)
            .is_none_or(|last| (now - *last).num_milliseconds() >= cooldown_ms)
    }

    /// Apply any matured badge decrements. Returns true when the pending
    /// count moved.
    pub fn apply_due_decrements(&mut self, now: DateTime<Utc>) -> bool {
        let before = self.pending;
        let mut remaining = Vec::with_capacity(self.decrements_due.len());
        for due in self.decrements_due.drain(..) {
            if due <= now {
                self.pending = self.pending.saturating_sub(1);
            } else {
                remaining.push(due);
            }
        }
        self.decrements_due = remaining;
        self.pending != before
    }

    /// Earliest scheduled decrement, for the daemon's wake-up timer.
    pub fn next_decrement_due(&self) -> Option<DateTime<Utc>> {
        self.decrements_due.iter().min().copied()
    }

    pub fn pending_count(&self) -> u32 {
        self.pending
    }

    /// Reset the badge; invoked when the user views the agent list.
    pub fn clear_badge(&mut self) {
        self.pending = 0;
    }

    /// Drop cooldown state for an expired agent id.
    pub fn purge_agent(&mut self, id: &str) {
        self.last_permission.remove(id);
        self.last_completion.remove(id);
    }

    #[cfg(test)]
    fn cooldown_entries(&self) -> usize {
        self.last_permission.len() + self.last_completion.len()
    }
}

fn permission_request(agent: &Agent) -> NotificationRequest {
    let activity = agent
        .current_activity
        .as_deref()
        .unwrap_or("Waiting for permission");
    NotificationRequest {
        kind: NotificationKind::Permission,
        agent_id: agent.id.clone(),
        title: "Claude needs approval".to_owned(),
        body: format!("{}: {activity}", agent.project_name),
        silent: false,
    }
}

fn completion_request(agent: &Agent) -> NotificationRequest {
    let body = match agent.git_branch.as_deref() {
        Some(branch) => format!("{} ({branch})", agent.project_name),
        None => agent.project_name.clone(),
    };
    NotificationRequest {
        kind: NotificationKind::Completion,
        agent_id: agent.id.clone(),
        title: "Claude finished".to_owned(),
        body,
        silent: true,
    }
}

// ─── Tests ───────────────────────────────────────────────────────
