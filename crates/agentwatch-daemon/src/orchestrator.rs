use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentwatch_core::notify::{NotificationPolicy, NotificationRequest};
use agentwatch_core::ports::{apply_whitelist, ports_changed};
use agentwatch_core::session::is_expired_agent;
use agentwatch_core::settings::Settings;
use agentwatch_core::types::{Agent, PortInfo, visible_sorted};
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::portscan::scan_listen_ports;
use crate::processes::{claude_pid_by_cwd, scan_peers};
use crate::server::SharedState;
use crate::sessions::scan_sessions;

/// Delay between a delivered SIGTERM and the follow-up scan that picks up
/// the process's disappearance.
const KILL_RESCAN_DELAY: Duration = Duration::from_millis(500);

/// Requests forwarded from server clients to the orchestrator.
#[derive(Debug)]
pub enum OrchestratorCommand {
    /// Force a scan tick and reply with the fresh visible agent list.
    Refresh { reply: oneshot::Sender<Vec<Agent>> },
    KillAgent {
        agent_id: String,
        reply: oneshot::Sender<bool>,
    },
    KillPort {
        pid: u32,
        reply: oneshot::Sender<bool>,
    },
    ClearBadge,
}

/// Events broadcast to subscribed clients.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    /// Visible agents in display order, sent every completed tick.
    AgentsUpdated(Vec<Agent>),
    /// Whitelisted listening ports, sent only when the set changed.
    PortsUpdated(Vec<PortInfo>),
    Notification(NotificationRequest),
    /// New pending-notification badge count.
    Badge(u32),
}

/// Owns the agent registry and drives the scan loop.
///
/// One task runs the loop; the server reaches in only through the command
/// channel and the shared snapshot, so no registry lock exists.
pub struct Orchestrator {
    projects_dir: PathBuf,
    settings: Arc<RwLock<Settings>>,
    /// Registry in insertion order; identity is `Agent::id`.
    agents: Vec<Agent>,
    ports: BTreeMap<u16, PortInfo>,
    policy: NotificationPolicy,
    /// Last badge count pushed to clients.
    published_pending: u32,
    command_rx: mpsc::Receiver<OrchestratorCommand>,
    /// Scan nudges from the filesystem watcher and kill follow-ups.
    scan_rx: mpsc::Receiver<()>,
    scan_tx: mpsc::Sender<()>,
    event_tx: broadcast::Sender<DaemonEvent>,
    /// Snapshot written here after every tick, read by the server.
    shared: SharedState,
    cancel: CancellationToken,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn with_cancel(
        projects_dir: impl Into<PathBuf>,
        settings: Arc<RwLock<Settings>>,
        command_rx: mpsc::Receiver<OrchestratorCommand>,
        scan_tx: mpsc::Sender<()>,
        scan_rx: mpsc::Receiver<()>,
        event_tx: broadcast::Sender<DaemonEvent>,
        shared: SharedState,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            settings,
            agents: Vec::new(),
            ports: BTreeMap::new(),
            policy: NotificationPolicy::new(),
            published_pending: 0,
            command_rx,
            scan_rx,
            scan_tx,
            event_tx,
            shared,
            cancel,
        }
    }

    /// Main scan loop. Runs until cancelled.
    ///
    /// The interval timer re-arms after each tick completes, so a slow scan
    /// never stacks ticks. Watcher nudges and refresh commands tick early;
    /// either way the timer restarts from the tick that just ran.
    pub async fn run(&mut self) {
        info!(projects = %self.projects_dir.display(), "orchestrator: scan loop started");
        self.tick().await;
        loop {
            let period = self.settings.read().await.scan_period();
            let tick_due = tokio::time::sleep(period);
            tokio::pin!(tick_due);

            loop {
                tokio::select! {
                    _ = &mut tick_due => {
                        self.tick().await;
                        break;
                    }
                    _ = self.scan_rx.recv() => {
                        debug!("scan nudge received");
                        self.tick().await;
                        break;
                    }
                    Some(command) = self.command_rx.recv() => {
                        if self.handle_command(command).await {
                            break;
                        }
                    }
                    _ = wait_until(self.policy.next_decrement_due()) => {
                        if self.policy.apply_due_decrements(Utc::now()) {
                            self.publish_badge();
                        }
                    }
                    _ = self.cancel.cancelled() => {
                        info!("orchestrator: cancellation requested, shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// Handle one client command. Returns true when a tick ran, meaning the
    /// interval timer should re-arm.
    async fn handle_command(&mut self, command: OrchestratorCommand) -> bool {
        match command {
            OrchestratorCommand::Refresh { reply } => {
                self.tick().await;
                let _ = reply.send(visible_sorted(self.agents.clone()));
                true
            }
            OrchestratorCommand::KillAgent { agent_id, reply } => {
                let _ = reply.send(self.kill_agent(&agent_id));
                false
            }
            OrchestratorCommand::KillPort { pid, reply } => {
                let _ = reply.send(self.kill_pid(pid));
                false
            }
            OrchestratorCommand::ClearBadge => {
                self.policy.clear_badge();
                self.publish_badge();
                false
            }
        }
    }

    /// One full scan pass: expiry, process map, session and peer scans,
    /// port refresh, notification evaluation, publication.
    async fn tick(&mut self) {
        let now = Utc::now();
        self.expire_agents(now);
        let previous: HashMap<String, Agent> = self
            .agents
            .iter()
            .map(|a| (a.id.clone(), a.clone()))
            .collect();

        let pid_by_cwd = claude_pid_by_cwd().await;
        let (sessions, peers) =
            tokio::join!(scan_sessions(&self.projects_dir, &pid_by_cwd), scan_peers());
        self.commit_sessions(sessions);
        self.commit_peers(peers);

        let whitelist = self.settings.read().await.port_whitelist.clone();
        let scanned = scan_listen_ports().await;
        self.commit_ports(scanned, &whitelist);

        for request in self.policy.evaluate(&self.agents, &previous, now) {
            info!(agent = %request.agent_id, kind = ?request.kind, "notification");
            // Ignore send errors; no subscribers is fine.
            let _ = self.event_tx.send(DaemonEvent::Notification(request));
        }
        self.publish_badge();

        let visible = visible_sorted(self.agents.clone());
        let _ = self.event_tx.send(DaemonEvent::AgentsUpdated(visible.clone()));
        self.sync_shared(visible, now);
    }

    /// Drop idle/completed agents whose last activity went stale, along
    /// with their notification cooldowns.
    fn expire_agents(&mut self, now: DateTime<Utc>) {
        let mut expired = Vec::new();
        self.agents.retain(|agent| {
            if is_expired_agent(agent, now) {
                expired.push(agent.id.clone());
                false
            } else {
                true
            }
        });
        for id in &expired {
            debug!(agent = %id, "expiring stale agent");
            self.policy.purge_agent(id);
        }
    }

    /// Merge freshly-scanned session agents into the registry. An existing
    /// entry is replaced wholesale except for `started_at`, which keeps its
    /// first-observed value.
    fn commit_sessions(&mut self, scanned: Vec<Agent>) {
        for mut agent in scanned {
            if let Some(existing) = self.agents.iter_mut().find(|a| a.id == agent.id) {
                agent.started_at = existing.started_at;
                *existing = agent;
            } else {
                self.agents.push(agent);
            }
        }
    }

    /// Merge peer-process agents. First observation wins: a known id keeps
    /// its original entry so the start time and activity stay stable.
    fn commit_peers(&mut self, scanned: Vec<Agent>) {
        for agent in scanned {
            if !self.agents.iter().any(|a| a.id == agent.id) {
                self.agents.push(agent);
            }
        }
    }

    /// Replace the port registry when the whitelisted set changed. A failed
    /// or empty scan clears previously-published ports the same way.
    fn commit_ports(&mut self, scanned: BTreeMap<u16, PortInfo>, whitelist: &[u16]) {
        let filtered = apply_whitelist(scanned, whitelist);
        if ports_changed(&self.ports, &filtered) {
            self.ports = filtered;
            let ports: Vec<PortInfo> = self.ports.values().cloned().collect();
            debug!(count = ports.len(), "listening ports changed");
            let _ = self.event_tx.send(DaemonEvent::PortsUpdated(ports));
        }
    }

    fn kill_agent(&self, agent_id: &str) -> bool {
        let Some(agent) = self.agents.iter().find(|a| a.id == agent_id) else {
            warn!(agent = %agent_id, "kill requested for unknown agent");
            return false;
        };
        let Some(pid) = agent.pid else {
            warn!(agent = %agent_id, "kill requested for agent with no pid");
            return false;
        };
        self.kill_pid(pid)
    }

    /// SIGTERM, fire and forget. A successful delivery schedules a follow-up
    /// scan so the registry reflects the exit promptly.
    fn kill_pid(&self, pid: u32) -> bool {
        let delivered = unsafe { libc::kill(pid as i32, libc::SIGTERM) } == 0;
        if delivered {
            info!(pid, "sent SIGTERM");
            let scan_tx = self.scan_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(KILL_RESCAN_DELAY).await;
                let _ = scan_tx.try_send(());
            });
        } else {
            warn!(pid, "SIGTERM delivery failed");
        }
        delivered
    }

    /// Push the badge count when it moved, and mirror it into the shared
    /// snapshot so `get_status` agrees with what clients saw.
    fn publish_badge(&mut self) {
        let pending = self.policy.pending_count();
        if pending == self.published_pending {
            return;
        }
        self.published_pending = pending;
        let _ = self.event_tx.send(DaemonEvent::Badge(pending));
        if let Ok(mut state) = self.shared.try_write() {
            state.pending = pending;
        }
    }

    fn sync_shared(&self, visible: Vec<Agent>, now: DateTime<Utc>) {
        // try_write keeps the loop from blocking on a reading client; the
        // next tick re-syncs on contention.
        match self.shared.try_write() {
            Ok(mut state) => {
                state.agents = visible;
                state.ports = self.ports.values().cloned().collect();
                state.pending = self.published_pending;
                state.last_tick = Some(now);
            }
            Err(_) => {
                debug!("shared state write lock contended, will sync next tick");
            }
        }
    }
}

/// Sleep until `due`, or forever when nothing is scheduled.
async fn wait_until(due: Option<DateTime<Utc>>) {
    match due {
        Some(due) => {
            let delta = (due - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(delta).await;
        }
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
