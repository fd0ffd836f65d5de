use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentwatch_core::settings::Settings;
use agentwatch_core::types::{Agent, PortInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{RwLock, broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{DaemonEvent, OrchestratorCommand};
use crate::settings::save_settings;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Thread-safe handle to daemon state shared between the orchestrator and server.
pub type SharedState = Arc<RwLock<DaemonState>>;

/// Published snapshot, owned by the orchestrator and read by the server.
///
/// `agents` holds only externally-visible agents in display order.
#[derive(Debug, Default)]
pub struct DaemonState {
    pub agents: Vec<Agent>,
    pub ports: Vec<PortInfo>,
    pub pending: u32,
    pub last_tick: Option<DateTime<Utc>>,
}

/// Compact answer for `get_status` and the status CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub agents: Vec<Agent>,
    pub ports: Vec<PortInfo>,
    pub pending: u32,
    pub last_tick: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// JSON-RPC types (newline-delimited JSON)
// ---------------------------------------------------------------------------

fn default_jsonrpc() -> String {
    "2.0".into()
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

/// Server-initiated push (no `id`).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

fn ok_response(id: Option<u64>, result: serde_json::Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: Some(result),
        error: None,
    }
}

fn err_response(id: Option<u64>, code: i32, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(JsonRpcError { code, message }),
    }
}

// ---------------------------------------------------------------------------
// Request params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KillAgentParams {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
struct KillPortParams {
    pid: u32,
}

#[derive(Debug, Deserialize)]
struct SetSettingParams {
    key: String,
    value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// DaemonServer
// ---------------------------------------------------------------------------

/// Unix-socket server that exposes the daemon API to local clients.
///
/// Protocol: Newline-delimited JSON over Unix stream sockets.
///
/// Supported methods:
///   - `get_agents`     -- current visible agent list
///   - `refresh_agents` -- force a scan tick, then return the agent list
///   - `kill_agent`     -- SIGTERM the process behind an agent
///   - `get_ports`      -- current whitelisted listening ports
///   - `kill_port`      -- SIGTERM the process owning a listening port
///   - `get_status`     -- full snapshot including the pending badge
///   - `get_settings` / `set_setting`
///   - `clear_badge`    -- reset the pending-notification counter
///   - `subscribe`      -- opt into push notifications on this connection
pub struct DaemonServer {
    socket_path: PathBuf,
    state: SharedState,
    settings: Arc<RwLock<Settings>>,
    settings_path: PathBuf,
    command_tx: mpsc::Sender<OrchestratorCommand>,
    event_tx: broadcast::Sender<DaemonEvent>,
    /// Cancellation token for graceful shutdown.
    cancel: CancellationToken,
}

impl DaemonServer {
    #[allow(clippy::too_many_arguments)]
    pub fn with_cancel(
        socket_path: impl Into<PathBuf>,
        state: SharedState,
        settings: Arc<RwLock<Settings>>,
        settings_path: impl Into<PathBuf>,
        command_tx: mpsc::Sender<OrchestratorCommand>,
        event_tx: broadcast::Sender<DaemonEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            state,
            settings,
            settings_path: settings_path.into(),
            command_tx,
            event_tx,
            cancel,
        }
    }

    /// Run the server: bind the listener and accept connections until
    /// cancelled or a fatal listener error occurs.
    pub async fn run(self) -> std::io::Result<()> {
        // Ensure parent directory exists.
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Clean up stale socket file from a previous run.
        cleanup_socket(&self.socket_path).await;

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(path = %self.socket_path.display(), "daemon server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let ctx = ClientContext {
                                state: Arc::clone(&self.state),
                                settings: Arc::clone(&self.settings),
                                settings_path: self.settings_path.clone(),
                                command_tx: self.command_tx.clone(),
                            };
                            let event_rx = self.event_tx.subscribe();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, ctx, event_rx).await {
                                    tracing::debug!(error = %e, "client handler finished with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept failed");
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("daemon server: cancellation requested, shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-client handler
// ---------------------------------------------------------------------------

/// Handles shared by every client connection.
struct ClientContext {
    state: SharedState,
    settings: Arc<RwLock<Settings>>,
    settings_path: PathBuf,
    command_tx: mpsc::Sender<OrchestratorCommand>,
}

async fn handle_client(
    stream: UnixStream,
    ctx: ClientContext,
    mut event_rx: broadcast::Receiver<DaemonEvent>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    tracing::debug!("client connected");

    let mut subscribed = false;

    loop {
        tokio::select! {
            // --- incoming request from client ---
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => {
                        tracing::debug!("client disconnected (EOF)");
                        return Ok(());
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "read error, dropping client");
                        return Err(e);
                    }
                };

                let req: JsonRpcRequest = match serde_json::from_str(&line) {
                    Ok(r) => r,
                    Err(e) => {
                        let resp = err_response(None, -32700, format!("parse error: {e}"));
                        write_json(&mut writer, &resp).await?;
                        continue;
                    }
                };

                tracing::debug!(method = %req.method, id = ?req.id, "request received");

                if req.method == "subscribe" {
                    subscribed = true;
                    let resp = ok_response(req.id, serde_json::json!({ "subscribed": true }));
                    write_json(&mut writer, &resp).await?;
                    continue;
                }

                let resp = handle_request(&ctx, req).await;
                write_json(&mut writer, &resp).await?;
            }

            // --- push event from orchestrator ---
            event = event_rx.recv() => {
                let event = match event {
                    Ok(e) => e,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "client lagged, dropped events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("event channel closed, dropping client");
                        return Ok(());
                    }
                };

                if subscribed {
                    let notif = event_to_push(&event);
                    if let Err(e) = write_json(&mut writer, &notif).await {
                        tracing::debug!(error = %e, "failed to push event, dropping client");
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Dispatch one request. Every arm produces a response; command-channel
/// failures surface as internal errors rather than dropped requests.
async fn handle_request(ctx: &ClientContext, req: JsonRpcRequest) -> JsonRpcResponse {
    match req.method.as_str() {
        "get_agents" => {
            let agents = ctx.state.read().await.agents.clone();
            ok_response(req.id, serde_json::json!({ "agents": agents }))
        }

        "refresh_agents" => {
            let (reply_tx, reply_rx) = oneshot::channel();
            let _ = ctx
                .command_tx
                .send(OrchestratorCommand::Refresh { reply: reply_tx })
                .await;
            match reply_rx.await {
                Ok(agents) => ok_response(req.id, serde_json::json!({ "agents": agents })),
                Err(_) => internal_error(req.id),
            }
        }

        "kill_agent" => {
            let params: KillAgentParams = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return invalid_params(req.id, &e),
            };
            let (reply_tx, reply_rx) = oneshot::channel();
            let _ = ctx
                .command_tx
                .send(OrchestratorCommand::KillAgent {
                    agent_id: params.agent_id,
                    reply: reply_tx,
                })
                .await;
            match reply_rx.await {
                Ok(killed) => ok_response(req.id, serde_json::json!({ "killed": killed })),
                Err(_) => internal_error(req.id),
            }
        }

        "get_ports" => {
            let ports = ctx.state.read().await.ports.clone();
            ok_response(req.id, serde_json::json!({ "ports": ports }))
        }

        "kill_port" => {
            let params: KillPortParams = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return invalid_params(req.id, &e),
            };
            let (reply_tx, reply_rx) = oneshot::channel();
            let _ = ctx
                .command_tx
                .send(OrchestratorCommand::KillPort {
                    pid: params.pid,
                    reply: reply_tx,
                })
                .await;
            match reply_rx.await {
                Ok(killed) => ok_response(req.id, serde_json::json!({ "killed": killed })),
                Err(_) => internal_error(req.id),
            }
        }

        "get_status" => {
            let summary = {
                let s = ctx.state.read().await;
                StatusSummary {
                    agents: s.agents.clone(),
                    ports: s.ports.clone(),
                    pending: s.pending,
                    last_tick: s.last_tick,
                }
            };
            match serde_json::to_value(&summary) {
                Ok(value) => ok_response(req.id, value),
                Err(_) => internal_error(req.id),
            }
        }

        "get_settings" => {
            let settings = ctx.settings.read().await.clone();
            match serde_json::to_value(&settings) {
                Ok(value) => ok_response(req.id, value),
                Err(_) => internal_error(req.id),
            }
        }

        "set_setting" => {
            let params: SetSettingParams = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return invalid_params(req.id, &e),
            };
            let mut settings = ctx.settings.write().await;
            if let Err(e) = settings.set(&params.key, &params.value) {
                return err_response(req.id, -32602, e.to_string());
            }
            if let Err(e) = save_settings(&ctx.settings_path, &settings).await {
                tracing::warn!(error = %e, "failed to persist settings");
            }
            ok_response(req.id, serde_json::json!({ "ok": true }))
        }

        "clear_badge" => {
            let _ = ctx.command_tx.send(OrchestratorCommand::ClearBadge).await;
            ok_response(req.id, serde_json::json!({ "ok": true }))
        }

        _ => err_response(
            req.id,
            -32601,
            format!("method not found: {}", req.method),
        ),
    }
}

fn invalid_params(id: Option<u64>, e: &serde_json::Error) -> JsonRpcResponse {
    err_response(id, -32602, format!("invalid params: {e}"))
}

fn internal_error(id: Option<u64>) -> JsonRpcResponse {
    err_response(id, -32603, "daemon unavailable".into())
}

// ---------------------------------------------------------------------------
// Event mapping
// ---------------------------------------------------------------------------

/// Map an orchestrator event to the JSON-RPC push sent to subscribers.
fn event_to_push(event: &DaemonEvent) -> JsonRpcNotification {
    let (method, params) = match event {
        DaemonEvent::AgentsUpdated(agents) => {
            ("agents_updated", serde_json::json!({ "agents": agents }))
        }
        DaemonEvent::PortsUpdated(ports) => {
            ("ports_updated", serde_json::json!({ "ports": ports }))
        }
        DaemonEvent::Notification(request) => (
            "notification",
            serde_json::to_value(request).unwrap_or_default(),
        ),
        DaemonEvent::Badge(pending) => ("badge", serde_json::json!({ "pending": pending })),
    };
    JsonRpcNotification {
        jsonrpc: "2.0".into(),
        method: method.into(),
        params,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialize a value as a single JSON line terminated by `\n` and flush.
async fn write_json<T: Serialize>(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    value: &T,
) -> std::io::Result<()> {
    let mut buf = serde_json::to_vec(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    buf.push(b'\n');
    writer.write_all(&buf).await?;
    writer.flush().await
}

/// Remove a stale socket file if it exists.
pub async fn cleanup_socket(path: &Path) {
    if path.exists() {
        tracing::info!(path = %path.display(), "removing stale socket");
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "failed to remove stale socket"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
