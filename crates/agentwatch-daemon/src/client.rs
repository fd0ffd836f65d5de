use std::path::Path;

use agentwatch_core::settings::Settings;
use agentwatch_core::types::{Agent, PortInfo};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::server::StatusSummary;

/// Client for the agentwatch daemon JSON-RPC Unix socket API.
pub struct DaemonClient {
    stream: BufReader<UnixStream>,
    next_id: u64,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("daemon error: {0}")]
    Daemon(String),
    #[error("missing result in response")]
    MissingResult,
    #[error("daemon closed the connection")]
    Disconnected,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    result: Option<Value>,
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[allow(dead_code)]
    code: i32,
    message: String,
}

/// Server push as received off the wire.
#[derive(Debug, Deserialize)]
pub struct DaemonPush {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Deserialize)]
struct AgentsResult {
    agents: Vec<Agent>,
}

#[derive(Debug, Deserialize)]
struct PortsResult {
    ports: Vec<PortInfo>,
}

#[derive(Debug, Deserialize)]
struct KilledResult {
    killed: bool,
}

/// Parse a raw JSON-RPC response line down to its `result` value.
///
/// Extracted from `DaemonClient::call` so it can be unit-tested without a
/// live socket connection.
fn parse_response(line: &str) -> Result<Value, ClientError> {
    let resp: WireResponse = serde_json::from_str(line)?;
    if let Some(err) = resp.error {
        return Err(ClientError::Daemon(err.message));
    }
    resp.result.ok_or(ClientError::MissingResult)
}

impl DaemonClient {
    /// Connect to the daemon at the given Unix socket path.
    pub async fn connect(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self {
            stream: BufReader::new(stream),
            next_id: 1,
        })
    }

    /// One request/response round trip as a newline-delimited JSON line.
    async fn call(&mut self, method: &str, params: Value) -> Result<Value, ClientError> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id,
            "method": method,
            "params": params,
        });
        self.next_id += 1;

        let mut buf = serde_json::to_vec(&request)?;
        buf.push(b'\n');
        let writer = self.stream.get_mut();
        writer.write_all(&buf).await?;
        writer.flush().await?;

        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(ClientError::Disconnected);
        }
        parse_response(&line)
    }

    /// Current visible agent list.
    pub async fn get_agents(&mut self) -> Result<Vec<Agent>, ClientError> {
        let result = self.call("get_agents", serde_json::json!({})).await?;
        let parsed: AgentsResult = serde_json::from_value(result)?;
        Ok(parsed.agents)
    }

    /// Force a scan tick and return the fresh agent list.
    pub async fn refresh_agents(&mut self) -> Result<Vec<Agent>, ClientError> {
        let result = self.call("refresh_agents", serde_json::json!({})).await?;
        let parsed: AgentsResult = serde_json::from_value(result)?;
        Ok(parsed.agents)
    }

    pub async fn kill_agent(&mut self, agent_id: &str) -> Result<bool, ClientError> {
        let result = self
            .call("kill_agent", serde_json::json!({ "agentId": agent_id }))
            .await?;
        let parsed: KilledResult = serde_json::from_value(result)?;
        Ok(parsed.killed)
    }

    pub async fn get_ports(&mut self) -> Result<Vec<PortInfo>, ClientError> {
        let result = self.call("get_ports", serde_json::json!({})).await?;
        let parsed: PortsResult = serde_json::from_value(result)?;
        Ok(parsed.ports)
    }

    pub async fn kill_port(&mut self, pid: u32) -> Result<bool, ClientError> {
        let result = self.call("kill_port", serde_json::json!({ "pid": pid })).await?;
        let parsed: KilledResult = serde_json::from_value(result)?;
        Ok(parsed.killed)
    }

    pub async fn get_status(&mut self) -> Result<StatusSummary, ClientError> {
        let result = self.call("get_status", serde_json::json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_settings(&mut self) -> Result<Settings, ClientError> {
        let result = self.call("get_settings", serde_json::json!({})).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn set_setting(&mut self, key: &str, value: Value) -> Result<(), ClientError> {
        self.call("set_setting", serde_json::json!({ "key": key, "value": value }))
            .await?;
        Ok(())
    }

    pub async fn clear_badge(&mut self) -> Result<(), ClientError> {
        self.call("clear_badge", serde_json::json!({})).await?;
        Ok(())
    }

    /// Opt this connection into push events.
    pub async fn subscribe(&mut self) -> Result<(), ClientError> {
        self.call("subscribe", serde_json::json!({})).await?;
        Ok(())
    }

    /// Block until the next push arrives. Only meaningful after
    /// [`DaemonClient::subscribe`].
    pub async fn next_event(&mut self) -> Result<DaemonPush, ClientError> {
        let mut line = String::new();
        if self.stream.read_line(&mut line).await? == 0 {
            return Err(ClientError::Disconnected);
        }
        Ok(serde_json::from_str(&line)?)
    }
}
