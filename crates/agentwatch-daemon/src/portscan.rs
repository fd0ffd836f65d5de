//! Listening-socket snapshot via `lsof`.
//!
//! `lsof -i` exits with status 1 when nothing is listening; that is a
//! normal empty result, not a failure, so the parse runs over whatever
//! stdout came back.

use std::collections::BTreeMap;

use agentwatch_core::ports::parse_listen_output;
use agentwatch_core::types::PortInfo;

use crate::processes::run_command;

/// Snapshot all listening TCP sockets, keyed by port.
pub async fn scan_listen_ports() -> BTreeMap<u16, PortInfo> {
    match run_command("lsof", &["-i", "-P", "-n", "-sTCP:LISTEN"]).await {
        Some(stdout) => parse_listen_output(&stdout),
        None => BTreeMap::new(),
    }
}
