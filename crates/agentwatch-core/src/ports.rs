//! Listening-socket snapshot parsing and change detection.
//!
//! Input is the tabular output of `lsof -i -P -n -sTCP:LISTEN`. Parsing is
//! tolerant: lines that do not look like socket rows are skipped, never an
//! error.

use std::collections::BTreeMap;

use crate::types::PortInfo;

/// Parse lsof LISTEN output into a port-keyed registry snapshot.
///
/// The first line is the column header. Rows need at least 9 whitespace
/// columns: process name in column 0, pid in column 1, and the local
/// address in column 8 whose trailing `:<digits>` is the port. The first
/// process observed on a port wins.
pub fn parse_listen_output(stdout: &str) -> BTreeMap<u16, PortInfo> {
    let mut ports = BTreeMap::new();
    for line in stdout.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 9 {
            continue;
        }
        let Ok(pid) = parts[1].parse::<u32>() else {
            continue;
        };
        let Some(port) = trailing_port(parts[8]) else {
            continue;
        };
        ports.entry(port).or_insert_with(|| PortInfo {
            port,
            pid,
            process_name: parts[0].to_owned(),
        });
    }
    ports
}

/// Extract the port from an address like `127.0.0.1:8000`, `*:3000`, or
/// `[::1]:8080`.
fn trailing_port(address: &str) -> Option<u16> {
    let (_, digits) = address.rsplit_once(':')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Drop ports not on the whitelist. An empty whitelist allows everything.
pub fn apply_whitelist(
    ports: BTreeMap<u16, PortInfo>,
    whitelist: &[u16],
) -> BTreeMap<u16, PortInfo> {
    if whitelist.is_empty() {
        return ports;
    }
    ports
        .into_iter()
        .filter(|(port, _)| whitelist.contains(port))
        .collect()
}

/// Whether the filtered snapshot differs from the previous tick's.
///
/// A difference is a changed port set or a retained port whose owning pid
/// changed (a restart under the same port counts).
pub fn ports_changed(
    previous: &BTreeMap<u16, PortInfo>,
    next: &BTreeMap<u16, PortInfo>,
) -> bool {
    next.len() != previous.len()
        || next
            .iter()
            .any(|(port, info)| previous.get(port).is_none_or(|p| p.pid != info.pid))
}

// ─── Tests ───────────────────────────────────────────────────────
