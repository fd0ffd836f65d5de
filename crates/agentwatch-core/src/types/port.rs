use serde::{Deserialize, Serialize};

/// One observed listening socket.
///
/// The port registry is replaced wholesale each scan tick, keyed by `port`;
/// the first process observed on a port wins when the raw scan reports
/// duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortInfo {
    pub port: u16,
    pub pid: u32,
    pub process_name: String,
}
