//! The agentwatch daemon: scanners, orchestrator, and the Unix-socket IPC
//! surface. All inference logic lives in `agentwatch-core`; this crate adds
//! the IO, scheduling, and process execution around it.

pub mod client;
pub mod orchestrator;
pub mod portscan;
pub mod processes;
pub mod server;
pub mod sessions;
pub mod settings;
pub mod status;
pub mod watcher;
