//! Core library for agentwatch.
//!
//! Everything here is pure: wire types, session-log inference, peer-tool
//! and port-scan parsing, the notification policy, and the settings
//! schema. IO, process execution, and scheduling live in the daemon crate.

pub mod notify;
pub mod paths;
pub mod peers;
pub mod ports;
pub mod session;
pub mod settings;
pub mod tools;
pub mod types;

pub use notify::{NotificationKind, NotificationPolicy, NotificationRequest};
pub use settings::{Settings, SettingsError, WindowMode};
pub use types::{Agent, AgentStatus, AgentType, ActivityItem, ActivityKind, PortInfo};
