mod activity;
mod agent;
mod port;

pub use activity::{ActivityItem, ActivityKind};
pub use agent::{Agent, AgentStatus, AgentType, visible_sorted};
pub use port::PortInfo;
