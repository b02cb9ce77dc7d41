//! Built-in system prompts for the three agent roles.
//!
//! The prompts are embedded at compile time so a deployed binary needs no
//! companion files.  Callers that want different behavior can override the
//! orchestrator prompt via
//! [`OrchestratorAgent::with_system_message`](crate::crewmind::orchestrator::OrchestratorAgent::with_system_message).

use crate::crewmind::actions::AgentType;

const ORCHESTRATOR_SYSTEM_MESSAGE: &str = include_str!("system_msgs/orchestrator.md");
const EXPLORER_SYSTEM_MESSAGE: &str = include_str!("system_msgs/explorer.md");
const CODER_SYSTEM_MESSAGE: &str = include_str!("system_msgs/coder.md");

/// System prompt for the orchestrator agent.
pub fn orchestrator_system_message() -> &'static str {
    ORCHESTRATOR_SYSTEM_MESSAGE
}

/// System prompt for an explorer subagent.
pub fn explorer_system_message() -> &'static str {
    EXPLORER_SYSTEM_MESSAGE
}

/// System prompt for a coder subagent.
pub fn coder_system_message() -> &'static str {
    CODER_SYSTEM_MESSAGE
}

/// System prompt for a subagent of the given type.
pub fn system_message_for(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Explorer => explorer_system_message(),
        AgentType::Coder => coder_system_message(),
    }
}
