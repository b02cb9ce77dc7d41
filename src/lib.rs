// src/lib.rs

// Import the top-level `crewmind` module.
pub mod crewmind;

// Re-exporting key items for easier external access.
pub use crewmind::actions::{Action, AgentType};
pub use crewmind::command_executor::{CommandExecutor, DockerExecutor, LocalExecutor};
pub use crewmind::hub::{OrchestratorHub, SubagentReport};
pub use crewmind::llm::{LlmClient, LlmConfig, LlmError, Message, Role};
pub use crewmind::orchestrator::{OrchestratorAgent, OrchestratorRunResult};
pub use crewmind::parser::ActionParser;
pub use crewmind::subagent::{Subagent, SubagentTask};
