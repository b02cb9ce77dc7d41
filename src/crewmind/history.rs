//! Turn records and the bounded per-agent conversation history.
//!
//! A [`Turn`] captures one full perceive–act cycle: the raw LLM reply, the
//! actions that actually executed, the environment responses indexed against
//! them, and any subagent trajectories harvested while the turn ran.
//! [`ConversationHistory`] keeps the most recent turns (FIFO, capped at 100)
//! and renders them into the state dump the orchestrator feeds back to the
//! model - it is a display aid, not a source of truth.

use indexmap::IndexMap;
use serde_json::json;

use crate::crewmind::actions::{Action, AgentType};
use crate::crewmind::llm::Message;

/// How much of a turn's raw LLM output survives into the prompt rendering.
const PROMPT_OUTPUT_LIMIT: usize = 500;

/// Trajectory and token accounting harvested from one subagent run.
#[derive(Debug, Clone)]
pub struct SubagentTrajectory {
    pub agent_type: AgentType,
    pub title: String,
    /// Full message list of the subagent run, when the report carried one.
    pub trajectory: Option<Vec<Message>>,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
}

/// Map from task id to the trajectory its subagent produced this turn.
pub type SubagentTrajectories = IndexMap<String, SubagentTrajectory>;

/// Result of executing all actions in a single LLM reply.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub actions_executed: Vec<Action>,
    /// Environment responses, one per executed action (parse errors are
    /// prepended when present).
    pub env_responses: Vec<String>,
    pub has_error: bool,
    pub finish_message: Option<String>,
    /// True once a finish action executed (or nothing was attempted at all).
    pub done: bool,
    pub subagent_trajectories: Option<SubagentTrajectories>,
}

/// One perceive–act cycle as stored in the conversation history.
#[derive(Debug)]
pub struct Turn {
    pub llm_output: String,
    pub actions_executed: Vec<Action>,
    pub env_responses: Vec<String>,
    pub subagent_trajectories: Option<SubagentTrajectories>,
}

impl Turn {
    /// Render the turn for inclusion in the orchestrator's state dump.
    pub fn to_prompt(&self) -> String {
        let mut parts = Vec::new();

        if self.llm_output.chars().count() > PROMPT_OUTPUT_LIMIT {
            let truncated: String = self.llm_output.chars().take(PROMPT_OUTPUT_LIMIT).collect();
            parts.push(format!("Agent: {}...", truncated));
        } else {
            parts.push(format!("Agent: {}", self.llm_output));
        }

        for response in &self.env_responses {
            parts.push(format!("Env: {}", response));
        }

        parts.join("\n")
    }

    /// Structured snapshot for the turn logger.
    pub fn to_log_value(&self) -> serde_json::Value {
        let actions: Vec<String> = self
            .actions_executed
            .iter()
            .map(|a| format!("{:?}", a))
            .collect();
        let mut value = json!({
            "llm_output": self.llm_output,
            "actions_executed": actions,
            "env_responses": self.env_responses,
        });
        if let Some(trajectories) = &self.subagent_trajectories {
            let dump: serde_json::Map<String, serde_json::Value> = trajectories
                .iter()
                .map(|(task_id, t)| {
                    (
                        task_id.clone(),
                        json!({
                            "agent_type": t.agent_type.as_str(),
                            "title": t.title,
                            "total_input_tokens": t.total_input_tokens,
                            "total_output_tokens": t.total_output_tokens,
                        }),
                    )
                })
                .collect();
            value["subagent_trajectories"] = serde_json::Value::Object(dump);
        }
        value
    }
}

/// FIFO-bounded sequence of turns.
#[derive(Debug)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
    max_turns: usize,
}

impl Default for ConversationHistory {
    fn default() -> Self {
        ConversationHistory::new()
    }
}

impl ConversationHistory {
    /// History bounded at the default cap of 100 turns.
    pub fn new() -> Self {
        ConversationHistory {
            turns: Vec::new(),
            max_turns: 100,
        }
    }

    /// History bounded at a caller-chosen cap.
    pub fn with_max_turns(max_turns: usize) -> Self {
        ConversationHistory {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Append a turn, evicting the oldest once the cap is exceeded.
    pub fn add_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(..excess);
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render the retained turns for the orchestrator's state dump.
    pub fn to_prompt(&self) -> String {
        if self.turns.is_empty() {
            return "No previous interactions.".to_string();
        }

        let rendered: Vec<String> = self
            .turns
            .iter()
            .enumerate()
            .map(|(i, turn)| format!("--- Turn {} ---\n{}", i + 1, turn.to_prompt()))
            .collect();
        rendered.join("\n\n")
    }

    /// Structured snapshot for the turn logger.
    pub fn to_log_value(&self) -> serde_json::Value {
        serde_json::Value::Array(self.turns.iter().map(Turn::to_log_value).collect())
    }
}
