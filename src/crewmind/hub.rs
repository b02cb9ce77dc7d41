//! Coordination hub: the task registry and the append-only context store.
//!
//! The hub is owned exclusively by the orchestrator; subagents never receive
//! a handle to it and communicate results only through the
//! [`SubagentReport`] they return.  Two rules keep the shared state sane:
//! task ids are minted from a monotonic counter (`task_001`, `task_002`, …)
//! and context entries are append-only - re-inserting an existing id is
//! rejected and the original value is never overwritten.
//!
//! Both stores are insertion-ordered so the human-readable dumps the
//! orchestrator feeds back to the LLM are stable across turns.

use indexmap::IndexMap;
use serde::Serialize;

use crate::crewmind::actions::{AgentType, ContextBootstrapItem, ContextItem};
use crate::crewmind::llm::Message;

/// Task lifecycle states.
///
/// `Failed` is part of the vocabulary but nothing in the runtime writes it
/// yet; tasks move `Created -> Completed` through
/// [`OrchestratorHub::process_subagent_result`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Created,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Created => "○",
            TaskStatus::Completed => "●",
            TaskStatus::Failed => "✗",
        }
    }
}

/// Outcome recorded on a task once its subagent reported back.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task_id: String,
    pub context_ids_stored: Vec<String>,
    pub comments: String,
}

/// A unit of delegable work tracked by the hub.
#[derive(Debug, Clone)]
pub struct Task {
    pub task_id: String,
    pub agent_type: AgentType,
    pub title: String,
    pub description: String,
    pub context_refs: Vec<String>,
    pub context_bootstrap: Vec<ContextBootstrapItem>,
    pub status: TaskStatus,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub result: Option<TaskResult>,
}

/// An immutable, named text artifact produced by an agent.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: String,
    pub content: String,
    /// Who stored it: the orchestrator itself or a task id.
    pub reported_by: String,
    pub task_id: Option<String>,
    pub created_at: String,
}

/// Execution metadata attached to a [`SubagentReport`].
#[derive(Debug, Clone, Default)]
pub struct SubagentMeta {
    /// Full message list of the run, for logging and audit.
    pub trajectory: Option<Vec<Message>>,
    /// Turns consumed, counting the forced extra turn when one happened.
    pub num_turns: Option<usize>,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
}

/// Structured report a subagent hands back to the orchestrator.
#[derive(Debug, Clone)]
pub struct SubagentReport {
    pub contexts: Vec<ContextItem>,
    pub comments: String,
    pub meta: SubagentMeta,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Central coordination state for the orchestrator: tasks plus context store.
#[derive(Debug, Default)]
pub struct OrchestratorHub {
    tasks: IndexMap<String, Task>,
    context_store: IndexMap<String, Context>,
    task_counter: u64,
}

impl OrchestratorHub {
    pub fn new() -> Self {
        OrchestratorHub::default()
    }

    /// Register a new task and return its freshly minted id.
    pub fn create_task(
        &mut self,
        agent_type: AgentType,
        title: impl Into<String>,
        description: impl Into<String>,
        context_refs: Vec<String>,
        context_bootstrap: Vec<ContextBootstrapItem>,
    ) -> String {
        self.task_counter += 1;
        let task_id = format!("task_{:03}", self.task_counter);
        let title = title.into();

        let task = Task {
            task_id: task_id.clone(),
            agent_type,
            title: title.clone(),
            description: description.into(),
            context_refs,
            context_bootstrap,
            status: TaskStatus::Created,
            created_at: now_rfc3339(),
            completed_at: None,
            result: None,
        };

        self.tasks.insert(task_id.clone(), task);
        log::info!("Created task {}: {}", task_id, title);
        task_id
    }

    pub fn get_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn context_count(&self) -> usize {
        self.context_store.len()
    }

    pub fn get_context(&self, context_id: &str) -> Option<&Context> {
        self.context_store.get(context_id)
    }

    /// Update a task's status; false when the id is unknown.  Completion
    /// stamps `completed_at`.
    pub fn update_task_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        let task = match self.tasks.get_mut(task_id) {
            Some(task) => task,
            None => {
                log::warn!("Task {} not found", task_id);
                return false;
            }
        };

        task.status = status;
        if status == TaskStatus::Completed {
            task.completed_at = Some(now_rfc3339());
        }
        log::info!("Updated task {} status to {}", task_id, status.as_str());
        true
    }

    /// Render every task with its status for the orchestrator prompt.
    pub fn view_all_tasks(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks created yet.".to_string();
        }

        let mut lines = vec!["Tasks:".to_string()];
        for (task_id, task) in &self.tasks {
            lines.push(format!(
                "  {} [{}] {} ({})",
                task.status.symbol(),
                task_id,
                task.title,
                task.agent_type
            ));
            lines.push(format!("      Status: {}", task.status.as_str()));

            if !task.context_refs.is_empty() {
                lines.push(format!(
                    "      Context refs: {}",
                    task.context_refs.join(", ")
                ));
            }
            if !task.context_bootstrap.is_empty() {
                let paths: Vec<&str> = task
                    .context_bootstrap
                    .iter()
                    .map(|item| item.path.as_str())
                    .collect();
                lines.push(format!("      Bootstrap: {}", paths.join(", ")));
            }
            if let Some(result) = &task.result {
                if let Ok(dump) = serde_json::to_string(result) {
                    lines.push(format!("      Result: {}", dump));
                }
            }
            if let Some(completed_at) = &task.completed_at {
                lines.push(format!("      Completed at: {}", completed_at));
            }
        }
        lines.join("\n")
    }

    /// Insert a context entry; false when the id already exists.  Existing
    /// entries are never overwritten.
    pub fn add_context(
        &mut self,
        context_id: impl Into<String>,
        content: impl Into<String>,
        reported_by: impl Into<String>,
        task_id: Option<String>,
    ) -> bool {
        let context_id = context_id.into();
        if self.context_store.contains_key(&context_id) {
            log::warn!("Context {} already exists", context_id);
            return false;
        }

        let context = Context {
            id: context_id.clone(),
            content: content.into(),
            reported_by: reported_by.into(),
            task_id,
            created_at: now_rfc3339(),
        };

        self.context_store.insert(context_id.clone(), context);
        log::info!("Added context {} to store", context_id);
        true
    }

    /// Resolve context references to `(id, content)` pairs, keeping the
    /// reference order.  Unknown ids are skipped and logged.
    pub fn get_contexts_for_task(&self, context_refs: &[String]) -> Vec<(String, String)> {
        let mut contexts = Vec::new();
        for reference in context_refs {
            match self.context_store.get(reference) {
                Some(context) => contexts.push((reference.clone(), context.content.clone())),
                None => log::warn!("Context {} not found", reference),
            }
        }
        contexts
    }

    /// Render the full context store for the orchestrator prompt.
    pub fn view_context_store(&self) -> String {
        if self.context_store.is_empty() {
            return "Context store is empty.".to_string();
        }

        let mut lines = vec!["Context Store:".to_string()];
        for (context_id, context) in &self.context_store {
            lines.push(format!("  Id: [{}]", context_id));
            lines.push(format!("     Content: {}", context.content));
            lines.push(format!("     Reported by: {}", context.reported_by));
            if let Some(task_id) = &context.task_id {
                lines.push(format!("    Task: {}", task_id));
            }
        }
        lines.join("\n")
    }

    /// Fold a subagent report into the store and complete its task.
    ///
    /// Each reported context is inserted with `reported_by` set to the task
    /// id; duplicates (and entries with an empty id or content) are skipped
    /// with a warning.  The resulting [`TaskResult`] is recorded on the task,
    /// which transitions to `Completed` - the only path that does so.
    pub fn process_subagent_result(
        &mut self,
        task_id: &str,
        report: &SubagentReport,
    ) -> TaskResult {
        let mut stored_context_ids = Vec::new();

        for ctx in &report.contexts {
            if ctx.id.is_empty() || ctx.content.is_empty() {
                continue;
            }
            if self.add_context(
                ctx.id.clone(),
                ctx.content.clone(),
                task_id.to_string(),
                Some(task_id.to_string()),
            ) {
                stored_context_ids.push(ctx.id.clone());
            } else {
                log::warn!("Context {} already exists, skipping", ctx.id);
            }
        }

        let result = TaskResult {
            task_id: task_id.to_string(),
            context_ids_stored: stored_context_ids,
            comments: report.comments.clone(),
        };

        if let Some(task) = self.tasks.get_mut(task_id) {
            task.result = Some(result.clone());
        }
        self.update_task_status(task_id, TaskStatus::Completed);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub_with_task(hub: &mut OrchestratorHub) -> String {
        hub.create_task(
            AgentType::Explorer,
            "Map the repo",
            "Walk the source tree and summarize the layout.",
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn task_ids_are_zero_padded_and_monotonic() {
        let mut hub = OrchestratorHub::new();
        assert_eq!(hub_with_task(&mut hub), "task_001");
        assert_eq!(hub_with_task(&mut hub), "task_002");
        assert_eq!(hub_with_task(&mut hub), "task_003");
    }

    #[test]
    fn duplicate_contexts_are_rejected_without_overwrite() {
        let mut hub = OrchestratorHub::new();
        assert!(hub.add_context("repo_layout", "original", "orchestrator", None));
        assert!(!hub.add_context("repo_layout", "replacement", "orchestrator", None));
        assert_eq!(hub.get_context("repo_layout").map(|c| c.content.as_str()), Some("original"));
    }

    #[test]
    fn process_subagent_result_completes_the_task() {
        let mut hub = OrchestratorHub::new();
        let task_id = hub_with_task(&mut hub);

        let report = SubagentReport {
            contexts: vec![
                ContextItem {
                    id: "finding_a".to_string(),
                    content: "src/ holds a single crate".to_string(),
                },
                ContextItem {
                    id: String::new(),
                    content: "dropped because of the empty id".to_string(),
                },
            ],
            comments: "done".to_string(),
            meta: SubagentMeta::default(),
        };

        let result = hub.process_subagent_result(&task_id, &report);
        assert_eq!(result.context_ids_stored, vec!["finding_a".to_string()]);

        let task = hub.get_task(&task_id).expect("task exists");
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert_eq!(hub.context_count(), 1);
        assert_eq!(
            hub.get_context("finding_a").map(|c| c.reported_by.as_str()),
            Some(task_id.as_str())
        );
    }

    #[test]
    fn missing_refs_are_skipped() {
        let mut hub = OrchestratorHub::new();
        hub.add_context("present", "value", "orchestrator", None);
        let refs = vec!["present".to_string(), "absent".to_string()];
        let resolved = hub.get_contexts_for_task(&refs);
        assert_eq!(resolved, vec![("present".to_string(), "value".to_string())]);
    }
}
