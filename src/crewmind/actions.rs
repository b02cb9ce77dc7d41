//! Typed action model for the agent wire protocol.
//!
//! Every instruction an LLM can issue is one tagged block whose body is a
//! YAML mapping; this module gives each tag a strongly typed record and a
//! closed [`Action`] sum type over all of them.  Decoding *is* validation:
//! unknown fields are rejected by serde (`deny_unknown_fields`), defaults are
//! applied during deserialization, and numeric/field-presence constraints are
//! enforced by each record's `validate()` before the action is accepted.

use serde::{Deserialize, Serialize};

/// Kind of agent a task can be delegated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// Read-only investigation agent.
    Explorer,
    /// Mutating implementation agent.
    Coder,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Explorer => "explorer",
            AgentType::Coder => "coder",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

fn default_bash_timeout() -> u64 {
    30
}

fn default_finish_message() -> String {
    "Task completed".to_string()
}

fn default_reported_by() -> String {
    "?".to_string()
}

/// Execute a shell command in the sandbox.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BashAction {
    /// Command line passed to the executor.
    pub cmd: String,
    /// Wait for completion (`true`) or dispatch in the background.
    #[serde(default = "default_true")]
    pub block: bool,
    /// Per-command timeout; must be in `(0, 300]`.
    #[serde(default = "default_bash_timeout")]
    pub timeout_secs: u64,
}

impl BashAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.cmd.is_empty() {
            return Err("'cmd' must not be empty".to_string());
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(format!(
                "'timeout_secs' must be in (0, 300], got {}",
                self.timeout_secs
            ));
        }
        Ok(())
    }
}

/// Mark the current task as finished.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FinishAction {
    #[serde(default = "default_finish_message")]
    pub message: String,
}

/// Discriminator for a single todo-list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoOpKind {
    Add,
    Complete,
    Delete,
    ViewAll,
}

/// One entry in a batched todo update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TodoOperation {
    #[serde(rename = "action")]
    pub kind: TodoOpKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub task_id: Option<u64>,
}

impl TodoOperation {
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            TodoOpKind::Add => {
                if self.content.as_deref().map_or(true, str::is_empty) {
                    return Err("'add' operation requires 'content'".to_string());
                }
            }
            TodoOpKind::Complete | TodoOpKind::Delete => {
                let verb = if self.kind == TodoOpKind::Complete {
                    "complete"
                } else {
                    "delete"
                };
                match self.task_id {
                    Some(id) if id >= 1 => {}
                    _ => {
                        return Err(format!("'{}' operation requires positive task_id", verb));
                    }
                }
            }
            TodoOpKind::ViewAll => {}
        }
        Ok(())
    }
}

/// Batched todo-list operations, executed in order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchTodoAction {
    pub operations: Vec<TodoOperation>,
    #[serde(default)]
    pub view_all: bool,
}

impl BatchTodoAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.operations.is_empty() {
            return Err("'operations' must not be empty".to_string());
        }
        for (i, op) in self.operations.iter().enumerate() {
            op.validate()
                .map_err(|e| format!("operations[{}]: {}", i, e))?;
        }
        Ok(())
    }
}

/// Read a file, optionally windowed by line offset and limit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadAction {
    pub file_path: String,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl ReadAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("'file_path' must not be empty".to_string());
        }
        if let Some(0) = self.limit {
            return Err("'limit' must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Write content to a file, creating parent directories as needed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteAction {
    pub file_path: String,
    pub content: String,
}

impl WriteAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("'file_path' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Replace the first (or all) occurrences of a string in a file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditAction {
    pub file_path: String,
    pub old_string: String,
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
}

impl EditAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("'file_path' must not be empty".to_string());
        }
        Ok(())
    }
}

/// One step of a [`MultiEditAction`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditOperation {
    pub old_string: String,
    pub new_string: String,
    #[serde(default)]
    pub replace_all: bool,
}

/// Several sequential edits against a single file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiEditAction {
    pub file_path: String,
    pub edits: Vec<EditOperation>,
}

impl MultiEditAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("'file_path' must not be empty".to_string());
        }
        if self.edits.is_empty() {
            return Err("'edits' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Stat one to ten paths.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileMetadataAction {
    pub file_paths: Vec<String>,
}

impl FileMetadataAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_paths.is_empty() {
            return Err("'file_paths' must not be empty".to_string());
        }
        if self.file_paths.len() > 10 {
            return Err(format!(
                "'file_paths' accepts at most 10 entries, got {}",
                self.file_paths.len()
            ));
        }
        Ok(())
    }
}

/// Recursive content search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrepAction {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub include: Option<String>,
}

impl GrepAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.is_empty() {
            return Err("'pattern' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Recursive filename match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobAction {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
}

impl GlobAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.is_empty() {
            return Err("'pattern' must not be empty".to_string());
        }
        Ok(())
    }
}

/// List a directory, with optional ignore patterns.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LsAction {
    pub path: String,
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl LsAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.is_empty() {
            return Err("'path' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Append a note to the agent's scratchpad.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddNoteAction {
    pub content: String,
}

impl AddNoteAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.content.is_empty() {
            return Err("'content' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Render every scratchpad note.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewAllNotesAction {}

/// A file or directory whose content should be read into a subagent's
/// starting prompt, with the reason it matters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextBootstrapItem {
    pub path: String,
    pub reason: String,
}

/// Register a new delegable task with the coordination hub.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskCreateAction {
    pub agent_type: AgentType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub context_refs: Vec<String>,
    #[serde(default)]
    pub context_bootstrap: Vec<ContextBootstrapItem>,
    #[serde(default)]
    pub auto_launch: bool,
}

impl TaskCreateAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.is_empty() {
            return Err("'title' must not be empty".to_string());
        }
        if self.description.is_empty() {
            return Err("'description' must not be empty".to_string());
        }
        for (i, item) in self.context_bootstrap.iter().enumerate() {
            if item.path.is_empty() || item.reason.is_empty() {
                return Err(format!(
                    "context_bootstrap[{}] needs 'path' and 'reason'",
                    i
                ));
            }
        }
        Ok(())
    }
}

/// Insert an entry into the shared context store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddContextAction {
    pub id: String,
    pub content: String,
    #[serde(default = "default_reported_by")]
    pub reported_by: String,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl AddContextAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("'id' must not be empty".to_string());
        }
        if self.content.is_empty() {
            return Err("'content' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Run the subagent for a previously created task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchSubagentAction {
    pub task_id: String,
}

impl LaunchSubagentAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.task_id.is_empty() {
            return Err("'task_id' must not be empty".to_string());
        }
        Ok(())
    }
}

/// A single named context carried by a subagent report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextItem {
    pub id: String,
    pub content: String,
}

/// Terminal action of a subagent: contexts to store plus free-form comments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportAction {
    #[serde(default)]
    pub contexts: Vec<ContextItem>,
    #[serde(default)]
    pub comments: String,
}

/// Write a throwaway helper script; same mechanics as a file write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteTempScriptAction {
    pub file_path: String,
    pub content: String,
}

impl WriteTempScriptAction {
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.is_empty() {
            return Err("'file_path' must not be empty".to_string());
        }
        Ok(())
    }
}

/// Every action the runtime can execute, dispatched on the wire tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Bash(BashAction),
    Finish(FinishAction),
    BatchTodo(BatchTodoAction),
    Read(ReadAction),
    Write(WriteAction),
    Edit(EditAction),
    MultiEdit(MultiEditAction),
    FileMetadata(FileMetadataAction),
    Grep(GrepAction),
    Glob(GlobAction),
    Ls(LsAction),
    AddNote(AddNoteAction),
    ViewAllNotes(ViewAllNotesAction),
    TaskCreate(TaskCreateAction),
    AddContext(AddContextAction),
    LaunchSubagent(LaunchSubagentAction),
    Report(ReportAction),
    WriteTempScript(WriteTempScriptAction),
}

impl Action {
    /// Short human-readable name used in logs and turn records.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Bash(_) => "bash",
            Action::Finish(_) => "finish",
            Action::BatchTodo(_) => "todo",
            Action::Read(_) => "read",
            Action::Write(_) => "write",
            Action::Edit(_) => "edit",
            Action::MultiEdit(_) => "multi_edit",
            Action::FileMetadata(_) => "metadata",
            Action::Grep(_) => "grep",
            Action::Glob(_) => "glob",
            Action::Ls(_) => "ls",
            Action::AddNote(_) => "add_note",
            Action::ViewAllNotes(_) => "view_all_notes",
            Action::TaskCreate(_) => "task_create",
            Action::AddContext(_) => "add_context",
            Action::LaunchSubagent(_) => "launch_subagent",
            Action::Report(_) => "report",
            Action::WriteTempScript(_) => "write_temp_script",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_timeout_bounds() {
        let ok = BashAction {
            cmd: "ls".to_string(),
            block: true,
            timeout_secs: 300,
        };
        assert!(ok.validate().is_ok());

        let too_long = BashAction {
            timeout_secs: 301,
            ..ok.clone()
        };
        assert!(too_long.validate().is_err());

        let zero = BashAction {
            timeout_secs: 0,
            ..ok
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn todo_add_requires_content() {
        let op = TodoOperation {
            kind: TodoOpKind::Add,
            content: None,
            task_id: None,
        };
        assert!(op.validate().is_err());

        let op = TodoOperation {
            kind: TodoOpKind::Add,
            content: Some("write tests".to_string()),
            task_id: None,
        };
        assert!(op.validate().is_ok());
    }

    #[test]
    fn todo_complete_requires_positive_id() {
        let op = TodoOperation {
            kind: TodoOpKind::Complete,
            content: None,
            task_id: Some(0),
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn metadata_caps_path_count() {
        let action = FileMetadataAction {
            file_paths: (0..11).map(|i| format!("/tmp/f{}", i)).collect(),
        };
        assert!(action.validate().is_err());
    }
}
