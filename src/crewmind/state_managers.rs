//! In-memory todo-list and scratchpad state for a single agent.
//!
//! Each driver owns its own pair of managers; they are never shared across
//! the hierarchy.  Both render a stable, human-readable dump that handlers
//! splice into environment responses.

use std::collections::BTreeMap;

/// Lifecycle of a todo entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    Pending,
    Completed,
}

/// A single todo entry.
#[derive(Debug, Clone)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
}

/// Agent-local todo list with integer ids handed out from 1.
#[derive(Debug, Default)]
pub struct TodoManager {
    todos: BTreeMap<u64, TodoItem>,
    next_id: u64,
}

impl TodoManager {
    pub fn new() -> Self {
        TodoManager {
            todos: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Add a task and return its id.
    pub fn add_task(&mut self, content: impl Into<String>) -> u64 {
        let task_id = self.next_id;
        self.next_id += 1;
        self.todos.insert(
            task_id,
            TodoItem {
                content: content.into(),
                status: TodoStatus::Pending,
            },
        );
        task_id
    }

    /// Mark a task completed; false when the id is unknown.
    pub fn complete_task(&mut self, task_id: u64) -> bool {
        match self.todos.get_mut(&task_id) {
            Some(item) => {
                item.status = TodoStatus::Completed;
                true
            }
            None => false,
        }
    }

    /// Remove a task; false when the id is unknown.
    pub fn delete_task(&mut self, task_id: u64) -> bool {
        self.todos.remove(&task_id).is_some()
    }

    pub fn get_task(&self, task_id: u64) -> Option<&TodoItem> {
        self.todos.get(&task_id)
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    /// Render the whole list, in id order.
    pub fn view_all(&self) -> String {
        if self.todos.is_empty() {
            return "Todo list is empty.".to_string();
        }

        let mut lines = vec!["Todo List:".to_string()];
        for (task_id, item) in &self.todos {
            let marker = match item.status {
                TodoStatus::Completed => "[✓]",
                TodoStatus::Pending => "[ ]",
            };
            lines.push(format!("{} [{}] {}", marker, task_id, item.content));
        }
        lines.join("\n")
    }

    /// Drop every entry and restart ids at 1.
    pub fn reset(&mut self) {
        self.todos.clear();
        self.next_id = 1;
    }
}

/// Agent-local append-only note store.
#[derive(Debug, Default)]
pub struct ScratchpadManager {
    notes: Vec<String>,
}

impl ScratchpadManager {
    pub fn new() -> Self {
        ScratchpadManager { notes: Vec::new() }
    }

    /// Append a note and return its zero-based index.
    pub fn add_note(&mut self, content: impl Into<String>) -> usize {
        self.notes.push(content.into());
        self.notes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Render every note in insertion order.
    pub fn view_all(&self) -> String {
        if self.notes.is_empty() {
            return "Scratchpad is empty.".to_string();
        }

        let mut lines = vec!["Scratchpad Contents:".to_string()];
        for (i, note) in self.notes.iter().enumerate() {
            lines.push(format!("\n--- Note {} ---\n{}", i + 1, note));
        }
        lines.join("\n")
    }

    pub fn reset(&mut self) {
        self.notes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_ids_start_at_one_and_survive_deletes() {
        let mut todos = TodoManager::new();
        assert_eq!(todos.add_task("a"), 1);
        assert_eq!(todos.add_task("b"), 2);
        assert!(todos.delete_task(1));
        assert_eq!(todos.add_task("c"), 3);
        assert_eq!(todos.len(), 2);
    }

    #[test]
    fn todo_view_all_marks_completion() {
        let mut todos = TodoManager::new();
        todos.add_task("first");
        todos.add_task("second");
        todos.complete_task(1);
        let view = todos.view_all();
        assert!(view.contains("[✓] [1] first"));
        assert!(view.contains("[ ] [2] second"));
    }

    #[test]
    fn scratchpad_orders_notes() {
        let mut pad = ScratchpadManager::new();
        assert_eq!(pad.add_note("alpha"), 0);
        assert_eq!(pad.add_note("beta"), 1);
        let view = pad.view_all();
        assert!(view.contains("--- Note 1 ---\nalpha"));
        assert!(view.contains("--- Note 2 ---\nbeta"));
    }
}
