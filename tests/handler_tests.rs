//! Tool handler tests against a real LocalExecutor in a temp directory.

use std::sync::Arc;

use crewmind::crewmind::actions::{
    Action, AddNoteAction, BatchTodoAction, EditAction, EditOperation, FileMetadataAction,
    GlobAction, GrepAction, LsAction, MultiEditAction, ReadAction, TodoOpKind, TodoOperation,
    ViewAllNotesAction, WriteAction,
};
use crewmind::crewmind::handlers::ActionHandler;
use crewmind::LocalExecutor;

fn handler_in(dir: &std::path::Path) -> ActionHandler {
    let executor = Arc::new(LocalExecutor::new().with_working_dir(dir.to_path_buf()));
    ActionHandler::for_subagent(executor)
}

fn op(kind: TodoOpKind, content: Option<&str>, task_id: Option<u64>) -> TodoOperation {
    TodoOperation {
        kind,
        content: content.map(str::to_string),
        task_id,
    }
}

#[tokio::test]
async fn batch_todo_runs_ops_in_order_and_appends_view() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let action = Action::BatchTodo(BatchTodoAction {
        operations: vec![
            op(TodoOpKind::Add, Some("First task with a long description"), None),
            op(TodoOpKind::Add, Some("Second"), None),
            op(TodoOpKind::Complete, None, Some(1)),
            op(TodoOpKind::Delete, None, Some(2)),
            op(TodoOpKind::ViewAll, None, None),
        ],
        view_all: true,
    });

    let (output, is_error) = handler.handle_action(&action).await.expect("handled");
    assert!(!is_error);
    assert!(output.starts_with("<todo_output>"));
    assert!(output.contains("Added todo [1]: First task with..."));
    assert!(output.contains("Added todo [2]: Second"));
    assert!(output.contains("Completed task [1]"));
    assert!(output.contains("Deleted task [2]"));
    assert!(output.contains("Todo List:"));
    assert!(output.contains("[✓] [1]"));

    assert_eq!(handler.todo_manager().len(), 1);
}

#[tokio::test]
async fn batch_todo_accumulates_errors_without_stopping() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let action = Action::BatchTodo(BatchTodoAction {
        operations: vec![
            op(TodoOpKind::Complete, None, Some(99)),
            op(TodoOpKind::Add, Some("still added"), None),
        ],
        view_all: false,
    });

    let (output, is_error) = handler.handle_action(&action).await.expect("handled");
    assert!(is_error);
    assert!(output.contains("[ERROR] Task 99 not found"));
    assert!(output.contains("Added todo [1]"));
}

#[tokio::test]
async fn scratchpad_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let (output, is_error) = handler
        .handle_action(&Action::AddNote(AddNoteAction {
            content: "remember the port is 8080".to_string(),
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("Added note 1 to scratchpad"));

    let (output, is_error) = handler
        .handle_action(&Action::ViewAllNotes(ViewAllNotesAction {}))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("remember the port is 8080"));
}

#[tokio::test]
async fn write_then_read_with_line_numbers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    let path = dir.path().join("notes/out.txt");
    let path_str = path.to_string_lossy().to_string();

    let (output, is_error) = handler
        .handle_action(&Action::Write(WriteAction {
            file_path: path_str.clone(),
            content: "alpha\nbeta\ngamma\n".to_string(),
        }))
        .await
        .expect("handled");
    assert!(!is_error, "write failed: {}", output);
    assert!(output.contains(&format!("Successfully wrote to {}", path_str)));

    let (output, is_error) = handler
        .handle_action(&Action::Read(ReadAction {
            file_path: path_str.clone(),
            offset: None,
            limit: None,
        }))
        .await
        .expect("handled");
    assert!(!is_error, "read failed: {}", output);
    assert!(output.contains("alpha"));
    assert!(output.contains("3"), "expected line numbers in: {}", output);

    // Windowed read numbers lines from the offset.
    let (output, is_error) = handler
        .handle_action(&Action::Read(ReadAction {
            file_path: path_str,
            offset: Some(2),
            limit: Some(1),
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("beta"));
    assert!(!output.contains("gamma"));
}

#[tokio::test]
async fn read_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let (output, is_error) = handler
        .handle_action(&Action::Read(ReadAction {
            file_path: "/definitely/not/here.txt".to_string(),
            offset: None,
            limit: None,
        }))
        .await
        .expect("handled");
    assert!(is_error);
    assert!(output.contains("File not found: /definitely/not/here.txt"));
}

#[tokio::test]
async fn edit_replaces_first_and_all_occurrences() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    let path = dir.path().join("code.txt");
    std::fs::write(&path, "foo bar foo baz foo").expect("seed file");
    let path_str = path.to_string_lossy().to_string();

    let (output, is_error) = handler
        .handle_action(&Action::Edit(EditAction {
            file_path: path_str.clone(),
            old_string: "foo".to_string(),
            new_string: "qux".to_string(),
            replace_all: false,
        }))
        .await
        .expect("handled");
    assert!(!is_error, "edit failed: {}", output);
    assert!(output.contains("first occurrence"));
    assert_eq!(
        std::fs::read_to_string(&path).expect("readable"),
        "qux bar foo baz foo"
    );

    let (output, is_error) = handler
        .handle_action(&Action::Edit(EditAction {
            file_path: path_str.clone(),
            old_string: "foo".to_string(),
            new_string: "qux".to_string(),
            replace_all: true,
        }))
        .await
        .expect("handled");
    assert!(!is_error, "edit failed: {}", output);
    assert!(output.contains("all occurrences"));
    assert_eq!(
        std::fs::read_to_string(&path).expect("readable"),
        "qux bar qux baz qux"
    );

    // The backup probe must not leave droppings behind.
    assert!(!path.with_extension("txt.bak").exists());
}

#[tokio::test]
async fn edit_with_no_matches_is_informational() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    let path = dir.path().join("code.txt");
    std::fs::write(&path, "nothing to see").expect("seed file");

    let (output, is_error) = handler
        .handle_action(&Action::Edit(EditAction {
            file_path: path.to_string_lossy().to_string(),
            old_string: "absent".to_string(),
            new_string: "x".to_string(),
            replace_all: false,
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("No matches found"));
}

#[tokio::test]
async fn edit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let (output, is_error) = handler
        .handle_action(&Action::Edit(EditAction {
            file_path: dir.path().join("ghost.txt").to_string_lossy().to_string(),
            old_string: "a".to_string(),
            new_string: "b".to_string(),
            replace_all: false,
        }))
        .await
        .expect("handled");
    assert!(is_error);
    assert!(output.contains("File not found"));
}

#[tokio::test]
async fn multi_edit_applies_sequentially_and_tolerates_no_matches() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    let path = dir.path().join("multi.txt");
    std::fs::write(&path, "one two three").expect("seed file");

    let (output, is_error) = handler
        .handle_action(&Action::MultiEdit(MultiEditAction {
            file_path: path.to_string_lossy().to_string(),
            edits: vec![
                EditOperation {
                    old_string: "one".to_string(),
                    new_string: "1".to_string(),
                    replace_all: false,
                },
                EditOperation {
                    old_string: "absent".to_string(),
                    new_string: "x".to_string(),
                    replace_all: false,
                },
                EditOperation {
                    old_string: "three".to_string(),
                    new_string: "3".to_string(),
                    replace_all: false,
                },
            ],
        }))
        .await
        .expect("handled");
    assert!(!is_error, "multi_edit failed: {}", output);
    assert!(output.contains("Edit 1:"));
    assert!(output.contains("Edit 2: No matches found"));
    assert!(output.contains("Edit 3:"));
    assert_eq!(
        std::fs::read_to_string(&path).expect("readable"),
        "1 two 3"
    );
}

#[tokio::test]
async fn metadata_reports_present_and_missing_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    let path = dir.path().join("real.txt");
    std::fs::write(&path, "content").expect("seed file");

    let (output, is_error) = handler
        .handle_action(&Action::FileMetadata(FileMetadataAction {
            file_paths: vec![
                path.to_string_lossy().to_string(),
                "/no/such/file".to_string(),
            ],
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("Size: 7 bytes"));
    assert!(output.contains("/no/such/file: Not found"));
}

#[tokio::test]
async fn grep_finds_matches_and_respects_include() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    std::fs::write(dir.path().join("a.rs"), "fn main() {}\n").expect("seed");
    std::fs::write(dir.path().join("b.txt"), "fn main in prose\n").expect("seed");

    let (output, is_error) = handler
        .handle_action(&Action::Grep(GrepAction {
            pattern: "fn main".to_string(),
            path: Some(".".to_string()),
            include: Some("*.rs".to_string()),
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("a.rs"));
    assert!(!output.contains("b.txt"));
}

#[tokio::test]
async fn grep_without_matches_is_informational() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let (output, is_error) = handler
        .handle_action(&Action::Grep(GrepAction {
            pattern: "nothing_matches_this".to_string(),
            path: Some(".".to_string()),
            include: None,
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("No matches found"));
}

#[tokio::test]
async fn glob_lists_and_reports_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    std::fs::write(dir.path().join("x.toml"), "").expect("seed");

    let (output, is_error) = handler
        .handle_action(&Action::Glob(GlobAction {
            pattern: "*.toml".to_string(),
            path: Some(".".to_string()),
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("x.toml"));

    let (output, is_error) = handler
        .handle_action(&Action::Glob(GlobAction {
            pattern: "*.nope".to_string(),
            path: Some(".".to_string()),
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("No files found matching pattern"));
}

#[tokio::test]
async fn ls_applies_ignore_patterns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());
    std::fs::write(dir.path().join("keep.rs"), "").expect("seed");
    std::fs::write(dir.path().join("skip.log"), "").expect("seed");

    let (output, is_error) = handler
        .handle_action(&Action::Ls(LsAction {
            path: ".".to_string(),
            ignore: vec!["*.log".to_string()],
        }))
        .await
        .expect("handled");
    assert!(!is_error);
    assert!(output.contains("keep.rs"));
    assert!(!output.contains("skip.log"));
}

#[tokio::test]
async fn ls_missing_path_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let (output, is_error) = handler
        .handle_action(&Action::Ls(LsAction {
            path: "/no/such/dir".to_string(),
            ignore: Vec::new(),
        }))
        .await
        .expect("handled");
    assert!(is_error);
    assert!(output.contains("Path not found: /no/such/dir"));
}

#[tokio::test]
async fn subagent_only_actions_fail_without_a_hub() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut handler = handler_in(dir.path());

    let (output, is_error) = handler
        .handle_action(&Action::AddContext(crewmind::crewmind::actions::AddContextAction {
            id: "x".to_string(),
            content: "y".to_string(),
            reported_by: "?".to_string(),
            task_id: None,
        }))
        .await
        .expect("handled");
    assert!(is_error);
    assert!(output.contains("not available"));
}
