//! File operations routed through the shared command executor.
//!
//! All reads and writes happen *inside* the sandbox by issuing shell
//! commands, so the orchestrator process never needs filesystem access to the
//! environment it is driving.  Content crosses the boundary base64-encoded in
//! both directions, which keeps arbitrary bytes (quotes, newlines, binary)
//! intact through `bash -c`.
//!
//! Every method returns `(rendered_output, is_error)`; rendering into the
//! `<file_output>` envelope happens at the handler layer.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::crewmind::actions::EditOperation;
use crate::crewmind::command_executor::CommandExecutor;

/// Default timeout for the helper commands issued by this module.
const FILE_CMD_TIMEOUT_SECS: u64 = 30;

/// Single-quote `s` for safe interpolation into a `bash -c` command line.
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Manages file operations within the sandbox via shell commands.
pub struct FileManager {
    executor: Arc<dyn CommandExecutor>,
}

impl FileManager {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        FileManager { executor }
    }

    async fn run(&self, cmd: &str) -> (String, i32) {
        self.executor.execute(cmd, FILE_CMD_TIMEOUT_SECS).await
    }

    /// Read file contents with optional line offset and limit.
    ///
    /// With both `offset` and `limit` the window `[offset, offset + limit)`
    /// is rendered with line numbers starting at `offset`; with only `limit`
    /// the first `limit` lines are numbered from 1; otherwise the whole file
    /// is numbered from 1.
    pub async fn read_file(
        &self,
        file_path: &str,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> (String, bool) {
        let quoted = shell_quote(file_path);
        let cmd = match (offset, limit) {
            (Some(offset), Some(limit)) => format!(
                "tail -n +{} {} 2>&1 | head -n {} | nl -ba -v {}",
                offset, quoted, limit, offset
            ),
            (None, Some(limit)) => format!("head -n {} {} 2>&1 | nl -ba", limit, quoted),
            _ => format!("nl -ba {} 2>&1", quoted),
        };

        log::debug!("Reading file with command: {}", cmd);
        let (output, code) = self.run(&cmd).await;

        if output.contains("No such file or directory") || output.contains("cannot open") {
            return (format!("File not found: {}", file_path), true);
        }
        if code != 0 && !output.is_empty() {
            return (format!("Error reading file: {}", output), true);
        }

        (output, false)
    }

    /// Write `content` verbatim, creating parent directories as needed.
    pub async fn write_file(&self, file_path: &str, content: &str) -> (String, bool) {
        if let Some(dir) = parent_dir(file_path) {
            self.run(&format!("mkdir -p {}", shell_quote(dir))).await;
        }

        let encoded = BASE64.encode(content.as_bytes());
        let cmd = format!(
            "echo '{}' | base64 -d > {}",
            encoded,
            shell_quote(file_path)
        );

        let (output, code) = self.run(&cmd).await;
        if code != 0 {
            return (format!("Error writing file: {}", output), true);
        }

        (format!("Successfully wrote to {}", file_path), false)
    }

    /// Replace the first (or all) occurrences of `old_string`.
    ///
    /// The file is fetched base64-encoded, rewritten in-process, and pushed
    /// back the same way.  A transient `.bak` copy doubles as the existence
    /// probe; it is removed afterwards on a best-effort basis.  A zero-match
    /// edit is informational, not an error.
    pub async fn edit_file(
        &self,
        file_path: &str,
        old_string: &str,
        new_string: &str,
        replace_all: bool,
    ) -> (String, bool) {
        let quoted = shell_quote(file_path);
        let backup = shell_quote(&format!("{}.bak", file_path));

        let (probe_output, probe_code) = self
            .run(&format!("cp {} {} 2>&1", quoted, backup))
            .await;
        if probe_code != 0 || probe_output.contains("No such file or directory") {
            return (format!("File not found: {}", file_path), true);
        }

        let cleanup = format!("rm -f {}", backup);

        let (encoded, fetch_code) = self.run(&format!("base64 {}", quoted)).await;
        if fetch_code != 0 {
            self.run(&cleanup).await;
            return (format!("Error reading file: {}", encoded), true);
        }

        let raw: String = encoded.split_whitespace().collect();
        let content = match BASE64.decode(raw.as_bytes()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
            Err(e) => {
                self.run(&cleanup).await;
                return (format!("Error decoding file content: {}", e), true);
            }
        };

        let matches = if old_string.is_empty() {
            0
        } else {
            content.matches(old_string).count()
        };
        if matches == 0 {
            self.run(&cleanup).await;
            return (
                format!("No matches found for the specified string in {}", file_path),
                false,
            );
        }

        let updated = if replace_all {
            content.replace(old_string, new_string)
        } else {
            content.replacen(old_string, new_string, 1)
        };

        let write_cmd = format!(
            "echo '{}' | base64 -d > {}",
            BASE64.encode(updated.as_bytes()),
            quoted
        );
        let (write_output, write_code) = self.run(&write_cmd).await;
        self.run(&cleanup).await;

        if write_code != 0 {
            return (format!("Error editing file: {}", write_output), true);
        }

        let scope = if replace_all {
            "all occurrences"
        } else {
            "first occurrence"
        };
        (
            format!("Successfully replaced {} in {}", scope, file_path),
            false,
        )
    }

    /// Apply `edits` in order; the first hard error aborts and names the
    /// failing step, while per-step zero-match results are tolerated.
    pub async fn multi_edit_file(
        &self,
        file_path: &str,
        edits: &[EditOperation],
    ) -> (String, bool) {
        let mut results = Vec::new();

        for (i, edit) in edits.iter().enumerate() {
            let (result, is_error) = self
                .edit_file(file_path, &edit.old_string, &edit.new_string, edit.replace_all)
                .await;

            if is_error && !result.contains("No matches found") {
                return (format!("Error on edit {}: {}", i + 1, result), true);
            }
            results.push(format!("Edit {}: {}", i + 1, result));
        }

        (results.join("\n"), false)
    }

    /// Report size, mtime, owner, permissions, and type for up to 10 paths.
    pub async fn get_metadata(&self, file_paths: &[String]) -> (String, bool) {
        let mut results = Vec::new();

        for file_path in file_paths.iter().take(10) {
            let quoted = shell_quote(file_path);
            let cmd = format!(
                "if [ -e {q} ]; then \
                   stat -c '%s %Y %U:%G %a' {q} 2>/dev/null || stat -f '%z %m %Su:%Sg %Lp' {q}; \
                   echo -n ' '; \
                   file -b {q} 2>/dev/null || echo 'unknown'; \
                 else \
                   echo 'not_found'; \
                 fi",
                q = quoted
            );

            let (output, _) = self.run(&cmd).await;

            if output.contains("not_found") {
                results.push(format!("{}: Not found", file_path));
                continue;
            }

            let parts: Vec<&str> = output.split_whitespace().collect();
            if parts.len() >= 5 {
                let (size, mtime, owner, perms) = (parts[0], parts[1], parts[2], parts[3]);
                let file_type = parts[4..].join(" ");
                results.push(format!(
                    "{}:\n  Size: {} bytes\n  Modified: {}\n  Type: {}\n  Owner: {}\n  Permissions: {}",
                    file_path, size, mtime, file_type, owner, perms
                ));
            } else {
                results.push(format!("{}: Unable to get metadata", file_path));
            }
        }

        (results.join("\n\n"), false)
    }
}

/// Parent directory component of a path, when it has one.
fn parent_dir(file_path: &str) -> Option<&str> {
    match file_path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&file_path[..idx]),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_wraps_and_escapes() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn parent_dir_components() {
        assert_eq!(parent_dir("/tmp/a/b.txt"), Some("/tmp/a"));
        assert_eq!(parent_dir("/rootfile"), Some("/"));
        assert_eq!(parent_dir("bare.txt"), None);
    }
}
