//! Search operations (grep, glob, ls) routed through the command executor.
//!
//! Like the file manager, every search runs inside the sandbox as a shell
//! command.  Result sets are truncated at 100 entries with an explicit
//! notice, and "nothing found" is an informational result, not an error.

use std::sync::Arc;

use crate::crewmind::command_executor::CommandExecutor;
use crate::crewmind::file_manager::shell_quote;

const SEARCH_CMD_TIMEOUT_SECS: u64 = 30;

/// Cap on rendered matches/paths before truncation kicks in.
const MAX_RESULTS: usize = 100;

/// Manages content and filename searches within the sandbox.
pub struct SearchManager {
    executor: Arc<dyn CommandExecutor>,
}

impl SearchManager {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        SearchManager { executor }
    }

    async fn run(&self, cmd: &str) -> (String, i32) {
        self.executor.execute(cmd, SEARCH_CMD_TIMEOUT_SECS).await
    }

    /// Recursive regex search over file contents with line numbers and
    /// filenames.
    pub async fn grep(
        &self,
        pattern: &str,
        path: Option<&str>,
        include: Option<&str>,
    ) -> (String, bool) {
        let mut flags = vec![
            "-r".to_string(),
            "-n".to_string(),
            "-H".to_string(),
            "--color=never".to_string(),
        ];
        if let Some(include) = include {
            flags.push(format!("--include={}", shell_quote(include)));
        }

        let search_path = path.unwrap_or(".");
        let cmd = format!(
            "grep {} {} {} 2>/dev/null | head -n {}",
            flags.join(" "),
            shell_quote(pattern),
            shell_quote(search_path),
            MAX_RESULTS
        );

        let (output, code) = self.run(&cmd).await;

        // grep exits 1 on "no matches", which is not an error.
        if code == 1 && output.is_empty() {
            return ("No matches found".to_string(), false);
        }
        if code > 1 {
            return (format!("Error during search: {}", output), true);
        }

        let trimmed = output.trim();
        if trimmed.is_empty() {
            return ("No matches found".to_string(), false);
        }

        let lines: Vec<&str> = trimmed.split('\n').collect();
        if lines.len() == MAX_RESULTS {
            return (
                format!(
                    "{}\n\n[Output truncated to {} matches]",
                    lines.join("\n"),
                    MAX_RESULTS
                ),
                false,
            );
        }

        (output, false)
    }

    /// Find files by name pattern.
    pub async fn glob(&self, pattern: &str, path: Option<&str>) -> (String, bool) {
        let search_path = path.unwrap_or(".");
        let cmd = format!(
            "find {} -name {} -type f 2>/dev/null | head -n {} | sort",
            shell_quote(search_path),
            shell_quote(pattern),
            MAX_RESULTS
        );

        let (output, code) = self.run(&cmd).await;
        if code != 0 {
            return (format!("Error during file search: {}", output), true);
        }

        let trimmed = output.trim();
        if trimmed.is_empty() {
            return ("No files found matching pattern".to_string(), false);
        }

        let lines: Vec<&str> = trimmed.split('\n').collect();
        if lines.len() == MAX_RESULTS {
            return (
                format!(
                    "{}\n\n[Output truncated to {} files]",
                    lines.join("\n"),
                    MAX_RESULTS
                ),
                false,
            );
        }

        (lines.join("\n"), false)
    }

    /// List a directory, dropping entries that match any ignore pattern.
    ///
    /// Patterns are interpreted as prefix (`x*`), suffix (`*x`), or substring
    /// matches against the file name.  Header (`total …`) and blank lines are
    /// always kept.
    pub async fn ls(&self, path: &str, ignore: &[String]) -> (String, bool) {
        let quoted = shell_quote(path);
        let check_cmd = format!(
            "test -d {q} && echo 'dir' || (test -e {q} && echo 'not_dir' || echo 'not_found')",
            q = quoted
        );
        let (probe, _) = self.run(&check_cmd).await;

        if probe.contains("not_found") {
            return (format!("Path not found: {}", path), true);
        }
        if probe.contains("not_dir") {
            return (format!("Path is not a directory: {}", path), true);
        }

        let (output, code) = self.run(&format!("ls -la {} 2>/dev/null", quoted)).await;
        if code != 0 {
            return (format!("Error listing directory: {}", output), true);
        }

        if ignore.is_empty() || output.is_empty() {
            return (output, false);
        }

        let filtered: Vec<&str> = output
            .trim_end()
            .split('\n')
            .filter(|line| {
                if line.starts_with("total") || line.trim().is_empty() {
                    return true;
                }
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() < 9 {
                    return true;
                }
                let filename = parts[8..].join(" ");
                !ignore.iter().any(|pattern| matches_ignore(pattern, &filename))
            })
            .collect();

        (filtered.join("\n"), false)
    }
}

/// Prefix/suffix/substring matching for ls ignore patterns.
fn matches_ignore(pattern: &str, filename: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*') {
        filename.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        filename.starts_with(prefix)
    } else {
        filename.contains(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignore_pattern_shapes() {
        assert!(matches_ignore("*.log", "build.log"));
        assert!(!matches_ignore("*.log", "build.rs"));
        assert!(matches_ignore("tmp*", "tmp_scratch"));
        assert!(!matches_ignore("tmp*", "scratch_tmp"));
        assert!(matches_ignore("cache", "my_cache_dir"));
    }
}
