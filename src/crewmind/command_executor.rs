//! Command execution abstraction for the sandboxed environment.
//!
//! Every file, search, and shell operation in the runtime funnels through a
//! [`CommandExecutor`]: an opaque `(cmd, timeout) -> (output, exit code)`
//! surface plus a fire-and-forget background entry point.  The executor *is*
//! the sandbox boundary - the orchestrator and all of its subagents share one
//! instance by reference, and because turns execute strictly sequentially no
//! locking is needed around it.
//!
//! Two implementations ship with the crate: [`LocalExecutor`] runs `bash -c`
//! on the host (handy for tests and demos), [`DockerExecutor`] runs
//! `docker exec` against a named container.  Both merge stdout and stderr
//! into a single output string and report timeouts with the conventional
//! exit code 124.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Exit code reported for a command that exceeded its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Maximum bytes collected from a single output stream (1 MiB); anything
/// beyond this is discarded so a chatty command cannot blow up the prompt.
const MAX_STREAM_BYTES: usize = 1024 * 1024;

/// Abstract command execution in a sandboxed environment.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Execute `cmd`, blocking up to `timeout_secs`, and return the merged
    /// stdout+stderr output together with the exit code.  Timeouts yield
    /// `("Command timed out after <t> seconds", 124)`; spawn failures yield
    /// `("Error executing command: <msg>", 1)`.  This method never fails at
    /// the Rust level - every problem is folded into the returned pair.
    async fn execute(&self, cmd: &str, timeout_secs: u64) -> (String, i32);

    /// Start `cmd` without waiting for it.  Dispatch failures are ignored.
    async fn execute_background(&self, cmd: &str);
}

/// Read from `reader` into a byte buffer, silently truncating past
/// `MAX_STREAM_BYTES`.
async fn read_stream<R: AsyncReadExt + Unpin>(mut reader: R) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = vec![0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => {
                if buf.len() < MAX_STREAM_BYTES {
                    let take = n.min(MAX_STREAM_BYTES - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                }
                // Keep draining even after truncation so the child can exit.
            }
        }
    }
}

/// Spawn the prepared command, enforce the timeout, and fold the outcome into
/// the `(output, exit_code)` contract.
async fn run_to_completion(mut command: Command, timeout_secs: u64) -> (String, i32) {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the handle after a timeout must also reap the process.
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => return (format!("Error executing command: {}", e), 1),
    };

    let stdout_pipe = child.stdout.take().expect("stdout was piped");
    let stderr_pipe = child.stderr.take().expect("stderr was piped");

    let work = async {
        // Read both streams concurrently to avoid pipe-buffer deadlocks.
        let (stdout_bytes, stderr_bytes) =
            tokio::join!(read_stream(stdout_pipe), read_stream(stderr_pipe));
        let status = child.wait().await;

        let mut output = String::from_utf8_lossy(&stdout_bytes).to_string();
        output.push_str(&String::from_utf8_lossy(&stderr_bytes));

        match status {
            Ok(status) => (output, status.code().unwrap_or(-1)),
            Err(e) => (format!("Error executing command: {}", e), 1),
        }
    };

    match tokio::time::timeout(Duration::from_secs(timeout_secs), work).await {
        Ok(result) => result,
        Err(_) => (
            format!("Command timed out after {} seconds", timeout_secs),
            TIMEOUT_EXIT_CODE,
        ),
    }
}

/// Execute commands with `bash -c` on the local host.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    /// Optional working directory for every spawned command.
    working_dir: Option<PathBuf>,
}

impl LocalExecutor {
    pub fn new() -> Self {
        LocalExecutor { working_dir: None }
    }

    /// Run every command from `dir` instead of the process working directory.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command_for(&self, cmd: &str) -> Command {
        let mut command = Command::new("bash");
        command.arg("-c").arg(cmd);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(&self, cmd: &str, timeout_secs: u64) -> (String, i32) {
        run_to_completion(self.command_for(cmd), timeout_secs).await
    }

    async fn execute_background(&self, cmd: &str) {
        let mut command = self.command_for(cmd);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Err(e) = command.spawn() {
            log::debug!("Background command failed to start: {}", e);
        }
        // The child is detached; dropping the handle leaves it running.
    }
}

/// Execute commands inside a running container with `docker exec`.
#[derive(Debug, Clone)]
pub struct DockerExecutor {
    container_name: String,
}

impl DockerExecutor {
    pub fn new(container_name: impl Into<String>) -> Self {
        DockerExecutor {
            container_name: container_name.into(),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }
}

#[async_trait]
impl CommandExecutor for DockerExecutor {
    async fn execute(&self, cmd: &str, timeout_secs: u64) -> (String, i32) {
        let mut command = Command::new("docker");
        command
            .arg("exec")
            .arg(&self.container_name)
            .arg("bash")
            .arg("-c")
            .arg(cmd);
        run_to_completion(command, timeout_secs).await
    }

    async fn execute_background(&self, cmd: &str) {
        let mut command = Command::new("docker");
        command
            .arg("exec")
            .arg("-d")
            .arg(&self.container_name)
            .arg("bash")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Err(e) = command.spawn() {
            log::debug!("Background docker exec failed to start: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_executor_merges_streams_and_reports_exit_code() {
        let executor = LocalExecutor::new();
        let (output, code) = executor.execute("echo out; echo err >&2; exit 3", 10).await;
        assert!(output.contains("out"));
        assert!(output.contains("err"));
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn local_executor_times_out_with_124() {
        let executor = LocalExecutor::new();
        let (output, code) = executor.execute("sleep 5", 1).await;
        assert_eq!(code, TIMEOUT_EXIT_CODE);
        assert_eq!(output, "Command timed out after 1 seconds");
    }
}
