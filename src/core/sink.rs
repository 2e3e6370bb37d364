//! Where command batches go: a shell sink for the primary and fallback paths,
//! and a spool for the privileged helper.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use crate::core::cmd::run_cmd_timeout_sync;
use crate::core::commands::{Command, CommandBatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    Completed,
    /// The shell refused to start. Nothing from the batch has run.
    NeedsFallback,
}

pub trait CommandSink: Send {
    fn dispatch(&mut self, batch: &CommandBatch) -> Result<SinkOutcome>;
}

pub trait HelperDispatch: Send {
    fn dispatch(&mut self, commands: &[Command]) -> Result<()>;
}

const DENIAL_MARKERS: [&str; 3] = ["permission denied", "not allowed", "permission denial"];
const PREFLIGHT_TIMEOUT_MS: u64 = 5000;

/// Runs a batch as one script through `<shell> -c`.
#[derive(Debug, Clone)]
pub struct ShellSink {
    shell: String,
    timeout_ms: u64,
}

impl ShellSink {
    pub fn new(shell: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            shell: shell.into(),
            timeout_ms,
        }
    }

    fn budget_ms(&self, batch: &CommandBatch) -> u64 {
        let delays: u64 = batch
            .commands
            .iter()
            .map(|c| c.delay_before_ms + c.delay_after_ms)
            .sum();
        self.timeout_ms + delays
    }
}

fn is_denial(stderr: &str) -> bool {
    let s = stderr.to_lowercase();
    DENIAL_MARKERS.iter().any(|m| s.contains(m))
}

/// The shell binary could not be started at all.
fn spawn_refused(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>().is_some_and(|io| {
        matches!(
            io.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
        )
    })
}

impl ShellSink {
    /// Run a no-op through the shell. `false` means it refused us, before
    /// any real command has been sent.
    fn preflight(&self) -> Result<bool> {
        match run_cmd_timeout_sync(&self.shell, &["-c", "true"], PREFLIGHT_TIMEOUT_MS) {
            Ok(out) => Ok(out.status.success()),
            Err(e) if spawn_refused(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl CommandSink for ShellSink {
    fn dispatch(&mut self, batch: &CommandBatch) -> Result<SinkOutcome> {
        if batch.is_empty() {
            return Ok(SinkOutcome::Completed);
        }
        if !self.preflight()? {
            warn!(target: "altscreen::sink", "{} refused to run, nothing dispatched", self.shell);
            return Ok(SinkOutcome::NeedsFallback);
        }

        let script = batch.to_script();
        debug!(target: "altscreen::sink", "{} -c <<\n{}", self.shell, script.trim_end());

        // From here on commands may have run: never hand the batch on.
        let out = match run_cmd_timeout_sync(&self.shell, &["-c", &script], self.budget_ms(batch)) {
            Ok(out) => out,
            Err(e) if spawn_refused(&e) => {
                warn!(target: "altscreen::sink", "{} unavailable: {:#}", self.shell, e);
                return Ok(SinkOutcome::NeedsFallback);
            }
            Err(e) => return Err(e),
        };

        let stderr = String::from_utf8_lossy(&out.stderr);
        if !out.status.success() {
            anyhow::bail!("{} batch exited with {}: {}", self.shell, out.status, stderr.trim());
        }
        if is_denial(&stderr) {
            warn!(
                target: "altscreen::sink",
                "{} ran the batch but some commands were denied: {}",
                self.shell,
                stderr.trim()
            );
        }

        info!(target: "altscreen::sink", "Ran {} commands via {}", batch.len(), self.shell);
        Ok(SinkOutcome::Completed)
    }
}

/// One request file picked up by the privileged helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperRequest {
    pub created_ms: u64,
    pub commands: Vec<Command>,
}

/// Hands commands to the helper by dropping JSON files into its spool dir.
#[derive(Debug, Clone)]
pub struct SpoolHelper {
    dir: PathBuf,
}

impl SpoolHelper {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl HelperDispatch for SpoolHelper {
    fn dispatch(&mut self, commands: &[Command]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.dir)
            .context(format!("Failed to create {}", self.dir.display()))?;

        let req = HelperRequest {
            created_ms: now_ms(),
            commands: commands.to_vec(),
        };
        let body = serde_json::to_string_pretty(&req).context("Failed to serialize helper request")?;

        let mut path = self.dir.join(format!("{}.json", req.created_ms));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}-{}.json", req.created_ms, n));
            n += 1;
        }
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, body).context("Failed to write temporary file")?;
        fs::rename(&temp_path, &path).context("Failed to rename to final file")?;

        info!(target: "altscreen::sink", "Queued {} commands for helper at {}", commands.len(), path.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_detection() {
        assert!(is_denial("java.lang.SecurityException: Permission Denial: writing"));
        assert!(is_denial("su: Permission denied"));
        assert!(!is_denial(""));
    }

    #[test]
    fn test_budget_includes_delays() {
        let sink = ShellSink::new("sh", 1000);
        let batch = CommandBatch {
            commands: vec![Command::new("a").wait_before(2000), Command::new("b").wait_after(500)],
            reboot_hint: false,
        };
        assert_eq!(sink.budget_ms(&batch), 3500);
    }

    #[test]
    fn test_spool_writes_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut helper = SpoolHelper::new(dir.path().join("spool"));
        helper
            .dispatch(&[Command::new("settings put system show_touches 1")])
            .unwrap();

        let files: Vec<_> = fs::read_dir(dir.path().join("spool"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let req: HelperRequest = serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
        assert_eq!(req.commands[0].line, "settings put system show_touches 1");
    }

    #[test]
    fn test_missing_shell_needs_fallback() {
        let mut sink = ShellSink::new("/nonexistent/altscreen-test-shell", 1000);
        let batch = CommandBatch { commands: vec![Command::new("true")], reboot_hint: false };
        assert_eq!(sink.dispatch(&batch).unwrap(), SinkOutcome::NeedsFallback);
    }

    fn counting_batch(marker: &std::path::Path, tail: &str) -> CommandBatch {
        CommandBatch {
            commands: vec![
                Command::new(format!("echo run >> '{}'", marker.display())),
                Command::new(tail),
            ],
            reboot_hint: false,
        }
    }

    fn runs(marker: &std::path::Path) -> usize {
        fs::read_to_string(marker).map(|s| s.lines().count()).unwrap_or(0)
    }

    #[test]
    fn test_refusing_shell_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("runs");
        let mut sink = ShellSink::new("false", 5000);
        let outcome = sink.dispatch(&counting_batch(&marker, "true")).unwrap();
        assert_eq!(outcome, SinkOutcome::NeedsFallback);
        assert_eq!(runs(&marker), 0);
    }

    #[test]
    fn test_denial_after_start_is_not_a_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("runs");
        let mut sink = ShellSink::new("sh", 5000);
        let outcome = sink
            .dispatch(&counting_batch(&marker, "echo 'Permission denied' >&2"))
            .unwrap();
        assert_eq!(outcome, SinkOutcome::Completed);
        assert_eq!(runs(&marker), 1);
    }

    #[test]
    fn test_failed_batch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("runs");
        let mut sink = ShellSink::new("sh", 5000);
        assert!(sink.dispatch(&counting_batch(&marker, "exit 3")).is_err());
        assert_eq!(runs(&marker), 1);
    }
}
