use anyhow::{Context, Result};
use std::process::{Command, Output};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const READ_TIMEOUT_MS: u64 = 3000;

/// Run a program and wait for it, giving up after `timeout_ms`.
///
/// The child keeps running on its own thread if the timeout fires.
pub fn run_cmd_timeout_sync(program: &str, args: &[&str], timeout_ms: u64) -> Result<Output> {
    let program = program.to_string();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
    let (tx, rx) = mpsc::channel();
    let label = program.clone();

    thread::spawn(move || {
        let result = Command::new(&program)
            .args(&args)
            .output()
            .with_context(|| format!("Failed to execute: {}", program));
        let _ = tx.send(result);
    });

    rx.recv_timeout(Duration::from_millis(timeout_ms))
        .with_context(|| format!("Command timeout: {}", label))?
}

/// Trimmed stdout of a short read-only command. Empty output is `None`.
pub fn read_output(program: &str, args: &[&str]) -> Result<Option<String>> {
    let out = run_cmd_timeout_sync(program, args, READ_TIMEOUT_MS)?;
    if !out.status.success() {
        anyhow::bail!(
            "{} {} exited with {}: {}",
            program,
            args.join(" "),
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    Ok(if s.is_empty() { None } else { Some(s) })
}

pub fn get_prop(key: &str) -> Result<Option<String>> {
    read_output("getprop", &[key])
}
