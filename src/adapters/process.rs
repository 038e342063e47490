//! Subprocess execution shared by command-backed adapters.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Spawn `argv`, feed `input` on stdin, and return stdout.
///
/// Fails on spawn errors, timeout, non-zero exit, or non-UTF-8 output.
pub(crate) async fn run_command(argv: &[String], input: &str, limit: Duration) -> Result<String> {
    let (program, args) = argv
        .split_first()
        .context("Command is empty")?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn '{}'", program))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .with_context(|| format!("Failed to write to '{}' stdin", program))?;
        // Drop stdin to signal EOF
    }

    let output = timeout(limit, child.wait_with_output())
        .await
        .with_context(|| format!("'{}' timed out after {:?}", program, limit))?
        .with_context(|| format!("Failed to wait for '{}'", program))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "'{}' failed with exit code {}: {}",
            program,
            exit_code,
            stderr.trim()
        );
    }

    String::from_utf8(output.stdout).with_context(|| format!("'{}' output is not valid UTF-8", program))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_echoes_stdin() {
        let out = run_command(&argv(&["cat"]), "hello", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_error() {
        let err = run_command(&argv(&["sh", "-c", "echo bad >&2; exit 3"]), "", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exit code 3"));
    }

    #[tokio::test]
    async fn test_empty_command() {
        assert!(run_command(&[], "", Duration::from_secs(1)).await.is_err());
    }
}
