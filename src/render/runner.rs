//! Sandboxed execution of runnable code blocks.
//!
//! Each run gets a fresh temporary directory as its working directory, an
//! environment reduced to `PATH`, no stdin, and a wall-clock limit. The child
//! is killed if the limit is hit.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("`{0}` blocks cannot be run")]
    NotRunnable(String),
    #[error("Could not start {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },
    #[error("Run timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interpreters available to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    JavaScript,
    Python,
    Shell,
}

impl Runtime {
    pub fn for_language(language: &str) -> Option<Self> {
        match language.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "node" => Some(Runtime::JavaScript),
            "python" | "py" | "python3" => Some(Runtime::Python),
            "bash" | "sh" | "shell" => Some(Runtime::Shell),
            _ => None,
        }
    }

    fn program(self) -> &'static str {
        match self {
            Runtime::JavaScript => "node",
            Runtime::Python => "python3",
            Runtime::Shell => "sh",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Runtime::JavaScript => "main.js",
            Runtime::Python => "main.py",
            Runtime::Shell => "main.sh",
        }
    }
}

pub fn is_runnable(language: &str) -> bool {
    Runtime::for_language(language).is_some()
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub timeout: Duration,
    /// Per-stream cap on captured output.
    pub max_output_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_output_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub truncated: bool,
}

fn capped(bytes: &[u8], max: usize) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max {
        return (text.into_owned(), false);
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    (text[..cut].to_string(), true)
}

pub async fn run_code(language: &str, code: &str, config: RunnerConfig) -> Result<RunOutput, RunError> {
    let runtime =
        Runtime::for_language(language).ok_or_else(|| RunError::NotRunnable(language.to_string()))?;

    let dir = tempfile::tempdir()?;
    let script = dir.path().join(runtime.file_name());
    tokio::fs::write(&script, code).await?;

    let mut cmd = Command::new(runtime.program());
    cmd.arg(&script)
        .current_dir(dir.path())
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Ok(path) = std::env::var("PATH") {
        cmd.env("PATH", path);
    }

    info!(runtime = ?runtime, bytes = code.len(), "Running code block");
    let child = cmd.spawn().map_err(|source| RunError::Spawn {
        program: runtime.program(),
        source,
    })?;

    let output = match timeout(config.timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            debug!("Code block exceeded {:?}; child killed", config.timeout);
            return Err(RunError::Timeout(config.timeout));
        }
    };

    let (stdout, out_cut) = capped(&output.stdout, config.max_output_bytes);
    let (stderr, err_cut) = capped(&output.stderr, config.max_output_bytes);

    Ok(RunOutput {
        stdout,
        stderr,
        exit_code: output.status.code(),
        truncated: out_cut || err_cut,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_language_is_inert() {
        let err = run_code("rust", "fn main() {}", RunnerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::NotRunnable(lang) if lang == "rust"));
    }

    #[tokio::test]
    async fn test_shell_runs_with_clean_env() {
        let output = run_code("sh", "echo \"hi ${HOME:-none}\"", RunnerConfig::default())
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(0));
        assert_eq!(output.stdout.trim(), "hi none");
    }

    #[tokio::test]
    async fn test_timeout_kills_run() {
        let config = RunnerConfig {
            timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let err = run_code("sh", "sleep 5", config).await.unwrap_err();
        assert!(matches!(err, RunError::Timeout(_)));
    }

    #[test]
    fn test_output_cap_respects_char_boundaries() {
        let (text, cut) = capped("héllo".as_bytes(), 2);
        assert!(cut);
        assert_eq!(text, "h");
    }
}
