//! Helpers for running tool subprocesses with timeouts and bounded output

use crate::tooling::{ToolError, ToolOutcome};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Bytes of combined output kept per call; the tail is kept since that is
/// where build tools print their errors
pub const OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// Run `cmd`, optionally feeding `stdin`, and capture combined output
///
/// The child is killed if `limit` elapses.
pub async fn run_tool(
    mut cmd: Command,
    program: &str,
    stdin: Option<&str>,
    limit: Duration,
) -> Result<ToolOutcome, ToolError> {
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Spawning {}", program);
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        program: program.to_string(),
        source,
    })?;

    // Feed stdin from a task so a chatty child cannot deadlock on a full pipe
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_string();
            Some(tokio::spawn(async move {
                if let Err(e) = pipe.write_all(input.as_bytes()).await {
                    warn!("Failed to write tool stdin: {}", e);
                }
            }))
        }
        _ => None,
    };

    let output = timeout(limit, child.wait_with_output())
        .await
        .map_err(|_| ToolError::Timeout {
            program: program.to_string(),
            secs: limit.as_secs(),
        })?
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if let Some(writer) = writer {
        let _ = writer.await;
    }

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }

    let text = keep_tail(text, OUTPUT_LIMIT_BYTES);
    debug!(
        "{} exited with {} ({} bytes of output)",
        program,
        output.status,
        text.len()
    );

    Ok(ToolOutcome {
        succeeded: output.status.success(),
        output: text,
    })
}

fn keep_tail(text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!(
        "[output truncated {} bytes]\n{}",
        start,
        &text[start..]
    )
}
