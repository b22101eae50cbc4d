//! Running external converters (`pandoc`, `markitdown`, `pdftotext`, `curl`) with a deadline.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SubprocessError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("{program} timed out after {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("{program} exited with {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Captured output of a successful run.
#[derive(Debug, Clone)]
pub struct Output {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl Output {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs `program args...`, optionally feeding `stdin`, and waits at most `timeout`.
///
/// A non-zero exit status is an error; the child is killed on timeout.
pub async fn run<I, S>(
    program: &Path,
    args: I,
    stdin: Option<&[u8]>,
    timeout: Duration,
) -> Result<Output, SubprocessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!(program = %name, ?cmd, "Spawning subprocess");
    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SubprocessError::NotFound {
                program: name.clone(),
            }
        } else {
            SubprocessError::Io {
                program: name.clone(),
                source: e,
            }
        }
    })?;

    // Feed stdin while output is drained, so neither pipe can fill up and stall the deadline.
    let writer = match (stdin, child.stdin.take()) {
        (Some(input), Some(mut pipe)) => {
            let input = input.to_vec();
            Some(tokio::spawn(async move {
                let result = pipe.write_all(&input).await;
                // Closing stdin lets filters like pandoc see EOF.
                drop(pipe);
                result
            }))
        }
        _ => None,
    };

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| SubprocessError::Io {
            program: name.clone(),
            source: e,
        })?,
        Err(_) => {
            if let Some(writer) = writer {
                writer.abort();
            }
            debug!(program = %name, secs = timeout.as_secs(), "Subprocess timed out");
            return Err(SubprocessError::TimedOut {
                program: name,
                secs: timeout.as_secs(),
            });
        }
    };

    if let Some(writer) = writer {
        match writer.await {
            // A child may exit without reading all of its input.
            Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(SubprocessError::Io {
                    program: name,
                    source: e,
                });
            }
            _ => {}
        }
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(SubprocessError::Failed {
            program: name,
            code: output.status.code(),
            stderr,
        });
    }
    debug!(program = %name, bytes = output.stdout.len(), "Subprocess finished");
    Ok(Output {
        stdout: output.stdout,
        stderr,
    })
}
