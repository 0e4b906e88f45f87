//! Child process execution with interleaved line capture

use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tracing::{debug, info};

use super::{CommandError, CommandOutput, CommandSpec, OutputLine, OutputStream};

pub const DEFAULT_CAPTURE_LIMIT: usize = 10_000;

/// Runs processes to completion. There is no timeout: a hung child hangs the
/// caller.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `spec` and fail unless its exit code is in the success set
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = self.run_unchecked(spec).await?;
        if !spec.is_success(output.exit_code) {
            return Err(CommandError::NonZeroExit {
                program: spec.program.clone(),
                code: output.exit_code,
                output: output.combined(),
            });
        }
        Ok(output)
    }

    /// Run `spec` and return whatever it produced, whatever the exit code
    pub async fn run_unchecked(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        info!("Running {}", spec);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_empty() {
                Stdio::null()
            } else {
                Stdio::piped()
            });
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let program = spec.program.clone();
        let limit = spec.capture_limit.unwrap_or(DEFAULT_CAPTURE_LIMIT);

        let feed = async move {
            if let Some(mut stdin) = stdin {
                for line in &spec.stdin {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                }
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, captured) = tokio::join!(feed, capture(stdout, stderr, limit));
        let spawn_error = |source| CommandError::Spawn {
            program: program.clone(),
            source,
        };
        let status = child.wait().await.map_err(spawn_error)?;
        debug!("{} finished with {}", spec.program, status);

        match fed {
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                debug!("{} closed its stdin before reading all input", spec.program);
            }
            fed => fed.map_err(spawn_error)?,
        }
        let (lines, dropped_lines) = captured.map_err(spawn_error)?;

        Ok(CommandOutput {
            exit_code: status.code(),
            lines,
            dropped_lines,
        })
    }
}

async fn capture(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    limit: usize,
) -> Result<(Vec<OutputLine>, usize), std::io::Error> {
    let mut lines = Vec::new();
    let mut dropped = 0;

    let mut out = stdout.map(|s| BufReader::new(s).lines());
    let mut err = stderr.map(|s| BufReader::new(s).lines());

    loop {
        let (stream, next) = tokio::select! {
            line = next_line(&mut out), if out.is_some() => (OutputStream::Stdout, line?),
            line = next_line(&mut err), if err.is_some() => (OutputStream::Stderr, line?),
            else => break,
        };

        match next {
            Some(text) => {
                debug!("[{:?}] {}", stream, text);
                if lines.len() < limit {
                    lines.push(OutputLine { stream, text });
                } else {
                    dropped += 1;
                }
            }
            None => match stream {
                OutputStream::Stdout => out = None,
                OutputStream::Stderr => err = None,
            },
        }
    }

    Ok((lines, dropped))
}

async fn next_line<R>(
    reader: &mut Option<tokio::io::Lines<R>>,
) -> Result<Option<String>, std::io::Error>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    match reader {
        Some(lines) => lines.next_line().await,
        None => Ok(None),
    }
}
