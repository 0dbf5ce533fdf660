//! External command remover and the shared process runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::progress::parse_percent;
use crate::remover::{ProgressCallback, WatermarkRemover};

/// Placeholder replaced with the input path.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Placeholder replaced with the output path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Number of stderr lines kept for failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Runs an external program to remove the watermark.
///
/// The command line is split on whitespace; `{input}` and `{output}` are
/// substituted per job. Progress is read from stdout and stderr lines such as
/// `progress=42` or `42%`.
#[derive(Debug, Clone)]
pub struct CommandRemover {
    program: String,
    args: Vec<String>,
}

impl CommandRemover {
    /// Create a remover from a program and argument templates.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> MediaResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let program = program.into();
        let args: Vec<String> = args.into_iter().map(Into::into).collect();

        if program.trim().is_empty() {
            return Err(MediaError::InvalidCommand("program is empty".to_string()));
        }
        for placeholder in [INPUT_PLACEHOLDER, OUTPUT_PLACEHOLDER] {
            if !args.iter().any(|a| a.contains(placeholder)) {
                return Err(MediaError::InvalidCommand(format!(
                    "arguments must contain {}",
                    placeholder
                )));
            }
        }

        Ok(Self { program, args })
    }

    /// Parse a whitespace-separated command line.
    pub fn parse(command_line: &str) -> MediaResult<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| MediaError::InvalidCommand("command is empty".to_string()))?;
        Self::new(program, parts)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the argument list for one job.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|a| {
                a.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
            })
            .collect()
    }
}

#[async_trait]
impl WatermarkRemover for CommandRemover {
    fn name(&self) -> &str {
        "command"
    }

    fn check_available(&self) -> MediaResult<()> {
        resolve_program(&self.program).map(|_| ())
    }

    async fn run(&self, input: &Path, output: &Path, progress: ProgressCallback) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::InputNotFound(input.to_path_buf()));
        }

        let args = self.build_args(input, output);
        info!(program = %self.program, input = %input.display(), "Running remover command");

        run_process(&self.program, &args, parse_percent, &progress).await
    }
}

/// Locate an executable, accepting either a bare name on `PATH` or a path.
pub fn resolve_program(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::RemoverNotFound(program.to_string()))
}

/// Spawn `program`, forward parsed progress, and fail with the stderr tail on
/// a non-zero exit.
///
/// Both output streams are drained so the child never blocks on a full pipe.
/// Lines the parser does not recognise from stderr are kept as diagnostics.
/// The child is killed if this future is dropped.
pub(crate) async fn run_process<P>(
    program: &str,
    args: &[String],
    mut parse: P,
    progress: &ProgressCallback,
) -> MediaResult<()>
where
    P: FnMut(&str) -> Option<u8>,
{
    debug!("Running: {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::RemoverNotFound(program.to_string())
            } else {
                MediaError::Io(e)
            }
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::processing_failed("stdout not captured", None, None))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::processing_failed("stderr not captured", None, None))?;

    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(line)) => {
                    if let Some(pct) = parse(&line) {
                        progress(pct);
                    }
                }
                _ => out_done = true,
            },
            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(line)) => {
                    if let Some(pct) = parse(&line) {
                        progress(pct);
                    } else if !line.trim().is_empty() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                }
                _ => err_done = true,
            },
        }
    }

    let status = child.wait().await?;
    if status.success() {
        return Ok(());
    }

    let stderr = if tail.is_empty() {
        None
    } else {
        Some(Vec::from(tail).join("\n"))
    };
    let message = match status.code() {
        Some(_) => "Remover exited with non-zero status",
        None => "Remover was terminated by a signal",
    };
    Err(MediaError::processing_failed(message, stderr, status.code()))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn test_parse_command_line() {
        let remover = CommandRemover::parse("python -m sorawm.cli --input {input} --output {output}").unwrap();
        assert_eq!(remover.program(), "python");

        let args = remover.build_args(Path::new("/in/a.mp4"), Path::new("/out/a.mp4"));
        assert_eq!(
            args,
            vec!["-m", "sorawm.cli", "--input", "/in/a.mp4", "--output", "/out/a.mp4"]
        );
    }

    #[test]
    fn test_placeholder_inside_argument() {
        let remover = CommandRemover::new("tool", ["--in={input}", "--out={output}"]).unwrap();
        let args = remover.build_args(Path::new("x.mp4"), Path::new("y.mp4"));
        assert_eq!(args, vec!["--in=x.mp4", "--out=y.mp4"]);
    }

    #[test]
    fn test_command_requires_placeholders() {
        assert!(matches!(
            CommandRemover::parse("tool {input}"),
            Err(MediaError::InvalidCommand(_))
        ));
        assert!(matches!(CommandRemover::parse("   "), Err(MediaError::InvalidCommand(_))));
    }

    #[test]
    fn test_missing_program_is_misconfiguration() {
        let remover = CommandRemover::parse("definitely-not-a-real-remover-binary {input} {output}").unwrap();
        let err = remover.check_available().unwrap_err();
        assert!(err.is_misconfiguration());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_forwards_progress_and_succeeds() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.mp4");
        let output = tmp.path().join("out.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let remover = CommandRemover::new(
            "sh",
            [
                "-c",
                "echo progress=10; echo 'loading' >&2; echo 50%; cp \"$0\" \"$1\"",
                "{input}",
                "{output}",
            ],
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress: ProgressCallback = Arc::new(move |p: u8| sink.lock().unwrap().push(p));

        remover.run(&input, &output, progress).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![10, 50]);
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"video");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_exit_code_and_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let remover = CommandRemover::new(
            "sh",
            ["-c", "echo 'model checkpoint missing' >&2; exit 3", "{input}", "{output}"],
        )
        .unwrap();

        let err = remover
            .run(&input, &tmp.path().join("out.mp4"), crate::no_progress())
            .await
            .unwrap_err();

        match &err {
            MediaError::ProcessingFailed { exit_code, stderr, .. } => {
                assert_eq!(*exit_code, Some(3));
                assert_eq!(stderr.as_deref(), Some("model checkpoint missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("model checkpoint missing"));
    }

    #[test]
    fn test_run_rejects_missing_input() {
        let remover = CommandRemover::parse("true {input} {output}").unwrap();
        let err = tokio_test::block_on(remover.run(
            Path::new("/nonexistent/in.mp4"),
            Path::new("/tmp/out.mp4"),
            crate::no_progress(),
        ))
        .unwrap_err();
        assert!(matches!(err, MediaError::InputNotFound(_)));
    }
}
