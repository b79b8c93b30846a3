//! Subprocess helpers with hard deadlines.
//!
//! Every external command goes through [`run`], which pairs the operation
//! with a deadline via [`with_deadline`]. Children are spawned with
//! `kill_on_drop`, so when the deadline expires and the pending wait is
//! dropped, the child is terminated.

use std::ffi::OsStr;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

/// Native command synthesis.
pub const NATIVE_SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(300);
/// Kokoro import probe and script execution.
pub const EXTERNAL_TIMEOUT: Duration = Duration::from_secs(30);
/// `--version` probes during interpreter discovery.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Voice listing commands.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not finish within {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },
}

/// Returned by [`with_deadline`] when the operation did not complete in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded(pub Duration);

/// Drive `operation` to completion unless `deadline` passes first.
///
/// When the deadline wins, the operation future is dropped, which is the
/// only cancellation path.
pub async fn with_deadline<F: Future>(
    operation: F,
    deadline: Duration,
) -> Result<F::Output, DeadlineExceeded> {
    tokio::time::timeout(deadline, operation)
        .await
        .map_err(|_| DeadlineExceeded(deadline))
}

/// Run `program` with `args`, capturing stdout and stderr.
///
/// A non-zero exit status is not an error here; callers inspect
/// `Output::status` themselves.
pub async fn run<I, S>(program: &Path, args: I, deadline: Duration) -> Result<Output, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.display().to_string();
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProcessError::NotFound(name.clone())
        } else {
            ProcessError::Io {
                program: name.clone(),
                source: e,
            }
        }
    })?;

    match with_deadline(child.wait_with_output(), deadline).await {
        Ok(result) => result.map_err(|e| ProcessError::Io {
            program: name,
            source: e,
        }),
        Err(DeadlineExceeded(after)) => {
            log::warn!("{name} exceeded its {}s deadline, killed", after.as_secs());
            Err(ProcessError::TimedOut {
                program: name,
                after,
            })
        }
    }
}

/// Resolve `program` against `PATH` without spawning anything.
///
/// Paths containing a separator are checked directly.
pub fn find_program(program: impl AsRef<Path>) -> Option<PathBuf> {
    let program = program.as_ref();
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Trimmed, lossy stderr of a finished command, for error messages.
pub fn stderr_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn captures_output() {
        let output = run(Path::new("sh"), ["-c", "echo hello"], Duration::from_secs(5))
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_returned_not_raised() {
        let output = run(
            Path::new("sh"),
            ["-c", "echo oops >&2; exit 3"],
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(stderr_text(&output), "oops");
    }

    #[tokio::test]
    async fn deadline_kills_slow_child() {
        let started = Instant::now();
        let err = run(Path::new("sleep"), ["10"], Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let err = run(
            Path::new("definitely-not-a-real-command-4821"),
            ["x"],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProcessError::NotFound(_)));
    }

    #[tokio::test]
    async fn with_deadline_passes_through_fast_operations() {
        let value = with_deadline(async { 7 }, Duration::from_secs(1)).await;
        assert_eq!(value, Ok(7));
    }

    #[test]
    fn finds_sh_on_path() {
        assert!(find_program("sh").is_some());
        assert!(find_program("definitely-not-a-real-command-4821").is_none());
    }
}
