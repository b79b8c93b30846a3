use std::path::{Path, PathBuf};

use crate::process::{self, ProcessError, EXTERNAL_TIMEOUT, PROBE_TIMEOUT};

/// Interpreters tried, in order, after any configured override.
pub const CANDIDATES: &[&str] = &["python3", "python", "python3.12", "python3.11", "python3.10"];

/// Statement the interpreter must run cleanly for the engine to be usable.
pub const IMPORT_PROBE: &str = "import kokoro, soundfile; print('ok')";

/// A Python interpreter that answered `--version`.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    pub path: PathBuf,
    pub version: String,
}

/// Candidate list with the override first.
pub fn candidates(override_path: Option<&Path>) -> Vec<PathBuf> {
    override_path
        .map(Path::to_path_buf)
        .into_iter()
        .chain(CANDIDATES.iter().map(PathBuf::from))
        .collect()
}

/// Return the first candidate whose `--version` probe succeeds.
pub async fn discover(candidates: &[PathBuf]) -> Option<Interpreter> {
    for candidate in candidates {
        match process::run(candidate, ["--version"], PROBE_TIMEOUT).await {
            Ok(output) if output.status.success() => {
                // Python 2 prints its version on stderr.
                let raw = if output.stdout.is_empty() {
                    &output.stderr
                } else {
                    &output.stdout
                };
                let version = String::from_utf8_lossy(raw).trim().to_string();
                log::debug!("Found interpreter {} ({version})", candidate.display());
                return Some(Interpreter {
                    path: candidate.clone(),
                    version,
                });
            }
            Ok(output) => log::debug!(
                "{} --version exited with {}",
                candidate.display(),
                output.status
            ),
            Err(ProcessError::NotFound(_)) => {}
            Err(e) => log::debug!("Probe of {} failed: {e}", candidate.display()),
        }
    }
    None
}

/// Check that the Kokoro packages import under `interpreter`.
///
/// Returns a short reason on failure.
pub async fn check_packages(interpreter: &Path) -> Result<(), String> {
    let output = process::run(interpreter, ["-c", IMPORT_PROBE], EXTERNAL_TIMEOUT)
        .await
        .map_err(|e| match e {
            ProcessError::TimedOut { after, .. } => {
                format!("importing kokoro timed out after {}s", after.as_secs())
            }
            other => other.to_string(),
        })?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = process::stderr_text(&output);
    let last_line = stderr.lines().last().unwrap_or("import failed");
    Err(format!(
        "kokoro is not importable with {}: {last_line}",
        interpreter.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_comes_first() {
        let list = candidates(Some(Path::new("/opt/venv/bin/python")));
        assert_eq!(list[0], PathBuf::from("/opt/venv/bin/python"));
        assert_eq!(list[1], PathBuf::from("python3"));
        assert_eq!(list.len(), CANDIDATES.len() + 1);
        assert_eq!(candidates(None).len(), CANDIDATES.len());
    }

    #[tokio::test]
    async fn skips_missing_candidates() {
        let list = vec![PathBuf::from("/nonexistent/python-4821")];
        assert!(discover(&list).await.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_import_failure_reason() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("python");
        std::fs::write(
            &fake,
            "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 'Python 3.11.9'; exit 0; fi\necho \"Traceback (most recent call last):\" >&2\necho \"ModuleNotFoundError: No module named 'kokoro'\" >&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let found = discover(&[fake.clone()]).await.unwrap();
        assert_eq!(found.version, "Python 3.11.9");

        let reason = check_packages(&fake).await.unwrap_err();
        assert!(reason.ends_with("ModuleNotFoundError: No module named 'kokoro'"));
    }
}
