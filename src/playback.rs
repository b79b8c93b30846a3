//! Playback of synthesized files through an external audio player.
//!
//! The controller owns at most one player process. Pausing and resuming
//! stop and continue that process with `SIGSTOP` / `SIGCONT`. Stopping asks
//! the player to exit with `SIGTERM` and kills it only if it lingers.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::error::{TtsError, TtsResult};
use crate::process::{self, with_deadline, PROBE_TIMEOUT};

/// How long a player gets to exit after `SIGTERM` before it is killed.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Players tried in order, with the arguments placed before the file path.
const PLAYERS: &[(&str, &[&str])] = &[
    ("afplay", &[]),
    ("paplay", &[]),
    ("aplay", &["-q"]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackReport {
    pub status: PlaybackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub message: String,
}

/// An audio player command line.
#[derive(Debug, Clone)]
pub struct Player {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Player {
    /// First known player found on `PATH`.
    pub fn discover() -> Option<Self> {
        PLAYERS.iter().find_map(|(name, args)| {
            process::find_program(name).map(|program| Self {
                program,
                args: args.iter().map(|a| a.to_string()).collect(),
            })
        })
    }
}

#[derive(Default)]
struct Inner {
    child: Option<Child>,
    paused: bool,
    current: Option<PathBuf>,
    last: Option<PathBuf>,
}

impl Inner {
    /// Forget a player that has exited on its own.
    fn reap(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("Player exited with {status}");
                self.child = None;
                self.current = None;
                self.paused = false;
            }
            Ok(None) => {}
            Err(e) => log::warn!("Could not poll player process: {e}"),
        }
    }

    fn status(&self) -> PlaybackStatus {
        match (&self.child, self.paused) {
            (None, _) => PlaybackStatus::Stopped,
            (Some(_), true) => PlaybackStatus::Paused,
            (Some(_), false) => PlaybackStatus::Playing,
        }
    }

    fn report(&self, message: impl Into<String>) -> PlaybackReport {
        PlaybackReport {
            status: self.status(),
            file: self.current.clone(),
            message: message.into(),
        }
    }

    async fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            if terminate(&mut child, self.paused).await.is_none() {
                if let Err(e) = child.kill().await {
                    log::warn!("Could not stop player: {e}");
                }
            }
        }
        self.current = None;
        self.paused = false;
    }
}

/// Tracks the single active playback.
///
/// Owned by the server and shared by reference; all state sits behind one
/// async mutex.
#[derive(Default)]
pub struct PlaybackController {
    player: Option<Player>,
    inner: Mutex<Inner>,
}

impl PlaybackController {
    /// Controller that discovers a player on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Controller that always uses `player`.
    pub fn with_player(player: Player) -> Self {
        Self {
            player: Some(player),
            inner: Mutex::default(),
        }
    }

    /// Record `path` as the most recent output, the default for `play`.
    pub async fn remember(&self, path: &Path) {
        self.inner.lock().await.last = Some(path.to_path_buf());
    }

    pub async fn play(&self, path: Option<&Path>) -> TtsResult<PlaybackReport> {
        let mut inner = self.inner.lock().await;
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => inner
                .last
                .clone()
                .ok_or_else(|| TtsError::FileNotFound(PathBuf::new()))?,
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(TtsError::FileNotFound(path)),
        }

        inner.kill().await;

        let player = self
            .player
            .clone()
            .or_else(Player::discover)
            .ok_or_else(|| {
                let names: Vec<&str> = PLAYERS.iter().map(|(name, _)| *name).collect();
                TtsError::playback(format!("no audio player found (tried {})", names.join(", ")))
            })?;

        let child = Command::new(&player.program)
            .args(&player.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::PlaybackFailed {
                message: format!("could not start {}", player.program.display()),
                source: Some(Box::new(e)),
            })?;

        log::info!("Playing {} with {}", path.display(), player.program.display());
        inner.child = Some(child);
        inner.paused = false;
        inner.current = Some(path.clone());
        inner.last = Some(path);
        Ok(inner.report("Playback started"))
    }

    pub async fn pause(&self) -> TtsResult<PlaybackReport> {
        let mut inner = self.inner.lock().await;
        inner.reap();
        match inner.status() {
            PlaybackStatus::Stopped => return Ok(inner.report("Nothing is playing")),
            PlaybackStatus::Paused => return Ok(inner.report("Playback is already paused")),
            PlaybackStatus::Playing => {}
        }
        signal(inner.child.as_ref(), "STOP").await?;
        inner.paused = true;
        Ok(inner.report("Playback paused"))
    }

    pub async fn resume(&self) -> TtsResult<PlaybackReport> {
        let mut inner = self.inner.lock().await;
        inner.reap();
        match inner.status() {
            PlaybackStatus::Stopped => return Ok(inner.report("Nothing is paused")),
            PlaybackStatus::Playing => return Ok(inner.report("Playback is not paused")),
            PlaybackStatus::Paused => {}
        }
        signal(inner.child.as_ref(), "CONT").await?;
        inner.paused = false;
        Ok(inner.report("Playback resumed"))
    }

    pub async fn stop(&self) -> TtsResult<PlaybackReport> {
        let mut inner = self.inner.lock().await;
        inner.reap();
        if inner.child.is_none() {
            return Ok(inner.report("Nothing is playing"));
        }
        inner.kill().await;
        log::info!("Playback stopped");
        Ok(inner.report("Playback stopped"))
    }

    pub async fn status(&self) -> PlaybackReport {
        let mut inner = self.inner.lock().await;
        inner.reap();
        let message = match inner.status() {
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Stopped => "Stopped",
        };
        inner.report(message)
    }

    /// Stop any playback.
    pub async fn shutdown(&self) {
        self.inner.lock().await.kill().await;
    }
}

/// Ask the player to exit with `SIGTERM` and wait up to [`STOP_GRACE`].
/// A stopped player also gets `SIGCONT` so it can act on the signal.
/// Returns `None` when the player is still running afterwards.
async fn terminate(child: &mut Child, paused: bool) -> Option<std::process::ExitStatus> {
    if let Err(e) = signal(Some(&*child), "TERM").await {
        log::debug!("Falling back to SIGKILL: {e}");
        return None;
    }
    if paused {
        if let Err(e) = signal(Some(&*child), "CONT").await {
            log::debug!("Could not continue paused player: {e}");
        }
    }
    match with_deadline(child.wait(), STOP_GRACE).await {
        Ok(Ok(status)) => {
            log::debug!("Player exited with {status}");
            Some(status)
        }
        Ok(Err(e)) => {
            log::warn!("Could not wait for player: {e}");
            None
        }
        Err(_) => {
            log::warn!("Player ignored SIGTERM for {STOP_GRACE:?}, killing it");
            None
        }
    }
}

/// Deliver `SIG<name>` to the player through the shell's `kill` builtin.
#[cfg(unix)]
async fn signal(child: Option<&Child>, name: &str) -> TtsResult<()> {
    let pid = child
        .and_then(Child::id)
        .ok_or_else(|| TtsError::playback("player process has already exited"))?
        .to_string();
    let script = format!("kill -s {name} \"$1\"");
    let output = process::run(
        Path::new("sh"),
        ["-c", script.as_str(), "kill", pid.as_str()],
        PROBE_TIMEOUT,
    )
    .await
    .map_err(|e| TtsError::PlaybackFailed {
        message: format!("could not send SIG{name}"),
        source: Some(Box::new(e)),
    })?;
    if !output.status.success() {
        return Err(TtsError::playback(format!(
            "sending SIG{name} to {pid} failed: {}",
            process::stderr_text(&output)
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal(_child: Option<&Child>, name: &str) -> TtsResult<()> {
    Err(TtsError::playback(format!(
        "SIG{name} is not supported on this platform"
    )))
}
