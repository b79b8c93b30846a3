use std::path::{Path, PathBuf};

use crate::error::{TtsError, TtsResult};
use crate::types::Quality;

/// Engine selector meaning "pick the preferred available engine".
pub const AUTO_ENGINE: &str = "auto";

/// Runtime configuration shared by the router, engines and server.
///
/// All values are supplied from outside (CLI flags or environment) and
/// treated as opaque strings and paths.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where synthesized audio files are written.
    pub output_dir: PathBuf,
    /// Where generated engine scripts are written and removed.
    pub temp_dir: PathBuf,
    /// Engine used when a request does not name one. `"auto"` by default.
    pub default_engine: String,
    pub default_quality: Quality,
    /// Interpreter tried before the built-in candidate list.
    pub python_path: Option<PathBuf>,
    /// Override for the native speech command (`say` / `espeak-ng`).
    pub native_command: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let base = dirs::audio_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir);
        Self {
            output_dir: base.join("tts-mcp"),
            temp_dir: std::env::temp_dir().join("tts-mcp"),
            default_engine: AUTO_ENGINE.to_string(),
            default_quality: Quality::default(),
            python_path: None,
            native_command: None,
        }
    }
}

impl Config {
    /// Configuration rooted at `dir`, with `output/` and `tmp/` inside it.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            output_dir: dir.join("output"),
            temp_dir: dir.join("tmp"),
            ..Self::default()
        }
    }

    /// Create the output and temp directories if they are missing.
    pub fn ensure_dirs(&self) -> TtsResult<()> {
        for dir in [&self.output_dir, &self.temp_dir] {
            std::fs::create_dir_all(dir).map_err(|e| TtsError::file_op(dir, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_auto_and_balanced() {
        let config = Config::default();
        assert_eq!(config.default_engine, AUTO_ENGINE);
        assert_eq!(config.default_quality, Quality::Balanced);
        assert!(config.output_dir.ends_with("tts-mcp"));
    }

    #[test]
    fn ensure_dirs_creates_both() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::in_dir(tmp.path());
        config.ensure_dirs().unwrap();
        assert!(config.output_dir.is_dir());
        assert!(config.temp_dir.is_dir());
    }
}
