use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uuid::Uuid;

use crate::engines::{resolve_voice, EngineCell, EngineState};
use crate::error::{TtsError, TtsResult};
use crate::output::{discard_partial, finished_size, output_path, wav_duration_secs};
use crate::process::{self, ProcessError, EXTERNAL_TIMEOUT};
use crate::types::{validate_text, AudioFormat, AudioResult, SynthesisRequest, Voice};
use crate::{Config, SynthesisEngine};

use super::interpreter::{self, Interpreter};
use super::script::{self, ScriptParams};
use super::voices::{catalog, pipeline_lang_code, DEFAULT_VOICE};

pub const ENGINE_NAME: &str = "kokoro";

const SCRIPT_PREFIX: &str = "kokoro_";

/// Kokoro text-to-speech engine.
///
/// Runs the Kokoro-82M model through the `kokoro` Python package. Each
/// synthesis writes a one-off script to the temp directory and executes it
/// with the discovered interpreter.
///
/// # Quick Start
///
/// ```rust,no_run
/// use tts_mcp::{Config, SynthesisEngine, SynthesisRequestBuilder};
/// use tts_mcp::engines::kokoro::KokoroEngine;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// // Uses python3 (or python, python3.12, ...) from PATH
/// let engine = KokoroEngine::new(&Config::default());
/// engine.initialize().await?;
/// let request = SynthesisRequestBuilder::default()
///     .text("Hello, world!")
///     .voice("bf_emma")
///     .build()?;
/// let result = engine.synthesize(&request).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Virtual environments
///
/// Point the engine at a specific interpreter, e.g. one inside a venv where
/// `kokoro` is installed, with [`Config::python_path`].
pub struct KokoroEngine {
    python_override: Option<PathBuf>,
    output_dir: PathBuf,
    temp_dir: PathBuf,
    synthesis_timeout: Duration,
    cell: EngineCell<Interpreter>,
}

impl KokoroEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            python_override: config.python_path.clone(),
            output_dir: config.output_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            synthesis_timeout: EXTERNAL_TIMEOUT,
            cell: EngineCell::default(),
        }
    }

    /// Replace the script deadline (30 seconds by default).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    /// Interpreter found during initialization, if any.
    pub fn interpreter(&self) -> Option<PathBuf> {
        self.cell
            .get()
            .filter(|state| state.available)
            .map(|state| state.backend.path.clone())
    }

    async fn probe(&self) -> EngineState<Interpreter> {
        let candidates = interpreter::candidates(self.python_override.as_deref());
        let Some(found) = interpreter::discover(&candidates).await else {
            return EngineState::unavailable(format!(
                "no Python interpreter found (tried {})",
                candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        };
        if let Err(reason) = interpreter::check_packages(&found.path).await {
            return EngineState::unavailable(reason);
        }

        let voices = catalog();
        log::info!(
            "Kokoro ready with {} ({}), {} voices",
            found.path.display(),
            found.version,
            voices.len()
        );
        EngineState {
            available: true,
            voices,
            detail: Some(format!("{} at {}", found.version, found.path.display())),
            backend: found,
        }
    }

    async fn ready(&self) -> TtsResult<Arc<EngineState<Interpreter>>> {
        let state = self.cell.get_or_init(|| self.probe()).await;
        if state.available {
            Ok(state)
        } else {
            Err(TtsError::unavailable(
                ENGINE_NAME,
                state.detail.clone().unwrap_or_default(),
            ))
        }
    }

    async fn render(
        &self,
        interpreter: &Path,
        voice: &Voice,
        request: &SynthesisRequest,
        path: &Path,
    ) -> TtsResult<u64> {
        let source = script::render(&ScriptParams {
            text: &request.text,
            voice: &voice.id,
            lang_code: pipeline_lang_code(&voice.id),
            speed: request.speed,
            output_path: path,
        });
        let script_path = self
            .temp_dir
            .join(format!("{SCRIPT_PREFIX}{}.py", Uuid::new_v4().simple()));
        tokio::fs::write(&script_path, source)
            .await
            .map_err(|e| TtsError::file_op(&script_path, e))?;

        let result = process::run(interpreter, [&script_path], self.synthesis_timeout).await;

        if let Err(e) = tokio::fs::remove_file(&script_path).await {
            log::warn!("Could not remove script {}: {e}", script_path.display());
        }

        let output = result.map_err(|e| match e {
            ProcessError::TimedOut { after, .. } => TtsError::Timeout {
                engine: Some(ENGINE_NAME.to_string()),
                operation: "kokoro synthesis".to_string(),
                after,
            },
            other => TtsError::synthesis_with(ENGINE_NAME, "could not run the interpreter", other),
        })?;

        if !output.status.success() {
            let stderr = process::stderr_text(&output);
            return Err(TtsError::synthesis(
                ENGINE_NAME,
                format!(
                    "script exited with {}: {}",
                    output.status,
                    stderr.lines().last().unwrap_or_default()
                ),
            ));
        }
        if !script::reported_success(&output.stdout) {
            return Err(TtsError::synthesis(
                ENGINE_NAME,
                "script exited cleanly but did not report success",
            ));
        }
        finished_size(path, ENGINE_NAME).await
    }
}

#[async_trait]
impl SynthesisEngine for KokoroEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn supported_formats(&self) -> &[AudioFormat] {
        &[AudioFormat::Wav]
    }

    /// Never fails: a missing interpreter or package leaves the engine
    /// registered but unavailable.
    async fn initialize(&self) -> TtsResult<()> {
        if let Err(e) = self.ready().await {
            log::warn!("{e}");
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        match self.cell.get() {
            Some(state) => state.available,
            None => interpreter::candidates(self.python_override.as_deref())
                .iter()
                .any(|c| process::find_program(c).is_some()),
        }
    }

    fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }

    fn status_detail(&self) -> Option<String> {
        self.cell.get().and_then(|state| state.detail.clone())
    }

    async fn list_voices(&self) -> TtsResult<Vec<Voice>> {
        Ok(self.ready().await?.voices.clone())
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> TtsResult<AudioResult> {
        validate_text(&request.text)?;
        let state = self.ready().await?;
        if request.output_format != AudioFormat::Wav {
            return Err(TtsError::InvalidParameters(format!(
                "kokoro only writes wav output, not {}",
                request.output_format
            )));
        }
        let voice = resolve_voice(
            ENGINE_NAME,
            &state.voices,
            request.voice.as_deref(),
            DEFAULT_VOICE,
        )?;

        for dir in [&self.output_dir, &self.temp_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| TtsError::file_op(dir, e))?;
        }
        let path = output_path(
            &self.output_dir,
            ENGINE_NAME,
            &voice.id,
            &request.text,
            AudioFormat::Wav,
            chrono::Local::now(),
        );

        let started = Instant::now();
        let size_bytes = match self
            .render(&state.backend.path, voice, request, &path)
            .await
        {
            Ok(size) => size,
            Err(e) => {
                discard_partial(&path).await;
                return Err(e);
            }
        };

        Ok(AudioResult {
            audio_duration_secs: wav_duration_secs(&path),
            path,
            format: AudioFormat::Wav,
            size_bytes,
            duration: started.elapsed(),
            voice: voice.id.clone(),
            engine: ENGINE_NAME.to_string(),
            quality: request.quality,
        })
    }

    /// Drops the cached interpreter and catalog and removes scripts left by
    /// interrupted requests.
    async fn cleanup(&self) -> TtsResult<()> {
        self.cell.clear();
        let mut entries = match tokio::fs::read_dir(&self.temp_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(TtsError::file_op(&self.temp_dir, e)),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TtsError::file_op(&self.temp_dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(SCRIPT_PREFIX) && name.ends_with(".py") {
                log::debug!("Removing leftover script {name}");
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
        Ok(())
    }
}
