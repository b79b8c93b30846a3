use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::engines::{resolve_voice, EngineCell, EngineState};
use crate::error::{TtsError, TtsResult};
use crate::output::{discard_partial, finished_size, output_path, wav_duration_secs};
use crate::process::{self, ProcessError, LISTING_TIMEOUT, NATIVE_SYNTHESIS_TIMEOUT};
use crate::types::{validate_text, AudioFormat, AudioResult, SynthesisRequest, Voice};
use crate::{Config, SynthesisEngine};

use super::voices::{parse_espeak_voices, parse_say_voices};

pub const ENGINE_NAME: &str = "system";

/// Map a speed multiplier to a words-per-minute rate.
///
/// `speed * 200`, clamped to 80–400.
pub fn speech_rate(speed: f32) -> u32 {
    (speed * 200.0).round().clamp(80.0, 400.0) as u32
}

/// Which OS speech command drives the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeBackend {
    /// macOS `say`.
    Say,
    /// `espeak-ng`, available on most Unix-like systems.
    EspeakNg,
}

impl NativeBackend {
    /// `say` on macOS, `espeak-ng` everywhere else.
    pub fn for_host() -> Self {
        if cfg!(target_os = "macos") {
            Self::Say
        } else {
            Self::EspeakNg
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            Self::Say => "say",
            Self::EspeakNg => "espeak-ng",
        }
    }

    pub fn supported_on_host(self) -> bool {
        match self {
            Self::Say => cfg!(target_os = "macos"),
            Self::EspeakNg => cfg!(unix),
        }
    }

    pub fn default_voice(self) -> &'static str {
        match self {
            Self::Say => "Samantha",
            Self::EspeakNg => "en-us",
        }
    }

    pub fn formats(self) -> &'static [AudioFormat] {
        match self {
            Self::Say => &[AudioFormat::Aiff, AudioFormat::Wav, AudioFormat::M4a],
            Self::EspeakNg => &[AudioFormat::Wav],
        }
    }

    fn listing_args(self) -> &'static [&'static str] {
        match self {
            Self::Say => &["-v", "?"],
            Self::EspeakNg => &["--voices"],
        }
    }

    fn parse_voices(self, listing: &str) -> Vec<Voice> {
        match self {
            Self::Say => parse_say_voices(listing),
            Self::EspeakNg => parse_espeak_voices(listing),
        }
    }

    /// Command-line arguments for one synthesis call.
    pub fn synthesis_args(
        self,
        voice: &str,
        rate: u32,
        path: &Path,
        format: AudioFormat,
        text: &str,
    ) -> Vec<OsString> {
        let (voice_flag, rate_flag, out_flag) = match self {
            Self::Say => ("-v", "-r", "-o"),
            Self::EspeakNg => ("-v", "-s", "-w"),
        };
        let mut args: Vec<OsString> = vec![
            voice_flag.into(),
            voice.into(),
            rate_flag.into(),
            rate.to_string().into(),
            out_flag.into(),
            path.as_os_str().to_owned(),
        ];
        if self == Self::Say {
            match format {
                AudioFormat::Aiff => {}
                AudioFormat::Wav => {
                    args.push("--file-format=WAVE".into());
                    args.push("--data-format=LEI16".into());
                }
                AudioFormat::M4a => {
                    args.push("--file-format=m4af".into());
                    args.push("--data-format=aac".into());
                }
            }
        }
        // Keep text that starts with a dash from being read as an option.
        if text.starts_with('-') {
            args.push(format!(" {text}").into());
        } else {
            args.push(text.into());
        }
        args
    }
}

/// Text-to-speech through the operating system's speech command.
///
/// ```rust,no_run
/// use tts_mcp::{Config, SynthesisEngine, SynthesisRequestBuilder};
/// use tts_mcp::engines::native::NativeEngine;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = NativeEngine::new(&Config::default());
/// engine.initialize().await?;
/// let request = SynthesisRequestBuilder::default().text("Hello, world!").build()?;
/// let result = engine.synthesize(&request).await?;
/// println!("{}", result.path.display());
/// # Ok(())
/// # }
/// ```
pub struct NativeEngine {
    backend: NativeBackend,
    program: PathBuf,
    output_dir: PathBuf,
    synthesis_timeout: Duration,
    cell: EngineCell<()>,
}

impl NativeEngine {
    /// Engine for the host's backend, honouring a configured command override.
    pub fn new(config: &Config) -> Self {
        let backend = NativeBackend::for_host();
        let program = config
            .native_command
            .clone()
            .unwrap_or_else(|| PathBuf::from(backend.program()));
        Self::with_command(backend, program, config.output_dir.clone())
    }

    /// Engine with an explicit backend and command path.
    pub fn with_command(backend: NativeBackend, program: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            backend,
            program,
            output_dir,
            synthesis_timeout: NATIVE_SYNTHESIS_TIMEOUT,
            cell: EngineCell::default(),
        }
    }

    /// Replace the synthesis deadline (five minutes by default).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.synthesis_timeout = timeout;
        self
    }

    pub fn backend(&self) -> NativeBackend {
        self.backend
    }

    async fn probe(&self) -> EngineState<()> {
        let program = self.program.display().to_string();
        if !self.backend.supported_on_host() {
            return EngineState::unavailable(format!(
                "{} is not supported on this platform",
                self.backend.program()
            ));
        }
        if process::find_program(&self.program).is_none() {
            return EngineState::unavailable(format!("{program} was not found"));
        }

        let output =
            match process::run(&self.program, self.backend.listing_args(), LISTING_TIMEOUT).await {
                Ok(output) => output,
                Err(e) => return EngineState::unavailable(format!("voice listing failed: {e}")),
            };
        if !output.status.success() {
            return EngineState::unavailable(format!(
                "{program} voice listing exited with {}: {}",
                output.status,
                process::stderr_text(&output)
            ));
        }

        let voices = self
            .backend
            .parse_voices(&String::from_utf8_lossy(&output.stdout));
        if voices.is_empty() {
            return EngineState::unavailable(format!("{program} reported no voices"));
        }
        log::info!("Loaded {} {} voices", voices.len(), self.backend.program());
        EngineState {
            available: true,
            voices,
            detail: Some(format!("using {program}")),
            backend: (),
        }
    }

    /// Initialized state, or `EngineNotAvailable`.
    async fn ready(&self) -> TtsResult<Arc<EngineState<()>>> {
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

    async fn render(&self, voice: &Voice, request: &SynthesisRequest, path: &Path) -> TtsResult<u64> {
        let args = self.backend.synthesis_args(
            &voice.id,
            speech_rate(request.speed),
            path,
            request.output_format,
            &request.text,
        );
        log::debug!(
            "Running {} with voice {} for {} characters",
            self.program.display(),
            voice.id,
            request.text.chars().count()
        );

        let output = process::run(&self.program, &args, self.synthesis_timeout)
            .await
            .map_err(|e| self.process_error(e))?;
        if !output.status.success() {
            return Err(TtsError::synthesis(
                ENGINE_NAME,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    process::stderr_text(&output)
                ),
            ));
        }
        finished_size(path, ENGINE_NAME).await
    }

    fn process_error(&self, err: ProcessError) -> TtsError {
        match err {
            ProcessError::TimedOut { program, after } => TtsError::Timeout {
                engine: Some(ENGINE_NAME.to_string()),
                operation: format!("{program} synthesis"),
                after,
            },
            ProcessError::NotFound(program) => {
                TtsError::unavailable(ENGINE_NAME, format!("{program} was not found"))
            }
            err @ ProcessError::Io { .. } => {
                TtsError::synthesis_with(ENGINE_NAME, "could not run the speech command", err)
            }
        }
    }
}

#[async_trait]
impl SynthesisEngine for NativeEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn supported_formats(&self) -> &[AudioFormat] {
        self.backend.formats()
    }

    /// A missing or broken command leaves the engine unavailable rather
    /// than failing.
    async fn initialize(&self) -> TtsResult<()> {
        if let Err(e) = self.ready().await {
            log::warn!("{e}");
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        match self.cell.get() {
            Some(state) => state.available,
            None => {
                self.backend.supported_on_host() && process::find_program(&self.program).is_some()
            }
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
        if !self.supported_formats().contains(&request.output_format) {
            return Err(TtsError::InvalidParameters(format!(
                "{} cannot write {} output",
                self.backend.program(),
                request.output_format
            )));
        }
        let voice = resolve_voice(
            ENGINE_NAME,
            &state.voices,
            request.voice.as_deref(),
            self.backend.default_voice(),
        )?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| TtsError::file_op(&self.output_dir, e))?;
        let path = output_path(
            &self.output_dir,
            ENGINE_NAME,
            &voice.id,
            &request.text,
            request.output_format,
            chrono::Local::now(),
        );

        let started = Instant::now();
        let size_bytes = match self.render(voice, request, &path).await {
            Ok(size) => size,
            Err(e) => {
                discard_partial(&path).await;
                return Err(e);
            }
        };

        let audio_duration_secs = match request.output_format {
            AudioFormat::Wav => wav_duration_secs(&path),
            _ => None,
        };
        Ok(AudioResult {
            path,
            format: request.output_format,
            size_bytes,
            duration: started.elapsed(),
            voice: voice.id.clone(),
            engine: ENGINE_NAME.to_string(),
            quality: request.quality,
            audio_duration_secs,
        })
    }

    async fn cleanup(&self) -> TtsResult<()> {
        self.cell.clear();
        Ok(())
    }
}
