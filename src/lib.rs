//! # tts-mcp
//!
//! Local text-to-speech exposed as callable tools over JSON-RPC (MCP) stdio.
//!
//! ## Features
//!
//! - **System TTS**: `say` on macOS, `espeak-ng` elsewhere, driven as a subprocess
//! - **Kokoro TTS**: the Kokoro neural engine, driven through a generated Python script
//! - **Routing**: explicit engine selection or automatic preference with fallback
//! - **Playback**: play, pause, resume and stop synthesized files through a system player
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tts-mcp = { version = "2026.2", features = ["kokoro"] }
//! ```
//!
//! ```ignore
//! use tts_mcp::{Config, Router, SynthesisRequestBuilder};
//!
//! let router = Router::with_default_engines(&Config::default());
//! router.initialize_all().await;
//!
//! let request = SynthesisRequestBuilder::default().text("Hello, world!").build()?;
//! let result = router.synthesize(request).await?;
//! println!("Wrote {} bytes to {}", result.size_bytes, result.path.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod output;
pub mod playback;
pub mod process;
pub mod router;
pub mod server;
pub mod types;

use async_trait::async_trait;

pub use config::Config;
pub use error::{TtsError, TtsResult};
pub use playback::{PlaybackController, PlaybackReport, PlaybackStatus};
pub use router::Router;
pub use types::{
    AudioFormat, AudioResult, Gender, Quality, SynthesisRequest, SynthesisRequestBuilder, Voice,
};

/// Common interface for text-to-speech synthesis engines.
///
/// Engines are shared behind `Arc` and keep their mutable state internally,
/// so every operation takes `&self`.
#[async_trait]
pub trait SynthesisEngine: Send + Sync {
    /// Registry name, e.g. `"kokoro"` or `"system"`.
    fn name(&self) -> &str;

    /// Output formats this engine can write.
    fn supported_formats(&self) -> &[AudioFormat];

    /// Probe the backend and load the voice catalog.
    ///
    /// Idempotent. A failed probe leaves the engine marked unavailable; it
    /// never takes the host down.
    async fn initialize(&self) -> TtsResult<()>;

    /// Fast, side-effect-free availability check, safe before `initialize`.
    fn is_available(&self) -> bool;

    fn is_initialized(&self) -> bool;

    /// Human-readable note on the engine state, e.g. why it is unavailable.
    fn status_detail(&self) -> Option<String> {
        None
    }

    /// Voices offered by this engine. Initializes the engine if needed.
    async fn list_voices(&self) -> TtsResult<Vec<Voice>>;

    /// Synthesize `request.text` to a file in the output directory.
    ///
    /// On failure no partial output file is left behind.
    async fn synthesize(&self, request: &SynthesisRequest) -> TtsResult<AudioResult>;

    /// Release engine state. A later call to `initialize` starts fresh.
    async fn cleanup(&self) -> TtsResult<()>;
}
