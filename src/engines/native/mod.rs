//! Operating-system speech command engine.
//!
//! Drives the speech synthesizer that ships with the host:
//!
//! | Host | Command | Voice listing | Output formats |
//! |---|---|---|---|
//! | macOS | `say` | `say -v ?` | `aiff`, `wav`, `m4a` |
//! | Linux / other Unix | `espeak-ng` | `espeak-ng --voices` | `wav` |
//!
//! # System Requirements
//!
//! On Linux, **espeak-ng** must be installed:
//! - **Debian/Ubuntu**: `sudo apt-get install espeak-ng`
//! - **Fedora**: `sudo dnf install espeak-ng`
//!
//! The engine registers under the name `system`. Speed multipliers map to
//! the command's words-per-minute rate via [`speech_rate`].

pub mod engine;
pub mod voices;

pub use engine::{speech_rate, NativeBackend, NativeEngine, ENGINE_NAME};
