//! Kokoro-82M text-to-speech engine implementation.
//!
//! This module drives the Kokoro neural TTS model through its Python
//! package. Nothing is loaded in-process: each request writes a small script
//! to the temp directory and runs it with a discovered interpreter.
//!
//! # System Requirements
//!
//! A Python 3 interpreter with the **kokoro** and **soundfile** packages:
//! - `pip install kokoro soundfile`
//! - **espeak-ng** is required by Kokoro for some languages
//!
//! Set `TTS_PYTHON_PATH` to use an interpreter from a virtual environment.
//!
//! # Language Support
//!
//! | Voice prefix | Language | Pipeline code |
//! |---|---|---|
//! | `af_`, `am_` | American English | `a` |
//! | `bf_`, `bm_` | British English | `b` |
//! | `ef_`, `em_` | Spanish | `e` |
//! | `ff_` | French | `f` |
//! | `hf_`, `hm_` | Hindi | `h` |
//! | `if_`, `im_` | Italian | `i` |
//! | `jf_`, `jm_` | Japanese | `j` |
//! | `pf_`, `pm_` | Brazilian Portuguese | `p` |
//! | `zf_`, `zm_` | Mandarin Chinese | `z` |
//!
//! # Voice Naming Convention
//!
//! Voices follow the pattern `{language_prefix}_{name}`, e.g.:
//! - `af_heart`: American English female "heart" (the default)
//! - `bf_emma`: British English female "emma"
//! - `jm_kumo`: Japanese male "kumo"
//!
//! # Success Contract
//!
//! A run only counts as successful when the interpreter exits with status 0
//! **and** prints [`script::SUCCESS_MARKER`] on stdout. Scripts run under a
//! 30-second deadline and are deleted afterwards.

pub mod engine;
pub mod interpreter;
pub mod script;
pub mod voices;

pub use engine::{KokoroEngine, ENGINE_NAME};
pub use interpreter::Interpreter;
