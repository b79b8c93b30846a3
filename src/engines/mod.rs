//! Speech synthesis engines.
//!
//! This module contains the subprocess-backed engines and the state cell
//! they share.
//!
//! # Available Engines
//!
//! Enable engines via Cargo features:
//! - `native` - System speech command (`say` on macOS, `espeak-ng` elsewhere)
//! - `kokoro` - Kokoro TTS through a Python interpreter with the `kokoro` package

#[cfg(feature = "kokoro")]
pub mod kokoro;
#[cfg(feature = "native")]
pub mod native;

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{TtsError, TtsResult};
use crate::types::Voice;

/// What an engine learned during initialization.
#[derive(Debug, Clone)]
pub struct EngineState<T> {
    pub available: bool,
    pub voices: Vec<Voice>,
    /// Why the engine is unavailable, or a note about the backend in use.
    pub detail: Option<String>,
    pub backend: T,
}

impl<T: Default> EngineState<T> {
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            available: false,
            voices: Vec::new(),
            detail: Some(detail.into()),
            backend: T::default(),
        }
    }
}

/// Lazily initialized, resettable engine state.
///
/// Reads are synchronous so `is_available` stays cheap; initialization is
/// serialized by an async lock so concurrent callers share one probe.
pub(crate) struct EngineCell<T> {
    state: RwLock<Option<Arc<EngineState<T>>>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl<T> Default for EngineCell<T> {
    fn default() -> Self {
        Self {
            state: RwLock::new(None),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }
}

impl<T> EngineCell<T> {
    pub fn get(&self) -> Option<Arc<EngineState<T>>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> Arc<EngineState<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = EngineState<T>>,
    {
        if let Some(state) = self.get() {
            return state;
        }
        let _guard = self.init_lock.lock().await;
        if let Some(state) = self.get() {
            return state;
        }
        let state = Arc::new(init().await);
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(state.clone());
        state
    }

    pub fn clear(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Pick the voice for a request.
///
/// An explicit request must match a catalog voice by id or name. Without
/// one, `default_id` is used if listed, then the first catalog voice.
pub fn resolve_voice<'a>(
    engine: &str,
    voices: &'a [Voice],
    requested: Option<&str>,
    default_id: &str,
) -> TtsResult<&'a Voice> {
    match requested.map(str::trim).filter(|v| !v.is_empty()) {
        Some(requested) => voices
            .iter()
            .find(|v| v.matches(requested))
            .ok_or_else(|| TtsError::VoiceNotFound {
                engine: engine.to_string(),
                voice: requested.to_string(),
            }),
        None => voices
            .iter()
            .find(|v| v.matches(default_id))
            .or_else(|| voices.first())
            .ok_or_else(|| TtsError::unavailable(engine, "engine reports no voices")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Gender, Quality};

    fn voice(id: &str, name: &str) -> Voice {
        Voice {
            id: id.to_string(),
            name: name.to_string(),
            language: "en-US".to_string(),
            gender: Gender::Neutral,
            description: None,
            engine: "test".to_string(),
            quality: Quality::Balanced,
        }
    }

    #[test]
    fn resolves_explicit_voice_case_insensitively() {
        let voices = vec![voice("alex", "Alex"), voice("samantha", "Samantha")];
        let found = resolve_voice("test", &voices, Some("SAMANTHA"), "alex").unwrap();
        assert_eq!(found.id, "samantha");
    }

    #[test]
    fn unknown_explicit_voice_is_not_found() {
        let voices = vec![voice("alex", "Alex")];
        let err = resolve_voice("test", &voices, Some("nobody"), "alex").unwrap_err();
        assert!(matches!(err, TtsError::VoiceNotFound { ref voice, .. } if voice == "nobody"));
    }

    #[test]
    fn omitted_voice_uses_default_then_first() {
        let voices = vec![voice("alex", "Alex"), voice("samantha", "Samantha")];
        assert_eq!(
            resolve_voice("test", &voices, None, "samantha").unwrap().id,
            "samantha"
        );
        assert_eq!(
            resolve_voice("test", &voices, Some("  "), "missing").unwrap().id,
            "alex"
        );
    }

    #[tokio::test]
    async fn cell_initializes_once_until_cleared() {
        let cell: EngineCell<()> = EngineCell::default();
        assert!(cell.get().is_none());

        let first = cell
            .get_or_init(|| async { EngineState::unavailable("first") })
            .await;
        let second = cell
            .get_or_init(|| async { EngineState::unavailable("second") })
            .await;
        assert_eq!(first.detail.as_deref(), Some("first"));
        assert_eq!(second.detail.as_deref(), Some("first"));

        cell.clear();
        let third = cell
            .get_or_init(|| async { EngineState::unavailable("third") })
            .await;
        assert_eq!(third.detail.as_deref(), Some("third"));
    }
}
