//! Engine registry and request routing.

use std::sync::Arc;

use serde::Serialize;

use crate::config::AUTO_ENGINE;
use crate::error::{TtsError, TtsResult};
use crate::types::{AudioFormat, AudioResult, Gender, SynthesisRequest, Voice};
use crate::{Config, SynthesisEngine};

/// Engines tried, in order, when a request asks for `"auto"`.
pub const AUTO_PREFERENCE: &[&str] = &["kokoro", "system"];

/// Health of one registered engine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineReport {
    pub name: String,
    pub initialized: bool,
    pub available: bool,
    pub voice_count: usize,
    pub supported_formats: Vec<AudioFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub default_engine: String,
    pub engines: Vec<EngineReport>,
}

/// Holds the registered engines and picks one per request.
pub struct Router {
    engines: Vec<Arc<dyn SynthesisEngine>>,
    default_engine: String,
}

impl Router {
    pub fn new(engines: Vec<Arc<dyn SynthesisEngine>>, default_engine: impl Into<String>) -> Self {
        Self {
            engines,
            default_engine: default_engine.into(),
        }
    }

    /// Router with every engine compiled into this build, in preference
    /// order.
    pub fn with_default_engines(config: &Config) -> Self {
        #[allow(unused_mut)]
        let mut engines: Vec<Arc<dyn SynthesisEngine>> = Vec::new();
        #[cfg(feature = "kokoro")]
        engines.push(Arc::new(crate::engines::kokoro::KokoroEngine::new(config)));
        #[cfg(feature = "native")]
        engines.push(Arc::new(crate::engines::native::NativeEngine::new(config)));
        Self::new(engines, config.default_engine.clone())
    }

    pub fn engines(&self) -> &[Arc<dyn SynthesisEngine>] {
        &self.engines
    }

    pub fn engine(&self, name: &str) -> Option<&Arc<dyn SynthesisEngine>> {
        self.engines.iter().find(|e| e.name() == name)
    }

    pub fn default_engine(&self) -> &str {
        &self.default_engine
    }

    /// Initialize every engine. Failures are logged; an engine that fails
    /// stays registered as unavailable.
    pub async fn initialize_all(&self) {
        for engine in &self.engines {
            match engine.initialize().await {
                Ok(()) if engine.is_available() => log::info!("Engine '{}' available", engine.name()),
                Ok(()) => log::info!(
                    "Engine '{}' unavailable: {}",
                    engine.name(),
                    engine.status_detail().unwrap_or_default()
                ),
                Err(e) => log::warn!("Engine '{}' failed to initialize: {e}", engine.name()),
            }
        }
    }

    /// Resolve an engine selector. `None` means the configured default.
    pub async fn select(&self, name: Option<&str>) -> TtsResult<Arc<dyn SynthesisEngine>> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.default_engine.as_str());

        if !name.eq_ignore_ascii_case(AUTO_ENGINE) {
            return self
                .engine(name)
                .cloned()
                .ok_or_else(|| TtsError::unavailable(name, "no engine is registered under this name"));
        }

        for preferred in AUTO_PREFERENCE {
            let Some(engine) = self.engine(preferred) else {
                continue;
            };
            if !engine.is_initialized() {
                if let Err(e) = engine.initialize().await {
                    log::warn!("Engine '{preferred}' failed to initialize: {e}");
                    continue;
                }
            }
            if engine.is_available() {
                log::debug!("Auto-selected engine '{preferred}'");
                return Ok(engine.clone());
            }
        }
        Err(TtsError::unavailable(
            AUTO_ENGINE,
            "no text-to-speech engine is available on this host",
        ))
    }

    /// Validate `request`, select its engine and synthesize.
    pub async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<AudioResult> {
        request.validate()?;
        let engine = self.select(request.engine.as_deref()).await?;
        log::info!(
            "Synthesizing {} characters with '{}'",
            request.text.chars().count(),
            engine.name()
        );
        let result = engine.synthesize(&request).await;
        match &result {
            Ok(audio) => log::info!(
                "Wrote {} ({} bytes) in {} ms",
                audio.path.display(),
                audio.size_bytes,
                audio.duration.as_millis()
            ),
            Err(e) => log::warn!("Synthesis with '{}' failed: {e}", engine.name()),
        }
        result
    }

    /// Voices of the named engine, or of every available engine.
    pub async fn list_voices(
        &self,
        engine: Option<&str>,
        language: Option<&str>,
        gender: Option<Gender>,
    ) -> TtsResult<Vec<Voice>> {
        let mut voices = Vec::new();
        match engine.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) if !name.eq_ignore_ascii_case(AUTO_ENGINE) => {
                let engine = self
                    .engine(name)
                    .ok_or_else(|| TtsError::unavailable(name, "no engine is registered under this name"))?;
                voices.extend(engine.list_voices().await?);
            }
            _ => {
                for engine in &self.engines {
                    match engine.list_voices().await {
                        Ok(list) => voices.extend(list),
                        Err(TtsError::EngineNotAvailable { .. }) => {}
                        Err(e) => log::warn!("Listing voices of '{}' failed: {e}", engine.name()),
                    }
                }
            }
        }

        if let Some(language) = language.map(normalize_tag).filter(|l| !l.is_empty()) {
            voices.retain(|v| normalize_tag(&v.language).starts_with(&language));
        }
        if let Some(gender) = gender {
            voices.retain(|v| v.gender == gender);
        }
        Ok(voices)
    }

    pub async fn health(&self) -> HealthReport {
        let mut engines = Vec::with_capacity(self.engines.len());
        for engine in &self.engines {
            let available = engine.is_initialized() && engine.is_available();
            let voice_count = if available {
                engine.list_voices().await.map(|v| v.len()).unwrap_or(0)
            } else {
                0
            };
            engines.push(EngineReport {
                name: engine.name().to_string(),
                initialized: engine.is_initialized(),
                available,
                voice_count,
                supported_formats: engine.supported_formats().to_vec(),
                detail: engine.status_detail(),
            });
        }

        let up = engines.iter().filter(|e| e.available).count();
        let status = match up {
            0 => HealthStatus::Unhealthy,
            n if n == engines.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        };
        HealthReport {
            status,
            default_engine: self.default_engine.clone(),
            engines,
        }
    }

    /// Release every engine's state.
    pub async fn cleanup(&self) {
        for engine in &self.engines {
            if let Err(e) = engine.cleanup().await {
                log::warn!("Cleanup of '{}' failed: {e}", engine.name());
            }
        }
    }
}

/// Lowercase with `_` folded to `-`, so `en_us` and `en-US` compare equal.
fn normalize_tag(tag: &str) -> String {
    tag.trim().to_ascii_lowercase().replace('_', "-")
}
