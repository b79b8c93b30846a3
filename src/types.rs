use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{TtsError, TtsResult};

/// Longest text accepted for a single synthesis, in characters.
pub const MAX_TEXT_LENGTH: usize = 50_000;

/// Accepted range for the speed multiplier.
pub const MIN_SPEED: f32 = 0.1;
pub const MAX_SPEED: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Neutral,
}

impl FromStr for Gender {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "female" | "f" => Ok(Self::Female),
            "male" | "m" => Ok(Self::Male),
            "neutral" => Ok(Self::Neutral),
            other => Err(TtsError::InvalidParameters(format!(
                "unknown gender '{other}' (expected female, male or neutral)"
            ))),
        }
    }
}

/// Quality tier of a voice or requested synthesis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Fast,
    #[default]
    Balanced,
    High,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::High => "high",
        })
    }
}

impl FromStr for Quality {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "balanced" => Ok(Self::Balanced),
            "high" => Ok(Self::High),
            other => Err(TtsError::InvalidParameters(format!(
                "unknown quality '{other}' (expected fast, balanced or high)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Aiff,
    M4a,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Aiff => "aiff",
            Self::M4a => "m4a",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "aiff" | "aif" => Ok(Self::Aiff),
            "m4a" => Ok(Self::M4a),
            other => Err(TtsError::InvalidParameters(format!(
                "unsupported output format '{other}' (expected wav, aiff or m4a)"
            ))),
        }
    }
}

/// A synthesis voice as reported by one engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    pub id: String,
    pub name: String,
    pub language: String,
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub engine: String,
    pub quality: Quality,
}

impl Voice {
    /// Case-insensitive match on either the id or the display name.
    pub fn matches(&self, requested: &str) -> bool {
        self.id.eq_ignore_ascii_case(requested) || self.name.eq_ignore_ascii_case(requested)
    }
}

/// Parameters for one synthesis call.
///
/// ```
/// use tts_mcp::{AudioFormat, SynthesisRequestBuilder};
///
/// let request = SynthesisRequestBuilder::default()
///     .text("Hello, world!")
///     .voice("af_heart")
///     .speed(1.2)
///     .build()?;
/// assert_eq!(request.output_format, AudioFormat::Wav);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SynthesisRequest {
    #[builder(setter(into))]
    pub text: String,
    /// Voice id or display name. `None` picks the engine default.
    #[builder(default, setter(into, strip_option))]
    pub voice: Option<String>,
    /// Engine name or `"auto"`. `None` uses the configured default.
    #[builder(default, setter(into, strip_option))]
    pub engine: Option<String>,
    #[builder(default)]
    pub output_format: AudioFormat,
    /// Speech speed multiplier. Range: 0.1–3.0, default 1.0.
    #[builder(default = "1.0")]
    pub speed: f32,
    #[builder(default)]
    pub quality: Quality,
}

impl SynthesisRequest {
    /// Checks that do not depend on any engine.
    pub fn validate(&self) -> TtsResult<()> {
        validate_text(&self.text)?;
        if !self.speed.is_finite() || !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(TtsError::InvalidParameters(format!(
                "speed must be between {MIN_SPEED} and {MAX_SPEED}, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}

/// Reject empty text and text over [`MAX_TEXT_LENGTH`] characters.
pub fn validate_text(text: &str) -> TtsResult<()> {
    if text.trim().is_empty() {
        return Err(TtsError::InvalidParameters(
            "text must not be empty".to_string(),
        ));
    }
    let length = text.chars().count();
    if length > MAX_TEXT_LENGTH {
        return Err(TtsError::TextTooLong {
            length,
            max: MAX_TEXT_LENGTH,
        });
    }
    Ok(())
}

/// The result of a successful synthesis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResult {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
    #[serde(serialize_with = "serialize_millis", rename = "durationMs")]
    pub duration: Duration,
    pub voice: String,
    pub engine: String,
    pub quality: Quality,
    /// Length of the produced audio, when it can be read back (WAV only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_duration_secs: Option<f64>,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(text: &str) -> SynthesisRequest {
        SynthesisRequestBuilder::default()
            .text(text)
            .build()
            .expect("text is the only required field")
    }

    #[test]
    fn builder_defaults() {
        let req = request("hi");
        assert_eq!(req.speed, 1.0);
        assert_eq!(req.quality, Quality::Balanced);
        assert_eq!(req.output_format, AudioFormat::Wav);
        assert!(req.voice.is_none());
        assert!(req.engine.is_none());
    }

    #[test]
    fn builder_requires_text() {
        assert!(SynthesisRequestBuilder::default().build().is_err());
    }

    #[test]
    fn rejects_blank_text() {
        for text in ["", "   ", "\n\t "] {
            let err = request(text).validate().unwrap_err();
            assert!(matches!(err, TtsError::InvalidParameters(_)), "{text:?}");
        }
    }

    #[test]
    fn rejects_text_over_limit() {
        let err = request(&"a".repeat(MAX_TEXT_LENGTH + 1))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            TtsError::TextTooLong {
                length: 50_001,
                max: 50_000
            }
        ));
        assert!(request(&"a".repeat(MAX_TEXT_LENGTH)).validate().is_ok());
    }

    #[test]
    fn counts_characters_not_bytes() {
        // 50,000 two-byte characters is within the limit.
        assert!(validate_text(&"é".repeat(MAX_TEXT_LENGTH)).is_ok());
    }

    #[test]
    fn rejects_speed_out_of_range() {
        for speed in [0.0, 0.05, 3.5, f32::NAN] {
            let mut req = request("hello");
            req.speed = speed;
            assert!(
                matches!(req.validate(), Err(TtsError::InvalidParameters(_))),
                "{speed}"
            );
        }
        let mut req = request("hello");
        req.speed = 3.0;
        assert!(req.validate().is_ok());
        req.speed = 0.1;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn parses_enums_case_insensitively() {
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert_eq!("High".parse::<Quality>().unwrap(), Quality::High);
        assert_eq!("F".parse::<Gender>().unwrap(), Gender::Female);
        assert!("ogg".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn voice_matches_id_or_name() {
        let voice = Voice {
            id: "af_heart".to_string(),
            name: "Heart".to_string(),
            language: "en-US".to_string(),
            gender: Gender::Female,
            description: None,
            engine: "kokoro".to_string(),
            quality: Quality::High,
        };
        assert!(voice.matches("AF_HEART"));
        assert!(voice.matches("heart"));
        assert!(!voice.matches("bella"));
    }
}
