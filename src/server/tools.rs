//! The four tools exposed over `tools/call`.

use std::path::PathBuf;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::protocol::{CallToolResult, ToolContent, ToolDefinition};
use crate::error::{TtsError, TtsResult};
use crate::types::{AudioFormat, Gender, Quality, SynthesisRequest, Voice, MAX_TEXT_LENGTH};
use crate::{PlaybackController, Router};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    SynthesizeText,
    ListVoices,
    HealthCheck,
    PlayAudio,
}

impl Tool {
    pub const ALL: [Tool; 4] = [
        Tool::SynthesizeText,
        Tool::ListVoices,
        Tool::HealthCheck,
        Tool::PlayAudio,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::SynthesizeText => "synthesize_text",
            Tool::ListVoices => "list_voices",
            Tool::HealthCheck => "health_check",
            Tool::PlayAudio => "play_audio",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    pub fn definition(self) -> ToolDefinition {
        let (description, input_schema) = match self {
            Tool::SynthesizeText => (
                "Convert text to speech and save it as an audio file. Returns the file path.",
                json!({
                    "type": "object",
                    "properties": {
                        "text": {
                            "type": "string",
                            "description": format!("Text to speak (at most {MAX_TEXT_LENGTH} characters)")
                        },
                        "voice": {
                            "type": "string",
                            "description": "Voice id or name. Use list_voices to see options."
                        },
                        "engine": {
                            "type": "string",
                            "description": "Engine to use: kokoro, system or auto"
                        },
                        "outputFormat": {
                            "type": "string",
                            "enum": ["wav", "aiff", "m4a"],
                            "description": "Audio file format (default wav)"
                        },
                        "speed": {
                            "type": "number",
                            "minimum": 0.1,
                            "maximum": 3.0,
                            "description": "Speech speed multiplier (default 1.0)"
                        },
                        "quality": {
                            "type": "string",
                            "enum": ["fast", "balanced", "high"]
                        }
                    },
                    "required": ["text"]
                }),
            ),
            Tool::ListVoices => (
                "List available voices, optionally filtered by engine, language or gender.",
                json!({
                    "type": "object",
                    "properties": {
                        "engine": {"type": "string", "description": "Only voices of this engine"},
                        "language": {"type": "string", "description": "Language prefix, e.g. en or en-GB"},
                        "gender": {"type": "string", "enum": ["female", "male", "neutral"]}
                    }
                }),
            ),
            Tool::HealthCheck => (
                "Report which engines are available and the overall server status.",
                json!({"type": "object", "properties": {}}),
            ),
            Tool::PlayAudio => (
                "Play, pause, resume or stop an audio file, or report playback status.",
                json!({
                    "type": "object",
                    "properties": {
                        "audioPath": {
                            "type": "string",
                            "description": "File to play. Defaults to the most recently synthesized file."
                        },
                        "action": {
                            "type": "string",
                            "enum": ["play", "pause", "resume", "stop", "status"],
                            "description": "Default play"
                        }
                    }
                }),
            ),
        };
        ToolDefinition {
            name: self.name().to_string(),
            description: description.to_string(),
            input_schema,
        }
    }
}

pub fn definitions() -> Vec<ToolDefinition> {
    Tool::ALL.into_iter().map(Tool::definition).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeArgs {
    text: String,
    voice: Option<String>,
    engine: Option<String>,
    output_format: Option<String>,
    speed: Option<f32>,
    quality: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListVoicesArgs {
    engine: Option<String>,
    language: Option<String>,
    gender: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayAudioArgs {
    audio_path: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackAction {
    Play,
    Pause,
    Resume,
    Stop,
    Status,
}

impl FromStr for PlaybackAction {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            "status" => Ok(Self::Status),
            other => Err(TtsError::InvalidParameters(format!(
                "unknown playback action '{other}' (expected play, pause, resume, stop or status)"
            ))),
        }
    }
}

#[derive(Serialize)]
struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

#[derive(Serialize)]
struct VoiceList {
    count: usize,
    voices: Vec<Voice>,
}

fn args<T: DeserializeOwned + Default>(arguments: Option<Value>) -> TtsResult<T> {
    match arguments {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| TtsError::InvalidParameters(format!("invalid arguments: {e}"))),
    }
}

fn parse_opt<T: FromStr<Err = TtsError>>(value: Option<&str>) -> TtsResult<Option<T>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::parse::<T>)
        .transpose()
}

fn payload<T: Serialize>(data: T) -> TtsResult<Value> {
    serde_json::to_value(Success {
        success: true,
        data,
    })
    .map_err(|e| TtsError::InvalidParameters(format!("unserializable result: {e}")))
}

/// Shared state the tools operate on.
pub struct ToolContext<'a> {
    pub router: &'a Router,
    pub playback: &'a PlaybackController,
    pub default_quality: Quality,
}

impl ToolContext<'_> {
    /// Run `tool`. Failures are reported inside the result, never as a
    /// protocol error.
    pub async fn call(&self, tool: Tool, arguments: Option<Value>) -> CallToolResult {
        let outcome = match tool {
            Tool::SynthesizeText => self.synthesize(arguments).await,
            Tool::ListVoices => self.list_voices(arguments).await,
            Tool::HealthCheck => payload(self.router.health().await),
            Tool::PlayAudio => self.play_audio(arguments).await,
        };
        match outcome {
            Ok(data) => CallToolResult {
                content: vec![ToolContent::Text {
                    text: data.to_string(),
                }],
                is_error: false,
            },
            Err(e) => {
                log::debug!("Tool {} failed: {e}", tool.name());
                error_result(&e)
            }
        }
    }

    async fn synthesize(&self, arguments: Option<Value>) -> TtsResult<Value> {
        let args: SynthesizeArgs = match arguments {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| TtsError::InvalidParameters(format!("invalid arguments: {e}")))?,
            None => return Err(TtsError::InvalidParameters("text is required".to_string())),
        };
        let request = SynthesisRequest {
            text: args.text,
            voice: args.voice,
            engine: args.engine,
            output_format: parse_opt::<AudioFormat>(args.output_format.as_deref())?
                .unwrap_or_default(),
            speed: args.speed.unwrap_or(1.0),
            quality: parse_opt::<Quality>(args.quality.as_deref())?
                .unwrap_or(self.default_quality),
        };
        let audio = self.router.synthesize(request).await?;
        self.playback.remember(&audio.path).await;
        payload(audio)
    }

    async fn list_voices(&self, arguments: Option<Value>) -> TtsResult<Value> {
        let args: ListVoicesArgs = args(arguments)?;
        let gender = parse_opt::<Gender>(args.gender.as_deref())?;
        let voices = self
            .router
            .list_voices(args.engine.as_deref(), args.language.as_deref(), gender)
            .await?;
        payload(VoiceList {
            count: voices.len(),
            voices,
        })
    }

    async fn play_audio(&self, arguments: Option<Value>) -> TtsResult<Value> {
        let args: PlayAudioArgs = args(arguments)?;
        let action = parse_opt::<PlaybackAction>(args.action.as_deref())?
            .unwrap_or(PlaybackAction::Play);
        let path = args
            .audio_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let report = match action {
            PlaybackAction::Play => self.playback.play(path.as_deref()).await?,
            PlaybackAction::Pause => self.playback.pause().await?,
            PlaybackAction::Resume => self.playback.resume().await?,
            PlaybackAction::Stop => self.playback.stop().await?,
            PlaybackAction::Status => self.playback.status().await,
        };
        payload(report)
    }
}

/// Structured failure payload: `{success: false, error: {code, message, engine?}}`.
pub fn error_result(error: &TtsError) -> CallToolResult {
    let mut detail = json!({
        "code": error.code(),
        "message": error.to_string(),
    });
    if let Some(engine) = error.engine() {
        detail["engine"] = json!(engine);
    }
    CallToolResult {
        content: vec![ToolContent::Text {
            text: json!({"success": false, "error": detail}).to_string(),
        }],
        is_error: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(Tool::from_name("speak"), None);
    }

    #[test]
    fn synthesize_schema_requires_text() {
        let def = Tool::SynthesizeText.definition();
        assert_eq!(def.input_schema["required"], json!(["text"]));
        assert!(def.input_schema["properties"]["outputFormat"].is_object());
    }

    #[test]
    fn error_payload_carries_code_and_engine() {
        let result = error_result(&TtsError::VoiceNotFound {
            engine: "kokoro".to_string(),
            voice: "nobody".to_string(),
        });
        assert!(result.is_error);
        let ToolContent::Text { text } = &result.content[0];
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["error"]["code"], json!("VOICE_NOT_FOUND"));
        assert_eq!(value["error"]["engine"], json!("kokoro"));
    }

    #[test]
    fn parses_playback_actions() {
        assert_eq!("PAUSE".parse::<PlaybackAction>().unwrap(), PlaybackAction::Pause);
        assert!("rewind".parse::<PlaybackAction>().is_err());
        assert_eq!(parse_opt::<PlaybackAction>(Some("  ")).unwrap(), None);
    }
}
