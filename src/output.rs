//! Output file naming and bookkeeping for synthesized audio.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::error::{TtsError, TtsResult};
use crate::types::AudioFormat;

const PREVIEW_CHARS: usize = 30;
const UNIQUE_CHARS: usize = 8;

/// Build `<engine>_<voice>_<timestamp>_<preview>_<unique>.<ext>` under `dir`.
///
/// The trailing random hex keeps concurrent requests that share text, voice
/// and millisecond from writing to the same file.
pub fn output_path(
    dir: &Path,
    engine: &str,
    voice: &str,
    text: &str,
    format: AudioFormat,
    now: DateTime<Local>,
) -> PathBuf {
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    let preview = match sanitize(&preview) {
        s if s.is_empty() => "speech".to_string(),
        s => s,
    };
    let unique = Uuid::new_v4().simple().to_string();
    let file_name = format!(
        "{}_{}_{}_{}_{}.{}",
        sanitize(engine),
        sanitize(voice),
        now.format("%Y%m%d_%H%M%S_%3f"),
        preview,
        &unique[..UNIQUE_CHARS],
        format.extension()
    );
    dir.join(file_name)
}

/// Lowercase, with each run of non-alphanumeric characters replaced by `_`.
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Remove a partially written output file, if any.
///
/// Failure to remove is logged rather than returned so the
/// synthesis error reaches the caller.
pub async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove partial output {}: {e}", path.display()),
    }
}

/// Size of a finished output file. Missing or empty files are a synthesis
/// failure for `engine`.
pub async fn finished_size(path: &Path, engine: &str) -> TtsResult<u64> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            TtsError::synthesis(
                engine,
                format!("no audio file was produced at {}", path.display()),
            )
        } else {
            TtsError::file_op(path, e)
        }
    })?;
    if meta.len() == 0 {
        return Err(TtsError::synthesis(
            engine,
            format!("audio file {} is empty", path.display()),
        ));
    }
    Ok(meta.len())
}

/// Duration of a WAV file in seconds, read from its header.
pub fn wav_duration_secs(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sanitizes_previews() {
        assert_eq!(sanitize("Hello, world!"), "hello_world");
        assert_eq!(sanitize("  --- "), "");
        assert_eq!(sanitize("Eddy (English (US))"), "eddy_english_us");
    }

    #[test]
    fn builds_names_from_engine_voice_time_and_text() {
        let now = Local.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap();
        let path = output_path(
            Path::new("/out"),
            "kokoro",
            "af_heart",
            "Hello, world! This text is longer than thirty characters.",
            AudioFormat::Wav,
            now,
        );
        assert_eq!(path.parent(), Some(Path::new("/out")));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let stem = name
            .strip_prefix("kokoro_af_heart_20260203_040506_000_hello_world_this_text_is_lon_")
            .and_then(|rest| rest.strip_suffix(".wav"))
            .unwrap();
        assert_eq!(stem.len(), UNIQUE_CHARS);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_inputs_in_the_same_millisecond_get_distinct_names() {
        let now = Local.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap();
        let first = output_path(Path::new("/out"), "system", "Alex", "Hi", AudioFormat::Aiff, now);
        let second = output_path(Path::new("/out"), "system", "Alex", "Hi", AudioFormat::Aiff, now);
        assert_ne!(first, second);
    }

    #[test]
    fn falls_back_to_speech_for_symbol_only_text() {
        let now = Local.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let path = output_path(Path::new("o"), "system", "Alex", "?!", AudioFormat::Aiff, now);
        let name = path.to_string_lossy().into_owned();
        assert!(name.contains("_000_speech_"));
        assert!(name.ends_with(".aiff"));
    }

    #[tokio::test]
    async fn empty_output_is_a_synthesis_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        let err = finished_size(&path, "system").await.unwrap_err();
        assert_eq!(err.code(), "SYNTHESIS_FAILED");

        discard_partial(&path).await;
        assert!(!path.exists());
        // Discarding twice is harmless.
        discard_partial(&path).await;
    }

    #[test]
    fn reads_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let secs = wav_duration_secs(&path).unwrap();
        assert!((secs - 0.5).abs() < 1e-9);
        assert!(wav_duration_secs(&dir.path().join("missing.wav")).is_none());
    }
}
