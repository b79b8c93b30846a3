use std::path::Path;

/// Printed by the generated script after the WAV file is written.
pub const SUCCESS_MARKER: &str = "SUCCESS";

/// Output sample rate of the Kokoro model.
pub const SAMPLE_RATE: u32 = 24000;

/// Inputs baked into one generated synthesis script.
#[derive(Debug, Clone)]
pub struct ScriptParams<'a> {
    pub text: &'a str,
    pub voice: &'a str,
    pub lang_code: char,
    pub speed: f32,
    pub output_path: &'a Path,
}

/// Python string literal for `s`.
///
/// JSON string syntax is a subset of Python's, so serde_json's escaping is
/// reused here.
fn py_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Render the one-off synthesis script.
pub fn render(params: &ScriptParams<'_>) -> String {
    format!(
        r#"import sys

import numpy as np
import soundfile as sf
from kokoro import KPipeline

TEXT = {text}
VOICE = {voice}
LANG_CODE = {lang_code}
SPEED = {speed:?}
OUTPUT_PATH = {output_path}
SAMPLE_RATE = {sample_rate}


def main():
    pipeline = KPipeline(lang_code=LANG_CODE)
    chunks = [audio for _, _, audio in pipeline(TEXT, voice=VOICE, speed=SPEED)]
    if not chunks:
        print("kokoro produced no audio", file=sys.stderr)
        return 1
    sf.write(OUTPUT_PATH, np.concatenate(chunks), SAMPLE_RATE)
    print("{marker}")
    return 0


if __name__ == "__main__":
    sys.exit(main())
"#,
        text = py_str(params.text),
        voice = py_str(params.voice),
        lang_code = py_str(&params.lang_code.to_string()),
        speed = params.speed,
        output_path = py_str(&params.output_path.to_string_lossy()),
        sample_rate = SAMPLE_RATE,
        marker = SUCCESS_MARKER,
    )
}

/// Whether the script reported success on stdout.
pub fn reported_success(stdout: &[u8]) -> bool {
    String::from_utf8_lossy(stdout)
        .lines()
        .any(|line| line.trim() == SUCCESS_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params<'a>(text: &'a str, path: &'a Path) -> ScriptParams<'a> {
        ScriptParams {
            text,
            voice: "bf_emma",
            lang_code: 'b',
            speed: 1.25,
            output_path: path,
        }
    }

    #[test]
    fn embeds_parameters_as_literals() {
        let script = render(&params("Hello", Path::new("/tmp/out.wav")));
        assert!(script.contains("TEXT = \"Hello\"\n"));
        assert!(script.contains("VOICE = \"bf_emma\"\n"));
        assert!(script.contains("LANG_CODE = \"b\"\n"));
        assert!(script.contains("SPEED = 1.25\n"));
        assert!(script.contains("OUTPUT_PATH = \"/tmp/out.wav\"\n"));
        assert!(script.contains("print(\"SUCCESS\")"));
    }

    #[test]
    fn escapes_hostile_text() {
        let text = "He said \"hi\"\n\\ and then\"\"\" ended";
        let script = render(&params(text, Path::new("/tmp/out.wav")));
        let line = script
            .lines()
            .find(|l| l.starts_with("TEXT = "))
            .unwrap();
        assert_eq!(
            line,
            r#"TEXT = "He said \"hi\"\n\\ and then\"\"\" ended""#
        );
    }

    #[test]
    fn integral_speed_keeps_decimal_point() {
        let mut p = params("x", Path::new("o.wav"));
        p.speed = 1.0;
        assert!(render(&p).contains("SPEED = 1.0\n"));
    }

    #[test]
    fn detects_marker_line() {
        assert!(reported_success(b"loading\nSUCCESS\n"));
        assert!(!reported_success(b"NOT A SUCCESS\n"));
        assert!(!reported_success(b""));
    }
}
