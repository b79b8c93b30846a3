use crate::types::{Gender, Quality, Voice};

use super::engine::ENGINE_NAME;

/// Voice used when a request does not name one.
pub const DEFAULT_VOICE: &str = "af_heart";

/// Built-in Kokoro-82M voices. Kokoro has no listing command, so the
/// catalog is fixed.
const VOICES: &[(&str, &str, Quality)] = &[
    ("af_heart", "Heart", Quality::High),
    ("af_bella", "Bella", Quality::High),
    ("af_nicole", "Nicole", Quality::Balanced),
    ("af_sarah", "Sarah", Quality::Balanced),
    ("af_sky", "Sky", Quality::Balanced),
    ("am_adam", "Adam", Quality::Balanced),
    ("am_michael", "Michael", Quality::Balanced),
    ("bf_emma", "Emma", Quality::Balanced),
    ("bf_isabella", "Isabella", Quality::Balanced),
    ("bm_george", "George", Quality::Balanced),
    ("bm_lewis", "Lewis", Quality::Balanced),
    ("ef_dora", "Dora", Quality::Balanced),
    ("em_alex", "Alex", Quality::Balanced),
    ("ff_siwis", "Siwis", Quality::Balanced),
    ("hf_alpha", "Alpha", Quality::Balanced),
    ("hm_omega", "Omega", Quality::Balanced),
    ("if_sara", "Sara", Quality::Balanced),
    ("im_nicola", "Nicola", Quality::Balanced),
    ("jf_alpha", "Alpha", Quality::Balanced),
    ("jm_kumo", "Kumo", Quality::Balanced),
    ("pf_dora", "Dora", Quality::Balanced),
    ("pm_alex", "Alex", Quality::Balanced),
    ("zf_xiaobei", "Xiaobei", Quality::Balanced),
    ("zm_yunjian", "Yunjian", Quality::Balanced),
];

/// Map a voice name prefix to a language tag and its human-readable name.
///
/// Voice names follow the pattern `{prefix}_{name}` where the first prefix
/// character encodes the language and the second the gender.
pub fn voice_language(voice: &str) -> (&'static str, &'static str) {
    match voice.chars().next() {
        Some('a') => ("en-US", "American English"),
        Some('b') => ("en-GB", "British English"),
        Some('e') => ("es", "Spanish"),
        Some('f') => ("fr", "French"),
        Some('h') => ("hi", "Hindi"),
        Some('i') => ("it", "Italian"),
        Some('j') => ("ja", "Japanese"),
        Some('p') => ("pt-BR", "Brazilian Portuguese"),
        Some('z') => ("cmn", "Mandarin Chinese"),
        _ => ("en-US", "American English"),
    }
}

/// The `KPipeline` language code for a voice: the first prefix character,
/// falling back to American English.
pub fn pipeline_lang_code(voice: &str) -> char {
    match voice.chars().next() {
        Some(c @ ('a' | 'b' | 'e' | 'f' | 'h' | 'i' | 'j' | 'p' | 'z')) => c,
        _ => 'a',
    }
}

fn voice_gender(voice: &str) -> Gender {
    match voice.chars().nth(1) {
        Some('f') => Gender::Female,
        Some('m') => Gender::Male,
        _ => Gender::Neutral,
    }
}

/// The full catalog, tagged with the engine name.
pub fn catalog() -> Vec<Voice> {
    VOICES
        .iter()
        .map(|&(id, name, quality)| {
            let (language, language_name) = voice_language(id);
            Voice {
                id: id.to_string(),
                name: name.to_string(),
                language: language.to_string(),
                gender: voice_gender(id),
                description: Some(format!("Kokoro {language_name} voice")),
                engine: ENGINE_NAME.to_string(),
                quality,
            }
        })
        .collect()
}
