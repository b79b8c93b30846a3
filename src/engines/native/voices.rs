use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Gender, Quality, Voice};

use super::engine::ENGINE_NAME;

const FEMALE_NAMES: &[&str] = &[
    "agnes", "alice", "allison", "alva", "amelie", "anna", "ava", "carmit", "damayanti",
    "ellen", "fiona", "flo", "grandma", "ioana", "joana", "kanya", "karen", "kathy", "kate",
    "kyoko", "laura", "lekha", "luciana", "mariska", "melina", "milena", "moira", "monica",
    "nora", "paulina", "princess", "samantha", "sandy", "sara", "satu", "serena", "shelley",
    "susan", "tessa", "tingting", "veena", "vicki", "victoria", "yelda", "yuna", "zosia",
    "zuzana",
];

const MALE_NAMES: &[&str] = &[
    "aaron", "albert", "alex", "arthur", "bruce", "daniel", "diego", "eddy", "fred",
    "gordon", "grandpa", "jacques", "jorge", "juan", "junior", "lee", "luca", "maged",
    "nicolas", "oliver", "ralph", "reed", "rishi", "rocko", "thomas", "tom", "xander",
    "yuri",
];

const FEMALE_WORDS: &[&str] = &["female", "woman", "girl", "her", "she"];
const MALE_WORDS: &[&str] = &["male", "man", "boy", "his", "he"];

/// Guess a voice's gender from its name and description.
///
/// Description words are checked before names; anything unmatched is
/// neutral.
pub fn infer_gender(name: &str, description: &str) -> Gender {
    let words: Vec<String> = description
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.iter().any(|w| FEMALE_WORDS.contains(&w.as_str())) {
        return Gender::Female;
    }
    if words.iter().any(|w| MALE_WORDS.contains(&w.as_str())) {
        return Gender::Male;
    }

    let first = name
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or_default()
        .to_lowercase();
    if FEMALE_NAMES.contains(&first.as_str()) {
        Gender::Female
    } else if MALE_NAMES.contains(&first.as_str()) {
        Gender::Male
    } else {
        Gender::Neutral
    }
}

/// Normalize `en_US` / `en-us` style tags to `en-US`.
pub fn normalize_language(tag: &str) -> String {
    tag.split(['_', '-'])
        .enumerate()
        .map(|(i, part)| {
            if i == 0 {
                part.to_lowercase()
            } else if i == 1 && part.len() == 2 && part.chars().all(|c| c.is_ascii_alphabetic()) {
                part.to_uppercase()
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn say_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>.+?)\s+(?P<locale>[a-z]{2,3}[_-][A-Za-z0-9]+)\s+#\s?(?P<desc>.*)$")
            .expect("valid say voice pattern")
    })
}

fn espeak_row() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*\d+\s+(?P<lang>\S+)\s+\S*/(?P<gender>[MF-])\s+(?P<name>\S+)\s+(?P<file>\S+)",
        )
        .expect("valid espeak-ng voice pattern")
    })
}

/// Parse `say -v ?` output.
///
/// Each line looks like `Alex                en_US    # Most people recognize me by my voice.`
pub fn parse_say_voices(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .filter_map(|line| {
            let caps = say_line().captures(line.trim_end())?;
            let name = caps["name"].trim().to_string();
            let description = caps["desc"].trim().to_string();
            let lowered = name.to_lowercase();
            let quality = if lowered.contains("premium") || lowered.contains("enhanced") {
                Quality::High
            } else {
                Quality::Balanced
            };
            Some(Voice {
                id: name.clone(),
                gender: infer_gender(&name, &description),
                language: normalize_language(&caps["locale"]),
                description: (!description.is_empty()).then_some(description),
                engine: ENGINE_NAME.to_string(),
                name,
                quality,
            })
        })
        .collect()
}

/// Parse the `espeak-ng --voices` table.
///
/// The language column doubles as the voice id passed to `-v`. Repeated
/// languages keep their first row.
pub fn parse_espeak_voices(listing: &str) -> Vec<Voice> {
    let mut voices: Vec<Voice> = Vec::new();
    for line in listing.lines() {
        let Some(caps) = espeak_row().captures(line) else {
            continue;
        };
        let id = caps["lang"].to_string();
        if voices.iter().any(|v| v.id == id) {
            continue;
        }
        let name = caps["name"].replace('_', " ");
        let gender = match &caps["gender"] {
            "F" => Gender::Female,
            "M" => Gender::Male,
            _ => infer_gender(&name, ""),
        };
        voices.push(Voice {
            language: normalize_language(&id),
            description: Some(format!("espeak-ng voice file {}", &caps["file"])),
            engine: ENGINE_NAME.to_string(),
            quality: Quality::Fast,
            id,
            name,
            gender,
        });
    }
    voices
}
