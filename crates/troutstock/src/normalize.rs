//! Conversions from raw schedule cell text into typed values.
//!
//! None of these fail loudly: an unusable cell becomes `None` (or `"Unknown"`
//! for species) so the row extractor can decide to skip it.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

pub const UNKNOWN: &str = "Unknown";

/// Alias (lower-case) to canonical species name.
const SPECIES: &[(&str, &str)] = &[
    ("rainbow", "Rainbow Trout"),
    ("rainbow trout", "Rainbow Trout"),
    ("brown", "Brown Trout"),
    ("brown trout", "Brown Trout"),
    ("brook", "Brook Trout"),
    ("brook trout", "Brook Trout"),
    ("golden", "Golden Trout"),
    ("golden trout", "Golden Trout"),
    ("tiger", "Tiger Trout"),
    ("tiger trout", "Tiger Trout"),
];

const SPECIES_DELIMITERS: &[char] = &['+', '/', ','];

// Two-digit years come first so "%Y" never swallows "24" as year 24.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%d %B %Y",
];

// Local times without an offset; only the calendar day is kept.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

static SPECIES_LONGEST_FIRST: LazyLock<Vec<(&'static str, &'static str)>> = LazyLock::new(|| {
    let mut aliases = SPECIES.to_vec();
    aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    aliases
});

static RE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d[\d,]*").expect("invalid regex: number"));

/// Parses a calendar date in any of the formats the schedule page has used,
/// yielding midnight UTC of that day.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|naive| naive.date())
        })
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Maps a species alias onto its canonical name. Anything unrecognised is
/// returned trimmed but otherwise untouched.
pub fn normalize_species(text: &str) -> String {
    let trimmed = text.trim();
    let lowered = trimmed.to_lowercase();

    SPECIES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

/// Splits a species cell into canonical names, in the order they appear.
///
/// Cells are either delimited (`"Rainbow/Brown"`) or run together
/// (`"Rainbow TroutBrown Trout"`); the latter is matched against the known
/// vocabulary, longest alias first.
pub fn parse_species(text: &str) -> Vec<String> {
    let mut species: Vec<String> = Vec::new();

    if text.contains(SPECIES_DELIMITERS) {
        for part in text.split(SPECIES_DELIMITERS) {
            let name = normalize_species(part);
            if !name.is_empty() && name != UNKNOWN && !species.contains(&name) {
                species.push(name);
            }
        }
        return species;
    }

    let mut haystack = text.to_lowercase();
    let mut found: Vec<(usize, &str)> = Vec::new();
    for (alias, canonical) in SPECIES_LONGEST_FIRST.iter() {
        while let Some(pos) = haystack.find(alias) {
            found.push((pos, *canonical));
            haystack.replace_range(pos..pos + alias.len(), &" ".repeat(alias.len()));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    for (_, canonical) in found {
        if !species.iter().any(|s| s == canonical) {
            species.push(canonical.to_string());
        }
    }

    if species.is_empty() {
        let name = normalize_species(text);
        if !name.is_empty() && name != UNKNOWN {
            species.push(name);
        }
    }

    species
}

pub fn join_species(species: &[String]) -> String {
    if species.is_empty() {
        UNKNOWN.to_string()
    } else {
        species.join(" + ")
    }
}

/// First digit run in `text`, thousands separators allowed: `"1,250 lbs"` is 1250.
pub fn extract_number(text: &str) -> Option<u64> {
    let found = RE_NUMBER.find(text)?;
    found.as_str().replace(',', "").parse().ok()
}
