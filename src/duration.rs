//! Free-text duration heuristics
//!
//! Duration fields are human-authored ("2 a 4 horas", "10 dias úteis",
//! "Sob consulta") with no fixed grammar. Parsing is total: unparseable
//! text yields `None`, never an error.

use regex::Regex;
use std::sync::LazyLock;

/// Days assumed when neither duration field yields a number
pub const FALLBACK_AVERAGE_DAYS: u32 = 3;

// =============================================================================
// PATTERNS
// =============================================================================

/// Two numbers joined by a connector: "2 a 4", "3 até 5", "1-2", "2 to 3"
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(?:\b(?:a|até|ate|to)\b|-|–)\s*(\d+(?:[.,]\d+)?)")
        .unwrap()
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

static HOUR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:horas?|h|hours?)\b").unwrap());

static DAY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:dias?|days?)\b").unwrap());

/// Leading count written out as a word: "três dias", "um dia útil"
static DAY_COUNT_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(\p{L}+)\s+(?:dias?|days?)\b").unwrap());

// =============================================================================
// PARSER
// =============================================================================

/// Extract a numeric estimate from a free-text duration.
///
/// Precedence: range mean, bare number, hour keyword (sub-day → 1),
/// day keyword (leading count word, else 1), otherwise `None`.
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = RANGE_RE.captures(text) {
        let low = parse_number(&caps[1]);
        let high = parse_number(&caps[2]);
        if let (Some(low), Some(high)) = (low, high) {
            return Some((low + high) / 2.0);
        }
    }

    if let Some(m) = NUMBER_RE.find(text) {
        if let Some(value) = parse_number(m.as_str()) {
            return Some(value);
        }
    }

    if HOUR_RE.is_match(text) {
        return Some(1.0);
    }

    if DAY_RE.is_match(text) {
        let count = DAY_COUNT_WORD_RE
            .captures(text)
            .and_then(|caps| number_word(&caps[1]));
        return Some(count.unwrap_or(1) as f64);
    }

    None
}

/// Average of the two duration estimates in whole days, never below 1.
///
/// Unparseable fields count as zero; when both are zero the result is
/// `FALLBACK_AVERAGE_DAYS`.
pub fn average_duration_days(capture_duration: &str, treatment_duration: &str) -> u32 {
    let capture = parse_duration(capture_duration).unwrap_or(0.0);
    let treatment = parse_duration(treatment_duration).unwrap_or(0.0);

    let average = ((capture + treatment) / 2.0).ceil();
    if average <= 0.0 || !average.is_finite() {
        return FALLBACK_AVERAGE_DAYS;
    }

    (average.min(u32::MAX as f64) as u32).max(1)
}

fn parse_number(token: &str) -> Option<f64> {
    token.replace(',', ".").parse::<f64>().ok()
}

fn number_word(word: &str) -> Option<u32> {
    let count = match word.to_lowercase().as_str() {
        "um" | "uma" | "one" => 1,
        "dois" | "duas" | "two" => 2,
        "três" | "tres" | "three" => 3,
        "quatro" | "four" => 4,
        "cinco" | "five" => 5,
        "seis" | "six" => 6,
        "sete" | "seven" => 7,
        "oito" | "eight" => 8,
        "nove" | "nine" => 9,
        "dez" | "ten" => 10,
        _ => return None,
    };
    Some(count)
}
