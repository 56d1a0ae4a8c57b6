//! Parsers for OCR'd HUD text
//!
//! OCR output is noisy, so every parser is strict about shape and returns
//! `None` (or zero for costs) instead of guessing.

use once_cell::sync::Lazy;
use regex::Regex;

static COST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)(?:\.(\d+))?\s*([KM])?").expect("valid cost pattern"));

static BOARD_PROGRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+/30").expect("valid progress pattern"));

static BOARD_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9/ ]").expect("valid noise pattern"));

static MINUTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:(\d+)\s*h)?\s*(\d+)\s*m").expect("valid countdown pattern"));

/// Fraction digits considered when scaling a decimal cost
const MAX_FRACTION_DIGITS: usize = 6;

fn digits(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Currency amount: every digit in the text, in order
pub fn parse_money(text: &str) -> Option<u64> {
    digits(text).parse().ok()
}

/// Roll counter "<rolls>/<capacity>"
///
/// Everything but digits and `/` is stripped first; the remainder must be
/// exactly two non-empty integers, and rolls may not exceed capacity.
pub fn parse_rolls(text: &str) -> Option<(u32, u32)> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '/')
        .collect();

    let mut parts = cleaned.split('/');
    let rolls = parts.next()?;
    let capacity = parts.next()?;
    if parts.next().is_some() || rolls.is_empty() || capacity.is_empty() {
        return None;
    }

    let rolls: u32 = rolls.parse().ok()?;
    let capacity: u32 = capacity.parse().ok()?;
    (rolls <= capacity).then_some((rolls, capacity))
}

/// Multiplier label such as "x5"
pub fn parse_multiplier(text: &str) -> Option<u32> {
    digits(text).parse().ok()
}

/// Upgrade cost with an optional `K`/`M` suffix
///
/// A decimal without a suffix is already expressed in thousands ("1.2" is
/// 1,200). Returns 0 when nothing numeric is found, which callers treat as
/// an unknown cost.
pub fn parse_cost(text: &str) -> u64 {
    let Some(captures) = COST.captures(text) else {
        return 0;
    };

    let whole: u64 = captures[1].parse().unwrap_or(0);
    let fraction = captures.get(2).map(|m| m.as_str());
    let unit: u64 = match captures.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
        Some(suffix) if suffix == "M" => 1_000_000,
        Some(_) => 1_000,
        None if fraction.is_some() => 1_000,
        None => 1,
    };

    let mut value = whole.saturating_mul(unit);
    if let Some(fraction) = fraction {
        let fraction = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        let scale = 10u64.pow(fraction.len() as u32);
        let numerator: u64 = fraction.parse().unwrap_or(0);
        value = value.saturating_add(numerator.saturating_mul(unit) / scale);
    }
    value
}

/// Board name with its "<n>/30" progress counter removed
pub fn board_name(text: &str) -> String {
    let cleaned = BOARD_NOISE.replace_all(text, "");
    match BOARD_PROGRESS.find(&cleaned) {
        Some(progress) => cleaned[..progress.start()].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Minutes until the next dice refill from a countdown like "1h 05m"
pub fn parse_refill_minutes(text: &str) -> Option<u32> {
    let captures = MINUTES.captures(text)?;
    let hours: u32 = match captures.get(1) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let minutes: u32 = captures[2].parse().ok()?;
    hours.checked_mul(60)?.checked_add(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_suffixes() {
        assert_eq!(parse_cost("2.5M"), 2_500_000);
        assert_eq!(parse_cost("800K"), 800_000);
        assert_eq!(parse_cost("1.5K"), 1500);
        assert_eq!(parse_cost("1500K"), 1_500_000);
    }

    #[test]
    fn test_cost_bare_decimal_is_thousands() {
        assert_eq!(parse_cost("1.2"), 1200);
    }

    #[test]
    fn test_cost_normalized_value_is_stable() {
        assert_eq!(parse_cost("1500"), 1500);
        assert_eq!(parse_cost("1500"), parse_cost("1.5K"));
    }

    #[test]
    fn test_cost_unknown() {
        assert_eq!(parse_cost("abc"), 0);
        assert_eq!(parse_cost(""), 0);
    }

    #[test]
    fn test_rolls_clean_pattern() {
        assert_eq!(parse_rolls("12/50"), Some((12, 50)));
        assert_eq!(parse_rolls(" 7 / 50\n"), Some((7, 50)));
    }

    #[test]
    fn test_rolls_ocr_noise_rejected() {
        assert_eq!(parse_rolls("O/5O"), None);
        assert_eq!(parse_rolls("12"), None);
        assert_eq!(parse_rolls("1/2/3"), None);
        assert_eq!(parse_rolls("60/50"), None);
    }

    #[test]
    fn test_money_and_multiplier() {
        assert_eq!(parse_money("1,234,567"), Some(1_234_567));
        assert_eq!(parse_money("$"), None);
        assert_eq!(parse_multiplier("x10"), Some(10));
        assert_eq!(parse_multiplier("x"), None);
    }

    #[test]
    fn test_board_name_strips_progress() {
        assert_eq!(board_name("Downtown 12/30"), "Downtown");
        assert_eq!(board_name("Old Town! 3/30 "), "Old Town");
        assert_eq!(board_name("Harbor"), "Harbor");
    }

    #[test]
    fn test_refill_minutes() {
        assert_eq!(parse_refill_minutes("12m"), Some(12));
        assert_eq!(parse_refill_minutes("1h 05m"), Some(65));
        assert_eq!(parse_refill_minutes("soon"), None);
    }

    #[test]
    fn test_refill_noisy_hours_rejected() {
        assert_eq!(parse_refill_minutes("99999999h 05m"), None);
        assert_eq!(parse_refill_minutes("99999999999h 05m"), None);
    }
}
