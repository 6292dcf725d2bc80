//! Small formatting helpers used in captions and log fields.

use crate::types::Speed;

/// Average speaking rate used for duration estimates
const WORDS_PER_SECOND: f64 = 2.5;

/// Human-readable duration: `45 seconds`, `2m 5s`, `1h 3m`
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds} seconds");
    }
    if seconds < 3600 {
        let (m, s) = (seconds / 60, seconds % 60);
        return if s > 0 {
            format!("{m}m {s}s")
        } else {
            format!("{m}m")
        };
    }
    let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
    let mut parts = vec![format!("{h}h")];
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if s > 0 {
        parts.push(format!("{s}s"));
    }
    parts.join(" ")
}

/// Cut to at most `max_chars` characters, ending with `...` when shortened
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Rough spoken length in whole seconds at the given speed
pub fn estimate_speech_duration(text: &str, speed: Speed) -> u64 {
    let words = text.split_whitespace().count() as f64;
    let base = words / WORDS_PER_SECOND;
    (base / f64::from(speed.value())) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(120), "2m");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3600), "1h");
        assert_eq!(format_duration(3785), "1h 3m 5s");
    }

    #[test]
    fn truncation() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn speech_estimate_scales_with_speed() {
        let text = "one two three four five six seven eight nine ten";
        assert_eq!(estimate_speech_duration(text, Speed::NORMAL), 4);
        assert_eq!(estimate_speech_duration(text, Speed::new(2.0)), 2);
    }
}
