//! Text validation and sanitization for submitted input.
//!
//! A submission must pass every check, in this order: non-empty, within the
//! length limit, free of script-injection markup with at least one
//! alphanumeric character, not predominantly Perso-Arabic script, and at least
//! 80% Latin letters among its alphabetic characters.

use crate::types::LanguageCode;
use regex::Regex;
use std::sync::OnceLock;

/// Share of non-Latin, non-digit, non-space characters in Perso-Arabic ranges
/// at which text is classified as unsupported script
pub const PERSIAN_SCRIPT_THRESHOLD: f64 = 0.3;

/// Minimum share of ASCII letters among alphabetic characters
pub const LATIN_LETTER_THRESHOLD: f64 = 0.8;

const MAX_FILENAME_LEN: usize = 255;

fn suspicious_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)<script.*?>.*?</script>").expect("valid regex"),
            Regex::new(r"(?i)<\s*script\b").expect("valid regex"),
            Regex::new(r"(?i)on\w+\s*=").expect("valid regex"),
            Regex::new(r"(?i)javascript:").expect("valid regex"),
            Regex::new(r"(?i)vbscript:").expect("valid regex"),
        ]
    })
}

fn whitespace_runs() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Why a submission was refused; each maps to its own localized message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRejection {
    Empty,
    TooLong { current: usize, max: usize },
    Invalid,
    UnsupportedScript,
    NonEnglish,
}

impl TextRejection {
    pub fn locale_key(self) -> &'static str {
        match self {
            TextRejection::Empty | TextRejection::Invalid => "text_input.invalid",
            TextRejection::TooLong { .. } => "text_input.too_long",
            TextRejection::UnsupportedScript => "text_input.unsupported_script",
            TextRejection::NonEnglish => "text_input.non_english",
        }
    }
}

/// Apply the full submission policy
pub fn validate_submission(text: &str, max_length: usize) -> Result<(), TextRejection> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TextRejection::Empty);
    }
    let current = char_len(trimmed);
    if current > max_length {
        return Err(TextRejection::TooLong {
            current,
            max: max_length,
        });
    }
    if !is_valid_text(trimmed) {
        return Err(TextRejection::Invalid);
    }
    if is_persian_text(trimmed) {
        return Err(TextRejection::UnsupportedScript);
    }
    if !is_mostly_english(trimmed) {
        return Err(TextRejection::NonEnglish);
    }
    Ok(())
}

/// Character count as users perceive length (code points, not bytes)
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn is_valid_text(text: &str) -> bool {
    let cleaned = text.trim();
    if cleaned.is_empty() {
        return false;
    }
    if suspicious_patterns().iter().any(|p| p.is_match(cleaned)) {
        return false;
    }
    cleaned.chars().any(char::is_alphanumeric)
}

/// Strip injection patterns and collapse whitespace
pub fn sanitize_text(text: &str) -> String {
    let mut sanitized = text.to_string();
    for pattern in suspicious_patterns() {
        sanitized = pattern.replace_all(&sanitized, "").into_owned();
    }
    whitespace_runs()
        .replace_all(&sanitized, " ")
        .trim()
        .to_string()
}

pub fn is_persian_char(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// True when Perso-Arabic characters dominate what is left after removing
/// ASCII letters, digits and whitespace
pub fn is_persian_text(text: &str) -> bool {
    let (persian, total) = text
        .chars()
        .filter(|c| !(c.is_ascii_alphanumeric() || c.is_whitespace()))
        .fold((0usize, 0usize), |(p, t), c| {
            (p + usize::from(is_persian_char(c)), t + 1)
        });
    if total == 0 {
        return false;
    }
    persian as f64 / total as f64 >= PERSIAN_SCRIPT_THRESHOLD
}

/// True when at least 80% of alphabetic characters are ASCII letters.
/// Text without letters (numbers, punctuation) passes.
pub fn is_mostly_english(text: &str) -> bool {
    let (latin, alpha) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(l, a), c| {
            (l + usize::from(c.is_ascii_alphabetic()), a + 1)
        });
    if alpha == 0 {
        return true;
    }
    latin as f64 / alpha as f64 >= LATIN_LETTER_THRESHOLD
}

pub fn detect_language(text: &str) -> LanguageCode {
    if is_persian_text(text) {
        LanguageCode::Persian
    } else {
        LanguageCode::English
    }
}

/// Accept plain-text uploads only, with no path components
pub fn validate_filename(filename: &str) -> bool {
    if filename.is_empty() || filename.len() > MAX_FILENAME_LEN {
        return false;
    }
    let lower = filename.to_ascii_lowercase();
    if !(lower.ends_with(".txt") || lower.ends_with(".text")) {
        return false;
    }
    !(filename.contains("..") || filename.contains('/') || filename.contains('\\'))
}
