//! Recognition of keyboard buttons and typed equivalents, and the keyboards
//! themselves.
//!
//! Input is normalized before matching: leading emoji and symbols are
//! dropped and the rest is lowercased, so "🎤 Convert Text" and
//! "convert text" are the same event. Labels of the user's language and of
//! English are both accepted.

use crate::locale::Translations;
use crate::transport::ReplyMarkup;
use crate::types::{LanguageCode, Speed};

pub const ENGLISH_BUTTON: &str = "🇺🇸 English";
pub const PERSIAN_BUTTON: &str = "🇮🇷 فارسی";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ConvertText,
    Batch,
    Help,
    ChangeLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageChoice {
    Select(LanguageCode),
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuousAction {
    Continue,
    Stop,
}

pub fn normalize(input: &str) -> String {
    input
        .trim()
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim()
        .to_lowercase()
}

/// True when `input` matches the button `key` in `language` or English
fn matches_button(t: &Translations, language: LanguageCode, key: &str, input: &str) -> bool {
    let wanted = normalize(input);
    if wanted.is_empty() {
        return false;
    }
    [language, LanguageCode::English]
        .iter()
        .any(|&lang| t.has_key(lang, key) && normalize(&t.lookup(lang, key)) == wanted)
}

pub fn parse_menu_action(t: &Translations, language: LanguageCode, input: &str) -> Option<MenuAction> {
    let candidates = [
        ("buttons.convert_text", MenuAction::ConvertText),
        ("buttons.batch", MenuAction::Batch),
        ("buttons.help", MenuAction::Help),
        ("buttons.change_language", MenuAction::ChangeLanguage),
    ];
    if let Some((_, action)) = candidates
        .iter()
        .find(|(key, _)| matches_button(t, language, key, input))
    {
        return Some(*action);
    }
    match normalize(input).as_str() {
        "convert" => Some(MenuAction::ConvertText),
        "batch" => Some(MenuAction::Batch),
        "language" => Some(MenuAction::ChangeLanguage),
        _ => None,
    }
}

pub fn parse_language_choice(t: &Translations, language: LanguageCode, input: &str) -> Option<LanguageChoice> {
    if is_back(t, language, input) {
        return Some(LanguageChoice::Back);
    }
    match normalize(input).as_str() {
        "english" | "en" => Some(LanguageChoice::Select(LanguageCode::English)),
        "فارسی" | "persian" | "farsi" | "fa" => Some(LanguageChoice::Select(LanguageCode::Persian)),
        _ => None,
    }
}

pub fn parse_continuous_action(
    t: &Translations,
    language: LanguageCode,
    input: &str,
) -> Option<ContinuousAction> {
    if matches_button(t, language, "buttons.stop", input) {
        Some(ContinuousAction::Stop)
    } else if matches_button(t, language, "buttons.continue", input) {
        Some(ContinuousAction::Continue)
    } else {
        None
    }
}

pub fn is_back(t: &Translations, language: LanguageCode, input: &str) -> bool {
    matches_button(t, language, "buttons.back", input)
}

pub fn language_keyboard(t: &Translations, language: LanguageCode, with_back: bool) -> ReplyMarkup {
    let mut rows = vec![vec![ENGLISH_BUTTON.to_string(), PERSIAN_BUTTON.to_string()]];
    if with_back {
        rows.push(vec![t.lookup(language, "buttons.back")]);
        ReplyMarkup::keyboard(rows)
    } else {
        ReplyMarkup::one_time(rows)
    }
}

pub fn main_menu_keyboard(t: &Translations, language: LanguageCode) -> ReplyMarkup {
    ReplyMarkup::keyboard(vec![
        vec![
            t.lookup(language, "buttons.convert_text"),
            t.lookup(language, "buttons.batch"),
        ],
        vec![
            t.lookup(language, "buttons.help"),
            t.lookup(language, "buttons.change_language"),
        ],
    ])
}

pub fn speed_keyboard(t: &Translations, language: LanguageCode) -> ReplyMarkup {
    let tokens: Vec<String> = Speed::CHOICES.iter().map(|s| s.token()).collect();
    ReplyMarkup::keyboard(vec![
        tokens[..3].to_vec(),
        vec![tokens[3].clone(), t.lookup(language, "buttons.back")],
    ])
}

pub fn continuous_keyboard(t: &Translations, language: LanguageCode) -> ReplyMarkup {
    ReplyMarkup::keyboard(vec![vec![
        t.lookup(language, "buttons.continue"),
        t.lookup(language, "buttons.stop"),
    ]])
}

pub fn back_keyboard(t: &Translations, language: LanguageCode) -> ReplyMarkup {
    ReplyMarkup::keyboard(vec![vec![t.lookup(language, "buttons.back")]])
}
