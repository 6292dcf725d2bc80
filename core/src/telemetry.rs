// Logging setup and log hygiene
use regex::Regex;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Default filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "info,speechbot=info,speechbot_core=info,speechbot_audio=info";

/// Install the global fmt subscriber. Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(true)
        .try_init();
}

fn secret_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (
                Regex::new(r"\d{8,10}:[A-Za-z0-9_-]{35}").expect("valid regex"),
                "[BOT_TOKEN]",
            ),
            (
                Regex::new(r#"(?i)token['"]?\s*[:=]\s*['"]?[^\s]+"#).expect("valid regex"),
                "token=[REDACTED]",
            ),
        ]
    })
}

/// Mask bot tokens and `token=...` pairs before a string reaches the logs
pub fn redact_secrets(message: &str) -> String {
    let mut out = message.to_string();
    for (pattern, replacement) in secret_patterns() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bot_tokens_are_masked() {
        let token = format!("123456789:{}", "A".repeat(35));
        let line = format!("connecting with {token}");
        assert_eq!(redact_secrets(&line), "connecting with [BOT_TOKEN]");
    }

    #[test]
    fn token_pairs_are_masked() {
        assert_eq!(
            redact_secrets("url?token=abc123 ok"),
            "url?token=[REDACTED] ok"
        );
        assert_eq!(redact_secrets("nothing here"), "nothing here");
    }
}
