use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pricepost_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(config_path: Option<PathBuf>) -> String {
    let options = LoadOptions { config_path: config_path.clone(), ..LoadOptions::default() };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = config_path.filter(|path| path.exists()).or_else(detect_config_path);
    let file_doc = load_config_file_doc(file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, file_doc.as_ref(), file_path.as_deref())
    };

    let fields = [
        field("database.url", config.database.url.clone(), &["PRICEPOST_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["PRICEPOST_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["PRICEPOST_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "telegram.bot_token",
            redact_token(config.telegram.bot_token.expose_secret()),
            &["PRICEPOST_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"],
        ),
        field("telegram.chat_id", config.telegram.chat_id.clone(), &["PRICEPOST_TELEGRAM_CHAT_ID"]),
        field(
            "telegram.api_base_url",
            config.telegram.api_base_url.clone(),
            &["PRICEPOST_TELEGRAM_API_BASE_URL"],
        ),
        field("telegram.link_host", config.telegram.link_host.clone(), &[]),
        field(
            "telegram.max_attempts",
            config.telegram.max_attempts.to_string(),
            &["PRICEPOST_TELEGRAM_MAX_ATTEMPTS"],
        ),
        field("sheets.products", config.sheets.products.clone(), &[]),
        field("sheets.directory", config.sheets.directory.clone(), &[]),
        field("sheets.settings", config.sheets.settings.clone(), &[]),
        field(
            "behavior.show_out_of_stock_placeholders",
            config.behavior.show_out_of_stock_placeholders.to_string(),
            &["PRICEPOST_SHOW_OUT_OF_STOCK_PLACEHOLDERS"],
        ),
        field(
            "behavior.show_items_without_price",
            config.behavior.show_items_without_price.to_string(),
            &["PRICEPOST_SHOW_ITEMS_WITHOUT_PRICE"],
        ),
        field(
            "pricing.high_markup",
            config.pricing.high_markup.to_string(),
            &["PRICEPOST_PRICING_HIGH_MARKUP"],
        ),
        field(
            "pricing.low_markup",
            config.pricing.low_markup.to_string(),
            &["PRICEPOST_PRICING_LOW_MARKUP"],
        ),
        field(
            "pricing.low_markup_threshold",
            config.pricing.low_markup_threshold.to_string(),
            &["PRICEPOST_PRICING_LOW_MARKUP_THRESHOLD"],
        ),
        field(
            "pricing.rounding_unit",
            config.pricing.rounding_unit.to_string(),
            &["PRICEPOST_PRICING_ROUNDING_UNIT"],
        ),
        field("lock.key", config.lock.key.clone(), &[]),
        field(
            "lock.stale_after_secs",
            config.lock.stale_after_secs.to_string(),
            &["PRICEPOST_LOCK_STALE_AFTER_SECS"],
        ),
        field(
            "logging.level",
            config.logging.level.clone(),
            &["PRICEPOST_LOGGING_LEVEL", "PRICEPOST_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["PRICEPOST_LOGGING_FORMAT", "PRICEPOST_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value, env_keys) in fields {
        lines.push(format!("- {key_path} = {value} (source: {})", source(key_path, env_keys)));
    }
    lines.join("\n")
}

fn field(
    key_path: &'static str,
    value: String,
    env_keys: &'static [&'static str],
) -> (&'static str, String, &'static [&'static str]) {
    (key_path, value, env_keys)
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("pricepost.toml"), PathBuf::from("config/pricepost.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps the public bot id, hides the secret half.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.split_once(':') {
        Some((bot_id, _)) => format!("{bot_id}:***"),
        None => "<redacted>".to_string(),
    }
}
