use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::directory::DirectoryColumnNames;
use crate::domain::product::ProductColumnNames;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub telegram: TelegramConfig,
    pub sheets: SheetsConfig,
    pub columns: ColumnsConfig,
    pub templates: TemplatesConfig,
    pub behavior: BehaviorConfig,
    pub pricing: PricingConfig,
    pub lock: LockConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub chat_id: String,
    pub api_base_url: String,
    pub link_host: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub products: String,
    pub directory: String,
    pub settings: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ColumnsConfig {
    pub group: String,
    pub category: String,
    pub flag: String,
    pub name: String,
    pub price: String,
    pub dir_group: String,
    pub dir_message_id: String,
    pub dir_status: String,
}

#[derive(Clone, Debug)]
pub struct TemplatesConfig {
    pub header: String,
    pub footer: String,
    pub out_of_stock: String,
    pub nav_header: String,
    pub date_format: String,
    pub utc_offset_hours: i32,
    pub other_category: String,
    pub price_on_request: String,
}

#[derive(Clone, Copy, Debug)]
pub struct BehaviorConfig {
    pub show_out_of_stock_placeholders: bool,
    pub show_items_without_price: bool,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub high_markup: i64,
    pub low_markup: i64,
    pub low_markup_threshold: i64,
    pub rounding_unit: i64,
    pub currency: String,
    pub thousands_separator: String,
}

#[derive(Clone, Debug)]
pub struct LockConfig {
    pub key: String,
    pub stale_after_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base_url: Option<String>,
    pub show_out_of_stock_placeholders: Option<bool>,
    pub show_items_without_price: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub const DEFAULT_HEADER_TEMPLATE: &str = "<b>{groupName}</b>\n\n🗓️ Date: {date}\n\n";
pub const DEFAULT_FOOTER_TEMPLATE: &str = "\n<b><i>✅ Genuine, factory-sealed devices only.</i></b>\n\n💬 Questions? Message us on Telegram.";
pub const DEFAULT_OUT_OF_STOCK_TEMPLATE: &str = "<b>{groupName}</b>\n\n🗓️ Date: {date}\n\nItems in this category are temporarily unavailable or sold out.";
pub const DEFAULT_NAV_HEADER_TEMPLATE: &str =
    "<b>PRICE LIST | NAVIGATION</b>\n\n🗓️ Prices current as of {date}\n\n👇 Browse by category:";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://pricepost.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                chat_id: String::new(),
                api_base_url: "https://api.telegram.org".to_string(),
                link_host: "t.me".to_string(),
                request_timeout_secs: 30,
                max_attempts: 5,
            },
            sheets: SheetsConfig {
                products: "Prices".to_string(),
                directory: "Post directory".to_string(),
                settings: "Bot settings".to_string(),
                retry_attempts: 3,
                retry_delay_ms: 2_000,
            },
            columns: ColumnsConfig {
                group: "Group".to_string(),
                category: "Category".to_string(),
                flag: "Flag".to_string(),
                name: "Name".to_string(),
                price: "Price".to_string(),
                dir_group: "Group".to_string(),
                dir_message_id: "message_id".to_string(),
                dir_status: "Status".to_string(),
            },
            templates: TemplatesConfig {
                header: DEFAULT_HEADER_TEMPLATE.to_string(),
                footer: DEFAULT_FOOTER_TEMPLATE.to_string(),
                out_of_stock: DEFAULT_OUT_OF_STOCK_TEMPLATE.to_string(),
                nav_header: DEFAULT_NAV_HEADER_TEMPLATE.to_string(),
                date_format: "%d.%m.%Y".to_string(),
                utc_offset_hours: 3,
                other_category: "Other".to_string(),
                price_on_request: "on request".to_string(),
            },
            behavior: BehaviorConfig {
                show_out_of_stock_placeholders: false,
                show_items_without_price: false,
            },
            pricing: PricingConfig {
                high_markup: 5_500,
                low_markup: 2_000,
                low_markup_threshold: 20_000,
                rounding_unit: 500,
                currency: "₽".to_string(),
                thousands_separator: "\u{a0}".to_string(),
            },
            lock: LockConfig { key: "price_update".to_string(), stale_after_secs: 3_600 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl ColumnsConfig {
    pub fn product_names(&self) -> ProductColumnNames {
        ProductColumnNames {
            group: self.group.clone(),
            category: self.category.clone(),
            flag: self.flag.clone(),
            name: self.name.clone(),
            price: self.price.clone(),
        }
    }

    pub fn directory_names(&self) -> DirectoryColumnNames {
        DirectoryColumnNames {
            group: self.dir_group.clone(),
            message_id: self.dir_message_id.clone(),
            status: self.dir_status.clone(),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricepost.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            set(&mut self.database.url, database.url);
            set(&mut self.database.max_connections, database.max_connections);
            set(&mut self.database.timeout_secs, database.timeout_secs);
        }

        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            set(&mut self.telegram.chat_id, telegram.chat_id);
            set(&mut self.telegram.api_base_url, telegram.api_base_url);
            set(&mut self.telegram.link_host, telegram.link_host);
            set(&mut self.telegram.request_timeout_secs, telegram.request_timeout_secs);
            set(&mut self.telegram.max_attempts, telegram.max_attempts);
        }

        if let Some(sheets) = patch.sheets {
            set(&mut self.sheets.products, sheets.products);
            set(&mut self.sheets.directory, sheets.directory);
            set(&mut self.sheets.settings, sheets.settings);
            set(&mut self.sheets.retry_attempts, sheets.retry_attempts);
            set(&mut self.sheets.retry_delay_ms, sheets.retry_delay_ms);
        }

        if let Some(columns) = patch.columns {
            set(&mut self.columns.group, columns.group);
            set(&mut self.columns.category, columns.category);
            set(&mut self.columns.flag, columns.flag);
            set(&mut self.columns.name, columns.name);
            set(&mut self.columns.price, columns.price);
            set(&mut self.columns.dir_group, columns.dir_group);
            set(&mut self.columns.dir_message_id, columns.dir_message_id);
            set(&mut self.columns.dir_status, columns.dir_status);
        }

        if let Some(templates) = patch.templates {
            set(&mut self.templates.header, templates.header);
            set(&mut self.templates.footer, templates.footer);
            set(&mut self.templates.out_of_stock, templates.out_of_stock);
            set(&mut self.templates.nav_header, templates.nav_header);
            set(&mut self.templates.date_format, templates.date_format);
            set(&mut self.templates.utc_offset_hours, templates.utc_offset_hours);
            set(&mut self.templates.other_category, templates.other_category);
            set(&mut self.templates.price_on_request, templates.price_on_request);
        }

        if let Some(behavior) = patch.behavior {
            set(
                &mut self.behavior.show_out_of_stock_placeholders,
                behavior.show_out_of_stock_placeholders,
            );
            set(&mut self.behavior.show_items_without_price, behavior.show_items_without_price);
        }

        if let Some(pricing) = patch.pricing {
            set(&mut self.pricing.high_markup, pricing.high_markup);
            set(&mut self.pricing.low_markup, pricing.low_markup);
            set(&mut self.pricing.low_markup_threshold, pricing.low_markup_threshold);
            set(&mut self.pricing.rounding_unit, pricing.rounding_unit);
            set(&mut self.pricing.currency, pricing.currency);
            set(&mut self.pricing.thousands_separator, pricing.thousands_separator);
        }

        if let Some(lock) = patch.lock {
            set(&mut self.lock.key, lock.key);
            set(&mut self.lock.stale_after_secs, lock.stale_after_secs);
        }

        if let Some(logging) = patch.logging {
            set(&mut self.logging.level, logging.level);
            set(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("PRICEPOST_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("PRICEPOST_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("PRICEPOST_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("PRICEPOST_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("PRICEPOST_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let bot_token =
            read_env("PRICEPOST_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TELEGRAM_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PRICEPOST_TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = value;
        }
        if let Some(value) = read_env("PRICEPOST_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("PRICEPOST_TELEGRAM_REQUEST_TIMEOUT_SECS") {
            self.telegram.request_timeout_secs =
                parse_env("PRICEPOST_TELEGRAM_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("PRICEPOST_TELEGRAM_MAX_ATTEMPTS") {
            self.telegram.max_attempts = parse_env("PRICEPOST_TELEGRAM_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("PRICEPOST_SHOW_OUT_OF_STOCK_PLACEHOLDERS") {
            self.behavior.show_out_of_stock_placeholders =
                parse_env("PRICEPOST_SHOW_OUT_OF_STOCK_PLACEHOLDERS", &value)?;
        }
        if let Some(value) = read_env("PRICEPOST_SHOW_ITEMS_WITHOUT_PRICE") {
            self.behavior.show_items_without_price =
                parse_env("PRICEPOST_SHOW_ITEMS_WITHOUT_PRICE", &value)?;
        }

        if let Some(value) = read_env("PRICEPOST_PRICING_HIGH_MARKUP") {
            self.pricing.high_markup = parse_env("PRICEPOST_PRICING_HIGH_MARKUP", &value)?;
        }
        if let Some(value) = read_env("PRICEPOST_PRICING_LOW_MARKUP") {
            self.pricing.low_markup = parse_env("PRICEPOST_PRICING_LOW_MARKUP", &value)?;
        }
        if let Some(value) = read_env("PRICEPOST_PRICING_LOW_MARKUP_THRESHOLD") {
            self.pricing.low_markup_threshold =
                parse_env("PRICEPOST_PRICING_LOW_MARKUP_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("PRICEPOST_PRICING_ROUNDING_UNIT") {
            self.pricing.rounding_unit = parse_env("PRICEPOST_PRICING_ROUNDING_UNIT", &value)?;
        }

        if let Some(value) = read_env("PRICEPOST_LOCK_STALE_AFTER_SECS") {
            self.lock.stale_after_secs = parse_env("PRICEPOST_LOCK_STALE_AFTER_SECS", &value)?;
        }

        let log_level =
            read_env("PRICEPOST_LOGGING_LEVEL").or_else(|| read_env("PRICEPOST_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICEPOST_LOGGING_FORMAT").or_else(|| read_env("PRICEPOST_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        set(&mut self.database.url, overrides.database_url);
        set(&mut self.logging.level, overrides.log_level);
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        set(&mut self.telegram.chat_id, overrides.telegram_chat_id);
        set(&mut self.telegram.api_base_url, overrides.telegram_api_base_url);
        set(
            &mut self.behavior.show_out_of_stock_placeholders,
            overrides.show_out_of_stock_placeholders,
        );
        set(&mut self.behavior.show_items_without_price, overrides.show_items_without_price);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_telegram(&self.telegram)?;
        validate_sheets(&self.sheets)?;
        validate_columns(&self.columns)?;
        validate_templates(&self.templates)?;
        validate_pricing(&self.pricing)?;
        validate_lock(&self.lock)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricepost.toml"), PathBuf::from("config/pricepost.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather".to_string(),
        ));
    }
    let well_formed = bot_token
        .split_once(':')
        .map(|(id, secret)| {
            !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) && !secret.is_empty()
        })
        .unwrap_or(false);
    if !well_formed {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>`".to_string(),
        ));
    }

    let chat_id = telegram.chat_id.trim();
    if chat_id.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.chat_id is required (`@channel` or a numeric id like `-1001234567890`)"
                .to_string(),
        ));
    }
    let handle = chat_id.len() > 1 && chat_id.starts_with('@');
    if !handle && chat_id.parse::<i64>().is_err() {
        return Err(ConfigError::Validation(format!(
            "telegram.chat_id `{chat_id}` must be `@handle` or a numeric id"
        )));
    }

    let base_url = telegram.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if telegram.link_host.trim().is_empty() || telegram.link_host.contains('/') {
        return Err(ConfigError::Validation(
            "telegram.link_host must be a bare host name such as `t.me`".to_string(),
        ));
    }

    if telegram.request_timeout_secs == 0 || telegram.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "telegram.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if telegram.max_attempts == 0 || telegram.max_attempts > 20 {
        return Err(ConfigError::Validation(
            "telegram.max_attempts must be in range 1..=20".to_string(),
        ));
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    let names = [
        ("sheets.products", &sheets.products),
        ("sheets.directory", &sheets.directory),
        ("sheets.settings", &sheets.settings),
    ];
    for (field, value) in names {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{field} must not be empty")));
        }
    }

    if sheets.products == sheets.directory
        || sheets.products == sheets.settings
        || sheets.directory == sheets.settings
    {
        return Err(ConfigError::Validation(
            "sheets.products, sheets.directory and sheets.settings must be distinct".to_string(),
        ));
    }

    if sheets.retry_attempts == 0 {
        return Err(ConfigError::Validation(
            "sheets.retry_attempts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_columns(columns: &ColumnsConfig) -> Result<(), ConfigError> {
    let product = [
        ("columns.group", &columns.group),
        ("columns.category", &columns.category),
        ("columns.flag", &columns.flag),
        ("columns.name", &columns.name),
        ("columns.price", &columns.price),
    ];
    let directory = [
        ("columns.dir_group", &columns.dir_group),
        ("columns.dir_message_id", &columns.dir_message_id),
        ("columns.dir_status", &columns.dir_status),
    ];

    for table in [&product[..], &directory[..]] {
        for (index, (field, value)) in table.iter().enumerate() {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} must not be empty")));
            }
            if table[..index].iter().any(|(_, other)| other == value) {
                return Err(ConfigError::Validation(format!(
                    "{field} duplicates another column name in the same table (`{value}`)"
                )));
            }
        }
    }

    Ok(())
}

fn validate_templates(templates: &TemplatesConfig) -> Result<(), ConfigError> {
    if templates.date_format.trim().is_empty() {
        return Err(ConfigError::Validation("templates.date_format must not be empty".to_string()));
    }

    if !(-12..=14).contains(&templates.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "templates.utc_offset_hours must be in range -12..=14".to_string(),
        ));
    }

    if templates.other_category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "templates.other_category must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.rounding_unit <= 0 {
        return Err(ConfigError::Validation(
            "pricing.rounding_unit must be greater than zero".to_string(),
        ));
    }

    if pricing.high_markup < 0 || pricing.low_markup < 0 {
        return Err(ConfigError::Validation(
            "pricing.high_markup and pricing.low_markup must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_lock(lock: &LockConfig) -> Result<(), ConfigError> {
    if lock.key.trim().is_empty() {
        return Err(ConfigError::Validation("lock.key must not be empty".to_string()));
    }

    if lock.stale_after_secs == 0 {
        return Err(ConfigError::Validation(
            "lock.stale_after_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    telegram: Option<TelegramPatch>,
    sheets: Option<SheetsPatch>,
    columns: Option<ColumnsPatch>,
    templates: Option<TemplatesPatch>,
    behavior: Option<BehaviorPatch>,
    pricing: Option<PricingPatch>,
    lock: Option<LockPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_base_url: Option<String>,
    link_host: Option<String>,
    request_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    products: Option<String>,
    directory: Option<String>,
    settings: Option<String>,
    retry_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ColumnsPatch {
    group: Option<String>,
    category: Option<String>,
    flag: Option<String>,
    name: Option<String>,
    price: Option<String>,
    dir_group: Option<String>,
    dir_message_id: Option<String>,
    dir_status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TemplatesPatch {
    header: Option<String>,
    footer: Option<String>,
    out_of_stock: Option<String>,
    nav_header: Option<String>,
    date_format: Option<String>,
    utc_offset_hours: Option<i32>,
    other_category: Option<String>,
    price_on_request: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BehaviorPatch {
    show_out_of_stock_placeholders: Option<bool>,
    show_items_without_price: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    high_markup: Option<i64>,
    low_markup: Option<i64>,
    low_markup_threshold: Option<i64>,
    rounding_unit: Option<i64>,
    currency: Option<String>,
    thousands_separator: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LockPatch {
    key: Option<String>,
    stale_after_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
