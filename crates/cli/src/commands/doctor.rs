use std::path::PathBuf;

use pricepost_core::config::{AppConfig, LoadOptions};
use pricepost_core::domain::product::ProductColumns;
use pricepost_core::TabularStore;
use pricepost_db::{connect_with_settings, SqlSheetStore};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Readiness report. Exit code 1 when any check did not pass.
pub fn run(config_path: Option<PathBuf>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<PathBuf>) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions { config_path, ..LoadOptions::default() }) {
        Ok(config) => {
            checks.push(DoctorCheck::pass("config_validation", "configuration loaded and validated"));
            checks.push(check_bot_token(&config));
            checks.extend(check_storage(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["telegram_token_readiness", "database_connectivity", "products_sheet"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Shape was validated on load; only the public bot id is reported.
fn check_bot_token(config: &AppConfig) -> DoctorCheck {
    let token = config.telegram.bot_token.expose_secret();
    let bot_id = token.split_once(':').map(|(bot_id, _)| bot_id).unwrap_or_default();
    DoctorCheck::pass(
        "telegram_token_readiness",
        format!("bot {bot_id} will post to {}", config.telegram.chat_id),
    )
}

fn check_storage(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("products_sheet", "the database was not reachable"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("products_sheet", "the database was not reachable"),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];
        checks.push(check_products_sheet(config, SqlSheetStore::new(pool.clone())).await);
        pool.close().await;
        checks
    })
}

async fn check_products_sheet(config: &AppConfig, store: SqlSheetStore) -> DoctorCheck {
    const NAME: &str = "products_sheet";
    let sheet = &config.sheets.products;

    let table = match store.read_all(sheet).await {
        Ok(Some(table)) => table,
        Ok(None) => {
            return DoctorCheck::fail(NAME, format!("sheet `{sheet}` has not been imported yet"));
        }
        Err(error) => {
            return DoctorCheck::fail(
                NAME,
                format!("could not read sheet `{sheet}` (has `pricepost migrate` run?): {error}"),
            );
        }
    };

    match ProductColumns::resolve(sheet, &table.column_index(), &config.columns.product_names()) {
        Ok(_) => DoctorCheck::pass(
            NAME,
            format!("sheet `{sheet}` has all columns and {} data rows", table.data_rows().len()),
        ),
        Err(error) => DoctorCheck::fail(NAME, error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
