use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use pricepost_core::Row;
use pricepost_db::SqlSheetStore;

use crate::commands::{load_config, open_database, runtime, CommandResult};

/// Loads an exported sheet (`[["Group", "Category", ...], ["Phones", ...]]`)
/// into the store, replacing whatever rows the sheet held before.
pub fn run(config_path: Option<PathBuf>, sheet: &str, file: &Path) -> CommandResult {
    let rows = match read_rows(file) {
        Ok(rows) => rows,
        Err(error) => {
            return CommandResult::failure("import", "input", format!("{error:#}"), 2);
        }
    };
    let config = match load_config("import", config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match runtime("import") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let store = SqlSheetStore::new(pool.clone());
        let replaced = store
            .replace_all(sheet, &rows)
            .await
            .map_err(|error| ("persistence", error.to_string(), 7u8));
        pool.close().await;
        replaced
    });

    match result {
        Ok(()) => CommandResult::success(
            "import",
            format!("imported {} rows into sheet `{sheet}`", rows.len()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("import", error_class, message, exit_code)
        }
    }
}

fn read_rows(file: &Path) -> anyhow::Result<Vec<Row>> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("could not read `{}`", file.display()))?;
    let rows: Vec<Row> = serde_json::from_str(&raw).with_context(|| {
        format!("`{}` must hold a JSON array of rows of strings, numbers, or nulls", file.display())
    })?;
    if rows.is_empty() {
        bail!("`{}` holds no rows; the first row must be the header", file.display());
    }
    Ok(rows)
}
