use std::path::PathBuf;
use std::sync::Arc;

use pricepost_core::errors::{ApplicationError, DomainError};
use pricepost_core::{AppConfig, PriceSync, RunOutcome};
use pricepost_db::{SqlRunLockStore, SqlSheetStore};
use pricepost_telegram::{HttpBotApi, TelegramClient};

use crate::commands::{load_config, open_database, runtime, CommandResult, Failure};
use crate::logging;

#[derive(Clone, Copy)]
enum Mode {
    Full,
    NavigationOnly,
}

/// Full synchronization: product posts, directory statuses, navigation post.
pub fn run(config_path: Option<PathBuf>) -> CommandResult {
    execute("run", config_path, Mode::Full)
}

/// Navigation post only, from the directory as currently stored.
pub fn nav(config_path: Option<PathBuf>) -> CommandResult {
    execute("nav", config_path, Mode::NavigationOnly)
}

fn execute(command: &str, config_path: Option<PathBuf>, mode: Mode) -> CommandResult {
    let config = match load_config(command, config_path) {
        Ok(config) => config,
        Err(result) => return result,
    };
    logging::init(&config.logging);
    let runtime = match runtime(command) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    match runtime.block_on(synchronize(config, mode)) {
        Ok(outcome) => {
            let message = match &outcome {
                RunOutcome::Completed(_) => "sync completed",
                RunOutcome::Skipped => "another run holds the lock; nothing was changed",
            };
            CommandResult::success_with_report(command, message, &outcome)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

async fn synchronize(config: AppConfig, mode: Mode) -> Result<RunOutcome, Failure> {
    let pool = open_database(&config).await?;
    let api = HttpBotApi::from_config(&config.telegram)
        .map_err(|error| failure(&ApplicationError::from(error)))?;
    let messenger = Arc::new(TelegramClient::from_config(Arc::new(api), &config.telegram));
    let sync = PriceSync::new(
        config,
        Arc::new(SqlSheetStore::new(pool.clone())),
        messenger,
        Arc::new(SqlRunLockStore::new(pool.clone())),
    );

    let outcome = match mode {
        Mode::Full => sync.run().await,
        Mode::NavigationOnly => sync.rebuild_navigation_only().await,
    };
    pool.close().await;

    outcome.map_err(|error| failure(&error))
}

fn failure(error: &ApplicationError) -> Failure {
    (error.error_class(), error.to_string(), exit_code(error))
}

fn exit_code(error: &ApplicationError) -> u8 {
    match error {
        ApplicationError::Configuration(_) => 2,
        ApplicationError::Domain(DomainError::MissingTable(_)) => 6,
        ApplicationError::Domain(DomainError::MissingColumns { .. }) => 6,
        ApplicationError::Persistence(_) => 7,
        ApplicationError::Integration(_) => 8,
        ApplicationError::Lock(_) => 9,
    }
}

#[cfg(test)]
mod tests {
    use pricepost_core::errors::{ApplicationError, DomainError};
    use pricepost_telegram::TransportError;

    use super::failure;

    #[test]
    fn bot_api_setup_failure_maps_to_integration_exit_code() {
        let (error_class, message, exit_code) =
            failure(&ApplicationError::from(TransportError::Setup("no tls backend".to_owned())));

        assert_eq!(error_class, "integration");
        assert_eq!(exit_code, 8);
        assert!(message.contains("no tls backend"));
    }

    #[test]
    fn every_error_class_has_its_own_exit_code() {
        let codes: Vec<u8> = [
            ApplicationError::Configuration("bad".to_owned()),
            ApplicationError::Domain(DomainError::MissingTable("Prices".to_owned())),
            ApplicationError::Persistence("disk".to_owned()),
            ApplicationError::Integration("http".to_owned()),
            ApplicationError::Lock("busy".to_owned()),
        ]
        .iter()
        .map(|error| failure(error).2)
        .collect();

        assert_eq!(codes, vec![2, 6, 7, 8, 9]);
    }
}
