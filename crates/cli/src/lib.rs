pub mod commands;
pub mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "pricepost",
    about = "Pricepost operator CLI",
    long_about = "Publish price-list posts to a Telegram channel, keep the group directory in step, and rebuild the pinned navigation post.",
    after_help = "Examples:\n  pricepost import --sheet Prices --file prices.json\n  pricepost run\n  pricepost doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a pricepost.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Synchronize product posts, directory statuses, and the navigation post")]
    Run,
    #[command(about = "Rebuild only the pinned navigation post from the stored directory")]
    Nav,
    #[command(about = "Replace a sheet's rows with a JSON array of rows (first row is the header)")]
    Import {
        #[arg(long, help = "Sheet name, e.g. the configured products sheet")]
        sheet: String,
        #[arg(long, help = "JSON file holding an array of row arrays")]
        file: PathBuf,
    },
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token shape, database, and the products sheet")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let config_path = cli.config;

    let result = match cli.command {
        Command::Run => commands::sync::run(config_path),
        Command::Nav => commands::sync::nav(config_path),
        Command::Import { sheet, file } => commands::import::run(config_path, &sheet, &file),
        Command::Migrate => commands::migrate::run(config_path),
        Command::Config => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(config_path),
        },
        Command::Doctor { json } => commands::doctor::run(config_path, json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
