use std::process::ExitCode;

fn main() -> ExitCode {
    pricepost_cli::run()
}
