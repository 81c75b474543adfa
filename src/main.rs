use clap::Parser;
use std::process::ExitCode;

mod cli;
mod logging;

use cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _logging = logging::init(cli.verbose);

    match cli.execute() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
