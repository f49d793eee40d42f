mod cli;
mod commands;
mod git;

use clap::Parser;
use cli::Cli;

fn main() {
    let cli = Cli::parse();
    let _log_guard = diffbudget_core::logging::init(&cli.log_level);

    match commands::execute(cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
