//! Thin binary entry point: parses the CLI, dispatches to
//! [`mosaic_search::cli`], and maps a returned error to a single
//! diagnostic line and a non-zero exit (§7 propagation policy).

use clap::Parser;
use mosaic_search::cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { goals, dp_dir, config, max_generations } => {
            mosaic_search::cli::run(&goals, dp_dir.as_deref(), config.as_deref(), max_generations)
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
