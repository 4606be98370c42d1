//! cem-analyzer CLI entry point.

use cem_analyzer::cli::{self, Cli, Commands, EXIT_ERROR};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("cem_analyzer=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Analyze(args) => {
            init_logging(args.verbose);
            match cli::run_analyze(&args) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    EXIT_ERROR
                }
            }
        }
        Commands::Init(args) => {
            init_logging(false);
            match cli::run_init(&args) {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    EXIT_ERROR
                }
            }
        }
    };

    std::process::exit(exit_code);
}
