//! Truthgate CLI entry point.

use clap::Parser;
use truthgate::cli::{self, Cli, Commands, EXIT_ERROR};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "truthgate=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Analyze(args) => cli::run_analyze(&cli, args).await,
        Commands::Serve(args) => cli::run_serve(&cli, args).await,
        Commands::Admin(args) => cli::run_admin(&cli, args),
        Commands::Init(args) => cli::run_init(args),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}
