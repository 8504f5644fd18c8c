//! Fornada Application CLI

use std::process;

use clap::Parser;
use fornada_app::observability;
use tracing::error;

mod cli;

#[tokio::main]
pub async fn main() {
    let _env = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    if let Err(error) = observability::init_subscriber(cli.logging()) {
        #[expect(
            clippy::print_stderr,
            reason = "logging not initialized, must use eprintln"
        )]
        {
            eprintln!("{error}");
        }

        process::exit(1);
    }

    if let Err(message) = cli.run().await {
        error!("{message}");

        process::exit(1);
    }
}
