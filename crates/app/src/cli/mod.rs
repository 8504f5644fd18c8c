use clap::{Parser, Subcommand};

use fornada_app::{
    config::{AppConfig, LoggingConfig},
    context::AppContext,
};

mod db;
mod payment;
mod postal;
mod promo;
mod quote;
mod stock;

#[derive(Debug, Parser)]
#[command(name = "fornada-app", about = "Fornada order engine CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Db(db::DbCommand),
    Promo(promo::PromoCommand),
    Quote(quote::QuoteArgs),
    Postal(postal::PostalCommand),
    Stock(stock::StockCommand),
    Payment(payment::PaymentCommand),
}

impl Cli {
    pub(crate) fn logging(&self) -> &LoggingConfig {
        &self.config.logging
    }

    pub(crate) async fn run(self) -> Result<(), String> {
        match self.command {
            Commands::Db(command) => db::run(command, &self.config).await,
            Commands::Promo(command) => promo::run(command, &self.config),
            Commands::Quote(args) => quote::run(args, &self.config),
            Commands::Postal(command) => postal::run(command, &self.config).await,
            Commands::Stock(command) => stock::run(command, &self.config).await,
            Commands::Payment(command) => payment::run(command, &self.config).await,
        }
    }
}

/// Builds the service context the stateful commands run against.
pub(crate) async fn context(config: &AppConfig) -> Result<AppContext, String> {
    AppContext::from_config(config)
        .await
        .map_err(|error| format!("failed to initialise: {error}"))
}
