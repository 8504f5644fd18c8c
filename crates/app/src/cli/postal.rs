use std::sync::Arc;

use clap::{Args, Subcommand};
use fornada_app::{
    config::AppConfig,
    domain::postal::{HttpPostalCodeLookup, PostalCodeResolver, models::Resolution},
};

#[derive(Debug, Args)]
pub(crate) struct PostalCommand {
    #[command(subcommand)]
    command: PostalSubcommand,
}

#[derive(Debug, Subcommand)]
enum PostalSubcommand {
    /// Resolve a CEP, falling back to the local state table
    Lookup(LookupArgs),
}

#[derive(Debug, Args)]
struct LookupArgs {
    /// Postal code, punctuation optional
    postal_code: String,
}

pub(crate) async fn run(command: PostalCommand, config: &AppConfig) -> Result<(), String> {
    match command.command {
        PostalSubcommand::Lookup(args) => lookup(&args, config).await,
    }
}

#[expect(clippy::print_stdout, reason = "Command output for the operator")]
async fn lookup(args: &LookupArgs, config: &AppConfig) -> Result<(), String> {
    let resolver = PostalCodeResolver::new(
        Arc::new(HttpPostalCodeLookup::new(&config.postal.postal_lookup_url)),
        config.postal.timeout(),
    );

    let resolution = resolver
        .resolve(&args.postal_code)
        .await
        .map_err(|error| format!("lookup failed: {error}"))?;

    match resolution {
        Resolution::Resolved(address) => {
            println!("postal_code: {}", address.postal_code);
            println!("street: {}", address.street);
            println!("neighborhood: {}", address.neighborhood);
            println!("city: {}", address.city);
            println!("region: {}", address.region);
        }
        Resolution::Degraded {
            postal_code,
            region,
        } => {
            println!("postal_code: {postal_code}");
            println!("region: {}", region.unwrap_or("unknown"));
            println!("degraded: lookup unavailable, region inferred locally");
        }
    }

    Ok(())
}
