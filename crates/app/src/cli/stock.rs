use clap::{Args, Subcommand};
use fornada_app::{config::AppConfig, domain::catalog::models::ProductUuid};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Args)]
pub(crate) struct StockCommand {
    #[command(subcommand)]
    command: StockSubcommand,
}

#[derive(Debug, Subcommand)]
enum StockSubcommand {
    /// Show a product's available stock
    Show(ProductArgs),

    /// Take units out of stock
    Reserve(MovementArgs),

    /// Return units to stock
    Release(MovementArgs),
}

#[derive(Debug, Args)]
struct ProductArgs {
    /// Product UUID
    #[arg(long)]
    product_uuid: Uuid,
}

#[derive(Debug, Args)]
struct MovementArgs {
    /// Product UUID
    #[arg(long)]
    product_uuid: Uuid,

    /// Units to move
    #[arg(long)]
    quantity: u32,
}

#[expect(clippy::print_stdout, reason = "Command output for the operator")]
pub(crate) async fn run(command: StockCommand, config: &AppConfig) -> Result<(), String> {
    let context = super::context(config).await?;

    let result = match command.command {
        StockSubcommand::Show(args) => {
            context
                .ledger
                .available(ProductUuid::from_uuid(args.product_uuid))
                .await
        }
        StockSubcommand::Reserve(args) => {
            context
                .ledger
                .reserve(ProductUuid::from_uuid(args.product_uuid), args.quantity)
                .await
        }
        StockSubcommand::Release(args) => {
            context
                .ledger
                .release(ProductUuid::from_uuid(args.product_uuid), args.quantity)
                .await
        }
    };

    let stats = context.shutdown().await;

    if stats.dropped > 0 {
        warn!(dropped = stats.dropped, "audit events were dropped");
    }

    let available = result.map_err(|error| format!("stock operation failed: {error}"))?;

    println!("available: {available}");

    Ok(())
}
