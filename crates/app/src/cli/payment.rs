use clap::{Args, Subcommand};
use fornada_app::{
    config::AppConfig,
    domain::orders::models::{Order, OrderUuid},
};
use uuid::Uuid;

#[derive(Debug, Args)]
pub(crate) struct PaymentCommand {
    #[command(subcommand)]
    command: PaymentSubcommand,
}

#[derive(Debug, Subcommand)]
enum PaymentSubcommand {
    /// Issue a PIX checkout for a pending order
    Checkout(OrderArgs),

    /// Mark a pending payment as paid, confirming the order
    Confirm(OrderArgs),

    /// Mark a pending payment as failed, cancelling the order
    Fail(OrderArgs),

    /// Fail every pending payment whose checkout has expired
    Expire,
}

#[derive(Debug, Args)]
struct OrderArgs {
    /// Order UUID
    #[arg(long)]
    order_uuid: Uuid,
}

#[expect(clippy::print_stdout, reason = "Command output for the operator")]
pub(crate) async fn run(command: PaymentCommand, config: &AppConfig) -> Result<(), String> {
    let context = super::context(config).await?;

    let output = match command.command {
        PaymentSubcommand::Checkout(args) => context
            .payments
            .issue_checkout(OrderUuid::from_uuid(args.order_uuid))
            .await
            .map_err(|error| format!("checkout failed: {error}"))
            .and_then(|checkout| {
                serde_json::to_string_pretty(&checkout)
                    .map_err(|error| format!("failed to encode checkout: {error}"))
            }),
        PaymentSubcommand::Confirm(args) => context
            .payments
            .confirm_payment(OrderUuid::from_uuid(args.order_uuid))
            .await
            .map(|order| describe(&order))
            .map_err(|error| format!("confirmation failed: {error}")),
        PaymentSubcommand::Fail(args) => context
            .payments
            .fail_payment(OrderUuid::from_uuid(args.order_uuid))
            .await
            .map(|order| describe(&order))
            .map_err(|error| format!("failure could not be recorded: {error}")),
        PaymentSubcommand::Expire => context
            .payments
            .expire_checkouts()
            .await
            .map(|expired| describe_expired(&expired))
            .map_err(|error| format!("expiry sweep failed: {error}")),
    };

    context.shutdown().await;

    println!("{}", output?);

    Ok(())
}

fn describe_expired(expired: &[OrderUuid]) -> String {
    expired
        .iter()
        .map(|order| format!("expired: {order}"))
        .chain(std::iter::once(format!("expired_count: {}", expired.len())))
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe(order: &Order) -> String {
    let expiry = order
        .checkout_expires_at
        .map(|expires_at| format!("\ncheckout_expires_at: {expires_at}"))
        .unwrap_or_default();

    format!(
        "order_uuid: {}\nstatus: {}\npayment_status: {}\ntotal: {:.2}{expiry}",
        order.uuid, order.status, order.payment_status, order.total
    )
}
