use clap::{Args, Subcommand};
use fornada::prelude::PricingCalculator;
use fornada_app::config::AppConfig;
use jiff::Timestamp;
use rust_decimal::Decimal;

#[derive(Debug, Args)]
pub(crate) struct PromoCommand {
    #[command(subcommand)]
    command: PromoSubcommand,
}

#[derive(Debug, Subcommand)]
enum PromoSubcommand {
    /// Check a promo code against an order subtotal
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Promo code, any case
    code: String,

    /// Order subtotal in BRL
    #[arg(long)]
    subtotal: Decimal,
}

pub(crate) fn run(command: PromoCommand, config: &AppConfig) -> Result<(), String> {
    match command.command {
        PromoSubcommand::Check(args) => check(&args, config),
    }
}

#[expect(clippy::print_stdout, reason = "Command output for the operator")]
fn check(args: &CheckArgs, config: &AppConfig) -> Result<(), String> {
    let pricing = config
        .pricing
        .load()
        .map_err(|error| format!("failed to load pricing configuration: {error}"))?;

    let calculator = PricingCalculator::new(pricing);

    match calculator.apply_promo_code(&args.code, args.subtotal, Timestamp::now()) {
        Ok(applied) => {
            println!("valid: true");
            println!("code: {}", applied.code);
            println!("discount: {:.2}", applied.discount);
        }
        Err(reason) => {
            println!("valid: false");
            println!("discount: 0.00");
            println!("reason: {reason}");
        }
    }

    Ok(())
}
