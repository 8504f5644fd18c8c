use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use clap::Args;
use fornada::prelude::{CartLine, Destination, PricingCalculator};
use fornada_app::config::AppConfig;
use jiff::Timestamp;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Args)]
pub(crate) struct QuoteArgs {
    /// Cart line as `PRICE:QUANTITY[:UNIT_WEIGHT_KG]`, repeatable
    #[arg(long = "line")]
    lines: Vec<QuoteLine>,

    /// JSON file holding an array of cart lines, customizations included
    #[arg(long)]
    cart: Option<PathBuf>,

    /// Destination city
    #[arg(long)]
    city: String,

    /// Destination state code, e.g. `SP`
    #[arg(long)]
    region: String,

    /// Promo code to apply
    #[arg(long)]
    promo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct QuoteLine {
    price: Decimal,
    quantity: u32,
    unit_weight_kg: Decimal,
}

impl FromStr for QuoteLine {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut parts = raw.split(':');

        let price = parts
            .next()
            .and_then(|part| Decimal::from_str(part.trim()).ok())
            .filter(|price| !price.is_sign_negative())
            .ok_or_else(|| format!("invalid price in line `{raw}`"))?;

        let quantity = parts
            .next()
            .and_then(|part| part.trim().parse::<u32>().ok())
            .filter(|quantity| *quantity > 0)
            .ok_or_else(|| format!("invalid quantity in line `{raw}`"))?;

        let unit_weight_kg = match parts.next() {
            Some(part) => Decimal::from_str(part.trim())
                .map_err(|error| format!("invalid weight in line `{raw}`: {error}"))?,
            None => Decimal::ZERO,
        };

        if parts.next().is_some() {
            return Err(format!("too many fields in line `{raw}`"));
        }

        Ok(Self {
            price,
            quantity,
            unit_weight_kg,
        })
    }
}

impl From<&QuoteLine> for CartLine {
    fn from(line: &QuoteLine) -> Self {
        CartLine::new(Uuid::nil(), line.quantity, line.price).with_unit_weight(line.unit_weight_kg)
    }
}

fn read_cart(path: &Path) -> Result<Vec<CartLine>, String> {
    let json = fs::read_to_string(path)
        .map_err(|error| format!("failed to read {}: {error}", path.display()))?;

    serde_json::from_str(&json).map_err(|error| format!("invalid cart {}: {error}", path.display()))
}

#[expect(clippy::print_stdout, reason = "Command output for the operator")]
pub(crate) fn run(args: QuoteArgs, config: &AppConfig) -> Result<(), String> {
    let pricing = config
        .pricing
        .load()
        .map_err(|error| format!("failed to load pricing configuration: {error}"))?;

    let mut lines: Vec<CartLine> = args.lines.iter().map(CartLine::from).collect();

    if let Some(path) = &args.cart {
        lines.extend(read_cart(path)?);
    }

    if lines.is_empty() {
        return Err("nothing to quote: pass --line or --cart".to_string());
    }

    let calculator = PricingCalculator::new(pricing);
    let destination = Destination::new(args.city, args.region);
    let now = Timestamp::now();

    if let Some(code) = args.promo.as_deref() {
        let subtotal = calculator
            .subtotal(&lines)
            .map_err(|error| error.to_string())?;

        if let Err(reason) = calculator.apply_promo_code(code, subtotal, now) {
            println!("promo_rejected: {reason}");
        }
    }

    let totals = calculator
        .totals(&lines, &destination, args.promo.as_deref(), now)
        .map_err(|error| error.to_string())?;

    println!("subtotal: {:.2}", totals.subtotal);
    println!("weight_kg: {}", totals.weight_kg);
    println!("delivery_tier: {}", totals.tier);
    println!("delivery_fee: {:.2}", totals.delivery_fee);
    println!("discount: {:.2}", totals.discount);
    println!("total: {:.2}", totals.total);

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn line_with_weight_parses() -> TestResult {
        let line: QuoteLine = "45.00:2:1.5".parse()?;

        assert_eq!(line.price, Decimal::new(45_00, 2));
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_weight_kg, Decimal::new(15, 1));

        Ok(())
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!("10.00:0".parse::<QuoteLine>().is_err(), "quantity must be positive");
        assert!("-1:1".parse::<QuoteLine>().is_err(), "price must not be negative");
        assert!("1:1:1:1".parse::<QuoteLine>().is_err(), "at most three fields");
    }
}
