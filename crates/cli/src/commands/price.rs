use mediaplan_core::config::{AppConfig, LoadOptions};
use mediaplan_core::domain::catalog::TaxMode;
use mediaplan_core::domain::line::PriceInputs;
use mediaplan_core::pricing::{DeterministicPricingEngine, PricingEngine, PricingInput};
use rust_decimal::Decimal;

use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct PriceArgs {
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub surcharge: Decimal,
    pub tax_mode: String,
    pub multiplier: Decimal,
}

pub fn run(options: &LoadOptions, args: PriceArgs) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "price",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let engine = match DeterministicPricingEngine::with_rates(config.pricing.rates()) {
        Ok(engine) => engine,
        Err(error) => return CommandResult::failure("price", error.kind(), error.to_string(), 2),
    };

    let tax_mode = match args.tax_mode.parse::<TaxMode>() {
        Ok(tax_mode) => tax_mode,
        Err(error) => return CommandResult::failure("price", error.kind(), error.to_string(), 3),
    };

    let inputs = PriceInputs {
        unit_price: args.unit_price,
        discount_pct: args.discount,
        surcharge_pct: args.surcharge,
    };
    if let Err(error) = inputs.validate() {
        return CommandResult::failure("price", error.kind(), error.to_string(), 3);
    }
    if args.multiplier < Decimal::ONE {
        return CommandResult::failure(
            "price",
            "invalid_input",
            format!("invalid multiplier: {} must be at least 1", args.multiplier),
            3,
        );
    }

    let input = PricingInput {
        unit_price: inputs.unit_price,
        discount_pct: inputs.discount_pct,
        surcharge_pct: inputs.surcharge_pct,
        tax_mode,
        multiplier: args.multiplier,
    };
    let result = match engine.price_with_trace(&input) {
        Ok(result) => result,
        Err(error) => return CommandResult::failure("price", error.kind(), error.to_string(), 3),
    };

    CommandResult::success_with_data(
        "price",
        format!(
            "net {} / gross {} / tax {} / order {}",
            result.totals.total_net,
            result.totals.total_gross,
            result.totals.tax,
            result.totals.total_order
        ),
        &result,
    )
}
