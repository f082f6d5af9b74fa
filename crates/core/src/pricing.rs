//! Net, gross, tax and order totals for one order line.
//!
//! Each labelled total is rounded to a whole currency unit before it feeds
//! the next step; rounding only at the end gives different figures.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Contract, Media, TaxMode};
use crate::domain::line::{LineTotals, PriceInputs};
use crate::errors::LineError;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRates {
    /// Share of the net total charged as value-added tax.
    pub tax_rate: Decimal,
    /// Ratio of net to gross.
    pub net_gross_factor: Decimal,
}

impl Default for PricingRates {
    fn default() -> Self {
        Self { tax_rate: Decimal::new(19, 2), net_gross_factor: Decimal::new(85, 2) }
    }
}

impl PricingRates {
    pub fn validate(&self) -> Result<(), LineError> {
        if self.tax_rate < Decimal::ZERO || self.tax_rate >= Decimal::ONE {
            return Err(LineError::Configuration(format!(
                "tax rate {} must be in range 0..1",
                self.tax_rate
            )));
        }
        if self.net_gross_factor <= Decimal::ZERO || self.net_gross_factor > Decimal::ONE {
            return Err(LineError::Configuration(format!(
                "net/gross factor {} must be in range (0, 1]",
                self.net_gross_factor
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInput {
    pub unit_price: Decimal,
    pub discount_pct: Decimal,
    pub surcharge_pct: Decimal,
    pub tax_mode: TaxMode,
    pub multiplier: Decimal,
}

impl PricingInput {
    /// Builds the input for a line, resolving the tax mode from its contract.
    pub fn for_line(
        inputs: &PriceInputs,
        contract: &Contract,
        multiplier: Decimal,
    ) -> Result<Self, LineError> {
        Ok(Self {
            unit_price: inputs.unit_price,
            discount_pct: inputs.discount_pct,
            surcharge_pct: inputs.surcharge_pct,
            tax_mode: contract.tax_mode()?,
            multiplier,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub totals: LineTotals,
    pub steps: Vec<PricingTraceStep>,
}

/// Fails with [`LineError::Overflow`] when an amount leaves the decimal range.
pub trait PricingEngine: Send + Sync {
    fn price_with_trace(&self, input: &PricingInput) -> Result<PricingResult, LineError>;

    fn compute_totals(&self, input: &PricingInput) -> Result<LineTotals, LineError> {
        self.price_with_trace(input).map(|result| result.totals)
    }
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicPricingEngine {
    rates: PricingRates,
}

impl DeterministicPricingEngine {
    pub fn with_rates(rates: PricingRates) -> Result<Self, LineError> {
        rates.validate()?;
        Ok(Self { rates })
    }

    pub fn rates(&self) -> PricingRates {
        self.rates
    }
}

impl PricingEngine for DeterministicPricingEngine {
    fn price_with_trace(&self, input: &PricingInput) -> Result<PricingResult, LineError> {
        price_with_rates(input, &self.rates)
    }
}

/// Totals under the default 19% tax and 0.85 net/gross factor.
pub fn compute_totals(input: &PricingInput) -> Result<LineTotals, LineError> {
    price_with_rates(input, &PricingRates::default()).map(|result| result.totals)
}

/// Quantity scales the unit price only for media priced per unit.
pub fn resolve_multiplier(media: &Media, total_quantity: Decimal) -> Decimal {
    if media.quantity_multiplies_price {
        total_quantity.max(Decimal::ONE)
    } else {
        Decimal::ONE
    }
}

pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

fn price_with_rates(
    input: &PricingInput,
    rates: &PricingRates,
) -> Result<PricingResult, LineError> {
    let mut steps = Vec::with_capacity(7);

    let mut base = checked("base", input.unit_price.checked_mul(input.multiplier))?;
    steps.push(step("base", "unit_price * multiplier", base));

    if input.discount_pct > Decimal::ZERO {
        let cut = percent_of(base, input.discount_pct, "discount")?;
        base = checked("discount", base.checked_sub(cut))?;
        steps.push(step("discount", format!("less {}%", input.discount_pct), base));
    }
    if input.surcharge_pct > Decimal::ZERO {
        let extra = percent_of(base, input.surcharge_pct, "surcharge")?;
        base = checked("surcharge", base.checked_add(extra))?;
        steps.push(step("surcharge", format!("plus {}%", input.surcharge_pct), base));
    }

    let factor = rates.net_gross_factor;
    let (total_net, total_gross) = match input.tax_mode {
        TaxMode::Net => {
            let net = round_currency(base);
            steps.push(step("net", "round(base)", net));
            let gross = round_currency(checked("gross", net.checked_div(factor))?);
            steps.push(step("gross", format!("round(net / {factor})"), gross));
            (net, gross)
        }
        TaxMode::Gross => {
            let gross = round_currency(base);
            steps.push(step("gross", "round(base)", gross));
            let net = round_currency(checked("net", gross.checked_mul(factor))?);
            steps.push(step("net", format!("round(gross * {factor})"), net));
            (net, gross)
        }
    };

    let tax = round_currency(checked("tax", total_net.checked_mul(rates.tax_rate))?);
    steps.push(step("tax", format!("round(net * {})", rates.tax_rate), tax));

    let total_order = checked("order", total_net.checked_add(tax))?;
    steps.push(step("order", "net + tax", total_order));

    Ok(PricingResult { totals: LineTotals { total_net, total_gross, tax, total_order }, steps })
}

fn percent_of(amount: Decimal, pct: Decimal, stage: &'static str) -> Result<Decimal, LineError> {
    checked(stage, amount.checked_mul(pct).and_then(|scaled| scaled.checked_div(HUNDRED)))
}

fn checked(stage: &'static str, value: Option<Decimal>) -> Result<Decimal, LineError> {
    value.ok_or(LineError::Overflow { stage })
}

fn step(stage: &str, detail: impl Into<String>, amount: Decimal) -> PricingTraceStep {
    PricingTraceStep { stage: stage.to_owned(), detail: detail.into(), amount }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use super::{
        compute_totals, resolve_multiplier, round_currency, DeterministicPricingEngine,
        PricingEngine, PricingInput, PricingRates,
    };
    use crate::domain::catalog::{Media, MediaRef, TaxMode};
    use crate::errors::LineError;

    fn input(unit_price: i64, discount: i64, surcharge: i64, mode: TaxMode) -> PricingInput {
        PricingInput {
            unit_price: Decimal::from(unit_price),
            discount_pct: Decimal::from(discount),
            surcharge_pct: Decimal::from(surcharge),
            tax_mode: mode,
            multiplier: Decimal::ONE,
        }
    }

    fn media(per_unit: bool) -> Media {
        Media {
            id: MediaRef("tv".to_owned()),
            name: "Television".to_owned(),
            quantity_multiplies_price: per_unit,
        }
    }

    #[test]
    fn net_mode_with_discount_matches_reference_figures() {
        let totals = compute_totals(&input(1000, 10, 0, TaxMode::Net)).expect("priced");

        assert_eq!(totals.total_net, Decimal::from(900));
        assert_eq!(totals.total_gross, Decimal::from(1059));
        assert_eq!(totals.tax, Decimal::from(171));
        assert_eq!(totals.total_order, Decimal::from(1071));
    }

    #[test]
    fn gross_mode_with_quantity_multiplier_rounds_tax_half_up() {
        let multiplier = resolve_multiplier(&media(true), Decimal::from(10));
        let totals = compute_totals(&PricingInput {
            multiplier,
            ..input(100, 0, 0, TaxMode::Gross)
        })
        .expect("priced");

        assert_eq!(multiplier, Decimal::from(10));
        assert_eq!(totals.total_gross, Decimal::from(1000));
        assert_eq!(totals.total_net, Decimal::from(850));
        assert_eq!(totals.tax, Decimal::from(162));
        assert_eq!(totals.total_order, Decimal::from(1012));
    }

    #[test]
    fn surcharge_applies_after_discount() {
        let totals = compute_totals(&input(1000, 10, 10, TaxMode::Net)).expect("priced");
        assert_eq!(totals.total_net, Decimal::from(990));
    }

    #[test]
    fn multiplier_ignores_quantity_for_flat_priced_media() {
        assert_eq!(resolve_multiplier(&media(false), Decimal::from(40)), Decimal::ONE);
        assert_eq!(resolve_multiplier(&media(true), Decimal::ZERO), Decimal::ONE);
        assert_eq!(resolve_multiplier(&media(true), Decimal::new(5, 1)), Decimal::ONE);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_currency(Decimal::new(1615, 1)), Decimal::from(162));
        assert_eq!(round_currency(Decimal::new(1625, 1)), Decimal::from(163));
        assert_eq!(round_currency(Decimal::new(1624, 1)), Decimal::from(162));
    }

    #[test]
    fn trace_records_each_labelled_step() {
        let engine = DeterministicPricingEngine::default();
        let result = engine.price_with_trace(&input(1000, 10, 5, TaxMode::Gross)).expect("priced");
        let stages: Vec<&str> = result.steps.iter().map(|step| step.stage.as_str()).collect();

        assert_eq!(stages, ["base", "discount", "surcharge", "gross", "net", "tax", "order"]);
        assert_eq!(result.steps.last().map(|step| step.amount), Some(result.totals.total_order));
    }

    #[test]
    fn custom_rates_are_validated() {
        let invalid = PricingRates { tax_rate: Decimal::ONE, ..PricingRates::default() };
        assert!(DeterministicPricingEngine::with_rates(invalid).is_err());

        let zero_factor =
            PricingRates { net_gross_factor: Decimal::ZERO, ..PricingRates::default() };
        assert!(DeterministicPricingEngine::with_rates(zero_factor).is_err());

        let no_tax = PricingRates { tax_rate: Decimal::ZERO, ..PricingRates::default() };
        let engine = DeterministicPricingEngine::with_rates(no_tax).expect("valid rates");
        let totals = engine.compute_totals(&input(500, 0, 0, TaxMode::Net)).expect("priced");
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total_order, Decimal::from(500));
    }

    #[test]
    fn net_conversion_overflow_is_reported() {
        let error = compute_totals(&PricingInput {
            unit_price: Decimal::MAX,
            ..input(0, 0, 0, TaxMode::Net)
        })
        .expect_err("gross exceeds decimal range");

        assert_eq!(error, LineError::Overflow { stage: "gross" });
    }

    #[test]
    fn price_times_quantity_overflow_is_reported() {
        let error = compute_totals(&PricingInput {
            unit_price: Decimal::from(10_000_000_000_000_000i64),
            multiplier: Decimal::from(10_000_000_000_000i64),
            ..input(0, 0, 0, TaxMode::Gross)
        })
        .expect_err("base exceeds decimal range");

        assert_eq!(error, LineError::Overflow { stage: "base" });
    }

    fn tax_mode() -> impl Strategy<Value = TaxMode> {
        prop_oneof![Just(TaxMode::Net), Just(TaxMode::Gross)]
    }

    fn pricing_input() -> impl Strategy<Value = PricingInput> {
        (0i64..=1_000_000_000, 0i64..=10_000, 0i64..=10_000, tax_mode(), 1i64..=1_000).prop_map(
            |(price_cents, discount_bp, surcharge_bp, tax_mode, multiplier)| PricingInput {
                unit_price: Decimal::new(price_cents, 2),
                discount_pct: Decimal::new(discount_bp, 2),
                surcharge_pct: Decimal::new(surcharge_bp, 2),
                tax_mode,
                multiplier: Decimal::from(multiplier),
            },
        )
    }

    proptest! {
        #[test]
        fn totals_are_non_negative_for_valid_inputs(input in pricing_input()) {
            let totals = compute_totals(&input).expect("in range");
            prop_assert!(totals.total_net >= Decimal::ZERO);
            prop_assert!(totals.total_gross >= Decimal::ZERO);
        }

        #[test]
        fn order_total_is_net_plus_tax(input in pricing_input()) {
            let totals = compute_totals(&input).expect("in range");
            prop_assert_eq!(totals.total_order, totals.total_net + totals.tax);
        }

        #[test]
        fn recomputation_is_idempotent(input in pricing_input()) {
            let first = compute_totals(&input).expect("in range");
            let second = compute_totals(&input).expect("in range");
            prop_assert_eq!(first, second);
            prop_assert_eq!(first.total_net.serialize(), second.total_net.serialize());
        }
    }
}
