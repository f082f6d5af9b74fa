use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::CalendarDay;
use crate::domain::catalog::{ContractRef, MediaRef};
use crate::domain::plan::{PlanId, PlanPeriod};
use crate::errors::LineError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(pub String);

impl LineId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineNumber(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderNumber(pub u64);

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineState {
    Draft,
    Ordered,
}

impl LineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Ordered => "ordered",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub day: CalendarDay,
    pub quantity: Decimal,
}

/// Price inputs a user edits directly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceInputs {
    pub unit_price: Decimal,
    pub discount_pct: Decimal,
    pub surcharge_pct: Decimal,
}

impl PriceInputs {
    /// Unit price must be non-negative and both percentages within 0..=100.
    pub fn validate(&self) -> Result<(), LineError> {
        if self.unit_price < Decimal::ZERO {
            return Err(LineError::invalid(
                "unit_price",
                format!("{} must not be negative", self.unit_price),
            ));
        }
        validate_pct("discount_pct", self.discount_pct)?;
        validate_pct("surcharge_pct", self.surcharge_pct)
    }
}

fn validate_pct(field: &'static str, pct: Decimal) -> Result<(), LineError> {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        return Err(LineError::invalid(field, format!("{pct} is outside 0..=100")));
    }
    Ok(())
}

/// The four derived monetary outputs of a line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    pub total_net: Decimal,
    pub total_gross: Decimal,
    pub tax: Decimal,
    pub total_order: Decimal,
}

/// Immutable snapshot of an order line ("alternative") handed to persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: LineId,
    pub plan_id: PlanId,
    pub period: PlanPeriod,
    pub line_number: Option<LineNumber>,
    pub order_number: Option<OrderNumber>,
    pub contract: ContractRef,
    pub media: MediaRef,
    #[serde(flatten)]
    pub inputs: PriceInputs,
    pub calendar: Vec<CalendarEntry>,
    #[serde(flatten)]
    pub totals: LineTotals,
    pub state: LineState,
}

impl OrderLine {
    pub fn is_locked(&self) -> bool {
        self.state == LineState::Ordered || self.order_number.is_some()
    }
}
