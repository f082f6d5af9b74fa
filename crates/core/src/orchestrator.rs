//! Single coordination point for editing one order line.
//!
//! Every command runs the lifecycle guard, applies the change to a working
//! copy, reprices it, and only then commits. A failed command leaves the
//! line exactly as it was, including its previous totals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::calendar::CalendarAllocation;
use crate::domain::catalog::{Contract, Media};
use crate::domain::line::{
    LineId, LineNumber, LineState, LineTotals, OrderLine, OrderNumber, PriceInputs,
};
use crate::domain::plan::{Plan, PlanId};
use crate::errors::LineError;
use crate::lifecycle::{LineLifecycle, LineOperation};
use crate::pricing::{resolve_multiplier, DeterministicPricingEngine, PricingEngine, PricingInput};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum LineCommand {
    SetUnitPrice {
        value: Decimal,
    },
    SetDiscount {
        pct: Decimal,
    },
    SetSurcharge {
        pct: Decimal,
    },
    SetCalendarQuantity {
        day: String,
        quantity: Decimal,
        #[serde(default)]
        autofill: bool,
    },
    ResetCalendar,
}

impl LineCommand {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SetUnitPrice { .. } => "line.unit_price_set",
            Self::SetDiscount { .. } => "line.discount_set",
            Self::SetSurcharge { .. } => "line.surcharge_set",
            Self::SetCalendarQuantity { .. } => "line.calendar_quantity_set",
            Self::ResetCalendar => "line.calendar_reset",
        }
    }

    fn category(&self) -> AuditCategory {
        match self {
            Self::SetCalendarQuantity { .. } | Self::ResetCalendar => AuditCategory::Calendar,
            _ => AuditCategory::Pricing,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrderLineOrchestrator<P = DeterministicPricingEngine> {
    id: LineId,
    plan_id: PlanId,
    line_number: Option<LineNumber>,
    order_number: Option<OrderNumber>,
    state: LineState,
    contract: Contract,
    media: Media,
    inputs: PriceInputs,
    calendar: CalendarAllocation,
    totals: LineTotals,
    engine: P,
}

impl<P> OrderLineOrchestrator<P>
where
    P: PricingEngine,
{
    /// Starts a new draft line for `plan` using resolved catalog snapshots.
    pub fn new(
        plan: &Plan,
        contract: Contract,
        media: Media,
        engine: P,
    ) -> Result<Self, LineError> {
        ensure_media_matches(&contract, &media)?;
        Ok(Self {
            id: LineId::generate(),
            plan_id: plan.id.clone(),
            line_number: None,
            order_number: None,
            state: LineState::Draft,
            contract,
            media,
            inputs: PriceInputs::default(),
            calendar: CalendarAllocation::new(plan.period),
            totals: LineTotals::default(),
            engine,
        })
    }

    /// Rehydrates a persisted line. Draft lines are repriced; ordered lines
    /// keep the totals they were ordered with. Calendar days outside the
    /// line's month are rejected.
    pub fn from_snapshot(
        line: OrderLine,
        contract: Contract,
        media: Media,
        engine: P,
    ) -> Result<Self, LineError> {
        if contract.id != line.contract {
            return Err(LineError::Configuration(format!(
                "line {} references contract {} but {} was supplied",
                line.id, line.contract, contract.id
            )));
        }
        if media.id != line.media {
            return Err(LineError::Configuration(format!(
                "line {} references media {} but {} was supplied",
                line.id, line.media, media.id
            )));
        }
        if line.state == LineState::Ordered && line.order_number.is_none() {
            return Err(LineError::Configuration(format!(
                "line {} is marked ordered but has no order number",
                line.id
            )));
        }
        line.inputs.validate()?;

        let calendar = CalendarAllocation::from_entries(line.period, line.calendar)?;
        let state =
            if line.order_number.is_some() { LineState::Ordered } else { LineState::Draft };

        let mut orchestrator = Self {
            id: line.id,
            plan_id: line.plan_id,
            line_number: line.line_number,
            order_number: line.order_number,
            state,
            contract,
            media,
            inputs: line.inputs,
            calendar,
            totals: line.totals,
            engine,
        };
        if state == LineState::Draft {
            let totals = orchestrator.price(&orchestrator.inputs, &orchestrator.calendar)?;
            orchestrator.totals = totals;
        }
        Ok(orchestrator)
    }

    pub fn id(&self) -> &LineId {
        &self.id
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn totals(&self) -> LineTotals {
        self.totals
    }

    pub fn inputs(&self) -> PriceInputs {
        self.inputs
    }

    pub fn calendar(&self) -> &CalendarAllocation {
        &self.calendar
    }

    pub fn apply(&mut self, command: LineCommand) -> Result<OrderLine, LineError> {
        let event_type = command.event_type();
        match self.try_apply(command) {
            Ok(()) => {
                tracing::debug!(
                    event_name = event_type,
                    line_id = %self.id,
                    total_net = %self.totals.total_net,
                    total_order = %self.totals.total_order,
                    "order line command applied"
                );
                Ok(self.to_snapshot())
            }
            Err(error) => {
                tracing::warn!(
                    event_name = event_type,
                    line_id = %self.id,
                    error_kind = error.kind(),
                    error = %error,
                    "order line command rejected"
                );
                Err(error)
            }
        }
    }

    pub fn apply_with_audit<S>(
        &mut self,
        command: LineCommand,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<OrderLine, LineError>
    where
        S: AuditSink,
    {
        let event_type = command.event_type();
        let category = command.category();
        let result = self.apply(command);
        let outcome = if result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Rejected };
        let event = AuditEvent::new(self.id.clone(), audit, event_type, category, outcome);
        let event = match &result {
            Ok(line) => event
                .with_metadata("total_net", line.totals.total_net.to_string())
                .with_metadata("total_gross", line.totals.total_gross.to_string())
                .with_metadata("tax", line.totals.tax.to_string())
                .with_metadata("total_order", line.totals.total_order.to_string()),
            Err(error) => event
                .with_metadata("error_kind", error.kind())
                .with_metadata("error", error.to_string()),
        };
        sink.emit(event);
        result
    }

    pub fn set_unit_price(&mut self, value: Decimal) -> Result<OrderLine, LineError> {
        self.apply(LineCommand::SetUnitPrice { value })
    }

    pub fn set_discount(&mut self, pct: Decimal) -> Result<OrderLine, LineError> {
        self.apply(LineCommand::SetDiscount { pct })
    }

    pub fn set_surcharge(&mut self, pct: Decimal) -> Result<OrderLine, LineError> {
        self.apply(LineCommand::SetSurcharge { pct })
    }

    pub fn set_calendar_quantity(
        &mut self,
        day: &str,
        quantity: Decimal,
        autofill: bool,
    ) -> Result<OrderLine, LineError> {
        self.apply(LineCommand::SetCalendarQuantity { day: day.to_owned(), quantity, autofill })
    }

    pub fn reset_calendar(&mut self) -> Result<OrderLine, LineError> {
        self.apply(LineCommand::ResetCalendar)
    }

    /// Locks the line under an externally issued order number.
    pub fn assign_order_number(
        &mut self,
        order_number: OrderNumber,
        line_number: Option<LineNumber>,
    ) -> Result<OrderLine, LineError> {
        LineLifecycle::guard(&self.id, self.state, LineOperation::AssignOrder)?;
        self.order_number = Some(order_number);
        self.line_number = line_number.or(self.line_number);
        self.state = LineState::Ordered;
        tracing::info!(
            event_name = "line.ordered",
            line_id = %self.id,
            order_number = %order_number,
            "order line locked"
        );
        Ok(self.to_snapshot())
    }

    pub fn authorize_delete(&self) -> Result<(), LineError> {
        LineLifecycle::guard(&self.id, self.state, LineOperation::Delete)
    }

    pub fn to_snapshot(&self) -> OrderLine {
        OrderLine {
            id: self.id.clone(),
            plan_id: self.plan_id.clone(),
            period: self.calendar.period(),
            line_number: self.line_number,
            order_number: self.order_number,
            contract: self.contract.id.clone(),
            media: self.media.id.clone(),
            inputs: self.inputs,
            calendar: self.calendar.entries(),
            totals: self.totals,
            state: self.state,
        }
    }

    fn try_apply(&mut self, command: LineCommand) -> Result<(), LineError> {
        LineLifecycle::guard(&self.id, self.state, LineOperation::Edit)?;

        let mut inputs = self.inputs;
        let mut calendar = self.calendar.clone();
        match command {
            LineCommand::SetUnitPrice { value } => inputs.unit_price = value,
            LineCommand::SetDiscount { pct } => inputs.discount_pct = pct,
            LineCommand::SetSurcharge { pct } => inputs.surcharge_pct = pct,
            LineCommand::SetCalendarQuantity { day, quantity, autofill } => {
                let day = calendar.resolve_day(&day)?;
                calendar.auto_fill_forward(day, quantity, autofill)?;
            }
            LineCommand::ResetCalendar => {
                calendar.clear();
                self.commit(inputs, calendar, LineTotals::default());
                return Ok(());
            }
        }
        inputs.validate()?;

        let totals = self.price(&inputs, &calendar)?;
        self.commit(inputs, calendar, totals);
        Ok(())
    }

    fn price(
        &self,
        inputs: &PriceInputs,
        calendar: &CalendarAllocation,
    ) -> Result<LineTotals, LineError> {
        let multiplier = resolve_multiplier(&self.media, calendar.total_quantity()?);
        let input = PricingInput::for_line(inputs, &self.contract, multiplier)?;
        self.engine.compute_totals(&input)
    }

    fn commit(&mut self, inputs: PriceInputs, calendar: CalendarAllocation, totals: LineTotals) {
        self.inputs = inputs;
        self.calendar = calendar;
        self.totals = totals;
    }
}

impl<P> OrderLineOrchestrator<P>
where
    P: PricingEngine + Clone,
{
    /// Copies inputs, schedule and totals into a fresh draft line.
    pub fn duplicate(&self) -> Self {
        Self {
            id: LineId::generate(),
            plan_id: self.plan_id.clone(),
            line_number: None,
            order_number: None,
            state: LineState::Draft,
            contract: self.contract.clone(),
            media: self.media.clone(),
            inputs: self.inputs,
            calendar: self.calendar.clone(),
            totals: self.totals,
            engine: self.engine.clone(),
        }
    }
}

fn ensure_media_matches(contract: &Contract, media: &Media) -> Result<(), LineError> {
    if contract.media != media.id {
        return Err(LineError::Configuration(format!(
            "contract {} is for media {} but {} was supplied",
            contract.id, contract.media, media.id
        )));
    }
    Ok(())
}
