pub mod audit;
pub mod calendar;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod orchestrator;
pub mod pricing;

pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink};
pub use calendar::{days_in_month, is_leap_year, CalendarAllocation, CalendarDay};
pub use domain::catalog::{Contract, ContractRef, Media, MediaRef, TaxMode};
pub use domain::line::{
    CalendarEntry, LineId, LineNumber, LineState, LineTotals, OrderLine, OrderNumber, PriceInputs,
};
pub use domain::plan::{CampaignRef, Plan, PlanId, PlanPeriod};
pub use errors::{ApplicationError, InterfaceError, LineError};
pub use lifecycle::{LineLifecycle, LineOperation};
pub use orchestrator::{LineCommand, OrderLineOrchestrator};
pub use pricing::{
    compute_totals, resolve_multiplier, DeterministicPricingEngine, PricingEngine, PricingInput,
    PricingRates, PricingResult,
};
