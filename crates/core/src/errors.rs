use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::line::LineId;
use crate::lifecycle::LineOperation;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("day `{day}` is outside 1..={days_in_month} for {year}-{month:02}")]
    OutOfRangeDay { day: String, year: i32, month: u32, days_in_month: u32 },
    #[error("quantity {quantity} for day `{day}` must not be negative")]
    NegativeQuantity { day: String, quantity: Decimal },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{operation:?} is not permitted on ordered line {line_id}")]
    PolicyViolation { line_id: LineId, operation: LineOperation },
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
    #[error("amount overflowed while computing {stage}")]
    Overflow { stage: &'static str },
}

impl LineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OutOfRangeDay { .. } => "out_of_range_day",
            Self::NegativeQuantity { .. } => "negative_quantity",
            Self::Configuration(_) => "configuration",
            Self::PolicyViolation { .. } => "policy_violation",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Overflow { .. } => "overflow",
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field, reason: reason.into() }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Line(#[from] LineError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("catalog lookup failed: {0}")]
    Catalog(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "The change could not be applied. Check inputs and try again.",
            Self::Conflict { .. } => {
                "This line has already been ordered. Duplicate it to make changes."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Line(LineError::PolicyViolation { .. }) => Self::Conflict {
                message: "line is locked by an order number".to_owned(),
                correlation_id,
            },
            ApplicationError::Line(LineError::Configuration(message)) => {
                Self::Internal { message, correlation_id }
            }
            ApplicationError::Line(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Persistence(message) | ApplicationError::Catalog(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::line::LineId;
    use crate::errors::{ApplicationError, InterfaceError, LineError};
    use crate::lifecycle::LineOperation;

    #[test]
    fn calendar_errors_map_to_bad_request() {
        let interface = ApplicationError::from(LineError::NegativeQuantity {
            day: "03".to_owned(),
            quantity: Decimal::NEGATIVE_ONE,
        })
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref correlation_id, ref message }
                if correlation_id == "req-1" && message.contains("`03`")
        ));
    }

    #[test]
    fn policy_violation_maps_to_conflict_with_duplicate_hint() {
        let interface = ApplicationError::from(LineError::PolicyViolation {
            line_id: LineId("line-1".to_owned()),
            operation: LineOperation::Edit,
        })
        .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::Conflict { .. }));
        assert!(interface.user_message().contains("Duplicate"));
        assert_eq!(interface.correlation_id(), "req-2");
    }

    #[test]
    fn unknown_tax_mode_is_an_internal_error() {
        let interface =
            ApplicationError::from(LineError::Configuration("unknown tax mode `x`".to_owned()))
                .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::Internal { .. }));
        assert_eq!(interface.user_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface =
            ApplicationError::Persistence("store offline".to_owned()).into_interface("req-4");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
    }

    #[test]
    fn overflow_is_a_bad_request() {
        let interface =
            ApplicationError::from(LineError::Overflow { stage: "gross" }).into_interface("req-5");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest { ref message, .. } if message.contains("gross")
        ));
    }

    #[test]
    fn error_kinds_are_stable_snake_case() {
        let error = LineError::OutOfRangeDay {
            day: "29".to_owned(),
            year: 2023,
            month: 2,
            days_in_month: 28,
        };
        assert_eq!(error.kind(), "out_of_range_day");
        assert_eq!(error.to_string(), "day `29` is outside 1..=28 for 2023-02");
    }
}
