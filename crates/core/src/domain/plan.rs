use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calendar::days_in_month;
use crate::errors::LineError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub String);

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CampaignRef(pub String);

/// Calendar month a plan buys media for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PeriodParts")]
pub struct PlanPeriod {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct PeriodParts {
    year: i32,
    month: u32,
}

impl TryFrom<PeriodParts> for PlanPeriod {
    type Error = LineError;

    fn try_from(parts: PeriodParts) -> Result<Self, Self::Error> {
        Self::new(parts.year, parts.month)
    }
}

impl PlanPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, LineError> {
        if !(1..=12).contains(&month) {
            return Err(LineError::invalid("month", format!("{month} is not in 1..=12")));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn days_in_month(&self) -> u32 {
        days_in_month(self.year, self.month)
    }
}

impl fmt::Display for PlanPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub period: PlanPeriod,
    pub campaign: CampaignRef,
}

#[cfg(test)]
mod tests {
    use super::PlanPeriod;

    #[test]
    fn rejects_month_outside_calendar() {
        assert!(PlanPeriod::new(2024, 0).is_err());
        assert!(PlanPeriod::new(2024, 13).is_err());
    }

    #[test]
    fn deserializing_validates_the_month() {
        let parsed: Result<PlanPeriod, _> = serde_json::from_str(r#"{"year":2024,"month":14}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn period_reports_its_month_length() {
        let period = PlanPeriod::new(2024, 2).expect("valid period");
        assert_eq!(period.days_in_month(), 29);
        assert_eq!(period.to_string(), "2024-02");
    }
}
