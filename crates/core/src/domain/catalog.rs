use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LineError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRef(pub String);

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef(pub String);

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of the net/gross conversion configured on a contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// Entered prices are net; gross is derived.
    Net,
    /// Entered prices are gross; net is derived.
    Gross,
}

impl TaxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Net => "net",
            Self::Gross => "gross",
        }
    }
}

impl FromStr for TaxMode {
    type Err = LineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "net" | "neto" => Ok(Self::Net),
            "gross" | "bruto" => Ok(Self::Gross),
            other => Err(LineError::Configuration(format!(
                "unknown tax generation mode `{other}` (expected net|gross)"
            ))),
        }
    }
}

/// Read-only contract snapshot resolved by the catalog before editing starts.
///
/// The tax generation mode is kept as the raw stored value so that a
/// corrupted record surfaces as a configuration error at pricing time
/// rather than failing the lookup itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractRef,
    pub tax_generation_mode: Option<String>,
    pub media: MediaRef,
}

impl Contract {
    pub fn new(id: ContractRef, tax_mode: TaxMode, media: MediaRef) -> Self {
        Self { id, tax_generation_mode: Some(tax_mode.as_str().to_owned()), media }
    }

    pub fn tax_mode(&self) -> Result<TaxMode, LineError> {
        match self.tax_generation_mode.as_deref() {
            Some(raw) => raw.parse(),
            None => Err(LineError::Configuration(format!(
                "contract {} has no tax generation mode",
                self.id
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: MediaRef,
    pub name: String,
    /// Unit price is a per-unit rate scaled by the scheduled quantity.
    #[serde(default)]
    pub quantity_multiplies_price: bool,
}
