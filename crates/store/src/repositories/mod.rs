use async_trait::async_trait;
use thiserror::Error;

use mediaplan_core::domain::catalog::{Contract, ContractRef, Media, MediaRef};
use mediaplan_core::domain::line::{LineId, OrderLine};
use mediaplan_core::domain::plan::PlanId;
use mediaplan_core::errors::{ApplicationError, LineError};

pub mod memory;

pub use memory::{InMemoryCatalog, InMemoryLineRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Line(#[from] LineError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Line(error) => Self::Line(error),
            RepositoryError::NotFound { entity: "contract" | "media", id } => {
                Self::Catalog(format!("catalog entry `{id}` was not found"))
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Read-only lookups for the contract and media snapshots a line prices against.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_contract(&self, id: &ContractRef) -> Result<Option<Contract>, RepositoryError>;
    async fn get_media(&self, id: &MediaRef) -> Result<Option<Media>, RepositoryError>;
}

#[async_trait]
pub trait LineRepository: Send + Sync {
    async fn find_by_id(&self, id: &LineId) -> Result<Option<OrderLine>, RepositoryError>;
    async fn list_for_plan(&self, plan_id: &PlanId) -> Result<Vec<OrderLine>, RepositoryError>;
    /// Inserts or replaces a line. Replacing an ordered line is refused.
    async fn save(&self, line: OrderLine) -> Result<(), RepositoryError>;
    /// Removes a draft line. Ordered lines are refused.
    async fn delete(&self, id: &LineId) -> Result<(), RepositoryError>;
    /// Assigns the next order number and a line number within the plan.
    async fn issue_order(&self, id: &LineId) -> Result<OrderLine, RepositoryError>;
}

/// Resolves a contract and the media it is for, both of which must exist.
pub async fn resolve_catalog_entries<C>(
    catalog: &C,
    contract_ref: &ContractRef,
) -> Result<(Contract, Media), RepositoryError>
where
    C: Catalog + ?Sized,
{
    let contract = catalog.get_contract(contract_ref).await?.ok_or_else(|| {
        RepositoryError::NotFound { entity: "contract", id: contract_ref.0.clone() }
    })?;
    let media = catalog
        .get_media(&contract.media)
        .await?
        .ok_or_else(|| RepositoryError::NotFound { entity: "media", id: contract.media.0.clone() })?;
    Ok((contract, media))
}
