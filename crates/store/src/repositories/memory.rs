use std::collections::HashMap;

use tokio::sync::RwLock;

use mediaplan_core::domain::catalog::{Contract, ContractRef, Media, MediaRef};
use mediaplan_core::domain::line::{LineId, LineNumber, LineState, OrderLine, OrderNumber};
use mediaplan_core::domain::plan::PlanId;
use mediaplan_core::lifecycle::{LineLifecycle, LineOperation};

use super::{Catalog, LineRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCatalog {
    contracts: RwLock<HashMap<String, Contract>>,
    media: RwLock<HashMap<String, Media>>,
}

impl InMemoryCatalog {
    pub async fn insert_contract(&self, contract: Contract) {
        let mut contracts = self.contracts.write().await;
        contracts.insert(contract.id.0.clone(), contract);
    }

    pub async fn insert_media(&self, media: Media) {
        let mut entries = self.media.write().await;
        entries.insert(media.id.0.clone(), media);
    }
}

#[async_trait::async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_contract(&self, id: &ContractRef) -> Result<Option<Contract>, RepositoryError> {
        let contracts = self.contracts.read().await;
        Ok(contracts.get(&id.0).cloned())
    }

    async fn get_media(&self, id: &MediaRef) -> Result<Option<Media>, RepositoryError> {
        let entries = self.media.read().await;
        Ok(entries.get(&id.0).cloned())
    }
}

#[derive(Default)]
struct LineTable {
    lines: HashMap<String, OrderLine>,
    last_order_number: u64,
}

pub struct InMemoryLineRepository {
    table: RwLock<LineTable>,
}

impl Default for InMemoryLineRepository {
    fn default() -> Self {
        Self::starting_at(OrderNumber(0))
    }
}

impl InMemoryLineRepository {
    /// The first issued order number is the one after `last_issued`.
    pub fn starting_at(last_issued: OrderNumber) -> Self {
        Self {
            table: RwLock::new(LineTable {
                lines: HashMap::new(),
                last_order_number: last_issued.0,
            }),
        }
    }
}

#[async_trait::async_trait]
impl LineRepository for InMemoryLineRepository {
    async fn find_by_id(&self, id: &LineId) -> Result<Option<OrderLine>, RepositoryError> {
        let table = self.table.read().await;
        Ok(table.lines.get(&id.0).cloned())
    }

    async fn list_for_plan(&self, plan_id: &PlanId) -> Result<Vec<OrderLine>, RepositoryError> {
        let table = self.table.read().await;
        let mut lines: Vec<OrderLine> =
            table.lines.values().filter(|line| &line.plan_id == plan_id).cloned().collect();
        lines.sort_by(|a, b| (a.line_number, &a.id.0).cmp(&(b.line_number, &b.id.0)));
        Ok(lines)
    }

    async fn save(&self, line: OrderLine) -> Result<(), RepositoryError> {
        let mut table = self.table.write().await;
        if let Some(existing) = table.lines.get(&line.id.0) {
            if existing.is_locked() && existing != &line {
                LineLifecycle::guard(&existing.id, LineState::Ordered, LineOperation::Edit)?;
            }
        }
        tracing::debug!(
            event_name = "store.line_saved",
            line_id = %line.id,
            plan_id = %line.plan_id,
            state = line.state.as_str(),
            "order line saved"
        );
        table.lines.insert(line.id.0.clone(), line);
        Ok(())
    }

    async fn delete(&self, id: &LineId) -> Result<(), RepositoryError> {
        let mut table = self.table.write().await;
        let line = table
            .lines
            .get(&id.0)
            .ok_or_else(|| RepositoryError::NotFound { entity: "line", id: id.0.clone() })?;
        let state = if line.is_locked() { LineState::Ordered } else { LineState::Draft };
        LineLifecycle::guard(id, state, LineOperation::Delete)?;
        table.lines.remove(&id.0);
        tracing::debug!(event_name = "store.line_deleted", line_id = %id, "order line deleted");
        Ok(())
    }

    async fn issue_order(&self, id: &LineId) -> Result<OrderLine, RepositoryError> {
        let mut table = self.table.write().await;
        let mut ordered = table
            .lines
            .get(&id.0)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound { entity: "line", id: id.0.clone() })?;
        let state = if ordered.is_locked() { LineState::Ordered } else { LineState::Draft };
        LineLifecycle::guard(id, state, LineOperation::AssignOrder)?;

        let numbered = table
            .lines
            .values()
            .filter(|other| other.plan_id == ordered.plan_id)
            .filter_map(|other| other.line_number)
            .max()
            .map_or(0, |LineNumber(number)| number);
        table.last_order_number += 1;
        let order_number = OrderNumber(table.last_order_number);

        ordered.order_number = Some(order_number);
        ordered.line_number = Some(LineNumber(numbered + 1));
        ordered.state = LineState::Ordered;
        table.lines.insert(id.0.clone(), ordered.clone());

        tracing::info!(
            event_name = "store.order_issued",
            line_id = %id,
            order_number = %order_number,
            "order number issued"
        );
        Ok(ordered)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use mediaplan_core::domain::catalog::{Contract, ContractRef, Media, MediaRef, TaxMode};
    use mediaplan_core::domain::line::{LineNumber, LineState, OrderNumber};
    use mediaplan_core::domain::plan::{CampaignRef, Plan, PlanId, PlanPeriod};
    use mediaplan_core::errors::{ApplicationError, LineError};
    use mediaplan_core::orchestrator::OrderLineOrchestrator;
    use mediaplan_core::pricing::DeterministicPricingEngine;

    use crate::repositories::{
        resolve_catalog_entries, Catalog, InMemoryCatalog, InMemoryLineRepository,
        LineRepository, RepositoryError,
    };

    fn plan() -> Plan {
        Plan {
            id: PlanId("plan-1".to_owned()),
            period: PlanPeriod::new(2024, 2).expect("period"),
            campaign: CampaignRef("winter".to_owned()),
        }
    }

    fn contract() -> Contract {
        Contract::new(ContractRef("C-1".to_owned()), TaxMode::Net, MediaRef("tv".to_owned()))
    }

    fn media() -> Media {
        Media {
            id: MediaRef("tv".to_owned()),
            name: "Television".to_owned(),
            quantity_multiplies_price: true,
        }
    }

    async fn catalog() -> InMemoryCatalog {
        let catalog = InMemoryCatalog::default();
        catalog.insert_contract(contract()).await;
        catalog.insert_media(media()).await;
        catalog
    }

    fn draft_line(price: i64) -> OrderLineOrchestrator {
        let mut line = OrderLineOrchestrator::new(
            &plan(),
            contract(),
            media(),
            DeterministicPricingEngine::default(),
        )
        .expect("line");
        line.set_unit_price(Decimal::from(price)).expect("price");
        line
    }

    #[tokio::test]
    async fn catalog_resolves_contract_with_its_media() {
        let catalog = catalog().await;
        let contract_ref = ContractRef("C-1".to_owned());
        let (contract, media) =
            resolve_catalog_entries(&catalog, &contract_ref).await.expect("found");

        assert_eq!(contract.tax_mode(), Ok(TaxMode::Net));
        assert!(media.quantity_multiplies_price);
    }

    #[tokio::test]
    async fn missing_catalog_entries_are_reported() {
        let catalog = InMemoryCatalog::default();
        catalog.insert_contract(contract()).await;

        let unknown = catalog.get_contract(&ContractRef("C-404".to_owned())).await.expect("read");
        assert!(unknown.is_none());
        let error = resolve_catalog_entries(&catalog, &ContractRef("C-1".to_owned()))
            .await
            .expect_err("media missing");
        assert!(matches!(error, RepositoryError::NotFound { entity: "media", .. }));
        assert!(matches!(ApplicationError::from(error), ApplicationError::Catalog(_)));
    }

    #[tokio::test]
    async fn issuing_an_order_locks_the_line_and_numbers_it() {
        let repository = InMemoryLineRepository::starting_at(OrderNumber(4999));
        let first = draft_line(100).to_snapshot();
        let second = draft_line(200).to_snapshot();
        repository.save(first.clone()).await.expect("save first");
        repository.save(second.clone()).await.expect("save second");

        let ordered = repository.issue_order(&first.id).await.expect("issue first");
        assert_eq!(ordered.order_number, Some(OrderNumber(5000)));
        assert_eq!(ordered.line_number, Some(LineNumber(1)));
        assert_eq!(ordered.state, LineState::Ordered);

        let ordered = repository.issue_order(&second.id).await.expect("issue second");
        assert_eq!(ordered.order_number, Some(OrderNumber(5001)));
        assert_eq!(ordered.line_number, Some(LineNumber(2)));

        let error = repository.issue_order(&first.id).await.expect_err("already ordered");
        assert!(matches!(error, RepositoryError::Line(LineError::PolicyViolation { .. })));
    }

    #[tokio::test]
    async fn ordered_lines_cannot_be_deleted_or_overwritten() {
        let repository = InMemoryLineRepository::default();
        let line = draft_line(100).to_snapshot();
        repository.save(line.clone()).await.expect("save");
        let ordered = repository.issue_order(&line.id).await.expect("issue");

        let error = repository.delete(&line.id).await.expect_err("locked");
        assert!(matches!(error, RepositoryError::Line(LineError::PolicyViolation { .. })));

        let error = repository.save(line.clone()).await.expect_err("overwrite");
        assert!(matches!(error, RepositoryError::Line(LineError::PolicyViolation { .. })));

        repository.save(ordered.clone()).await.expect("re-saving identical snapshot is harmless");
        assert_eq!(repository.find_by_id(&line.id).await.expect("read"), Some(ordered));
    }

    #[tokio::test]
    async fn draft_lines_can_be_deleted() {
        let repository = InMemoryLineRepository::default();
        let line = draft_line(100).to_snapshot();
        repository.save(line.clone()).await.expect("save");

        repository.delete(&line.id).await.expect("delete draft");
        assert!(repository.find_by_id(&line.id).await.expect("read").is_none());

        let error = repository.delete(&line.id).await.expect_err("gone");
        assert!(matches!(error, RepositoryError::NotFound { entity: "line", .. }));
    }

    #[tokio::test]
    async fn issued_snapshot_rehydrates_as_ordered_line() {
        let repository = InMemoryLineRepository::default();
        let line = draft_line(100).to_snapshot();
        repository.save(line.clone()).await.expect("save");
        let ordered = repository.issue_order(&line.id).await.expect("issue");

        let mut restored = OrderLineOrchestrator::from_snapshot(
            ordered,
            contract(),
            media(),
            DeterministicPricingEngine::default(),
        )
        .expect("restore");

        assert_eq!(restored.state(), LineState::Ordered);
        assert!(restored.set_unit_price(Decimal::from(1)).is_err());
    }

    #[tokio::test]
    async fn plan_listing_orders_numbered_lines_after_drafts() {
        let repository = InMemoryLineRepository::default();
        let ordered = draft_line(100).to_snapshot();
        let draft = draft_line(200).to_snapshot();
        repository.save(ordered.clone()).await.expect("save");
        repository.save(draft.clone()).await.expect("save");
        repository.issue_order(&ordered.id).await.expect("issue");

        let lines = repository.list_for_plan(&PlanId("plan-1".to_owned())).await.expect("list");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].id, draft.id);
        assert_eq!(lines[1].id, ordered.id);
        let other = repository.list_for_plan(&PlanId("other".to_owned())).await.expect("list");
        assert!(other.is_empty());
    }
}
