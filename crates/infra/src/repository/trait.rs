use std::sync::Arc;

use thiserror::Error;

use pcbforge_core::{
    InventoryItemId, PcbId, PcbProductionRecordId, ProductionRunId, ProjectId,
};
use pcbforge_inventory::InventoryItem;
use pcbforge_production::{
    BomLine, ContextChanges, PcbDefinition, PcbProductionRecord, Precondition, ProductionRun,
    Project,
};

/// Which BOM lines of a project to load.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BomLineFilter {
    All,
    /// Lines assigned to one board.
    Pcb(PcbId),
    /// Lines not assigned to any board.
    Unassociated,
}

impl BomLineFilter {
    pub fn matches(&self, line: &BomLine) -> bool {
        match self {
            BomLineFilter::All => true,
            BomLineFilter::Pcb(pcb_id) => line.is_assigned_to(*pcb_id),
            BomLineFilter::Unassociated => line.is_unassociated(),
        }
    }
}

/// Every mutation of one produce/reverse call.
///
/// Upserts are applied before deletions. Deleting a run also deletes its
/// board records. Nothing is applied if any precondition no longer holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub projects: Vec<Project>,
    pub pcbs: Vec<PcbDefinition>,
    pub bom_lines: Vec<BomLine>,
    pub inventory_items: Vec<InventoryItem>,
    pub runs: Vec<ProductionRun>,
    pub records: Vec<PcbProductionRecord>,
    pub deleted_runs: Vec<ProductionRunId>,
    pub deleted_records: Vec<PcbProductionRecordId>,
    pub preconditions: Vec<Precondition>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.pcbs.is_empty()
            && self.bom_lines.is_empty()
            && self.inventory_items.is_empty()
            && self.runs.is_empty()
            && self.records.is_empty()
            && self.deleted_runs.is_empty()
            && self.deleted_records.is_empty()
            && self.preconditions.is_empty()
    }
}

impl From<ContextChanges> for ChangeSet {
    fn from(changes: ContextChanges) -> Self {
        Self {
            projects: vec![changes.project],
            pcbs: changes.boards,
            bom_lines: changes.lines,
            inventory_items: changes.items,
            preconditions: changes.preconditions,
            ..Self::default()
        }
    }
}

/// Repository operation error.
///
/// Infrastructure failures, as opposed to domain errors. The service surfaces
/// them unchanged and never retries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The change set contradicts stored state: a record without its run, or
    /// a precondition that another writer invalidated.
    #[error("conflicting change: {0}")]
    Conflict(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Storage the production engine reads its working set from and writes its
/// results to.
///
/// Implementations must:
/// - apply a [`ChangeSet`] atomically (all or nothing)
/// - reject it with `Conflict` when a [`Precondition`] does not match storage
/// - cascade run deletion to the run's board records
/// - return `NotFound` for missing entities rather than empty values
pub trait ProductionRepository: Send + Sync {
    fn get_project(&self, id: ProjectId) -> Result<Project, RepositoryError>;

    fn get_bom_lines(
        &self,
        project_id: ProjectId,
        filter: BomLineFilter,
    ) -> Result<Vec<BomLine>, RepositoryError>;

    fn get_pcb_definition(&self, id: PcbId) -> Result<PcbDefinition, RepositoryError>;

    fn get_inventory_item(&self, id: InventoryItemId) -> Result<InventoryItem, RepositoryError>;

    fn get_production_run(&self, id: ProductionRunId) -> Result<ProductionRun, RepositoryError>;

    fn get_pcb_production_record(
        &self,
        id: PcbProductionRecordId,
    ) -> Result<PcbProductionRecord, RepositoryError>;

    /// Runs of a project, newest first.
    fn list_production_runs(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProductionRun>, RepositoryError>;

    fn list_pcb_production_records(
        &self,
        run_id: ProductionRunId,
    ) -> Result<Vec<PcbProductionRecord>, RepositoryError>;

    /// Apply every mutation of one operation as a unit.
    fn save_all(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

impl<S> ProductionRepository for Arc<S>
where
    S: ProductionRepository + ?Sized,
{
    fn get_project(&self, id: ProjectId) -> Result<Project, RepositoryError> {
        (**self).get_project(id)
    }

    fn get_bom_lines(
        &self,
        project_id: ProjectId,
        filter: BomLineFilter,
    ) -> Result<Vec<BomLine>, RepositoryError> {
        (**self).get_bom_lines(project_id, filter)
    }

    fn get_pcb_definition(&self, id: PcbId) -> Result<PcbDefinition, RepositoryError> {
        (**self).get_pcb_definition(id)
    }

    fn get_inventory_item(&self, id: InventoryItemId) -> Result<InventoryItem, RepositoryError> {
        (**self).get_inventory_item(id)
    }

    fn get_production_run(&self, id: ProductionRunId) -> Result<ProductionRun, RepositoryError> {
        (**self).get_production_run(id)
    }

    fn get_pcb_production_record(
        &self,
        id: PcbProductionRecordId,
    ) -> Result<PcbProductionRecord, RepositoryError> {
        (**self).get_pcb_production_record(id)
    }

    fn list_production_runs(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProductionRun>, RepositoryError> {
        (**self).list_production_runs(project_id)
    }

    fn list_pcb_production_records(
        &self,
        run_id: ProductionRunId,
    ) -> Result<Vec<PcbProductionRecord>, RepositoryError> {
        (**self).list_pcb_production_records(run_id)
    }

    fn save_all(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        (**self).save_all(changes)
    }
}
