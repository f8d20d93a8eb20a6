//! Application service around the production engine.
//!
//! ```text
//! request
//!   ↓
//! 1. take the project lock
//!   ↓
//! 2. load the working set (project, boards, lines, tracked items)
//!   ↓
//! 3. run the engine (validate, then apply) on the in-memory context
//!   ↓
//! 4. save every mutation as one ChangeSet
//!   ↓
//! 5. publish a ProductionEvent
//! ```
//!
//! Nothing is published unless the save succeeded. A failed save leaves storage
//! untouched and the in-memory context is dropped.

use std::collections::BTreeSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use pcbforge_core::{
    DomainError, InventoryItemId, PcbId, PcbProductionRecordId, ProductionRunId, ProjectId,
    StockShortfall,
};
use pcbforge_events::{Event, EventBus};
use pcbforge_production::{
    BoardRecordReversed, BoardReversal, BomLine, PcbDefinition, PcbProductionRecord,
    ProductionCommitter, ProductionContext, ProductionEvent, ProductionOutcome, ProductionPlan,
    ProductionRequest, ProductionRun, ProductionValidator, Project, ReversalEngine, RunProduced,
    RunReversal, RunReversed,
};

use crate::config::ServiceConfig;
use crate::locks::{LockError, ProjectLocks};
use crate::repository::{BomLineFilter, ChangeSet, ProductionRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Every short line found during validation.
    #[error("insufficient stock on {} bom line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    #[error("cannot sequence serial number {serial:?} of board {pcb_id}")]
    SerialNumberParse { pcb_id: PcbId, serial: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Shared stock or a shared board changed between load and save; nothing
    /// was written and the operation can be retried.
    #[error("conflict: {0}")]
    Conflict(String),

    /// `save_all` failed; nothing was written.
    #[error("persistence failed: {0}")]
    Persistence(RepositoryError),

    #[error(transparent)]
    Lock(#[from] LockError),

    /// The change set was saved but publication failed. `run_id` identifies
    /// the committed (or reversed) run; retrying the operation would repeat it.
    #[error("publish failed after saving run {run_id}: {message}")]
    Publish {
        run_id: ProductionRunId,
        message: String,
    },
}

impl ServiceError {
    pub fn shortfalls(&self) -> &[StockShortfall] {
        match self {
            ServiceError::InsufficientStock(s) => s,
            _ => &[],
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            DomainError::InsufficientStock(shortfalls) => ServiceError::InsufficientStock(shortfalls),
            DomainError::SerialNumberParse { pcb_id, serial } => {
                ServiceError::SerialNumberParse { pcb_id, serial }
            }
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            other => ServiceError::Persistence(other),
        }
    }
}

/// One run together with its board records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHistory {
    pub run: ProductionRun,
    pub records: Vec<PcbProductionRecord>,
}

/// Produces and reverses runs against a [`ProductionRepository`].
///
/// - `R`: storage for projects, BOMs, stock and history
/// - `B`: bus the committed [`ProductionEvent`]s go to
///
/// Operations on the same project are serialized; the repository is only asked
/// to make each `save_all` atomic.
#[derive(Debug)]
pub struct ProductionService<R, B> {
    repo: R,
    bus: B,
    locks: ProjectLocks,
    committer: ProductionCommitter,
    config: ServiceConfig,
}

impl<R, B> ProductionService<R, B> {
    pub fn new(repo: R, bus: B) -> Self {
        Self::with_config(repo, bus, ServiceConfig::default())
    }

    pub fn with_config(repo: R, bus: B, config: ServiceConfig) -> Self {
        Self {
            repo,
            bus,
            locks: ProjectLocks::new(),
            committer: ProductionCommitter::new(config.default_serial_number.clone()),
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn into_parts(self) -> (R, B) {
        (self.repo, self.bus)
    }
}

impl<R, B> ProductionService<R, B>
where
    R: ProductionRepository,
    B: EventBus<ProductionEvent>,
{
    /// Validate a request without changing anything.
    #[instrument(skip_all, fields(project_id = %request.project_id, units = request.units_requested))]
    pub fn check(&self, request: &ProductionRequest) -> Result<ProductionPlan, ServiceError> {
        let ctx = self.load_for_request(request)?;
        ProductionValidator::validate(&ctx, request).map_err(Self::rejected)
    }

    /// Validate and commit one production run.
    #[instrument(skip_all, fields(project_id = %request.project_id, units = request.units_requested))]
    pub fn produce(&self, request: &ProductionRequest) -> Result<ProductionOutcome, ServiceError> {
        self.locks.with_project(request.project_id, || -> Result<_, ServiceError> {
            let mut ctx = self.load_for_request(request)?;
            let now = Utc::now();
            let outcome = self
                .committer
                .produce(&mut ctx, request, now)
                .map_err(Self::rejected)?;

            let mut changes = ChangeSet::from(ctx.changes());
            changes.runs.push(outcome.run.clone());
            changes.records.extend(outcome.records.iter().cloned());
            self.save(changes)?;

            info!(
                run_id = %outcome.run.id,
                boards = outcome.records.len(),
                parts_consumed = outcome.run.parts_consumed_total,
                "production run committed"
            );

            self.publish(ProductionEvent::RunProduced(RunProduced {
                run_id: outcome.run.id,
                project_id: outcome.run.project_id,
                units_requested: outcome.run.units_requested,
                boards: outcome.records.iter().map(|r| r.pcb_id).collect(),
                parts_consumed_total: outcome.run.parts_consumed_total,
                occurred_at: now,
            }))?;

            Ok(outcome)
        })?
    }

    /// Return everything a run consumed, then delete the run and its records.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub fn reverse_run(&self, run_id: ProductionRunId) -> Result<RunReversal, ServiceError> {
        let project_id = self.repo.get_production_run(run_id)?.project_id;

        self.locks.with_project(project_id, || -> Result<_, ServiceError> {
            // Re-read under the lock: a concurrent reversal may have removed it.
            let mut run = self.repo.get_production_run(run_id)?;
            let records = self.repo.list_pcb_production_records(run_id)?;

            let pcb_ids: Vec<PcbId> = records.iter().map(|r| r.pcb_id).collect();
            let project = self.repo.get_project(project_id)?;
            let lines = self.load_lines(project_id, &pcb_ids, run.produce_unassociated)?;
            let mut ctx = self.load_context(project, Vec::new(), lines)?;

            let now = Utc::now();
            let reversal = ReversalEngine::reverse_run(&mut ctx, &mut run, &records, now)?;

            let mut changes = ChangeSet::from(ctx.changes());
            changes.deleted_runs.push(run.id);
            self.save(changes)?;

            info!(
                records = reversal.boards.len(),
                parts_returned = reversal.total_returned,
                "production run reversed"
            );

            self.publish(ProductionEvent::RunReversed(RunReversed {
                run_id: run.id,
                project_id,
                parts_returned: reversal.total_returned,
                occurred_at: now,
            }))?;

            Ok(reversal)
        })?
    }

    /// Return what one board record consumed and delete that record.
    ///
    /// The parent run stays, with its `parts_consumed_total` reduced.
    #[instrument(skip_all, fields(record_id = %record_id))]
    pub fn reverse_board_record(
        &self,
        record_id: PcbProductionRecordId,
    ) -> Result<BoardReversal, ServiceError> {
        let run_id = self.repo.get_pcb_production_record(record_id)?.run_id;
        let project_id = self.repo.get_production_run(run_id)?.project_id;

        self.locks.with_project(project_id, || -> Result<_, ServiceError> {
            let record = self.repo.get_pcb_production_record(record_id)?;
            let mut run = self.repo.get_production_run(record.run_id)?;

            let project = self.repo.get_project(project_id)?;
            let lines = self.load_lines(project_id, &[record.pcb_id], false)?;
            let mut ctx = self.load_context(project, Vec::new(), lines)?;

            let now = Utc::now();
            let reversal = ReversalEngine::reverse_board_record(&mut ctx, &mut run, &record, now)?;

            let mut changes = ChangeSet::from(ctx.changes());
            changes.runs.push(run.clone());
            changes.deleted_records.push(record.id);
            self.save(changes)?;

            info!(
                run_id = %run.id,
                pcb_id = %record.pcb_id,
                parts_returned = reversal.total_returned,
                "board record reversed"
            );

            self.publish(ProductionEvent::BoardRecordReversed(BoardRecordReversed {
                run_id: run.id,
                record_id: record.id,
                project_id,
                pcb_id: record.pcb_id,
                parts_returned: reversal.total_returned,
                occurred_at: now,
            }))?;

            Ok(reversal)
        })?
    }

    /// Runs of a project, newest first, each with its board records.
    #[instrument(skip_all, fields(project_id = %project_id))]
    pub fn history(&self, project_id: ProjectId) -> Result<Vec<RunHistory>, ServiceError> {
        self.repo.get_project(project_id)?;
        self.repo
            .list_production_runs(project_id)?
            .into_iter()
            .map(|run| -> Result<RunHistory, ServiceError> {
                let records = self.repo.list_pcb_production_records(run.id)?;
                Ok(RunHistory { run, records })
            })
            .collect()
    }

    fn load_for_request(&self, request: &ProductionRequest) -> Result<ProductionContext, ServiceError> {
        let project = self.repo.get_project(request.project_id)?;
        let boards = request
            .pcb_ids
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|&pcb_id| self.repo.get_pcb_definition(pcb_id))
            .collect::<Result<Vec<PcbDefinition>, _>>()?;
        let lines = self.load_lines(
            request.project_id,
            &request.pcb_ids,
            request.produce_unassociated,
        )?;
        self.load_context(project, boards, lines)
    }

    fn load_lines(
        &self,
        project_id: ProjectId,
        pcb_ids: &[PcbId],
        include_unassociated: bool,
    ) -> Result<Vec<BomLine>, ServiceError> {
        let mut lines = Vec::new();
        for &pcb_id in pcb_ids.iter().collect::<BTreeSet<_>>() {
            lines.extend(self.repo.get_bom_lines(project_id, BomLineFilter::Pcb(pcb_id))?);
        }
        if include_unassociated {
            lines.extend(self.repo.get_bom_lines(project_id, BomLineFilter::Unassociated)?);
        }
        Ok(lines)
    }

    fn load_context(
        &self,
        project: Project,
        boards: Vec<PcbDefinition>,
        lines: Vec<BomLine>,
    ) -> Result<ProductionContext, ServiceError> {
        let items = lines
            .iter()
            .filter_map(BomLine::tracked_item)
            .collect::<BTreeSet<InventoryItemId>>()
            .into_iter()
            .map(|item_id| self.repo.get_inventory_item(item_id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProductionContext::new(project, boards, lines, items)?)
    }

    fn save(&self, changes: ChangeSet) -> Result<(), ServiceError> {
        self.repo.save_all(changes).map_err(|e| match e {
            RepositoryError::Conflict(msg) => {
                warn!(reason = %msg, "stale working set, nothing saved");
                ServiceError::Conflict(msg)
            }
            other => {
                error!(error = %other, "saving production changes failed");
                ServiceError::Persistence(other)
            }
        })
    }

    fn publish(&self, event: ProductionEvent) -> Result<(), ServiceError> {
        if !self.config.publish_events {
            return Ok(());
        }
        let run_id = event.run_id();
        debug!(event_type = event.event_type(), run_id = %run_id, "publishing event");
        self.bus.publish(event).map_err(|e| {
            error!(run_id = %run_id, error = ?e, "publishing after save failed");
            ServiceError::Publish {
                run_id,
                message: format!("{e:?}"),
            }
        })
    }

    fn rejected(err: DomainError) -> ServiceError {
        match &err {
            DomainError::InsufficientStock(shortfalls) => {
                for s in shortfalls {
                    warn!(
                        line_id = %s.line_id,
                        available = s.available,
                        required = s.required,
                        "insufficient stock"
                    );
                }
            }
            DomainError::SerialNumberParse { pcb_id, serial } => {
                warn!(pcb_id = %pcb_id, serial = %serial, "unparsable serial number");
            }
            _ => {}
        }
        ServiceError::from(err)
    }
}
