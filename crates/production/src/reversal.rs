//! Returning what a production run (or one board of it) consumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pcbforge_core::{BomLineId, DomainError, DomainResult, PcbProductionRecordId, ProductionRunId};

use crate::context::ProductionContext;
use crate::model::{PcbProductionRecord, ProductionRun};
use crate::validator::{checked_difference, checked_sum, required_quantity};

/// Quantity handed back to one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedQuantity {
    pub line_id: BomLineId,
    pub quantity: i64,
}

/// Result of reversing a single board record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardReversal {
    pub record_id: PcbProductionRecordId,
    pub returned: Vec<ReturnedQuantity>,
    pub total_returned: i64,
}

/// Result of reversing a whole run. The run and all listed records are to be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReversal {
    pub run_id: ProductionRunId,
    pub boards: Vec<BoardReversal>,
    pub unassociated_returned: Vec<ReturnedQuantity>,
    pub total_returned: i64,
}

impl RunReversal {
    pub fn deleted_records(&self) -> impl Iterator<Item = PcbProductionRecordId> + '_ {
        self.boards.iter().map(|b| b.record_id)
    }
}

/// Undoes consumption recorded by runs and board records.
///
/// Quantities are recomputed from the current BOM lines and the multiplier
/// snapshot on each record, so a round trip is exact as long as the lines were
/// not edited in between.
#[derive(Debug, Default)]
pub struct ReversalEngine;

impl ReversalEngine {
    /// Reverse every board record of `run` and, if the run opted in, its
    /// unassociated consumption.
    pub fn reverse_run(
        ctx: &mut ProductionContext,
        run: &mut ProductionRun,
        records: &[PcbProductionRecord],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<RunReversal> {
        Self::check_run(ctx, run)?;
        for record in records {
            Self::check_record(run, record)?;
        }

        let mut boards = Vec::with_capacity(records.len());
        let mut total_returned = 0;
        for record in records {
            let board = Self::return_board(ctx, run, record)?;
            total_returned = checked_sum(total_returned, board.total_returned)?;
            boards.push(board);
        }

        let mut unassociated_returned = Vec::new();
        if run.produce_unassociated {
            let pending = ctx
                .unassociated_lines()
                .map(|line| {
                    required_quantity(line, run.units_requested, 1).map(|quantity| {
                        ReturnedQuantity {
                            line_id: line.id,
                            quantity,
                        }
                    })
                })
                .collect::<DomainResult<Vec<_>>>()?;

            for r in pending {
                ctx.apply_delta(r.line_id, r.quantity)?;
                run.parts_consumed_total = checked_difference(run.parts_consumed_total, r.quantity)?;
                total_returned = checked_sum(total_returned, r.quantity)?;
                unassociated_returned.push(r);
            }
        }

        ctx.touch_project(occurred_at);

        Ok(RunReversal {
            run_id: run.id,
            boards,
            unassociated_returned,
            total_returned,
        })
    }

    /// Reverse one board record, leaving the run and its other records in place.
    ///
    /// Decrements `run.parts_consumed_total` by the returned amount.
    pub fn reverse_board_record(
        ctx: &mut ProductionContext,
        run: &mut ProductionRun,
        record: &PcbProductionRecord,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<BoardReversal> {
        Self::check_run(ctx, run)?;
        Self::check_record(run, record)?;

        let reversal = Self::return_board(ctx, run, record)?;
        ctx.touch_project(occurred_at);
        Ok(reversal)
    }

    fn return_board(
        ctx: &mut ProductionContext,
        run: &mut ProductionRun,
        record: &PcbProductionRecord,
    ) -> DomainResult<BoardReversal> {
        let multiplier = record.effective_multiplier();
        let returned = ctx
            .lines_for(record.pcb_id)
            .map(|line| {
                required_quantity(line, run.units_requested, multiplier).map(|quantity| {
                    ReturnedQuantity {
                        line_id: line.id,
                        quantity,
                    }
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let mut total_returned = 0;
        for r in &returned {
            ctx.apply_delta(r.line_id, r.quantity)?;
            run.parts_consumed_total = checked_difference(run.parts_consumed_total, r.quantity)?;
            total_returned = checked_sum(total_returned, r.quantity)?;
        }

        Ok(BoardReversal {
            record_id: record.id,
            returned,
            total_returned,
        })
    }

    fn check_run(ctx: &ProductionContext, run: &ProductionRun) -> DomainResult<()> {
        if run.project_id != ctx.project().id {
            return Err(DomainError::invariant(format!(
                "run {} belongs to project {}, not {}",
                run.id,
                run.project_id,
                ctx.project().id
            )));
        }
        Ok(())
    }

    fn check_record(run: &ProductionRun, record: &PcbProductionRecord) -> DomainResult<()> {
        if record.run_id != run.id {
            return Err(DomainError::invariant(format!(
                "record {} belongs to run {}, not {}",
                record.id, record.run_id, run.id
            )));
        }
        Ok(())
    }
}
