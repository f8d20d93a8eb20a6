//! Validate-then-apply orchestration of one production run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pcbforge_core::{DomainResult, PcbId, PcbProductionRecordId, ProductionRunId};

use crate::context::ProductionContext;
use crate::model::{PcbProductionRecord, ProductionRun};
use crate::serial::{DEFAULT_SERIAL_NUMBER, SerialNumberSequencer};
use crate::validator::{ProductionPlan, ProductionRequest, ProductionValidator, checked_sum};

/// One serial handed out during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedSerial {
    pub pcb_id: PcbId,
    pub serial: String,
    /// 1-based position within the board's sequence for this run.
    pub step: u64,
}

/// What a successful `produce` created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOutcome {
    pub run: ProductionRun,
    pub records: Vec<PcbProductionRecord>,
    pub serials: Vec<AssignedSerial>,
    pub plan: ProductionPlan,
}

/// Orchestrates a run end-to-end against a [`ProductionContext`].
///
/// ```text
/// 1. validate the whole request (stock + serials)   → fails with nothing mutated
/// 2. create the run with the validated total
/// 3. consume board lines, sequence serials, write one record per board
/// 4. consume unassociated lines (opt-in)
/// 5. touch the project
/// ```
///
/// Persisting the outcome and `ctx.changes()` as one unit is the caller's job.
#[derive(Debug, Clone)]
pub struct ProductionCommitter {
    default_serial: String,
}

impl Default for ProductionCommitter {
    fn default() -> Self {
        Self::new(DEFAULT_SERIAL_NUMBER)
    }
}

impl ProductionCommitter {
    pub fn new(default_serial: impl Into<String>) -> Self {
        Self {
            default_serial: default_serial.into(),
        }
    }

    pub fn produce(
        &self,
        ctx: &mut ProductionContext,
        request: &ProductionRequest,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ProductionOutcome> {
        // Phase 1: nothing below may fail for stock or serial reasons once this passes.
        let plan = ProductionValidator::validate(ctx, request)?;
        let sequencers = request
            .pcb_ids
            .iter()
            .map(|&pcb_id| {
                let board = ctx.board(pcb_id)?;
                SerialNumberSequencer::new(
                    pcb_id,
                    &board.last_serial_number,
                    board.initial_serial(&self.default_serial),
                )
            })
            .collect::<DomainResult<Vec<_>>>()?;
        let units = u64::try_from(request.units_requested).unwrap_or_default();
        for sequencer in &sequencers {
            sequencer.ensure_capacity(units)?;
        }

        // Phase 2: apply.
        let run = ProductionRun {
            id: ProductionRunId::new(),
            project_id: request.project_id,
            units_requested: request.units_requested,
            produce_unassociated: request.produce_unassociated,
            parts_consumed_total: plan.total,
            created_at: occurred_at,
        };

        let mut records = Vec::with_capacity(request.pcb_ids.len());
        let mut serials = Vec::new();
        let mut applied_total = 0;

        for (&pcb_id, sequencer) in request.pcb_ids.iter().zip(&sequencers) {
            let mut consumed = 0;
            for c in plan.consumptions_for(Some(pcb_id)) {
                ctx.apply_delta(c.line_id, -c.quantity)?;
                consumed = checked_sum(consumed, c.quantity)?;
            }
            applied_total = checked_sum(applied_total, consumed)?;

            let board = ctx.board(pcb_id)?;
            let (multiplier, cost) = (board.quantity_multiplier, board.cost);

            let mut first_serial = None;
            let last_serial = sequencer.sequence(units, |serial, step| {
                first_serial.get_or_insert_with(|| serial.to_string());
                serials.push(AssignedSerial {
                    pcb_id,
                    serial: serial.to_string(),
                    step,
                });
            })?;

            records.push(PcbProductionRecord {
                id: PcbProductionRecordId::new(),
                run_id: run.id,
                pcb_id,
                pcb_quantity_multiplier: multiplier,
                pcb_cost: cost,
                assigned_serial_number: first_serial.unwrap_or_else(|| last_serial.clone()),
                last_serial_number: last_serial.clone(),
                parts_consumed_for_this_board: consumed,
            });
            ctx.set_last_serial(pcb_id, last_serial)?;
        }

        if request.produce_unassociated {
            for c in plan.consumptions_for(None) {
                ctx.apply_delta(c.line_id, -c.quantity)?;
                applied_total = checked_sum(applied_total, c.quantity)?;
            }
        }

        debug_assert_eq!(applied_total, run.parts_consumed_total);
        ctx.touch_project(occurred_at);

        Ok(ProductionOutcome {
            run,
            records,
            serials,
            plan,
        })
    }
}
