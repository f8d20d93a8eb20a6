//! Pure feasibility check for a production request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pcbforge_core::{BomLineId, DomainError, DomainResult, PcbId, ProjectId, StockShortfall};

use crate::context::ProductionContext;
use crate::ledger::StockSource;
use crate::model::BomLine;

/// "Produce `units_requested` units of these boards of this project."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRequest {
    pub project_id: ProjectId,
    pub pcb_ids: Vec<PcbId>,
    pub units_requested: i64,
    /// Also consume lines not assigned to any board.
    pub produce_unassociated: bool,
}

/// Quantity one line will give up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedConsumption {
    pub line_id: BomLineId,
    pub pcb_id: Option<PcbId>,
    pub quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPlan {
    pub pcb_id: PcbId,
    pub consumed: i64,
}

/// Everything a validated request would consume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionPlan {
    pub consumptions: Vec<PlannedConsumption>,
    pub boards: Vec<BoardPlan>,
    pub unassociated_total: i64,
    pub total: i64,
}

impl ProductionPlan {
    pub fn board_total(&self, pcb_id: PcbId) -> i64 {
        self.boards
            .iter()
            .find(|b| b.pcb_id == pcb_id)
            .map_or(0, |b| b.consumed)
    }

    /// Consumptions for one board, or for unassociated lines when `pcb_id` is `None`.
    pub fn consumptions_for(&self, pcb_id: Option<PcbId>) -> impl Iterator<Item = &PlannedConsumption> {
        self.consumptions.iter().filter(move |c| c.pcb_id == pcb_id)
    }
}

/// `quantity_per_unit * units * multiplier`, rejecting negative inputs and overflow.
pub fn required_quantity(line: &BomLine, units: i64, multiplier: i64) -> DomainResult<i64> {
    if line.quantity_per_unit < 0 {
        return Err(DomainError::validation(format!(
            "bom line {} has negative quantity per unit ({})",
            line.id, line.quantity_per_unit
        )));
    }
    line.quantity_per_unit
        .checked_mul(units)
        .and_then(|q| q.checked_mul(multiplier))
        .ok_or_else(|| DomainError::validation(format!("quantity overflow on bom line {}", line.id)))
}

pub(crate) fn checked_sum(a: i64, b: i64) -> DomainResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::validation("consumed quantity total overflows"))
}

pub(crate) fn checked_difference(a: i64, b: i64) -> DomainResult<i64> {
    a.checked_sub(b)
        .ok_or_else(|| DomainError::validation("consumed quantity total underflows"))
}

/// Computes required versus available quantities without mutating anything.
#[derive(Debug, Default)]
pub struct ProductionValidator;

impl ProductionValidator {
    /// Check every affected line and return the consumption plan.
    ///
    /// All short lines are collected in one pass and reported together as
    /// [`DomainError::InsufficientStock`]. Lines drawing on the same inventory
    /// item are checked against their combined demand.
    pub fn validate(
        ctx: &ProductionContext,
        request: &ProductionRequest,
    ) -> DomainResult<ProductionPlan> {
        Self::check_request(ctx, request)?;

        let mut demand: BTreeMap<StockSource, i64> = BTreeMap::new();
        let mut shortfalls = Vec::new();
        let mut plan = ProductionPlan::default();

        for &pcb_id in &request.pcb_ids {
            let multiplier = ctx.board(pcb_id)?.effective_multiplier();
            let mut consumed = 0;
            for line in ctx.lines_for(pcb_id) {
                let required = required_quantity(line, request.units_requested, multiplier)?;
                Self::reserve(ctx, line, required, &mut demand, &mut shortfalls)?;
                plan.consumptions.push(PlannedConsumption {
                    line_id: line.id,
                    pcb_id: Some(pcb_id),
                    quantity: required,
                });
                consumed = checked_sum(consumed, required)?;
            }
            plan.boards.push(BoardPlan { pcb_id, consumed });
            plan.total = checked_sum(plan.total, consumed)?;
        }

        if request.produce_unassociated {
            for line in ctx.unassociated_lines() {
                let required = required_quantity(line, request.units_requested, 1)?;
                Self::reserve(ctx, line, required, &mut demand, &mut shortfalls)?;
                plan.consumptions.push(PlannedConsumption {
                    line_id: line.id,
                    pcb_id: None,
                    quantity: required,
                });
                plan.unassociated_total = checked_sum(plan.unassociated_total, required)?;
            }
            plan.total = checked_sum(plan.total, plan.unassociated_total)?;
        }

        if !shortfalls.is_empty() {
            return Err(DomainError::InsufficientStock(shortfalls));
        }

        Ok(plan)
    }

    fn check_request(ctx: &ProductionContext, request: &ProductionRequest) -> DomainResult<()> {
        if request.project_id != ctx.project().id {
            return Err(DomainError::validation(format!(
                "request targets project {} but the working set holds project {}",
                request.project_id,
                ctx.project().id
            )));
        }
        if request.units_requested < 1 {
            return Err(DomainError::validation(format!(
                "units requested must be at least 1, got {}",
                request.units_requested
            )));
        }
        if request.pcb_ids.is_empty() && !request.produce_unassociated {
            return Err(DomainError::validation("nothing to produce"));
        }
        for (idx, pcb_id) in request.pcb_ids.iter().enumerate() {
            if request.pcb_ids[..idx].contains(pcb_id) {
                return Err(DomainError::validation(format!(
                    "board {pcb_id} requested more than once"
                )));
            }
        }
        Ok(())
    }

    fn reserve(
        ctx: &ProductionContext,
        line: &BomLine,
        required: i64,
        demand: &mut BTreeMap<StockSource, i64>,
        shortfalls: &mut Vec<StockShortfall>,
    ) -> DomainResult<()> {
        let available = ctx.ledger().available_quantity(line)?;
        let reserved = demand.entry(StockSource::of(line)).or_insert(0);
        let remaining = available.saturating_sub(*reserved);

        if required > remaining {
            shortfalls.push(StockShortfall {
                line_id: line.id,
                pcb_id: line.pcb_id,
                available: remaining.max(0),
                required,
            });
        }
        *reserved = checked_sum(*reserved, required)?;
        Ok(())
    }
}
