use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pcbforge_core::{PcbId, PcbProductionRecordId, ProductionRunId, ProjectId};
use pcbforge_events::Event;

/// Event: RunProduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProduced {
    pub run_id: ProductionRunId,
    pub project_id: ProjectId,
    pub units_requested: i64,
    pub boards: Vec<PcbId>,
    pub parts_consumed_total: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BoardRecordReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRecordReversed {
    pub run_id: ProductionRunId,
    pub record_id: PcbProductionRecordId,
    pub project_id: ProjectId,
    pub pcb_id: PcbId,
    pub parts_returned: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RunReversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReversed {
    pub run_id: ProductionRunId,
    pub project_id: ProjectId,
    pub parts_returned: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionEvent {
    RunProduced(RunProduced),
    BoardRecordReversed(BoardRecordReversed),
    RunReversed(RunReversed),
}

impl ProductionEvent {
    pub fn run_id(&self) -> ProductionRunId {
        match self {
            ProductionEvent::RunProduced(e) => e.run_id,
            ProductionEvent::BoardRecordReversed(e) => e.run_id,
            ProductionEvent::RunReversed(e) => e.run_id,
        }
    }
}

impl Event for ProductionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductionEvent::RunProduced(_) => "production.run.produced",
            ProductionEvent::BoardRecordReversed(_) => "production.board_record.reversed",
            ProductionEvent::RunReversed(_) => "production.run.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductionEvent::RunProduced(e) => e.occurred_at,
            ProductionEvent::BoardRecordReversed(e) => e.occurred_at,
            ProductionEvent::RunReversed(e) => e.occurred_at,
        }
    }
}
