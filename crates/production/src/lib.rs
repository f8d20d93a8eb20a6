//! Production engine.
//!
//! Turns a BOM into a recorded production run: validate every affected line
//! first, then consume stock, assign board serials and write audit records.
//! Runs and individual board records can be reversed.
//!
//! Pure domain logic only: no IO, no persistence. The infrastructure layer
//! loads a [`ProductionContext`], runs the engine and saves what changed.

pub mod committer;
pub mod context;
pub mod events;
pub mod ledger;
pub mod model;
pub mod reversal;
pub mod serial;
pub mod validator;

#[cfg(test)]
mod fixtures;

pub use committer::{AssignedSerial, ProductionCommitter, ProductionOutcome};
pub use context::{ContextChanges, Precondition, ProductionContext};
pub use events::{BoardRecordReversed, ProductionEvent, RunProduced, RunReversed};
pub use ledger::{InventoryLedger, StockSource};
pub use model::{BomLine, PcbDefinition, PcbProductionRecord, ProductionRun, Project, QuantitySource};
pub use reversal::{BoardReversal, ReturnedQuantity, ReversalEngine, RunReversal};
pub use serial::{DEFAULT_SERIAL_NUMBER, SerialNumber, SerialNumberSequencer};
pub use validator::{
    BoardPlan, PlannedConsumption, ProductionPlan, ProductionRequest, ProductionValidator,
    required_quantity,
};
