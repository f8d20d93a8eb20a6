//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{BomLineId, PcbId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One BOM line that cannot be satisfied by the stock currently available to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub line_id: BomLineId,
    /// Board the line is assigned to; `None` for unassociated lines.
    pub pcb_id: Option<PcbId>,
    /// Quantity left for this line after earlier lines drawing on the same stock.
    pub available: i64,
    pub required: i64,
}

impl core::fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "line {} (available: {}, required: {})",
            self.line_id, self.available, self.required
        )
    }
}

fn join_shortfalls(shortfalls: &[StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, shortages). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity is missing from the working set.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// One or more BOM lines are short. Every short line found in the pass is listed.
    #[error("insufficient stock: {}", join_shortfalls(.0))]
    InsufficientStock(Vec<StockShortfall>),

    /// The numeric suffix of a board's serial number cannot be parsed or incremented.
    #[error("cannot sequence serial number {serial:?} of board {pcb_id}")]
    SerialNumberParse { pcb_id: PcbId, serial: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shortfalls carried by an `InsufficientStock` error, empty otherwise.
    pub fn shortfalls(&self) -> &[StockShortfall] {
        match self {
            Self::InsufficientStock(s) => s,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_lists_every_line() {
        let a = BomLineId::new();
        let b = BomLineId::new();
        let err = DomainError::InsufficientStock(vec![
            StockShortfall {
                line_id: a,
                pcb_id: None,
                available: 1,
                required: 4,
            },
            StockShortfall {
                line_id: b,
                pcb_id: Some(PcbId::new()),
                available: 0,
                required: 2,
            },
        ]);

        let msg = err.to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
        assert!(msg.contains("available: 1, required: 4"));
        assert_eq!(err.shortfalls().len(), 2);
    }

    #[test]
    fn shortfalls_is_empty_for_other_kinds() {
        assert!(DomainError::validation("nope").shortfalls().is_empty());
        assert_eq!(
            DomainError::not_found("project", "p-1").to_string(),
            "project p-1 not found"
        );
    }
}
