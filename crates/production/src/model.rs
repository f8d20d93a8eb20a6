//! Entities the production engine reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pcbforge_core::{
    BomLineId, Entity, InventoryItemId, PcbId, PcbProductionRecordId, ProductionRunId, ProjectId,
};

/// A project owns a BOM. Its timestamp is touched on every production write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            updated_at,
        }
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// A board design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbDefinition {
    pub id: PcbId,
    pub name: String,
    /// Boards produced per unit. Values below 1 behave as 1.
    pub quantity_multiplier: i64,
    /// Cost per board in smallest currency unit (e.g. cents).
    pub cost: i64,
    /// Serial a never-produced board counts up from (e.g. `"C10-00000"`).
    /// Empty defers to the service-wide default.
    pub serial_number_format: String,
    /// High-water mark of assigned serials; empty when nothing was produced yet.
    pub last_serial_number: String,
}

impl PcbDefinition {
    pub fn effective_multiplier(&self) -> i64 {
        self.quantity_multiplier.max(1)
    }

    /// Starting serial for a board with no `last_serial_number` yet.
    pub fn initial_serial<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.serial_number_format.is_empty() {
            fallback
        } else {
            &self.serial_number_format
        }
    }
}

/// Where a BOM line's stock lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuantitySource {
    /// Stock is held by an inventory item shared with the rest of the system.
    Tracked { item_id: InventoryItemId },
    /// Stock is a plain counter on the line itself.
    Untracked {
        quantity_available: i64,
        /// Unit cost in smallest currency unit.
        cost: Option<i64>,
        currency: Option<String>,
    },
}

/// A project-part assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub id: BomLineId,
    pub project_id: ProjectId,
    /// Board the line belongs to; `None` marks an unassociated line.
    pub pcb_id: Option<PcbId>,
    /// Parts consumed per unit of the parent board (or project, if unassociated).
    pub quantity_per_unit: i64,
    pub source: QuantitySource,
}

impl BomLine {
    pub fn is_unassociated(&self) -> bool {
        self.pcb_id.is_none()
    }

    pub fn is_assigned_to(&self, pcb_id: PcbId) -> bool {
        self.pcb_id == Some(pcb_id)
    }

    pub fn tracked_item(&self) -> Option<InventoryItemId> {
        match self.source {
            QuantitySource::Tracked { item_id } => Some(item_id),
            QuantitySource::Untracked { .. } => None,
        }
    }
}

/// One recorded "produce N units of this project".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRun {
    pub id: ProductionRunId,
    pub project_id: ProjectId,
    pub units_requested: i64,
    pub produce_unassociated: bool,
    /// Running sum of everything this run consumed.
    pub parts_consumed_total: i64,
    pub created_at: DateTime<Utc>,
}

/// Audit record for one board touched by a production run.
///
/// Multiplier and cost are snapshots taken at production time; reversal uses
/// them instead of the live board definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcbProductionRecord {
    pub id: PcbProductionRecordId,
    pub run_id: ProductionRunId,
    pub pcb_id: PcbId,
    pub pcb_quantity_multiplier: i64,
    pub pcb_cost: i64,
    /// First serial assigned to this board in the run.
    pub assigned_serial_number: String,
    /// Last serial assigned to this board in the run.
    pub last_serial_number: String,
    pub parts_consumed_for_this_board: i64,
}

impl PcbProductionRecord {
    pub fn effective_multiplier(&self) -> i64 {
        self.pcb_quantity_multiplier.max(1)
    }
}

macro_rules! impl_entity {
    ($t:ty, $id:ty, $kind:literal) => {
        impl Entity for $t {
            type Id = $id;

            const KIND: &'static str = $kind;

            fn id(&self) -> Self::Id {
                self.id
            }
        }
    };
}

impl_entity!(Project, ProjectId, "project");
impl_entity!(PcbDefinition, PcbId, "pcb");
impl_entity!(BomLine, BomLineId, "bom line");
impl_entity!(ProductionRun, ProductionRunId, "production run");
impl_entity!(PcbProductionRecord, PcbProductionRecordId, "pcb production record");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_below_one_behaves_as_one() {
        let mut pcb = PcbDefinition {
            id: PcbId::new(),
            name: "main".to_string(),
            quantity_multiplier: 0,
            cost: 0,
            serial_number_format: String::new(),
            last_serial_number: String::new(),
        };
        assert_eq!(pcb.effective_multiplier(), 1);

        pcb.quantity_multiplier = 4;
        assert_eq!(pcb.effective_multiplier(), 4);
    }

    #[test]
    fn initial_serial_prefers_the_board_format() {
        let mut pcb = PcbDefinition {
            id: PcbId::new(),
            name: "main".to_string(),
            quantity_multiplier: 1,
            cost: 0,
            serial_number_format: String::new(),
            last_serial_number: String::new(),
        };
        assert_eq!(pcb.initial_serial("00000"), "00000");

        pcb.serial_number_format = "MB-000".to_string();
        assert_eq!(pcb.initial_serial("00000"), "MB-000");
    }

    #[test]
    fn quantity_source_serializes_as_tagged_variant() {
        let source = QuantitySource::Untracked {
            quantity_available: 12,
            cost: Some(150),
            currency: Some("EUR".to_string()),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["kind"], "untracked");
        assert_eq!(json["quantity_available"], 12);
    }
}
