//! Builders shared by the engine's tests.

use chrono::{DateTime, TimeZone, Utc};

use pcbforge_core::{BomLineId, InventoryItemId, PcbId, ProjectId};
use pcbforge_inventory::InventoryItem;

use crate::context::ProductionContext;
use crate::model::{BomLine, PcbDefinition, Project, QuantitySource};
use crate::validator::ProductionRequest;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub(crate) fn t1() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
pub(crate) struct Fixture {
    pub project: Project,
    pub boards: Vec<PcbDefinition>,
    pub lines: Vec<BomLine>,
    pub items: Vec<InventoryItem>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            project: Project::new(ProjectId::new(), "sensor node", t0()),
            boards: Vec::new(),
            lines: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn board(&mut self, quantity_multiplier: i64, last_serial: &str) -> PcbId {
        let id = PcbId::new();
        self.boards.push(PcbDefinition {
            id,
            name: format!("board-{}", self.boards.len()),
            quantity_multiplier,
            cost: 1250,
            serial_number_format: String::new(),
            last_serial_number: last_serial.to_string(),
        });
        id
    }

    pub fn item(&mut self, quantity: i64) -> InventoryItemId {
        let id = InventoryItemId::new();
        self.items.push(InventoryItem::new(id, "part", quantity));
        id
    }

    pub fn line_on_item(&mut self, pcb_id: Option<PcbId>, per_unit: i64, item_id: InventoryItemId) -> BomLineId {
        self.push_line(pcb_id, per_unit, QuantitySource::Tracked { item_id })
    }

    pub fn tracked_line(&mut self, pcb_id: Option<PcbId>, per_unit: i64, stock: i64) -> BomLineId {
        let item_id = self.item(stock);
        self.line_on_item(pcb_id, per_unit, item_id)
    }

    pub fn untracked_line(&mut self, pcb_id: Option<PcbId>, per_unit: i64, stock: i64) -> BomLineId {
        self.push_line(
            pcb_id,
            per_unit,
            QuantitySource::Untracked {
                quantity_available: stock,
                cost: Some(3),
                currency: Some("EUR".to_string()),
            },
        )
    }

    fn push_line(&mut self, pcb_id: Option<PcbId>, per_unit: i64, source: QuantitySource) -> BomLineId {
        let id = BomLineId::new();
        self.lines.push(BomLine {
            id,
            project_id: self.project.id,
            pcb_id,
            quantity_per_unit: per_unit,
            source,
        });
        id
    }

    pub fn context(&self) -> ProductionContext {
        ProductionContext::new(
            self.project.clone(),
            self.boards.clone(),
            self.lines.clone(),
            self.items.clone(),
        )
        .unwrap()
    }

    pub fn request(&self, pcb_ids: &[PcbId], units: i64, produce_unassociated: bool) -> ProductionRequest {
        ProductionRequest {
            project_id: self.project.id,
            pcb_ids: pcb_ids.to_vec(),
            units_requested: units,
            produce_unassociated,
        }
    }
}

pub(crate) fn quantity(ctx: &ProductionContext, line_id: BomLineId) -> i64 {
    ctx.available_quantity(line_id).unwrap()
}

pub(crate) fn quantities(ctx: &ProductionContext) -> Vec<i64> {
    ctx.lines().iter().map(|l| quantity(ctx, l.id)).collect()
}
