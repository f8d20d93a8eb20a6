//! The working set one production or reversal operates on.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use pcbforge_core::{BomLineId, DomainError, DomainResult, Entity, InventoryItemId, PcbId};
use pcbforge_inventory::InventoryItem;

use crate::ledger::InventoryLedger;
use crate::model::{BomLine, PcbDefinition, Project};

/// A stored value the changes were computed from. Storage must reject the
/// changes if the value moved since the context was loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Inventory items can be shared between projects.
    ItemQuantity { item_id: InventoryItemId, quantity: i64 },
    /// Boards can be produced from more than one project.
    LastSerial { pcb_id: PcbId, serial: String },
}

/// Entities mutated while operating on a [`ProductionContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextChanges {
    pub project: Project,
    pub boards: Vec<PcbDefinition>,
    pub lines: Vec<BomLine>,
    pub items: Vec<InventoryItem>,
    pub preconditions: Vec<Precondition>,
}

/// One project's BOM, the boards involved and the stock behind its lines.
///
/// Operations mutate the context in place. If an operation fails, the context
/// must be discarded rather than persisted.
#[derive(Debug, Clone)]
pub struct ProductionContext {
    project: Project,
    boards: Vec<PcbDefinition>,
    lines: Vec<BomLine>,
    ledger: InventoryLedger,
    loaded_serials: BTreeMap<PcbId, String>,
    touched_lines: BTreeSet<BomLineId>,
    touched_boards: BTreeSet<PcbId>,
    project_touched: bool,
}

impl ProductionContext {
    pub fn new(
        project: Project,
        boards: Vec<PcbDefinition>,
        lines: Vec<BomLine>,
        items: impl IntoIterator<Item = InventoryItem>,
    ) -> DomainResult<Self> {
        if let Some(foreign) = lines.iter().find(|l| l.project_id != project.id) {
            return Err(DomainError::invariant(format!(
                "bom line {} belongs to project {}, not {}",
                foreign.id, foreign.project_id, project.id
            )));
        }

        let loaded_serials = boards
            .iter()
            .map(|b| (b.id, b.last_serial_number.clone()))
            .collect();

        Ok(Self {
            project,
            boards,
            loaded_serials,
            lines,
            ledger: InventoryLedger::new(items),
            touched_lines: BTreeSet::new(),
            touched_boards: BTreeSet::new(),
            project_touched: false,
        })
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn board(&self, pcb_id: PcbId) -> DomainResult<&PcbDefinition> {
        self.boards
            .iter()
            .find(|b| b.id == pcb_id)
            .ok_or_else(|| DomainError::not_found(PcbDefinition::KIND, pcb_id))
    }

    pub fn lines(&self) -> &[BomLine] {
        &self.lines
    }

    pub fn line(&self, line_id: BomLineId) -> DomainResult<&BomLine> {
        self.lines
            .iter()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(BomLine::KIND, line_id))
    }

    pub fn lines_for(&self, pcb_id: PcbId) -> impl Iterator<Item = &BomLine> {
        self.lines.iter().filter(move |l| l.is_assigned_to(pcb_id))
    }

    pub fn unassociated_lines(&self) -> impl Iterator<Item = &BomLine> {
        self.lines.iter().filter(|l| l.is_unassociated())
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn available_quantity(&self, line_id: BomLineId) -> DomainResult<i64> {
        self.ledger.available_quantity(self.line(line_id)?)
    }

    pub(crate) fn apply_delta(&mut self, line_id: BomLineId, delta: i64) -> DomainResult<()> {
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| DomainError::not_found(BomLine::KIND, line_id))?;

        self.ledger.apply_delta(line, delta)?;
        if line.tracked_item().is_none() {
            self.touched_lines.insert(line_id);
        }
        Ok(())
    }

    pub(crate) fn set_last_serial(&mut self, pcb_id: PcbId, serial: String) -> DomainResult<()> {
        let board = self
            .boards
            .iter_mut()
            .find(|b| b.id == pcb_id)
            .ok_or_else(|| DomainError::not_found(PcbDefinition::KIND, pcb_id))?;
        board.last_serial_number = serial;
        self.touched_boards.insert(pcb_id);
        Ok(())
    }

    pub(crate) fn touch_project(&mut self, at: DateTime<Utc>) {
        self.project.touch(at);
        self.project_touched = true;
    }

    /// Whether anything in the working set has been mutated.
    pub fn is_dirty(&self) -> bool {
        self.project_touched
            || !self.touched_lines.is_empty()
            || !self.touched_boards.is_empty()
            || self.ledger.has_touched_items()
    }

    /// Snapshot of every mutated entity, ready to hand to the repository.
    pub fn changes(&self) -> ContextChanges {
        ContextChanges {
            project: self.project.clone(),
            boards: self
                .boards
                .iter()
                .filter(|b| self.touched_boards.contains(&b.id))
                .cloned()
                .collect(),
            lines: self
                .lines
                .iter()
                .filter(|l| self.touched_lines.contains(&l.id))
                .cloned()
                .collect(),
            items: self.ledger.touched_items(),
            preconditions: self.preconditions(),
        }
    }

    fn preconditions(&self) -> Vec<Precondition> {
        let items = self.ledger.touched_items().into_iter().filter_map(|item| {
            self.ledger
                .loaded_quantity(item.id())
                .map(|quantity| Precondition::ItemQuantity {
                    item_id: item.id(),
                    quantity,
                })
        });
        let serials = self.touched_boards.iter().filter_map(|pcb_id| {
            self.loaded_serials
                .get(pcb_id)
                .map(|serial| Precondition::LastSerial {
                    pcb_id: *pcb_id,
                    serial: serial.clone(),
                })
        });
        items.chain(serials).collect()
    }
}
