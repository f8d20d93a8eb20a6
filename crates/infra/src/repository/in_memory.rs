use std::collections::HashMap;
use std::sync::RwLock;

use pcbforge_core::{
    BomLineId, Entity, InventoryItemId, PcbId, PcbProductionRecordId, ProductionRunId, ProjectId,
};
use pcbforge_inventory::InventoryItem;
use pcbforge_production::{
    BomLine, PcbDefinition, PcbProductionRecord, Precondition, ProductionRun, Project,
};

use super::r#trait::{BomLineFilter, ChangeSet, ProductionRepository, RepositoryError};

#[derive(Debug, Default, Clone)]
struct Tables {
    projects: HashMap<ProjectId, Project>,
    pcbs: HashMap<PcbId, PcbDefinition>,
    bom_lines: HashMap<BomLineId, BomLine>,
    inventory_items: HashMap<InventoryItemId, InventoryItem>,
    runs: HashMap<ProductionRunId, ProductionRun>,
    records: HashMap<PcbProductionRecordId, PcbProductionRecord>,
}

fn fetch<E>(table: &HashMap<E::Id, E>, id: E::Id) -> Result<E, RepositoryError>
where
    E: Entity + Clone,
{
    table
        .get(&id)
        .cloned()
        .ok_or_else(|| RepositoryError::not_found(E::KIND, id))
}

fn upsert<E: Entity>(table: &mut HashMap<E::Id, E>, rows: Vec<E>) {
    for row in rows {
        table.insert(row.id(), row);
    }
}

impl Tables {
    /// Reject the change set if anything it references is missing afterwards.
    fn check(&self, changes: &ChangeSet) -> Result<(), RepositoryError> {
        for precondition in &changes.preconditions {
            self.check_precondition(precondition)?;
        }
        for id in &changes.deleted_runs {
            if !self.runs.contains_key(id) && !changes.runs.iter().any(|r| r.id == *id) {
                return Err(RepositoryError::not_found(ProductionRun::KIND, id));
            }
        }
        for id in &changes.deleted_records {
            if !self.records.contains_key(id) && !changes.records.iter().any(|r| r.id == *id) {
                return Err(RepositoryError::not_found(PcbProductionRecord::KIND, id));
            }
        }
        for record in &changes.records {
            let run_known = self.runs.contains_key(&record.run_id)
                || changes.runs.iter().any(|r| r.id == record.run_id);
            if !run_known || changes.deleted_runs.contains(&record.run_id) {
                return Err(RepositoryError::Conflict(format!(
                    "record {} references missing run {}",
                    record.id, record.run_id
                )));
            }
        }
        for run in &changes.runs {
            let project_known = self.projects.contains_key(&run.project_id)
                || changes.projects.iter().any(|p| p.id == run.project_id);
            if !project_known {
                return Err(RepositoryError::Conflict(format!(
                    "run {} references missing project {}",
                    run.id, run.project_id
                )));
            }
        }
        Ok(())
    }

    fn check_precondition(&self, precondition: &Precondition) -> Result<(), RepositoryError> {
        match precondition {
            Precondition::ItemQuantity { item_id, quantity } => {
                let stored = fetch(&self.inventory_items, *item_id)?.quantity();
                if stored != *quantity {
                    return Err(RepositoryError::Conflict(format!(
                        "inventory item {item_id} changed concurrently (loaded {quantity}, stored {stored})"
                    )));
                }
            }
            Precondition::LastSerial { pcb_id, serial } => {
                let stored = fetch(&self.pcbs, *pcb_id)?.last_serial_number;
                if stored != *serial {
                    return Err(RepositoryError::Conflict(format!(
                        "pcb {pcb_id} serial changed concurrently (loaded {serial:?}, stored {stored:?})"
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        upsert(&mut self.projects, changes.projects);
        upsert(&mut self.pcbs, changes.pcbs);
        upsert(&mut self.bom_lines, changes.bom_lines);
        upsert(&mut self.inventory_items, changes.inventory_items);
        upsert(&mut self.runs, changes.runs);
        upsert(&mut self.records, changes.records);

        for id in &changes.deleted_records {
            self.records.remove(id);
        }
        for id in &changes.deleted_runs {
            self.runs.remove(id);
            self.records.retain(|_, r| r.run_id != *id);
        }
    }
}

/// In-memory production repository.
///
/// Intended for tests/dev. A change set is checked and applied under a single
/// write lock, so readers never observe half of it.
#[derive(Debug, Default)]
pub struct InMemoryProductionRepository {
    tables: RwLock<Tables>,
}

impl InMemoryProductionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }
}

impl ProductionRepository for InMemoryProductionRepository {
    fn get_project(&self, id: ProjectId) -> Result<Project, RepositoryError> {
        fetch(&self.read()?.projects, id)
    }

    fn get_bom_lines(
        &self,
        project_id: ProjectId,
        filter: BomLineFilter,
    ) -> Result<Vec<BomLine>, RepositoryError> {
        let tables = self.read()?;
        if !tables.projects.contains_key(&project_id) {
            return Err(RepositoryError::not_found(Project::KIND, project_id));
        }

        let mut lines: Vec<_> = tables
            .bom_lines
            .values()
            .filter(|l| l.project_id == project_id && filter.matches(l))
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    fn get_pcb_definition(&self, id: PcbId) -> Result<PcbDefinition, RepositoryError> {
        fetch(&self.read()?.pcbs, id)
    }

    fn get_inventory_item(&self, id: InventoryItemId) -> Result<InventoryItem, RepositoryError> {
        fetch(&self.read()?.inventory_items, id)
    }

    fn get_production_run(&self, id: ProductionRunId) -> Result<ProductionRun, RepositoryError> {
        fetch(&self.read()?.runs, id)
    }

    fn get_pcb_production_record(
        &self,
        id: PcbProductionRecordId,
    ) -> Result<PcbProductionRecord, RepositoryError> {
        fetch(&self.read()?.records, id)
    }

    fn list_production_runs(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProductionRun>, RepositoryError> {
        let tables = self.read()?;
        let mut runs: Vec<_> = tables
            .runs
            .values()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }

    fn list_pcb_production_records(
        &self,
        run_id: ProductionRunId,
    ) -> Result<Vec<PcbProductionRecord>, RepositoryError> {
        let tables = self.read()?;
        let mut records: Vec<_> = tables
            .records
            .values()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    fn save_all(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))?;

        tables.check(&changes)?;
        tables.apply(changes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pcbforge_production::QuantitySource;

    fn project() -> Project {
        Project::new(ProjectId::new(), "p", Utc::now())
    }

    fn run_for(project_id: ProjectId) -> ProductionRun {
        ProductionRun {
            id: ProductionRunId::new(),
            project_id,
            units_requested: 1,
            produce_unassociated: false,
            parts_consumed_total: 0,
            created_at: Utc::now(),
        }
    }

    fn record_for(run_id: ProductionRunId) -> PcbProductionRecord {
        PcbProductionRecord {
            id: PcbProductionRecordId::new(),
            run_id,
            pcb_id: PcbId::new(),
            pcb_quantity_multiplier: 1,
            pcb_cost: 0,
            assigned_serial_number: "A-1".to_string(),
            last_serial_number: "A-1".to_string(),
            parts_consumed_for_this_board: 0,
        }
    }

    #[test]
    fn missing_entities_are_not_found() {
        let repo = InMemoryProductionRepository::new();
        let err = repo.get_project(ProjectId::new()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { entity: "project", .. }));

        let err = repo
            .get_bom_lines(ProjectId::new(), BomLineFilter::All)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn bom_lines_are_filtered_by_board() {
        let repo = InMemoryProductionRepository::new();
        let p = project();
        let pcb = PcbId::new();
        let line = |pcb_id| BomLine {
            id: BomLineId::new(),
            project_id: p.id,
            pcb_id,
            quantity_per_unit: 1,
            source: QuantitySource::Untracked {
                quantity_available: 1,
                cost: None,
                currency: None,
            },
        };
        repo.save_all(ChangeSet {
            projects: vec![p.clone()],
            bom_lines: vec![line(Some(pcb)), line(None), line(Some(PcbId::new()))],
            ..ChangeSet::default()
        })
        .unwrap();

        assert_eq!(repo.get_bom_lines(p.id, BomLineFilter::All).unwrap().len(), 3);
        assert_eq!(repo.get_bom_lines(p.id, BomLineFilter::Pcb(pcb)).unwrap().len(), 1);
        assert_eq!(
            repo.get_bom_lines(p.id, BomLineFilter::Unassociated)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn deleting_a_run_cascades_to_records() {
        let repo = InMemoryProductionRepository::new();
        let p = project();
        let run = run_for(p.id);
        let records = vec![record_for(run.id), record_for(run.id)];
        repo.save_all(ChangeSet {
            projects: vec![p.clone()],
            runs: vec![run.clone()],
            records,
            ..ChangeSet::default()
        })
        .unwrap();
        assert_eq!(repo.list_pcb_production_records(run.id).unwrap().len(), 2);

        repo.save_all(ChangeSet {
            deleted_runs: vec![run.id],
            ..ChangeSet::default()
        })
        .unwrap();

        assert!(repo.get_production_run(run.id).is_err());
        assert!(repo.list_pcb_production_records(run.id).unwrap().is_empty());
    }

    #[test]
    fn invalid_change_set_is_rejected_whole() {
        let repo = InMemoryProductionRepository::new();
        let p = project();
        let orphan = record_for(ProductionRunId::new());

        let err = repo
            .save_all(ChangeSet {
                projects: vec![p.clone()],
                records: vec![orphan],
                ..ChangeSet::default()
            })
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(repo.get_project(p.id).is_err());
    }

    #[test]
    fn deleting_unknown_record_is_not_found() {
        let repo = InMemoryProductionRepository::new();
        let err = repo
            .save_all(ChangeSet {
                deleted_records: vec![PcbProductionRecordId::new()],
                ..ChangeSet::default()
            })
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn runs_are_listed_newest_first() {
        let repo = InMemoryProductionRepository::new();
        let p = project();
        let mut older = run_for(p.id);
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = run_for(p.id);
        repo.save_all(ChangeSet {
            projects: vec![p.clone()],
            runs: vec![older.clone(), newer.clone()],
            ..ChangeSet::default()
        })
        .unwrap();

        let ids: Vec<_> = repo
            .list_production_runs(p.id)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn stale_item_quantity_is_a_conflict() {
        let repo = InMemoryProductionRepository::new();
        let item = InventoryItem::new(InventoryItemId::new(), "capacitor", 10);
        repo.save_all(ChangeSet {
            inventory_items: vec![item.clone()],
            ..ChangeSet::default()
        })
        .unwrap();

        let mut consumed = item.clone();
        consumed.adjust(-6);
        let write = |loaded: i64| ChangeSet {
            inventory_items: vec![consumed.clone()],
            preconditions: vec![Precondition::ItemQuantity {
                item_id: item.id(),
                quantity: loaded,
            }],
            ..ChangeSet::default()
        };

        repo.save_all(write(10)).unwrap();
        let err = repo.save_all(write(10)).unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.get_inventory_item(item.id()).unwrap().quantity(), 4);
    }

    #[test]
    fn stale_board_serial_is_a_conflict() {
        let repo = InMemoryProductionRepository::new();
        let pcb = PcbDefinition {
            id: PcbId::new(),
            name: "main".to_string(),
            quantity_multiplier: 1,
            cost: 0,
            serial_number_format: String::new(),
            last_serial_number: "A-5".to_string(),
        };
        repo.save_all(ChangeSet {
            pcbs: vec![pcb.clone()],
            ..ChangeSet::default()
        })
        .unwrap();

        let err = repo
            .save_all(ChangeSet {
                pcbs: vec![pcb.clone()],
                preconditions: vec![Precondition::LastSerial {
                    pcb_id: pcb.id,
                    serial: "A-3".to_string(),
                }],
                ..ChangeSet::default()
            })
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
