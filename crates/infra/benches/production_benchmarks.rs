use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use pcbforge_core::{BomLineId, InventoryItemId, PcbId, ProjectId};
use pcbforge_events::InMemoryEventBus;
use pcbforge_infra::{ChangeSet, InMemoryProductionRepository, ProductionRepository, ProductionService};
use pcbforge_inventory::InventoryItem;
use pcbforge_production::{
    BomLine, PcbDefinition, ProductionEvent, ProductionRequest, Project, QuantitySource,
};

type Service = ProductionService<Arc<InMemoryProductionRepository>, Arc<InMemoryEventBus<ProductionEvent>>>;

/// One project with `boards` boards of `lines_per_board` lines each.
/// Every other line is tracked; stock is effectively unlimited.
fn seeded_service(boards: usize, lines_per_board: usize) -> (Service, ProductionRequest) {
    let project = Project::new(ProjectId::new(), "bench", Utc::now());
    let mut seed = ChangeSet::default();
    let mut pcb_ids = Vec::with_capacity(boards);

    for b in 0..boards {
        let pcb_id = PcbId::new();
        pcb_ids.push(pcb_id);
        seed.pcbs.push(PcbDefinition {
            id: pcb_id,
            name: format!("board-{b}"),
            quantity_multiplier: 2,
            cost: 500,
            serial_number_format: String::new(),
            last_serial_number: format!("B{b}-00000"),
        });

        for l in 0..lines_per_board {
            let source = if l % 2 == 0 {
                let item_id = InventoryItemId::new();
                seed.inventory_items
                    .push(InventoryItem::new(item_id, format!("part-{b}-{l}"), i64::MAX / 4));
                QuantitySource::Tracked { item_id }
            } else {
                QuantitySource::Untracked {
                    quantity_available: i64::MAX / 4,
                    cost: Some(3),
                    currency: Some("USD".to_string()),
                }
            };
            seed.bom_lines.push(BomLine {
                id: BomLineId::new(),
                project_id: project.id,
                pcb_id: Some(pcb_id),
                quantity_per_unit: 1 + l as i64 % 5,
                source,
            });
        }
    }

    let request = ProductionRequest {
        project_id: project.id,
        pcb_ids,
        units_requested: 10,
        produce_unassociated: false,
    };
    seed.projects.push(project);

    let repo = Arc::new(InMemoryProductionRepository::new());
    repo.save_all(seed).expect("seed");
    let service = ProductionService::new(repo, Arc::new(InMemoryEventBus::new()));
    (service, request)
}

fn bench_produce_reverse_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("produce_reverse_cycle");

    for lines in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), lines, |b, &lines| {
            let (service, request) = seeded_service(1, lines);
            b.iter(|| {
                let outcome = service.produce(black_box(&request)).expect("produce");
                service.reverse_run(outcome.run.id).expect("reverse");
            });
        });
    }

    group.finish();
}

fn bench_check_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_latency");

    for boards in [1usize, 5, 20].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(boards), boards, |b, &boards| {
            let (service, request) = seeded_service(boards, 20);
            b.iter(|| black_box(service.check(&request).expect("check")));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_produce_reverse_cycle, bench_check_latency);
criterion_main!(benches);
