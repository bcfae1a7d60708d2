use std::path::Path;
use std::sync::Mutex;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;

use griddock::atom::XsType;
use griddock::grid::{GridMap, SearchBox};
use griddock::ligand::{Change, Conformation, Ligand};
use griddock::optimization::{monte_carlo_task, ResultContainer};
use griddock::scoring::VinaScore;

fn atom_line(serial: usize, name: &str, x: f64, y: f64, z: f64, ad: &str) -> String {
    format!(
        "ATOM  {:>5} {:<4} LIG A   1    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00    +0.000 {:<2}",
        serial, name, x, y, z, ad
    )
}

fn bench_ligand() -> Ligand {
    let text = [
        "ROOT".to_string(),
        atom_line(1, "C1", 0.0, 0.0, 0.0, "C"),
        atom_line(2, "C2", 0.75, 1.299, -0.5, "C"),
        "ENDROOT".to_string(),
        "BRANCH   1   3".to_string(),
        atom_line(3, "C3", 0.0, 0.0, 1.5, "C"),
        atom_line(4, "C4", 1.5, 0.0, 1.5, "C"),
        atom_line(5, "C5", 2.0, 0.0, 0.4, "C"),
        "ENDBRANCH   1   3".to_string(),
        "TORSDOF 1".to_string(),
    ]
    .join("\n");
    Ligand::from_reader(text.as_bytes(), Path::new("bench.pdbqt")).expect("fixture parses")
}

fn setup() -> (Ligand, SearchBox, Vec<GridMap>, VinaScore) {
    let lig = bench_ligand();
    let bx = SearchBox::new(Vector3::zeros(), Vector3::new(16.0, 16.0, 16.0), 0.5);
    let maps = (0..XsType::COUNT)
        .map(|_| GridMap::from_fn(&bx, |_, _, z| 0.01 * z as f64))
        .collect();
    (lig, bx, maps, VinaScore::new())
}

fn bench_evaluate(c: &mut Criterion) {
    let (lig, bx, maps, sf) = setup();
    let mut ws = lig.workspace();
    let mut g = Change::new(lig.num_active_torsions);
    let mut conf = Conformation::new(lig.num_active_torsions);
    conf.position = Vector3::new(1.0, -0.5, 0.25);
    conf.torsions[0] = 0.9;

    c.bench_function("ligand_evaluate", |b| {
        b.iter(|| {
            lig.evaluate(
                black_box(&conf),
                &sf,
                &bx,
                &maps,
                f64::INFINITY,
                &mut ws,
                &mut g,
            )
        })
    });
}

fn bench_monte_carlo_task(c: &mut Criterion) {
    let (lig, bx, maps, sf) = setup();

    c.bench_function("monte_carlo_task", |b| {
        b.iter(|| {
            let container = Mutex::new(ResultContainer::new(20));
            monte_carlo_task(&container, &lig, black_box(7), &sf, &bx, &maps);
            container.into_inner().map(|c| c.len()).unwrap_or(0)
        })
    });
}

criterion_group!(benches, bench_evaluate, bench_monte_carlo_task);
criterion_main!(benches);
