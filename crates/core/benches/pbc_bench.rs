//! Criterion benchmarks for the PBC geometry routines.
//!
//! Uses a synthetic water box and random-walk jump matrices so that each
//! routine runs on realistically sized inputs.
//!
//! Run with: cargo bench -p mdpbc-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mdpbc_core::{
    pbc_diff_many, pbc_points, whole, JumpMatrices, JumpMatrix, NoJumpTracker, OrthoBox,
    TileOptions, DEFAULT_NOJUMP_CACHE_SIZE,
};

const BOX_EDGE: f64 = 40.0;

/// Build `n_waters` three-site molecules on a lattice, some of them split
/// across the x boundary. Returns (positions, residue_ids, masses).
fn build_water_box(n_waters: usize) -> (Vec<[f64; 3]>, Vec<usize>, Vec<f64>) {
    let per_edge = (n_waters as f64).cbrt().ceil() as usize;
    let spacing = BOX_EDGE / per_edge as f64;

    let mut positions = Vec::with_capacity(n_waters * 3);
    let mut residue_ids = Vec::with_capacity(n_waters * 3);
    let mut masses = Vec::with_capacity(n_waters * 3);

    for w in 0..n_waters {
        let ix = w % per_edge;
        let iy = (w / per_edge) % per_edge;
        let iz = w / (per_edge * per_edge);
        let o = [
            ix as f64 * spacing,
            iy as f64 * spacing + 0.5,
            iz as f64 * spacing + 0.5,
        ];
        // Hydrogens at -x may fall below zero; wrap them to the far side.
        let h1 = [(o[0] - 0.8).rem_euclid(BOX_EDGE), o[1] + 0.6, o[2]];
        let h2 = [o[0] + 0.8, o[1] + 0.6, o[2]];
        for (p, m) in [(o, 16.0), (h1, 1.008), (h2, 1.008)] {
            positions.push(p);
            residue_ids.push(w + 1);
            masses.push(m);
        }
    }

    (positions, residue_ids, masses)
}

/// Jump matrices where every atom crosses a boundary once every `period` steps.
fn build_jumps(n_steps: usize, n_atoms: usize, period: usize) -> JumpMatrices {
    let mut axes = [
        JumpMatrix::zeros(n_steps, n_atoms),
        JumpMatrix::zeros(n_steps, n_atoms),
        JumpMatrix::zeros(n_steps, n_atoms),
    ];
    for atom in 0..n_atoms {
        for step in (atom % period..n_steps).step_by(period) {
            let direction = if (atom + step) % 2 == 0 { 1 } else { -1 };
            axes[atom % 3].record(step, atom, direction).unwrap();
        }
    }
    JumpMatrices::new(axes).expect("axes share one shape")
}

fn bench_pbc_diff(c: &mut Criterion) {
    let pbc_box = OrthoBox::new([BOX_EDGE; 3]).unwrap();
    let (positions, _, _) = build_water_box(3000);
    let shifted: Vec<[f64; 3]> = positions
        .iter()
        .map(|p| [p[0] + 17.3, p[1] - 29.1, p[2] + 3.7])
        .collect();

    c.bench_function("pbc_diff_many_9000", |b| {
        b.iter(|| {
            pbc_diff_many(
                black_box(&positions),
                Some(black_box(&shifted)),
                Some(&pbc_box),
            )
        })
    });
}

fn bench_whole(c: &mut Criterion) {
    let pbc_box = OrthoBox::new([BOX_EDGE; 3]).unwrap();
    let mut group = c.benchmark_group("whole");
    for &n_waters in &[500, 3000] {
        let (positions, residue_ids, masses) = build_water_box(n_waters);
        group.bench_with_input(BenchmarkId::from_parameter(n_waters), &n_waters, |b, _| {
            b.iter(|| whole(black_box(&positions), &residue_ids, &masses, &pbc_box))
        });
    }
    group.finish();
}

fn bench_nojump(c: &mut Criterion) {
    let pbc_box = OrthoBox::new([BOX_EDGE; 3]).unwrap();
    let n_atoms = 3000;
    let n_steps = 2000;
    let jumps = build_jumps(n_steps, n_atoms, 37);
    let selection: Vec<usize> = (0..n_atoms).step_by(2).collect();

    let mut group = c.benchmark_group("nojump_sequential_scan");
    group.sample_size(10);

    group.bench_function("cached", |b| {
        b.iter(|| {
            let mut tracker =
                NoJumpTracker::with_cache(jumps.clone(), DEFAULT_NOJUMP_CACHE_SIZE).unwrap();
            for step in (0..n_steps).step_by(10) {
                black_box(tracker.correction(step, &selection, &pbc_box).unwrap());
            }
        })
    });

    group.bench_function("uncached", |b| {
        b.iter(|| {
            let mut tracker = NoJumpTracker::new(jumps.clone());
            for step in (0..n_steps).step_by(10) {
                black_box(tracker.correction(step, &selection, &pbc_box).unwrap());
            }
        })
    });

    group.finish();
}

fn bench_pbc_points(c: &mut Criterion) {
    let pbc_box = OrthoBox::new([BOX_EDGE; 3]).unwrap();
    let (positions, _, _) = build_water_box(3000);
    let mut group = c.benchmark_group("pbc_points");
    for &thickness in &[0.0, 2.5] {
        let options = TileOptions {
            thickness,
            ..TileOptions::default()
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(thickness),
            &options,
            |b, options| b.iter(|| pbc_points(black_box(&positions), &pbc_box, options)),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_pbc_diff,
    bench_whole,
    bench_nojump,
    bench_pbc_points
);
criterion_main!(benches);
