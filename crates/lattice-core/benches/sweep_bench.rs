// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Sweep Benchmarks
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use lattice_core::{Cartesian2D, Cell, MocDriver, SimplePinCell};
use lattice_math::polar::PolarQuadrature;
use lattice_types::config::{SolverSettings, TrackingSettings};
use lattice_types::xs::CrossSection;
use ndarray::array;
use std::hint::black_box;
use std::sync::Arc;

fn fuel() -> Arc<CrossSection> {
    Arc::new(
        CrossSection::new(
            array![0.4526487],
            array![0.06938952],
            array![[0.3832592]],
            array![0.03976306],
            array![2.5 * 0.03976306],
            array![1.0],
        )
        .unwrap(),
    )
}

fn water() -> Arc<CrossSection> {
    Arc::new(
        CrossSection::new(
            array![0.84155],
            array![0.003751],
            array![[0.83779]],
            array![0.0],
            array![0.0],
            array![0.0],
        )
        .unwrap(),
    )
}

fn pin_geometry() -> Cartesian2D {
    let cell = Cell::Simple(
        SimplePinCell::new(
            vec![0.2, 0.4, 0.5],
            vec![fuel(), fuel(), water(), water()],
            1.27,
            1.27,
        )
        .unwrap(),
    );
    Cartesian2D::new(&[1.27], &[1.27], vec![cell]).unwrap()
}

/// Track generation, segmentation and linking for a single pin cell.
fn bench_draw_tracks_64(c: &mut Criterion) {
    c.bench_function("draw_tracks_64_angles", |b| {
        b.iter(|| {
            let polar = PolarQuadrature::yamamoto_tabuchi(6).unwrap();
            let settings = TrackingSettings {
                n_angles: 64,
                track_spacing: 0.02,
                ..TrackingSettings::default()
            };
            let mut driver = MocDriver::new(pin_geometry(), polar, settings).unwrap();
            driver.draw_tracks().unwrap();
            black_box(driver.drawn());
        })
    });
}

/// A small eigenvalue solve with a loose budget; the driver is rebuilt
/// each iteration so boundary fluxes start from the same state.
fn bench_solve_32_angles(c: &mut Criterion) {
    c.bench_function("solve_keff_32_angles", |b| {
        b.iter(|| {
            let polar = PolarQuadrature::yamamoto_tabuchi(4).unwrap();
            let settings = TrackingSettings {
                n_angles: 32,
                track_spacing: 0.05,
                ..TrackingSettings::default()
            };
            let mut driver = MocDriver::new(pin_geometry(), polar, settings).unwrap();
            driver.draw_tracks().unwrap();
            let solver = SolverSettings {
                k_tolerance: 1.0e-3,
                flux_tolerance: 1.0e-3,
                max_iterations: 200,
            };
            let k = driver.solve_keff(black_box(&solver)).unwrap();
            black_box(k);
        })
    });
}

criterion_group!(sweep_benches, bench_draw_tracks_64, bench_solve_32_angles);
criterion_main!(sweep_benches);
