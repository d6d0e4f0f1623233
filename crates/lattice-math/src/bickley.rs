// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Bickley
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Bickley–Naylor function of order 3.
//!
//! Ki3(x) = ∫ over θ in (0, π/2) of sin²θ · exp(-x / sinθ) dθ, the
//! kernel of two-dimensional first-flight collision probabilities.
//! Evaluated from a fine-step table built once with Gauss–Legendre
//! quadrature and read with linear interpolation.

use crate::legendre::gauss_legendre_on;
use std::sync::OnceLock;

/// Optical depths past this evaluate to zero (Ki3(30) < 1e-14).
const TABLE_MAX: f64 = 30.0;

/// Table step; linear interpolation error stays below ~1.2e-8.
const TABLE_STEP: f64 = 2.5e-4;

/// Quadrature order used to fill the table.
const EVAL_POINTS: usize = 48;

static TABLE: OnceLock<Vec<f64>> = OnceLock::new();

fn eval(theta: &[f64], w: &[f64], x: f64) -> f64 {
    theta
        .iter()
        .zip(w)
        .map(|(&t, &wt)| {
            let s = t.sin();
            wt * s * s * (-x / s).exp()
        })
        .sum()
}

fn table() -> &'static [f64] {
    TABLE.get_or_init(|| {
        let (theta, w) = gauss_legendre_on(0.0, std::f64::consts::FRAC_PI_2, EVAL_POINTS);
        let len = (TABLE_MAX / TABLE_STEP).round() as usize + 1;
        (0..len)
            .map(|i| eval(&theta, &w, i as f64 * TABLE_STEP))
            .collect()
    })
}

/// Ki3 at optical depth `x >= 0`. Negative inputs clamp to zero depth.
pub fn ki3(x: f64) -> f64 {
    if x <= 0.0 {
        return std::f64::consts::FRAC_PI_4;
    }
    if x >= TABLE_MAX {
        return 0.0;
    }
    let tab = table();
    let pos = x / TABLE_STEP;
    let i = pos as usize;
    let f = pos - i as f64;
    (1.0 - f) * tab[i] + f * tab[i + 1]
}
