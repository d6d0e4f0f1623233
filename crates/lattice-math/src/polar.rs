// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Polar Quadrature
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Polar quadrature sets for the characteristic sweep.
//!
//! The abscissae are sinθ values over one polar hemisphere, the weights
//! sum to one. The Yamamoto–Tabuchi sets minimize the approximation
//! error of the Bickley function Ki3 by
//! Σ_p w_p sinθ_p (1 - exp(-τ/sinθ_p)); the Legendre sets are Gauss
//! quadrature on the polar cosine.

use crate::legendre::gauss_legendre_on;
use lattice_types::error::{LatticeError, LatticeResult};

// Yamamoto–Tabuchi optimal sets, indexed by total polar order N.
const YT2_SIN: [f64; 1] = [0.798184];
const YT2_WGT: [f64; 1] = [1.000000];
const YT4_SIN: [f64; 2] = [0.363900, 0.899900];
const YT4_WGT: [f64; 2] = [0.212854, 0.787146];
const YT6_SIN: [f64; 3] = [0.166648, 0.537707, 0.932954];
const YT6_WGT: [f64; 3] = [0.046233, 0.283619, 0.670148];

#[derive(Debug, Clone)]
pub struct PolarQuadrature {
    sin_thetas: Vec<f64>,
    weights: Vec<f64>,
}

impl PolarQuadrature {
    /// Yamamoto–Tabuchi set of total order `n` (2, 4 or 6 polar angles
    /// over the sphere; n/2 abscissae per hemisphere).
    pub fn yamamoto_tabuchi(n: usize) -> LatticeResult<Self> {
        let (s, w): (&[f64], &[f64]) = match n {
            2 => (&YT2_SIN, &YT2_WGT),
            4 => (&YT4_SIN, &YT4_WGT),
            6 => (&YT6_SIN, &YT6_WGT),
            _ => {
                return Err(LatticeError::Config(format!(
                    "Yamamoto–Tabuchi quadrature exists for orders 2, 4 and 6, got {n}"
                )));
            }
        };
        Ok(PolarQuadrature {
            sin_thetas: s.to_vec(),
            weights: w.to_vec(),
        })
    }

    /// Gauss–Legendre quadrature on the polar cosine μ in (0, 1), for
    /// any even total order `n`.
    pub fn gauss_legendre(n: usize) -> LatticeResult<Self> {
        if n == 0 || n % 2 != 0 {
            return Err(LatticeError::Config(format!(
                "Legendre polar quadrature needs a positive even order, got {n}"
            )));
        }
        let (mu, weights) = gauss_legendre_on(0.0, 1.0, n / 2);
        let sin_thetas = mu.iter().map(|&m| (1.0 - m * m).sqrt()).collect();
        Ok(PolarQuadrature {
            sin_thetas,
            weights,
        })
    }

    pub fn n_polar(&self) -> usize {
        self.sin_thetas.len()
    }

    pub fn sin_theta(&self, p: usize) -> f64 {
        self.sin_thetas[p]
    }

    pub fn weight(&self, p: usize) -> f64 {
        self.weights[p]
    }

    pub fn sin_thetas(&self) -> &[f64] {
        &self.sin_thetas
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}
