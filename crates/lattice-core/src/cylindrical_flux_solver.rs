// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Cylindrical Flux Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Multi-group flux and k-eigenvalue from a collision-probability
//! matrix with an albedo outer boundary.
//!
//! Escaping neutrons return isotropically with probability α; summing
//! the repeated surface bounces gives the effective probabilities
//! P̃_ij = P_ij + α e_i X_j / (1 - α Γ). With α = 1 the cell conserves
//! every neutron and the iteration converges to k-infinity.

use crate::cylindrical_cell::CylindricalCell;
use lattice_types::config::SolverSettings;
use lattice_types::error::{LatticeError, LatticeResult};
use log::{info, warn};
use ndarray::{Array2, Array3};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct CylindricalFluxSolver {
    cell: CylindricalCell,
    albedo: f64,
    /// Scalar flux, `[N, G]`.
    flux: Array2<f64>,
    keff: f64,
    solved: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl CylindricalFluxSolver {
    /// Takes ownership of the cell, solving its probability tables
    /// first if that has not happened yet. `albedo` is the reflected
    /// fraction of the outward partial current (0 vacuum, 1 white).
    pub fn new(mut cell: CylindricalCell, albedo: f64) -> LatticeResult<Self> {
        if !(0.0..=1.0).contains(&albedo) {
            return Err(LatticeError::Config(format!(
                "Albedo must lie in [0, 1], got {albedo}"
            )));
        }
        if !cell.solved() {
            cell.solve()?;
        }
        let n = cell.nrings();
        let ng = cell.ngroups();
        Ok(CylindricalFluxSolver {
            cell,
            albedo,
            flux: Array2::ones((n, ng)),
            keff: 1.0,
            solved: false,
            cancel: None,
        })
    }

    /// Install a flag checked between iterations; raising it aborts the
    /// solve.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    pub fn keff(&self) -> f64 {
        self.keff
    }

    pub fn albedo(&self) -> f64 {
        self.albedo
    }

    pub fn cell(&self) -> &CylindricalCell {
        &self.cell
    }

    /// Scalar flux of ring `i`, group `g`, from the latest solve.
    pub fn flux(&self, i: usize, g: usize) -> f64 {
        self.flux[[i, g]]
    }

    /// Power iteration on the fission source.
    pub fn solve(&mut self, settings: &SolverSettings) -> LatticeResult<f64> {
        settings.validate()?;
        let n = self.cell.nrings();
        let ng = self.cell.ngroups();

        let fissile =
            (0..n).any(|i| (0..ng).any(|g| self.cell.xs(i).nu_ef(g) > 0.0));
        if !fissile {
            return Err(LatticeError::Config(
                "The cell holds no fissile material".to_string(),
            ));
        }

        // Effective transfer with the boundary return folded in:
        // ptilde[g][[j, i]] takes emission in j to first collision in i.
        let mut ptilde = Array3::<f64>::zeros((ng, n, n));
        for g in 0..ng {
            let bounce = self.albedo / (1.0 - self.albedo * self.cell.gamma(g));
            for j in 0..n {
                for i in 0..n {
                    ptilde[[g, j, i]] = self.cell.p(g, j, i)
                        + bounce * self.cell.escape(g, j) * self.cell.x_entry(g, i);
                }
            }
        }

        if !self.solved {
            self.keff = 1.0;
            self.flux.fill(1.0);
        }

        let mut negative_last_iter = false;
        for outer in 1..=settings.max_iterations {
            if self.cancelled() {
                return Err(LatticeError::Numerical {
                    iteration: outer,
                    message: "Solve cancelled".to_string(),
                });
            }
            let old_flux = self.flux.clone();
            let old_production = self.production(&old_flux);
            if !(old_production > 0.0) {
                return Err(LatticeError::Numerical {
                    iteration: outer,
                    message: format!("Fission production collapsed to {old_production}"),
                });
            }

            // Total isotropic emission density per ring and group.
            let mut source = Array2::<f64>::zeros((n, ng));
            for j in 0..n {
                let xs = self.cell.xs(j);
                let mut fission_rate = 0.0;
                for gp in 0..ng {
                    fission_rate += xs.nu_ef(gp) * old_flux[[j, gp]];
                }
                for g in 0..ng {
                    let mut scatter = 0.0;
                    for gp in 0..ng {
                        scatter += xs.es(gp, g) * old_flux[[j, gp]];
                    }
                    source[[j, g]] = xs.chi(g) * fission_rate / self.keff + scatter;
                }
            }

            // Collision balance: φ_i Σ_i V_i = Σ_j V_j Q_j P̃_ji.
            for i in 0..n {
                let xs_i = self.cell.xs(i);
                for g in 0..ng {
                    let mut collisions = 0.0;
                    for j in 0..n {
                        collisions +=
                            self.cell.volume(j) * source[[j, g]] * ptilde[[g, j, i]];
                    }
                    self.flux[[i, g]] =
                        collisions / (self.cell.volume(i) * xs_i.et(g));
                }
            }

            let new_production = self.production(&self.flux);
            let keff_new = self.keff * new_production / old_production;
            if !keff_new.is_finite() {
                return Err(LatticeError::Numerical {
                    iteration: outer,
                    message: format!("k became non-finite ({keff_new})"),
                });
            }

            let negative_now = self.flux.iter().any(|&v| v < 0.0);
            if negative_now {
                if negative_last_iter {
                    return Err(LatticeError::Numerical {
                        iteration: outer,
                        message: "Negative flux persisted across iterations".to_string(),
                    });
                }
                warn!("Negative flux at iteration {outer}; continuing");
            }
            negative_last_iter = negative_now;

            let dk = (keff_new - self.keff).abs() / keff_new.abs();
            self.keff = keff_new;

            let mut dphi: f64 = 0.0;
            for (new, old) in self.flux.iter().zip(old_flux.iter()) {
                if new.abs() > 0.0 {
                    dphi = dphi.max(((new - old) / new).abs());
                }
            }

            if dk < settings.k_tolerance && dphi < settings.flux_tolerance {
                self.solved = true;
                info!("Converged after {outer} iterations: k = {:.6}", self.keff);
                return Ok(self.keff);
            }
        }

        Err(LatticeError::Numerical {
            iteration: settings.max_iterations,
            message: format!(
                "Eigenvalue not converged after {} iterations",
                settings.max_iterations
            ),
        })
    }

    fn production(&self, flux: &Array2<f64>) -> f64 {
        let n = self.cell.nrings();
        let ng = self.cell.ngroups();
        let mut total = 0.0;
        for i in 0..n {
            let xs = self.cell.xs(i);
            let mut rate = 0.0;
            for g in 0..ng {
                rate += xs.nu_ef(g) * flux[[i, g]];
            }
            total += self.cell.volume(i) * rate;
        }
        total
    }
}
