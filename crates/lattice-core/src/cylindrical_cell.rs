// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Cylindrical Cell
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! First-flight collision probabilities for concentric annuli.
//!
//! Chords at impact parameter y cross the rings symmetrically; pairing
//! the chord segments and integrating Bickley Ki3 differences over y
//! gives the volume-to-volume collision matrix. Reciprocity is enforced
//! by symmetrizing V_i Σ_i P_ij, and closure holds exactly because the
//! escape probability is stored as the complement of the row sum.
//!
//! Alongside P the solver keeps, per group, the surface-entry
//! first-collision probabilities X_i = 4 V_i Σ_i e_i / S and the
//! transmission Γ = 1 - Σ X_i consumed by the albedo boundary of the
//! flux solver.

use lattice_math::bickley::ki3;
use lattice_math::legendre::gauss_legendre_on;
use lattice_types::constants::KI3_ZERO;
use lattice_types::error::{LatticeError, LatticeResult};
use lattice_types::xs::CrossSection;
use ndarray::{Array1, Array2, Array3};
use rayon::prelude::*;
use std::sync::Arc;

/// Gauss–Legendre order per radial interval of the chord integration.
const POINTS_PER_INTERVAL: usize = 32;

pub struct CylindricalCell {
    radii: Vec<f64>,
    mats: Vec<Arc<CrossSection>>,
    volumes: Vec<f64>,
    ngroups: usize,
    /// Collision probabilities, `[G, N, N]`.
    p: Array3<f64>,
    /// Escape probabilities, `[G, N]`.
    escape: Array2<f64>,
    /// Surface-entry first-collision probabilities, `[G, N]`.
    x_entry: Array2<f64>,
    /// Uncollided transmission through the whole cell, `[G]`.
    gamma: Array1<f64>,
    solved: bool,
}

impl CylindricalCell {
    /// Ring `i` spans (radii\[i-1\], radii\[i\]) with radii\[-1\] = 0;
    /// one cross section per ring.
    pub fn new(radii: Vec<f64>, mats: Vec<Arc<CrossSection>>) -> LatticeResult<Self> {
        if radii.is_empty() {
            return Err(LatticeError::Config(
                "A cylindrical cell needs at least one ring".to_string(),
            ));
        }
        if mats.len() != radii.len() {
            return Err(LatticeError::Config(format!(
                "{} radii but {} materials",
                radii.len(),
                mats.len()
            )));
        }
        let mut prev = 0.0;
        for &r in &radii {
            if r <= prev {
                return Err(LatticeError::Config(
                    "Ring radii must be positive and strictly increasing".to_string(),
                ));
            }
            prev = r;
        }
        let ngroups = mats[0].ngroups();
        for (i, m) in mats.iter().enumerate() {
            if m.ngroups() != ngroups {
                return Err(LatticeError::Config(
                    "All ring materials must share the group structure".to_string(),
                ));
            }
            for g in 0..ngroups {
                if !(m.et(g) > 0.0) {
                    return Err(LatticeError::Config(format!(
                        "Ring {i} has a non-positive total cross section in group {g}"
                    )));
                }
            }
        }

        let mut volumes = Vec::with_capacity(radii.len());
        let mut r_in = 0.0;
        for &r in &radii {
            volumes.push(std::f64::consts::PI * (r * r - r_in * r_in));
            r_in = r;
        }

        let n = radii.len();
        Ok(CylindricalCell {
            radii,
            mats,
            volumes,
            ngroups,
            p: Array3::zeros((ngroups, n, n)),
            escape: Array2::zeros((ngroups, n)),
            x_entry: Array2::zeros((ngroups, n)),
            gamma: Array1::zeros(ngroups),
            solved: false,
        })
    }

    pub fn ngroups(&self) -> usize {
        self.ngroups
    }

    pub fn nrings(&self) -> usize {
        self.radii.len()
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn volume(&self, i: usize) -> f64 {
        self.volumes[i]
    }

    pub fn xs(&self, i: usize) -> &Arc<CrossSection> {
        &self.mats[i]
    }

    pub fn solved(&self) -> bool {
        self.solved
    }

    /// P_ij of group `g`: first collision in ring `j` for a neutron
    /// born uniformly and isotropically in ring `i`.
    pub fn p(&self, g: usize, i: usize, j: usize) -> f64 {
        self.p[[g, i, j]]
    }

    pub fn escape(&self, g: usize, i: usize) -> f64 {
        self.escape[[g, i]]
    }

    /// Probability that a neutron entering the outer surface
    /// (cosine-distributed) collides first in ring `i`.
    pub fn x_entry(&self, g: usize, i: usize) -> f64 {
        self.x_entry[[g, i]]
    }

    /// Uncollided transmission through the cell for group `g`.
    pub fn gamma(&self, g: usize) -> f64 {
        self.gamma[g]
    }

    /// Assemble the probability tables for every group. Groups are
    /// independent, so they run in parallel; per-group output order is
    /// fixed, so the result does not depend on thread count.
    pub fn solve(&mut self) -> LatticeResult<()> {
        let sigt: Vec<Vec<f64>> = (0..self.ngroups)
            .map(|g| self.mats.iter().map(|m| m.et(g)).collect())
            .collect();

        let cell: &CylindricalCell = self;
        let results: Vec<(Array2<f64>, Array1<f64>, Array1<f64>, f64)> = sigt
            .par_iter()
            .map(|sig| cell.assemble_group(sig))
            .collect();

        for (g, (p, escape, x_entry, gamma)) in results.into_iter().enumerate() {
            let n = self.nrings();
            for i in 0..n {
                for j in 0..n {
                    self.p[[g, i, j]] = p[[i, j]];
                }
                self.escape[[g, i]] = escape[i];
                self.x_entry[[g, i]] = x_entry[i];
            }
            self.gamma[g] = gamma;
        }
        self.solved = true;
        Ok(())
    }

    /// Chord-integrated collision matrix of one group.
    fn assemble_group(&self, sig: &[f64]) -> (Array2<f64>, Array1<f64>, Array1<f64>, f64) {
        let n = self.nrings();
        // c[i][j] accumulates V_i Σ_i P_ij.
        let mut c = Array2::<f64>::zeros((n, n));

        // Reusable per-chord scratch.
        let mut seg_region: Vec<usize> = Vec::with_capacity(2 * n);
        let mut seg_len: Vec<f64> = Vec::with_capacity(2 * n);
        let mut tau: Vec<f64> = Vec::with_capacity(2 * n + 1);

        for m0 in 0..n {
            // Impact parameters in (r_{m0-1}, r_m0), substituted as
            // y = r_m0 sin t so the tangent-point square root is smooth.
            let r_hi = self.radii[m0];
            let r_lo = if m0 == 0 { 0.0 } else { self.radii[m0 - 1] };
            let t_lo = (r_lo / r_hi).asin();
            let (t_nodes, t_wgts) =
                gauss_legendre_on(t_lo, std::f64::consts::FRAC_PI_2, POINTS_PER_INTERVAL);

            for (&t, &wt) in t_nodes.iter().zip(&t_wgts) {
                let y = r_hi * t.sin();
                let w = wt * r_hi * t.cos();

                // Half-chord crossings with every ring boundary.
                let x_of = |k: usize| -> f64 {
                    let r = self.radii[k];
                    if r > y {
                        (r * r - y * y).sqrt()
                    } else {
                        0.0
                    }
                };

                // Ordered segments along the chord direction.
                seg_region.clear();
                seg_len.clear();
                for k in (m0 + 1..n).rev() {
                    seg_region.push(k);
                    seg_len.push(x_of(k) - x_of(k - 1));
                }
                seg_region.push(m0);
                seg_len.push(2.0 * x_of(m0));
                for k in m0 + 1..n {
                    seg_region.push(k);
                    seg_len.push(x_of(k) - x_of(k - 1));
                }

                // Optical depth at every segment boundary.
                tau.clear();
                tau.push(0.0);
                for (s, &len) in seg_len.iter().enumerate() {
                    let t_prev = *tau.last().expect("seeded with zero");
                    tau.push(t_prev + sig[seg_region[s]] * len);
                }

                // Pairwise Bickley kernel, downstream pairs only.
                let ns = seg_region.len();
                for si in 0..ns {
                    let ri = seg_region[si];
                    let (tis, tie) = (tau[si], tau[si + 1]);

                    // Self term.
                    c[[ri, ri]] +=
                        w * (sig[ri] * seg_len[si] - KI3_ZERO + ki3(tie - tis));

                    for sj in si + 1..ns {
                        let rj = seg_region[sj];
                        let (tjs, tje) = (tau[sj], tau[sj + 1]);
                        let f = ki3(tjs - tie) - ki3(tjs - tis) - ki3(tje - tie)
                            + ki3(tje - tis);
                        c[[ri, rj]] += w * f;
                    }
                }
            }
        }

        // Both chord directions and the two signs of y.
        c.mapv_inplace(|v| 2.0 * v);

        // Reciprocity: V_i Σ_i P_ij is symmetric.
        for i in 0..n {
            for j in i + 1..n {
                let avg = 0.5 * (c[[i, j]] + c[[j, i]]);
                c[[i, j]] = avg;
                c[[j, i]] = avg;
            }
        }

        let mut p = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            let denom = self.volumes[i] * sig[i];
            for j in 0..n {
                p[[i, j]] = c[[i, j]] / denom;
            }
        }

        // Closure: the escape probability is the exact complement.
        let mut escape = Array1::<f64>::zeros(n);
        for i in 0..n {
            escape[i] = 1.0 - p.row(i).sum();
        }

        // Surface reciprocity and transmission.
        let surface = 2.0 * std::f64::consts::PI * self.radii[n - 1];
        let mut x_entry = Array1::<f64>::zeros(n);
        for i in 0..n {
            x_entry[i] = 4.0 * self.volumes[i] * sig[i] * escape[i] / surface;
        }
        let gamma = 1.0 - x_entry.sum();

        (p, escape, x_entry, gamma)
    }
}
