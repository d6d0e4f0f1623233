// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Cross Section
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Multi-group macroscopic cross-section container.
//!
//! Holds Σt, Σa, Σs(g→g'), optional Σs1, Σf, νΣf and χ for G energy
//! groups, with the algebra needed to build materials (sum, density
//! scaling) and to collapse onto a coarser group structure (condense).

use crate::error::{LatticeError, LatticeResult};
use ndarray::{Array1, Array2};

/// Negative values larger than this (from interpolation round-off) are
/// clamped to zero; anything more negative is rejected.
const NEGATIVE_XS_TOL: f64 = 1.0e-10;

/// Tolerance on the fission-spectrum normalization.
const CHI_NORM_TOL: f64 = 1.0e-10;

#[derive(Debug, Clone)]
pub struct CrossSection {
    et: Array1<f64>,
    ea: Array1<f64>,
    es: Array2<f64>,
    es1: Option<Array2<f64>>,
    ef: Array1<f64>,
    nu_ef: Array1<f64>,
    chi: Array1<f64>,
    fissile: bool,
}

impl CrossSection {
    /// Build a container without a P1 scattering matrix.
    pub fn new(
        et: Array1<f64>,
        ea: Array1<f64>,
        es: Array2<f64>,
        ef: Array1<f64>,
        nu_ef: Array1<f64>,
        chi: Array1<f64>,
    ) -> LatticeResult<Self> {
        Self::build(et, ea, es, None, ef, nu_ef, chi)
    }

    /// Build a container carrying a P1 scattering matrix.
    pub fn with_p1(
        et: Array1<f64>,
        ea: Array1<f64>,
        es: Array2<f64>,
        es1: Array2<f64>,
        ef: Array1<f64>,
        nu_ef: Array1<f64>,
        chi: Array1<f64>,
    ) -> LatticeResult<Self> {
        Self::build(et, ea, es, Some(es1), ef, nu_ef, chi)
    }

    fn build(
        et: Array1<f64>,
        mut ea: Array1<f64>,
        mut es: Array2<f64>,
        es1: Option<Array2<f64>>,
        ef: Array1<f64>,
        nu_ef: Array1<f64>,
        mut chi: Array1<f64>,
    ) -> LatticeResult<Self> {
        let ng = et.len();
        if ng == 0 {
            return Err(LatticeError::Config(
                "Cross section needs at least one group".to_string(),
            ));
        }
        if ea.len() != ng || ef.len() != ng || nu_ef.len() != ng || chi.len() != ng {
            return Err(LatticeError::Config(format!(
                "Group-count mismatch in cross-section vectors (expected {ng})"
            )));
        }
        if es.dim() != (ng, ng) {
            return Err(LatticeError::Config(format!(
                "Scatter matrix must be {ng}x{ng}, got {:?}",
                es.dim()
            )));
        }
        if let Some(m) = &es1 {
            if m.dim() != (ng, ng) {
                return Err(LatticeError::Config(format!(
                    "P1 scatter matrix must be {ng}x{ng}, got {:?}",
                    m.dim()
                )));
            }
        }

        clamp_non_negative(&mut ea, "absorption")?;
        for mut row in es.rows_mut() {
            for v in row.iter_mut() {
                if *v < 0.0 {
                    if *v < -NEGATIVE_XS_TOL {
                        return Err(LatticeError::Config(format!(
                            "Negative scatter cross section {v}"
                        )));
                    }
                    *v = 0.0;
                }
            }
        }
        clamp_non_negative(&mut chi, "fission spectrum")?;

        let fissile = nu_ef.iter().any(|&v| v > 0.0);
        if fissile {
            let chi_sum = chi.sum();
            if chi_sum <= 0.0 {
                return Err(LatticeError::Config(
                    "Fissile cross section with an empty fission spectrum".to_string(),
                ));
            }
            if (chi_sum - 1.0).abs() > CHI_NORM_TOL {
                chi.mapv_inplace(|v| v / chi_sum);
            }
        }

        Ok(CrossSection {
            et,
            ea,
            es,
            es1,
            ef,
            nu_ef,
            chi,
            fissile,
        })
    }

    pub fn ngroups(&self) -> usize {
        self.et.len()
    }

    pub fn fissile(&self) -> bool {
        self.fissile
    }

    pub fn has_p1(&self) -> bool {
        self.es1.is_some()
    }

    pub fn et(&self, g: usize) -> f64 {
        self.et[g]
    }

    pub fn ea(&self, g: usize) -> f64 {
        self.ea[g]
    }

    /// Σs(g → g_out).
    pub fn es(&self, g: usize, g_out: usize) -> f64 {
        self.es[[g, g_out]]
    }

    /// Σs1(g → g_out); zero when no P1 matrix is carried.
    pub fn es1(&self, g: usize, g_out: usize) -> f64 {
        match &self.es1 {
            Some(m) => m[[g, g_out]],
            None => 0.0,
        }
    }

    pub fn ef(&self, g: usize) -> f64 {
        self.ef[g]
    }

    pub fn nu_ef(&self, g: usize) -> f64 {
        self.nu_ef[g]
    }

    pub fn chi(&self, g: usize) -> f64 {
        self.chi[g]
    }

    /// Total out-scatter from group g.
    pub fn es_out(&self, g: usize) -> f64 {
        self.es.row(g).sum()
    }

    /// Sum with another container of the same group structure.
    ///
    /// χ of the result is the νΣf-production-weighted average of the two
    /// spectra, renormalized.
    pub fn add(&self, other: &CrossSection) -> LatticeResult<CrossSection> {
        let ng = self.ngroups();
        if other.ngroups() != ng {
            return Err(LatticeError::Config(format!(
                "Cannot sum cross sections with {} and {} groups",
                ng,
                other.ngroups()
            )));
        }

        let et = &self.et + &other.et;
        let ea = &self.ea + &other.ea;
        let es = &self.es + &other.es;
        let ef = &self.ef + &other.ef;
        let nu_ef = &self.nu_ef + &other.nu_ef;

        let es1 = match (&self.es1, &other.es1) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) => Some(a + b),
        };

        let w_a = self.nu_ef.sum();
        let w_b = other.nu_ef.sum();
        let chi = if w_a + w_b > 0.0 {
            (&self.chi * w_a + &other.chi * w_b) / (w_a + w_b)
        } else {
            Array1::zeros(ng)
        };

        match es1 {
            Some(m) => CrossSection::with_p1(et, ea, es, m, ef, nu_ef, chi),
            None => CrossSection::new(et, ea, es, ef, nu_ef, chi),
        }
    }

    /// Scale by a non-negative factor (atom-density scaling, barns to
    /// 1/cm). χ is a distribution and is left untouched.
    pub fn scale(&self, factor: f64) -> LatticeResult<CrossSection> {
        if !(factor >= 0.0) {
            return Err(LatticeError::Config(format!(
                "Scale factor must be non-negative, got {factor}"
            )));
        }
        let es1 = self.es1.as_ref().map(|m| m * factor);
        let et = &self.et * factor;
        let ea = &self.ea * factor;
        let es = &self.es * factor;
        let ef = &self.ef * factor;
        let nu_ef = &self.nu_ef * factor;
        match es1 {
            Some(m) => CrossSection::with_p1(et, ea, es, m, ef, nu_ef, self.chi.clone()),
            None => CrossSection::new(et, ea, es, ef, nu_ef, self.chi.clone()),
        }
    }

    /// Collapse onto a coarse group structure.
    ///
    /// `groups` lists the inclusive fine-group range of each coarse
    /// group, in order and covering 0..G without gaps. Cross sections
    /// are flux-weighted; χ condenses by summation.
    pub fn condense(
        &self,
        flux: &Array1<f64>,
        groups: &[(usize, usize)],
    ) -> LatticeResult<CrossSection> {
        let ng = self.ngroups();
        if flux.len() != ng {
            return Err(LatticeError::Config(format!(
                "Condensation spectrum has {} groups, expected {ng}",
                flux.len()
            )));
        }
        let nc = groups.len();
        if nc == 0 {
            return Err(LatticeError::Config(
                "Condensation needs at least one coarse group".to_string(),
            ));
        }
        let mut expect = 0usize;
        for &(lo, hi) in groups {
            if lo != expect || hi < lo || hi >= ng {
                return Err(LatticeError::Config(format!(
                    "Coarse group ({lo}, {hi}) does not tile the fine structure"
                )));
            }
            expect = hi + 1;
        }
        if expect != ng {
            return Err(LatticeError::Config(
                "Coarse groups do not cover every fine group".to_string(),
            ));
        }

        let mut et = Array1::zeros(nc);
        let mut ea = Array1::zeros(nc);
        let mut es = Array2::zeros((nc, nc));
        let mut es1 = self.es1.as_ref().map(|_| Array2::zeros((nc, nc)));
        let mut ef = Array1::zeros(nc);
        let mut nu_ef = Array1::zeros(nc);
        let mut chi = Array1::zeros(nc);

        for (gc, &(lo, hi)) in groups.iter().enumerate() {
            let mut w = 0.0;
            for g in lo..=hi {
                let f = flux[g];
                w += f;
                et[gc] += f * self.et(g);
                ea[gc] += f * self.ea(g);
                ef[gc] += f * self.ef(g);
                nu_ef[gc] += f * self.nu_ef(g);
                chi[gc] += self.chi(g);
                for (gc_out, &(lo_o, hi_o)) in groups.iter().enumerate() {
                    let mut s = 0.0;
                    let mut s1 = 0.0;
                    for g_out in lo_o..=hi_o {
                        s += self.es(g, g_out);
                        s1 += self.es1(g, g_out);
                    }
                    es[[gc, gc_out]] += f * s;
                    if let Some(m) = &mut es1 {
                        m[[gc, gc_out]] += f * s1;
                    }
                }
            }
            if w <= 0.0 {
                return Err(LatticeError::Config(format!(
                    "Zero condensation flux in coarse group {gc}"
                )));
            }
            et[gc] /= w;
            ea[gc] /= w;
            ef[gc] /= w;
            nu_ef[gc] /= w;
            for gc_out in 0..nc {
                es[[gc, gc_out]] /= w;
                if let Some(m) = &mut es1 {
                    m[[gc, gc_out]] /= w;
                }
            }
        }

        match es1 {
            Some(m) => CrossSection::with_p1(et, ea, es, m, ef, nu_ef, chi),
            None => CrossSection::new(et, ea, es, ef, nu_ef, chi),
        }
    }
}

fn clamp_non_negative(v: &mut Array1<f64>, what: &str) -> LatticeResult<()> {
    for x in v.iter_mut() {
        if *x < 0.0 {
            if *x < -NEGATIVE_XS_TOL {
                return Err(LatticeError::Config(format!(
                    "Negative {what} cross section {x}"
                )));
            }
            *x = 0.0;
        }
    }
    Ok(())
}
