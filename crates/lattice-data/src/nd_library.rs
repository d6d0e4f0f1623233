// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — ND Library
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Tabulated multi-group nuclear-data library.
//!
//! The library is a read-only store keyed by nuclide name. Per-nuclide
//! metadata is read eagerly; the tabulated datasets (absorption,
//! scatter, p1-scatter, and for fissile nuclides fission/nu/chi) are
//! materialized lazily on first use and can be dropped again with
//! [`NdLibrary::unload`].
//!
//! Effective cross sections come out of three paths: plain
//! temperature/dilution interpolation, the two-term rational (Carlvik)
//! approximation, and its four-lump spatial variant for annular
//! subdivisions of a fuel pin.

use lattice_types::error::{LatticeError, LatticeResult};
use lattice_types::xs::CrossSection;
use log::{error, info};
use ndarray::{Array1, Array2, Array3, Array4};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Background dilution assigned to a lump with zero mean chord (barns).
const EMPTY_LUMP_DILUTION: f64 = 1.0e10;

/// Tabulated datasets of one nuclide, in barns.
#[derive(Debug, Clone)]
pub struct NuclideData {
    /// Absorption, `[T, D, G]`.
    pub absorption: Array3<f64>,
    /// P0 scatter transfer, `[T, D, G, G]`.
    pub scatter: Array4<f64>,
    /// P1 scatter transfer, `[T, D, G, G]`.
    pub p1_scatter: Array4<f64>,
    /// Fission, `[T, D, G]`; fissile nuclides only.
    pub fission: Option<Array3<f64>>,
    /// Neutrons per fission, `[T, G]`; fissile nuclides only.
    pub nu: Option<Array2<f64>>,
    /// Fission spectrum, `[T, G]`; fissile nuclides only.
    pub chi: Option<Array2<f64>>,
}

/// Metadata and (possibly unloaded) datasets of one nuclide.
#[derive(Debug, Clone)]
pub struct NuclideHandle {
    pub name: String,
    pub label: String,
    pub temperatures: Vec<f64>,
    pub dilutions: Vec<f64>,
    pub awr: f64,
    pub potential_xs: f64,
    pub za: u32,
    pub fissile: bool,
    pub resonant: bool,
    data: Option<NuclideData>,
}

impl NuclideHandle {
    /// Metadata-only handle; datasets attach through
    /// [`NdLibrary::add_nuclide`] or lazy file loading.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        label: &str,
        temperatures: Vec<f64>,
        dilutions: Vec<f64>,
        awr: f64,
        potential_xs: f64,
        za: u32,
        fissile: bool,
        resonant: bool,
    ) -> Self {
        NuclideHandle {
            name: name.to_string(),
            label: label.to_string(),
            temperatures,
            dilutions,
            awr,
            potential_xs,
            za,
            fissile,
            resonant,
            data: None,
        }
    }

    pub fn loaded(&self) -> bool {
        self.data.is_some()
    }

    pub fn unload(&mut self) {
        self.data = None;
    }

    fn data(&self) -> &NuclideData {
        self.data
            .as_ref()
            .expect("nuclide datasets must be loaded before interpolation")
    }
}

#[derive(Debug)]
pub struct NdLibrary {
    handles: BTreeMap<String, NuclideHandle>,
    library: String,
    group_structure: String,
    group_bounds: Vec<f64>,
    ngroups: usize,
    path: Option<PathBuf>,
}

impl NdLibrary {
    /// Empty in-memory library, for programmatic construction.
    pub fn new(
        library: &str,
        group_structure: &str,
        group_bounds: Vec<f64>,
        ngroups: usize,
    ) -> LatticeResult<Self> {
        if ngroups == 0 {
            return Err(LatticeError::Config(
                "Library needs at least one group".to_string(),
            ));
        }
        if group_bounds.len() != ngroups + 1 {
            return Err(LatticeError::Config(format!(
                "Group bounds must have {} entries, got {}",
                ngroups + 1,
                group_bounds.len()
            )));
        }
        Ok(NdLibrary {
            handles: BTreeMap::new(),
            library: library.to_string(),
            group_structure: group_structure.to_string(),
            group_bounds,
            ngroups,
            path: None,
        })
    }

    /// Open a library file. Metadata for every nuclide is read now;
    /// datasets materialize on first use.
    pub fn from_file<P: AsRef<Path>>(path: P) -> LatticeResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            error!("Could not read nuclear-data file {}", path.display());
            LatticeError::Io(e)
        })?;
        let file: LibraryFile = serde_json::from_str(&contents)?;

        let mut lib = NdLibrary::new(
            &file.library,
            &file.group_structure,
            file.group_bounds,
            file.ngroups,
        )?;
        lib.path = Some(path.to_path_buf());

        for (name, entry) in &file.nuclides {
            let handle = NuclideHandle {
                name: name.clone(),
                label: entry.label.clone(),
                temperatures: entry.temperatures.clone(),
                dilutions: entry.dilutions.clone(),
                awr: entry.awr,
                potential_xs: entry.potential_xs,
                za: entry.za,
                fissile: entry.fissile,
                resonant: entry.resonant,
                data: None,
            };
            lib.insert_handle(handle)?;
        }

        info!(
            "Opened nuclear-data library \"{}\" ({} groups, {} nuclides)",
            lib.library,
            lib.ngroups,
            lib.handles.len()
        );
        Ok(lib)
    }

    /// Register an in-memory nuclide with its datasets attached.
    pub fn add_nuclide(&mut self, handle: NuclideHandle, data: NuclideData) -> LatticeResult<()> {
        validate_data(&handle, &data, self.ngroups)?;
        let mut handle = handle;
        handle.data = Some(data);
        self.insert_handle(handle)
    }

    fn insert_handle(&mut self, handle: NuclideHandle) -> LatticeResult<()> {
        if handle.temperatures.is_empty() || handle.dilutions.is_empty() {
            return Err(LatticeError::Config(format!(
                "Nuclide \"{}\" needs at least one temperature and one dilution",
                handle.name
            )));
        }
        self.handles.insert(handle.name.clone(), handle);
        Ok(())
    }

    pub fn ngroups(&self) -> usize {
        self.ngroups
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn group_structure(&self) -> &str {
        &self.group_structure
    }

    /// Group boundaries in eV, decreasing.
    pub fn group_bounds(&self) -> &[f64] {
        &self.group_bounds
    }

    pub fn get_nuclide(&self, name: &str) -> LatticeResult<&NuclideHandle> {
        self.handles.get(name).ok_or_else(|| {
            error!("Could not find nuclide by name of \"{name}\"");
            LatticeError::Config(format!("Could not find nuclide by name of \"{name}\""))
        })
    }

    /// Drop every nuclide's datasets, keeping metadata.
    pub fn unload(&mut self) {
        for handle in self.handles.values_mut() {
            handle.unload();
        }
    }

    fn ensure_loaded(&mut self, name: &str) -> LatticeResult<()> {
        if self.get_nuclide(name)?.loaded() {
            return Ok(());
        }
        let path = self.path.clone().ok_or_else(|| {
            LatticeError::Config(format!(
                "Nuclide \"{name}\" is unloaded and the library has no backing file"
            ))
        })?;

        info!("Loading datasets for nuclide \"{name}\"");
        let contents = std::fs::read_to_string(&path)?;
        let file: LibraryFile = serde_json::from_str(&contents)?;
        let entry = file.nuclides.get(name).ok_or_else(|| {
            LatticeError::Config(format!(
                "Backing file {} no longer contains nuclide \"{name}\"",
                path.display()
            ))
        })?;

        let handle = self.handles.get(name).expect("handle checked above");
        let data = entry.to_data(handle, self.ngroups)?;
        self.handles.get_mut(name).expect("handle checked above").data = Some(data);
        Ok(())
    }

    /// Effective cross section at temperature `temp` (K) and background
    /// dilution `dil` (barns), by √T / linear-dilution bilinear
    /// interpolation of the tabulated datasets.
    pub fn interp_xs(&mut self, name: &str, temp: f64, dil: f64) -> LatticeResult<CrossSection> {
        self.ensure_loaded(name)?;
        let nuc = self.get_nuclide(name)?;
        let (it, f_temp) = temp_interp_params(&nuc.temperatures, temp);
        let (id, f_dil) = dil_interp_params(&nuc.dilutions, dil);
        let data = nuc.data();
        let ng = self.ngroups;

        let ea = interp_td_1d(&data.absorption, it, f_temp, id, f_dil);
        let mut es = interp_td_2d(&data.scatter, it, f_temp, id, f_dil);
        let es1 = interp_td_2d(&data.p1_scatter, it, f_temp, id, f_dil);

        let mut ef = Array1::zeros(ng);
        let mut nu = Array1::zeros(ng);
        let mut chi = Array1::zeros(ng);
        if nuc.fissile {
            ef = interp_td_1d(data.fission.as_ref().expect("validated"), it, f_temp, id, f_dil);
            nu = interp_t_1d(data.nu.as_ref().expect("validated"), it, f_temp);
            chi = interp_t_1d(data.chi.as_ref().expect("validated"), it, f_temp);
        }

        // Reconstruct the transport-corrected total and remove the P1
        // diagonal from the in-group transfer.
        let mut et = Array1::zeros(ng);
        for g in 0..ng {
            et[g] = ea[g] + es.row(g).sum() - es1[[g, g]];
            es[[g, g]] -= es1[[g, g]];
        }

        let nu_ef = &nu * &ef;
        CrossSection::with_p1(et, ea, es, es1, ef, nu_ef, chi)
    }

    /// Two-term rational (Carlvik) self-shielded cross section.
    ///
    /// `b1`, `b2` are the rational weights and `bg_xs_1`, `bg_xs_2` the
    /// two background dilutions (barns).
    pub fn two_term_xs(
        &mut self,
        name: &str,
        temp: f64,
        b1: f64,
        b2: f64,
        bg_xs_1: f64,
        bg_xs_2: f64,
    ) -> LatticeResult<CrossSection> {
        let xs_1 = self.interp_xs(name, temp, bg_xs_1)?;
        let xs_2 = self.interp_xs(name, temp, bg_xs_2)?;
        let pot_xs = self.get_nuclide(name)?.potential_xs;
        let ng = self.ngroups;

        let mut et = Array1::zeros(ng);
        let mut ea = Array1::zeros(ng);
        let mut es = Array2::zeros((ng, ng));
        let mut es1 = Array2::zeros((ng, ng));
        let mut ef = Array1::zeros(ng);
        let mut nu_ef = Array1::zeros(ng);
        let mut chi = Array1::zeros(ng);

        let mut nu_ef_sum_1 = 0.0;
        let mut nu_ef_sum_2 = 0.0;
        for g in 0..ng {
            // Narrow-resonance flux of each term in this group.
            let flux_1_g = (pot_xs + bg_xs_1) / (xs_1.ea(g) + pot_xs + bg_xs_1);
            let flux_2_g = (pot_xs + bg_xs_2) / (xs_2.ea(g) + pot_xs + bg_xs_2);

            let f1_g = b1 * flux_1_g / (b1 * flux_1_g + b2 * flux_2_g);
            let f2_g = b2 * flux_2_g / (b1 * flux_1_g + b2 * flux_2_g);

            ea[g] = f1_g * xs_1.ea(g) + f2_g * xs_2.ea(g);
            ef[g] = f1_g * xs_1.ef(g) + f2_g * xs_2.ef(g);
            for g_out in 0..ng {
                es[[g, g_out]] = f1_g * xs_1.es(g, g_out) + f2_g * xs_2.es(g, g_out);
                es1[[g, g_out]] = f1_g * xs_1.es1(g, g_out) + f2_g * xs_2.es1(g, g_out);
            }
            et[g] = ea[g] + es.row(g).sum();

            let nu_ef_1 = f1_g * xs_1.nu_ef(g);
            let nu_ef_2 = f2_g * xs_2.nu_ef(g);
            nu_ef[g] = nu_ef_1 + nu_ef_2;
            nu_ef_sum_1 += nu_ef_1;
            nu_ef_sum_2 += nu_ef_2;
        }

        // χ averaged with weights proportional to each term's production.
        if nu_ef_sum_1 + nu_ef_sum_2 > 0.0 {
            for g in 0..ng {
                chi[g] = (nu_ef_sum_1 * xs_1.chi(g) + nu_ef_sum_2 * xs_2.chi(g))
                    / (nu_ef_sum_1 + nu_ef_sum_2);
            }
        }

        CrossSection::with_p1(et, ea, es, es1, ef, nu_ef, chi)
    }

    /// Four-lump spatial two-term self-shielding for an annular ring
    /// (`r_in`, `r_out`) of a fuel region of radius `r_fuel`.
    ///
    /// `mat_pot_xs` is the macroscopic potential cross section of the
    /// fuel material (1/cm) and `n_dens` the atom density of this
    /// nuclide (atoms/b·cm).
    #[allow(clippy::too_many_arguments)]
    pub fn ring_two_term_xs(
        &mut self,
        name: &str,
        temp: f64,
        a1: f64,
        a2: f64,
        b1: f64,
        b2: f64,
        mat_pot_xs: f64,
        n_dens: f64,
        r_fuel: f64,
        r_in: f64,
        r_out: f64,
    ) -> LatticeResult<CrossSection> {
        if r_in >= r_out {
            error!("Rin must be < Rout");
            return Err(LatticeError::Config("Rin must be < Rout".to_string()));
        }
        if r_out > r_fuel {
            error!("Rout must be <= Rfuel");
            return Err(LatticeError::Config("Rout must be <= Rfuel".to_string()));
        }

        let pot_xs = self.get_nuclide(name)?.potential_xs;
        let macro_pot_xs = n_dens * pot_xs;
        let ng = self.ngroups;

        let mut et = Array1::zeros(ng);
        let mut ea = Array1::zeros(ng);
        let mut es = Array2::zeros((ng, ng));
        let mut es1 = Array2::zeros((ng, ng));
        let mut ef = Array1::zeros(ng);
        let mut nu_ef = Array1::zeros(ng);
        let mut chi = Array1::zeros(ng);

        // Per-group denominators of the lump-weighted flux average.
        let mut denoms = Array1::<f64>::zeros(ng);

        for m in 1..=4 {
            let (eta_m, l_m) = eta_lm(m, r_fuel, r_in, r_out)?;

            let bg_xs_1 = if l_m > 0.0 {
                (mat_pot_xs - macro_pot_xs + a1 / l_m) / n_dens
            } else {
                EMPTY_LUMP_DILUTION
            };
            let bg_xs_2 = if l_m > 0.0 {
                (mat_pot_xs - macro_pot_xs + a2 / l_m) / n_dens
            } else {
                EMPTY_LUMP_DILUTION
            };

            let xs_1 = self.interp_xs(name, temp, bg_xs_1)?;
            let xs_2 = self.interp_xs(name, temp, bg_xs_2)?;

            for g in 0..ng {
                let flux_1_g = (pot_xs + bg_xs_1) / (xs_1.ea(g) + pot_xs + bg_xs_1);
                let flux_2_g = (pot_xs + bg_xs_2) / (xs_2.ea(g) + pot_xs + bg_xs_2);

                denoms[g] += eta_m * (b1 * flux_1_g + b2 * flux_2_g);

                ea[g] += eta_m * (b1 * xs_1.ea(g) + b2 * xs_2.ea(g));
                ef[g] += eta_m * (b1 * xs_1.ef(g) + b2 * xs_2.ef(g));
                nu_ef[g] += eta_m * (b1 * xs_1.nu_ef(g) + b2 * xs_2.nu_ef(g));
                for g_out in 0..ng {
                    es[[g, g_out]] += eta_m * (b1 * xs_1.es(g, g_out) + b2 * xs_2.es(g, g_out));
                    es1[[g, g_out]] +=
                        eta_m * (b1 * xs_1.es1(g, g_out) + b2 * xs_2.es1(g, g_out));
                }

                // The fission spectrum is taken from the first lump; it
                // is close to dilution-independent, which spares a full
                // spatial treatment of χ.
                if m == 1 {
                    chi[g] = xs_1.chi(g);
                }
            }
        }

        for g in 0..ng {
            let inv_denom = 1.0 / denoms[g];
            ea[g] *= inv_denom;
            ef[g] *= inv_denom;
            nu_ef[g] *= inv_denom;
            et[g] = ea[g];
            for g_out in 0..ng {
                es[[g, g_out]] *= inv_denom;
                es1[[g, g_out]] *= inv_denom;
                et[g] += es[[g, g_out]];
            }
        }

        CrossSection::with_p1(et, ea, es, es1, ef, nu_ef, chi)
    }
}

/// Geometry factors (η_m, ℓ_m) of lump `m` for an annular ring inside a
/// fuel pin: signed chord-weighted fractions of the four-term expansion
/// of the ring escape probability.
pub fn eta_lm(m: usize, r_fuel: f64, r_in: f64, r_out: f64) -> LatticeResult<(f64, f64)> {
    if m == 0 || m > 4 {
        error!("Invalid lump index {m}");
        return Err(LatticeError::Config(format!("Invalid lump index {m}")));
    }

    let p_i = (r_out / r_fuel).min(1.0);
    let p_im = r_in / r_fuel;

    let p = if m == 3 || m == 4 { p_im } else { p_i };

    let mut theta = 0.5 * std::f64::consts::PI * p;
    if m == 2 || m == 4 {
        theta = -theta;
    }

    // Mean chord of the ring: 4 V_ring / S_pin = 2 (Rout² - Rin²) / Rfuel.
    let l = 2.0 * (r_out * r_out - r_in * r_in) / r_fuel;

    let t1 = (1.0 - p * p).sqrt();
    let t2 = if r_in > 0.0 { p.asin() / p } else { 1.0 };

    let lm = (2.0 * r_fuel / std::f64::consts::PI) * (t1 + t2 + theta);

    let mut eta = p * lm / l;
    if m == 2 || m == 3 {
        eta = -eta;
    }

    Ok((eta, lm))
}

// ── Interpolation parameters and dataset helpers ─────────────────────

/// Bracketing index and √T interpolation factor, clamped to [0, 1].
fn temp_interp_params(temperatures: &[f64], temp: f64) -> (usize, f64) {
    if temperatures.len() < 2 || temp <= temperatures[0] {
        return (0, 0.0);
    }
    let last = temperatures.len() - 1;
    if temp >= temperatures[last] {
        return (last - 1, 1.0);
    }
    for i in 0..last {
        if temp >= temperatures[i] && temp <= temperatures[i + 1] {
            let f = (temp.sqrt() - temperatures[i].sqrt())
                / (temperatures[i + 1].sqrt() - temperatures[i].sqrt());
            return (i, f.clamp(0.0, 1.0));
        }
    }
    (last - 1, 1.0)
}

/// Bracketing index and linear dilution factor, clamped to [0, 1].
fn dil_interp_params(dilutions: &[f64], dil: f64) -> (usize, f64) {
    if dilutions.len() < 2 || dil <= dilutions[0] {
        return (0, 0.0);
    }
    let last = dilutions.len() - 1;
    if dil >= dilutions[last] {
        return (last - 1, 1.0);
    }
    for i in 0..last {
        if dil >= dilutions[i] && dil <= dilutions[i + 1] {
            let f = (dil - dilutions[i]) / (dilutions[i + 1] - dilutions[i]);
            return (i, f.clamp(0.0, 1.0));
        }
    }
    (last - 1, 1.0)
}

fn interp_td_1d(data: &Array3<f64>, it: usize, f_t: f64, id: usize, f_d: f64) -> Array1<f64> {
    let ng = data.shape()[2];
    let mut out = Array1::zeros(ng);
    for g in 0..ng {
        let v00 = data[[it, id, g]];
        let v01 = if f_d > 0.0 { data[[it, id + 1, g]] } else { 0.0 };
        let (v10, v11) = if f_t > 0.0 {
            (
                data[[it + 1, id, g]],
                if f_d > 0.0 { data[[it + 1, id + 1, g]] } else { 0.0 },
            )
        } else {
            (0.0, 0.0)
        };
        out[g] = (1.0 - f_t) * ((1.0 - f_d) * v00 + f_d * v01)
            + f_t * ((1.0 - f_d) * v10 + f_d * v11);
    }
    out
}

fn interp_td_2d(data: &Array4<f64>, it: usize, f_t: f64, id: usize, f_d: f64) -> Array2<f64> {
    let ng = data.shape()[2];
    let mut out = Array2::zeros((ng, ng));
    for g in 0..ng {
        for g_out in 0..ng {
            let v00 = data[[it, id, g, g_out]];
            let v01 = if f_d > 0.0 {
                data[[it, id + 1, g, g_out]]
            } else {
                0.0
            };
            let (v10, v11) = if f_t > 0.0 {
                (
                    data[[it + 1, id, g, g_out]],
                    if f_d > 0.0 {
                        data[[it + 1, id + 1, g, g_out]]
                    } else {
                        0.0
                    },
                )
            } else {
                (0.0, 0.0)
            };
            out[[g, g_out]] = (1.0 - f_t) * ((1.0 - f_d) * v00 + f_d * v01)
                + f_t * ((1.0 - f_d) * v10 + f_d * v11);
        }
    }
    out
}

fn interp_t_1d(data: &Array2<f64>, it: usize, f_t: f64) -> Array1<f64> {
    let ng = data.shape()[1];
    let mut out = Array1::zeros(ng);
    for g in 0..ng {
        out[g] = if f_t > 0.0 {
            (1.0 - f_t) * data[[it, g]] + f_t * data[[it + 1, g]]
        } else {
            data[[it, g]]
        };
    }
    out
}

fn validate_data(handle: &NuclideHandle, data: &NuclideData, ng: usize) -> LatticeResult<()> {
    let nt = handle.temperatures.len();
    let nd = handle.dilutions.len();
    let bad = |what: &str| {
        LatticeError::Config(format!(
            "Nuclide \"{}\": dataset \"{what}\" has the wrong shape",
            handle.name
        ))
    };
    if data.absorption.shape() != [nt, nd, ng] {
        return Err(bad("absorption"));
    }
    if data.scatter.shape() != [nt, nd, ng, ng] {
        return Err(bad("scatter"));
    }
    if data.p1_scatter.shape() != [nt, nd, ng, ng] {
        return Err(bad("p1-scatter"));
    }
    if handle.fissile {
        match (&data.fission, &data.nu, &data.chi) {
            (Some(f), Some(n), Some(c)) => {
                if f.shape() != [nt, nd, ng] {
                    return Err(bad("fission"));
                }
                if n.shape() != [nt, ng] {
                    return Err(bad("nu"));
                }
                if c.shape() != [nt, ng] {
                    return Err(bad("chi"));
                }
            }
            _ => {
                return Err(LatticeError::Config(format!(
                    "Fissile nuclide \"{}\" is missing fission/nu/chi data",
                    handle.name
                )));
            }
        }
    }
    Ok(())
}

// ── On-disk schema ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct LibraryFile {
    #[serde(default)]
    library: String,
    #[serde(rename = "group-structure", default)]
    group_structure: String,
    #[serde(rename = "group-bounds")]
    group_bounds: Vec<f64>,
    ngroups: usize,
    nuclides: BTreeMap<String, NuclideEntry>,
}

#[derive(Deserialize)]
struct NuclideEntry {
    label: String,
    temperatures: Vec<f64>,
    dilutions: Vec<f64>,
    awr: f64,
    #[serde(rename = "potential-xs")]
    potential_xs: f64,
    #[serde(rename = "ZA")]
    za: u32,
    fissile: bool,
    resonant: bool,
    absorption: Vec<Vec<Vec<f64>>>,
    scatter: Vec<Vec<Vec<Vec<f64>>>>,
    #[serde(rename = "p1-scatter")]
    p1_scatter: Vec<Vec<Vec<Vec<f64>>>>,
    #[serde(default)]
    fission: Option<Vec<Vec<Vec<f64>>>>,
    #[serde(default)]
    nu: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    chi: Option<Vec<Vec<f64>>>,
}

impl NuclideEntry {
    fn to_data(&self, handle: &NuclideHandle, ng: usize) -> LatticeResult<NuclideData> {
        let nt = handle.temperatures.len();
        let nd = handle.dilutions.len();
        let data = NuclideData {
            absorption: nested3(&self.absorption, nt, nd, ng, &handle.name, "absorption")?,
            scatter: nested4(&self.scatter, nt, nd, ng, &handle.name, "scatter")?,
            p1_scatter: nested4(&self.p1_scatter, nt, nd, ng, &handle.name, "p1-scatter")?,
            fission: match &self.fission {
                Some(v) => Some(nested3(v, nt, nd, ng, &handle.name, "fission")?),
                None => None,
            },
            nu: match &self.nu {
                Some(v) => Some(nested2(v, nt, ng, &handle.name, "nu")?),
                None => None,
            },
            chi: match &self.chi {
                Some(v) => Some(nested2(v, nt, ng, &handle.name, "chi")?),
                None => None,
            },
        };
        validate_data(handle, &data, ng)?;
        Ok(data)
    }
}

fn shape_err(name: &str, what: &str) -> LatticeError {
    LatticeError::Config(format!(
        "Nuclide \"{name}\": dataset \"{what}\" is ragged or mis-sized"
    ))
}

fn nested2(v: &[Vec<f64>], n0: usize, n1: usize, name: &str, what: &str) -> LatticeResult<Array2<f64>> {
    if v.len() != n0 || v.iter().any(|r| r.len() != n1) {
        return Err(shape_err(name, what));
    }
    let flat: Vec<f64> = v.iter().flatten().copied().collect();
    Array2::from_shape_vec((n0, n1), flat).map_err(|_| shape_err(name, what))
}

fn nested3(
    v: &[Vec<Vec<f64>>],
    n0: usize,
    n1: usize,
    n2: usize,
    name: &str,
    what: &str,
) -> LatticeResult<Array3<f64>> {
    if v.len() != n0
        || v.iter().any(|a| a.len() != n1)
        || v.iter().flatten().any(|b| b.len() != n2)
    {
        return Err(shape_err(name, what));
    }
    let flat: Vec<f64> = v.iter().flatten().flatten().copied().collect();
    Array3::from_shape_vec((n0, n1, n2), flat).map_err(|_| shape_err(name, what))
}

fn nested4(
    v: &[Vec<Vec<Vec<f64>>>],
    n0: usize,
    n1: usize,
    n2: usize,
    name: &str,
    what: &str,
) -> LatticeResult<Array4<f64>> {
    if v.len() != n0
        || v.iter().any(|a| a.len() != n1)
        || v.iter().flatten().any(|b| b.len() != n2)
        || v.iter().flatten().flatten().any(|c| c.len() != n2)
    {
        return Err(shape_err(name, what));
    }
    let flat: Vec<f64> = v.iter().flatten().flatten().flatten().copied().collect();
    Array4::from_shape_vec((n0, n1, n2, n2), flat).map_err(|_| shape_err(name, what))
}
