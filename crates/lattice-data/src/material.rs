// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Material
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Material composition: nuclide atom densities at a temperature,
//! summed into macroscopic cross sections through the data library.

use crate::nd_library::NdLibrary;
use lattice_types::constants::INFINITE_DILUTION;
use lattice_types::error::{LatticeError, LatticeResult};
use lattice_types::xs::CrossSection;

/// A homogeneous mixture of nuclides.
///
/// Densities are in atoms/(barn·cm), so a microscopic cross section in
/// barns scales directly to 1/cm.
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    temperature: f64,
    composition: Vec<(String, f64)>,
}

impl Material {
    pub fn new(name: &str, temperature: f64) -> LatticeResult<Self> {
        if !(temperature > 0.0) {
            return Err(LatticeError::Config(format!(
                "Material \"{name}\" needs a positive temperature, got {temperature}"
            )));
        }
        Ok(Material {
            name: name.to_string(),
            temperature,
            composition: Vec::new(),
        })
    }

    pub fn add_nuclide(&mut self, nuclide: &str, atom_density: f64) -> LatticeResult<()> {
        if !(atom_density > 0.0) {
            return Err(LatticeError::Config(format!(
                "Material \"{}\": atom density of {nuclide} must be positive, got {atom_density}",
                self.name
            )));
        }
        self.composition.push((nuclide.to_string(), atom_density));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn composition(&self) -> &[(String, f64)] {
        &self.composition
    }

    /// Macroscopic cross section at infinite dilution.
    pub fn macro_xs(&self, ndl: &mut NdLibrary) -> LatticeResult<CrossSection> {
        let dilutions = vec![INFINITE_DILUTION; self.composition.len()];
        self.macro_xs_diluted(ndl, &dilutions)
    }

    /// Macroscopic cross section with one background dilution per
    /// nuclide, in composition order.
    pub fn macro_xs_diluted(
        &self,
        ndl: &mut NdLibrary,
        dilutions: &[f64],
    ) -> LatticeResult<CrossSection> {
        if self.composition.is_empty() {
            return Err(LatticeError::Config(format!(
                "Material \"{}\" has no nuclides",
                self.name
            )));
        }
        if dilutions.len() != self.composition.len() {
            return Err(LatticeError::Config(format!(
                "Material \"{}\": {} dilutions for {} nuclides",
                self.name,
                dilutions.len(),
                self.composition.len()
            )));
        }

        let mut total: Option<CrossSection> = None;
        for ((nuclide, density), &dil) in self.composition.iter().zip(dilutions) {
            let micro = ndl.interp_xs(nuclide, self.temperature, dil)?;
            let macro_part = micro.scale(*density)?;
            total = Some(match total {
                None => macro_part,
                Some(t) => t.add(&macro_part)?,
            });
        }
        Ok(total.expect("composition checked non-empty"))
    }

    /// Macroscopic potential cross section (1/cm), the Σ_pot consumed
    /// by the spatial self-shielding path.
    pub fn potential_xs(&self, ndl: &NdLibrary) -> LatticeResult<f64> {
        let mut total = 0.0;
        for (nuclide, density) in &self.composition {
            total += density * ndl.get_nuclide(nuclide)?.potential_xs;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nd_library::{NuclideData, NuclideHandle};
    use ndarray::{Array2, Array3, Array4};

    fn simple_library() -> NdLibrary {
        let mut lib =
            NdLibrary::new("test-lib", "1-group-test", vec![2.0e7, 1.0e-5], 1).unwrap();

        // One-group constant tables make the macroscopic sums exact.
        let make = |sigma_a: f64, sigma_s: f64, pot: f64, name: &str, za: u32| {
            let handle = NuclideHandle::new(
                name,
                name,
                vec![293.6, 600.0],
                vec![1.0, 1.0e10],
                1.0,
                pot,
                za,
                false,
                false,
            );
            let data = NuclideData {
                absorption: Array3::from_elem((2, 2, 1), sigma_a),
                scatter: Array4::from_elem((2, 2, 1, 1), sigma_s),
                p1_scatter: Array4::from_elem((2, 2, 1, 1), 0.0),
                fission: None,
                nu: None,
                chi: None,
            };
            (handle, data)
        };

        let (h, d) = make(0.2, 2.0, 1.5, "H1", 1001);
        lib.add_nuclide(h, d).unwrap();
        let (h, d) = make(0.4, 4.0, 3.8, "O16", 8016);
        lib.add_nuclide(h, d).unwrap();
        lib
    }

    #[test]
    fn test_macro_xs_sums_and_scales() {
        let mut lib = simple_library();
        let mut water = Material::new("water", 293.6).unwrap();
        water.add_nuclide("H1", 0.05).unwrap();
        water.add_nuclide("O16", 0.025).unwrap();

        let xs = water.macro_xs(&mut lib).unwrap();
        let expect_ea = 0.05 * 0.2 + 0.025 * 0.4;
        let expect_es = 0.05 * 2.0 + 0.025 * 4.0;
        assert!((xs.ea(0) - expect_ea).abs() < 1e-12, "Ea = {}", xs.ea(0));
        assert!((xs.es(0, 0) - expect_es).abs() < 1e-12);
        assert!((xs.et(0) - (expect_ea + expect_es)).abs() < 1e-12);
        assert!(!xs.fissile());
    }

    #[test]
    fn test_potential_xs() {
        let lib = simple_library();
        let mut water = Material::new("water", 293.6).unwrap();
        water.add_nuclide("H1", 0.05).unwrap();
        water.add_nuclide("O16", 0.025).unwrap();
        let pot = water.potential_xs(&lib).unwrap();
        assert!((pot - (0.05 * 1.5 + 0.025 * 3.8)).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_nuclide_rejected() {
        let mut lib = simple_library();
        let mut m = Material::new("mystery", 300.0).unwrap();
        m.add_nuclide("Xe135", 0.001).unwrap();
        assert!(m.macro_xs(&mut lib).is_err());
    }

    #[test]
    fn test_empty_material_rejected() {
        let mut lib = simple_library();
        let m = Material::new("void", 300.0).unwrap();
        assert!(m.macro_xs(&mut lib).is_err());
    }

    #[test]
    fn test_bad_inputs_rejected() {
        assert!(Material::new("cold", 0.0).is_err());
        let mut m = Material::new("m", 300.0).unwrap();
        assert!(m.add_nuclide("H1", 0.0).is_err());
        assert!(m.add_nuclide("H1", -1.0).is_err());
    }

    #[test]
    fn test_dilution_count_checked() {
        let mut lib = simple_library();
        let mut m = Material::new("m", 300.0).unwrap();
        m.add_nuclide("H1", 0.05).unwrap();
        assert!(m.macro_xs_diluted(&mut lib, &[10.0, 20.0]).is_err());
        assert!(m.macro_xs_diluted(&mut lib, &[10.0]).is_ok());
    }
}
