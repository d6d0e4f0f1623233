// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::error::{LatticeError, LatticeResult};
use serde::{Deserialize, Serialize};

/// Outer-boundary treatment of a transport problem.
///
/// `White` applies to the cylindrical solver only (isotropic return);
/// `Periodic` is carried for data-model completeness but is rejected by
/// tracking validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryCondition {
    Reflective,
    Vacuum,
    Periodic,
    White,
}

/// Stopping criteria shared by the MOC driver and the cylindrical flux
/// solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    pub k_tolerance: f64,
    pub flux_tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            k_tolerance: 1.0e-5,
            flux_tolerance: 1.0e-5,
            max_iterations: 500,
        }
    }
}

impl SolverSettings {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> LatticeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> LatticeResult<()> {
        if !(self.k_tolerance > 0.0) || !(self.flux_tolerance > 0.0) {
            return Err(LatticeError::Config(
                "Convergence tolerances must be positive".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(LatticeError::Config(
                "Iteration budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ray-tracing parameters and the boundary conditions of the four sides
/// of the cartesian domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    pub n_angles: u32,
    pub track_spacing: f64,
    pub x_min_bc: BoundaryCondition,
    pub x_max_bc: BoundaryCondition,
    pub y_min_bc: BoundaryCondition,
    pub y_max_bc: BoundaryCondition,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        TrackingSettings {
            n_angles: 32,
            track_spacing: 0.05,
            x_min_bc: BoundaryCondition::Reflective,
            x_max_bc: BoundaryCondition::Reflective,
            y_min_bc: BoundaryCondition::Reflective,
            y_max_bc: BoundaryCondition::Reflective,
        }
    }
}

impl TrackingSettings {
    /// Load from a JSON file.
    pub fn from_file(path: &str) -> LatticeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> LatticeResult<()> {
        if self.n_angles == 0 || self.n_angles % 4 != 0 {
            return Err(LatticeError::Config(format!(
                "Number of azimuthal angles must be a positive multiple of 4, got {}",
                self.n_angles
            )));
        }
        if !(self.track_spacing > 0.0) {
            return Err(LatticeError::Config(format!(
                "Track spacing must be positive, got {}",
                self.track_spacing
            )));
        }
        for bc in [self.x_min_bc, self.x_max_bc, self.y_min_bc, self.y_max_bc] {
            match bc {
                BoundaryCondition::Reflective | BoundaryCondition::Vacuum => {}
                other => {
                    return Err(LatticeError::Config(format!(
                        "Boundary condition {other:?} is not supported by the tracked sweep"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_settings_defaults() {
        let s = SolverSettings::default();
        assert!((s.k_tolerance - 1.0e-5).abs() < 1e-15);
        assert!((s.flux_tolerance - 1.0e-5).abs() < 1e-15);
        assert_eq!(s.max_iterations, 500);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_solver_settings_rejects_bad_tolerances() {
        let mut s = SolverSettings::default();
        s.k_tolerance = 0.0;
        assert!(s.validate().is_err());

        let mut s = SolverSettings::default();
        s.flux_tolerance = -1.0;
        assert!(s.validate().is_err());

        let mut s = SolverSettings::default();
        s.max_iterations = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_tracking_settings_angle_multiple_of_four() {
        let mut t = TrackingSettings::default();
        assert!(t.validate().is_ok());
        t.n_angles = 30;
        assert!(t.validate().is_err());
        t.n_angles = 0;
        assert!(t.validate().is_err());
        t.n_angles = 4;
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_tracking_settings_rejects_white_and_periodic() {
        let mut t = TrackingSettings::default();
        t.x_min_bc = BoundaryCondition::White;
        assert!(t.validate().is_err());
        t.x_min_bc = BoundaryCondition::Periodic;
        assert!(t.validate().is_err());
        t.x_min_bc = BoundaryCondition::Vacuum;
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_serialization() {
        let t = TrackingSettings {
            n_angles: 64,
            track_spacing: 0.02,
            x_min_bc: BoundaryCondition::Vacuum,
            x_max_bc: BoundaryCondition::Reflective,
            y_min_bc: BoundaryCondition::Reflective,
            y_max_bc: BoundaryCondition::Vacuum,
        };
        let json = serde_json::to_string_pretty(&t).unwrap();
        let t2: TrackingSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(t2.n_angles, 64);
        assert!((t2.track_spacing - 0.02).abs() < 1e-15);
        assert_eq!(t2.x_min_bc, BoundaryCondition::Vacuum);
        assert_eq!(t2.y_max_bc, BoundaryCondition::Vacuum);
    }
}
