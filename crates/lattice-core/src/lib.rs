// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Lattice Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Deterministic lattice transport: tracked method-of-characteristics
//! sweeps over cartesian pin-cell geometries and collision-probability
//! solves for cylindrical cells.

pub mod cartesian2d;
pub mod cell;
pub mod cylindrical_cell;
pub mod cylindrical_flux_solver;
pub mod moc_driver;
pub mod surface;
pub mod track;
pub mod vector;

pub use cartesian2d::Cartesian2D;
pub use cell::{Cell, PinCell, SimplePinCell};
pub use cylindrical_cell::CylindricalCell;
pub use cylindrical_flux_solver::CylindricalFluxSolver;
pub use moc_driver::MocDriver;
pub use surface::{BoundaryCondition, Side, Surface};
pub use vector::{Direction, Vector};
