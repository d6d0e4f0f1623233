// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Surface
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Axis-aligned planes and side classification.

use crate::vector::{Direction, Vector};

pub use lattice_types::config::BoundaryCondition;

/// Points within this distance of a plane classify by direction of
/// travel instead of by coordinate.
const ON_SURFACE_TOL: f64 = 1.0e-11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Positive,
    Negative,
}

/// An axis-aligned plane in the lattice plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surface {
    /// Plane of constant x.
    XPlane { x0: f64 },
    /// Plane of constant y.
    YPlane { y0: f64 },
}

impl Surface {
    /// The fixed coordinate of the plane.
    pub fn coordinate(&self) -> f64 {
        match self {
            Surface::XPlane { x0 } => *x0,
            Surface::YPlane { y0 } => *y0,
        }
    }

    /// Which side of the plane `r` lies on; on the plane itself, the
    /// direction of travel breaks the tie.
    pub fn side(&self, r: &Vector, u: &Direction) -> Side {
        let (delta, along) = match self {
            Surface::XPlane { x0 } => (r.x - x0, u.u()),
            Surface::YPlane { y0 } => (r.y - y0, u.v()),
        };
        if delta > ON_SURFACE_TOL {
            Side::Positive
        } else if delta < -ON_SURFACE_TOL {
            Side::Negative
        } else if along >= 0.0 {
            Side::Positive
        } else {
            Side::Negative
        }
    }

    /// Distance along `u` from `r` to the plane; `None` when the ray is
    /// parallel to the plane or the hit lies behind the start point.
    pub fn distance(&self, r: &Vector, u: &Direction) -> Option<f64> {
        let (delta, along) = match self {
            Surface::XPlane { x0 } => (x0 - r.x, u.u()),
            Surface::YPlane { y0 } => (y0 - r.y, u.v()),
        };
        if along.abs() < 1.0e-14 {
            return None;
        }
        let t = delta / along;
        if t > ON_SURFACE_TOL {
            Some(t)
        } else {
            None
        }
    }
}
