// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Full solid angle (sr). Isotropic sources are stored per steradian.
pub const FOUR_PI: f64 = 4.0 * std::f64::consts::PI;

/// Bickley function of order 3 at zero optical depth, Ki3(0) = π/4.
pub const KI3_ZERO: f64 = std::f64::consts::FRAC_PI_4;

/// Relative bump applied past a crossed boundary while tracing rays,
/// scaled by the domain diagonal.
pub const TRACE_BUMP: f64 = 1.0e-11;

/// Maximum deviation from unit norm accepted for a direction.
pub const DIRECTION_NORM_TOL: f64 = 1.0e-12;

/// Tolerance on probability-matrix identities (reciprocity, closure).
pub const PROBABILITY_TOL: f64 = 1.0e-10;

/// Dilution treated as infinite when interpolating tabulated data (barns).
pub const INFINITE_DILUTION: f64 = 1.0e10;
