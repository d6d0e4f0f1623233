// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Lattice Data
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Nuclear-data access and material composition.
//!
//! Tabulated library handles, temperature/dilution interpolation,
//! two-term rational self-shielding, material macroscopic sums.

pub mod material;
pub mod nd_library;
