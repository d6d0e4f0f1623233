// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Cell
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Pin cells: annular partitioning of a rectangle into flat source
//! regions.
//!
//! A cell spans local coordinates (0, dx) × (0, dy) with the pin
//! centered in the rectangle. Each annulus is one region. The material
//! outside the last radius fills the cell to its boundary: as a single
//! region in a `SimplePinCell`, split into four quadrants by the center
//! planes in a `PinCell`. Region indices are rings first (innermost
//! outward), then the background.

use crate::cartesian2d::Cartesian2D;
use crate::surface::Surface;
use crate::vector::{Direction, Vector};
use lattice_types::error::{LatticeError, LatticeResult};
use lattice_types::xs::CrossSection;
use std::sync::Arc;

/// Crossing distances closer than this merge into one cut point.
const CUT_MERGE_TOL: f64 = 1.0e-12;

/// Intervals shorter than this are dropped as degenerate.
const MIN_SEGMENT: f64 = 1.0e-13;

/// Shared annular machinery of the two pin-cell flavors.
#[derive(Debug, Clone)]
struct AnnularCore {
    radii: Vec<f64>,
    mats: Vec<Arc<CrossSection>>,
    dx: f64,
    dy: f64,
}

impl AnnularCore {
    fn new(
        radii: Vec<f64>,
        mats: Vec<Arc<CrossSection>>,
        dx: f64,
        dy: f64,
    ) -> LatticeResult<Self> {
        if !(dx > 0.0) || !(dy > 0.0) {
            return Err(LatticeError::Config(format!(
                "Cell dimensions must be positive, got {dx} x {dy}"
            )));
        }
        if mats.len() != radii.len() + 1 {
            return Err(LatticeError::Config(format!(
                "A pin cell needs one more material than radii: {} radii, {} materials",
                radii.len(),
                mats.len()
            )));
        }
        let mut prev = 0.0;
        for &r in &radii {
            if r <= prev {
                return Err(LatticeError::Config(
                    "Pin radii must be positive and strictly increasing".to_string(),
                ));
            }
            prev = r;
        }
        if let Some(&outer) = radii.last() {
            if outer > 0.5 * dx.min(dy) {
                return Err(LatticeError::Config(format!(
                    "Pin of radius {outer} does not fit a {dx} x {dy} cell"
                )));
            }
        }
        let ng = mats[0].ngroups();
        for m in &mats {
            if m.ngroups() != ng {
                return Err(LatticeError::Config(
                    "All materials of a cell must share the group structure".to_string(),
                ));
            }
        }
        Ok(AnnularCore {
            radii,
            mats,
            dx,
            dy,
        })
    }

    fn center(&self) -> Vector {
        Vector::new(0.5 * self.dx, 0.5 * self.dy)
    }

    /// Ring index containing the (already bumped) point, or the ring
    /// count when the point lies in the background.
    fn ring_of(&self, r: &Vector) -> usize {
        let rho = r.distance(&self.center());
        for (i, &rad) in self.radii.iter().enumerate() {
            if rho < rad {
                return i;
            }
        }
        self.radii.len()
    }

    /// Forward crossing distances with every ring circle, in (0, t_max).
    fn circle_crossings(&self, r: &Vector, u: &Direction, t_max: f64, cuts: &mut Vec<f64>) {
        let d = *r - self.center();
        let b = d.x * u.u() + d.y * u.v();
        let rho2 = d.dot(&d);
        for &rad in &self.radii {
            let disc = b * b - (rho2 - rad * rad);
            if disc <= 0.0 {
                continue;
            }
            let sq = disc.sqrt();
            for t in [-b - sq, -b + sq] {
                if t > CUT_MERGE_TOL && t < t_max - CUT_MERGE_TOL {
                    cuts.push(t);
                }
            }
        }
    }

    fn ring_volume(&self, i: usize) -> f64 {
        let r_out = self.radii[i];
        let r_in = if i == 0 { 0.0 } else { self.radii[i - 1] };
        std::f64::consts::PI * (r_out * r_out - r_in * r_in)
    }

    fn background_volume(&self) -> f64 {
        let r = self.radii.last().copied().unwrap_or(0.0);
        self.dx * self.dy - std::f64::consts::PI * r * r
    }
}

/// Sort the cut points, then classify each interval by its midpoint.
fn build_segments(
    mut cuts: Vec<f64>,
    t_max: f64,
    r: &Vector,
    u: &Direction,
    classify: impl Fn(&Vector) -> usize,
) -> Vec<(f64, usize)> {
    cuts.sort_by(|a, b| a.partial_cmp(b).expect("cut distances are finite"));
    cuts.dedup_by(|a, b| (*a - *b).abs() < CUT_MERGE_TOL);

    let mut segments: Vec<(f64, usize)> = Vec::with_capacity(cuts.len() + 1);
    let mut t_prev = 0.0;
    for t in cuts.into_iter().chain(std::iter::once(t_max)) {
        let len = t - t_prev;
        if len < MIN_SEGMENT {
            t_prev = t;
            continue;
        }
        let mid = *r + u.scaled(0.5 * (t_prev + t));
        let fsr = classify(&mid);
        match segments.last_mut() {
            Some(last) if last.1 == fsr => last.0 += len,
            _ => segments.push((len, fsr)),
        }
        t_prev = t;
    }
    segments
}

/// Annuli plus a single background region.
#[derive(Debug, Clone)]
pub struct SimplePinCell {
    core: AnnularCore,
}

impl SimplePinCell {
    /// An annular pin centered in a dx × dy cell. One more material
    /// than radii; the last material fills the cell to its boundary.
    pub fn new(
        radii: Vec<f64>,
        mats: Vec<Arc<CrossSection>>,
        dx: f64,
        dy: f64,
    ) -> LatticeResult<Self> {
        Ok(SimplePinCell {
            core: AnnularCore::new(radii, mats, dx, dy)?,
        })
    }

    pub fn num_fsrs(&self) -> usize {
        self.core.radii.len() + 1
    }

    fn locate(&self, r: &Vector) -> usize {
        self.core.ring_of(r)
    }

    fn trace(&self, r: &Vector, u: &Direction, t_max: f64) -> Vec<(f64, usize)> {
        let mut cuts = Vec::new();
        self.core.circle_crossings(r, u, t_max, &mut cuts);
        build_segments(cuts, t_max, r, u, |mid| self.core.ring_of(mid))
    }

    fn fsr_volume(&self, fsr: usize) -> f64 {
        if fsr < self.core.radii.len() {
            self.core.ring_volume(fsr)
        } else {
            self.core.background_volume()
        }
    }

    fn fsr_xs(&self, fsr: usize) -> &Arc<CrossSection> {
        &self.core.mats[fsr.min(self.core.radii.len())]
    }
}

/// Annuli plus a background split into four quadrants by the center
/// planes.
#[derive(Debug, Clone)]
pub struct PinCell {
    core: AnnularCore,
}

impl PinCell {
    /// An annular pin centered in a dx × dy cell. One more material
    /// than radii; the last material fills the four background
    /// quadrants.
    pub fn new(
        radii: Vec<f64>,
        mats: Vec<Arc<CrossSection>>,
        dx: f64,
        dy: f64,
    ) -> LatticeResult<Self> {
        Ok(PinCell {
            core: AnnularCore::new(radii, mats, dx, dy)?,
        })
    }

    pub fn num_fsrs(&self) -> usize {
        self.core.radii.len() + 4
    }

    fn quadrant(&self, r: &Vector) -> usize {
        let c = self.core.center();
        match (r.x >= c.x, r.y >= c.y) {
            (true, true) => 0,
            (false, true) => 1,
            (false, false) => 2,
            (true, false) => 3,
        }
    }

    fn locate(&self, r: &Vector) -> usize {
        let ring = self.core.ring_of(r);
        if ring < self.core.radii.len() {
            ring
        } else {
            ring + self.quadrant(r)
        }
    }

    fn trace(&self, r: &Vector, u: &Direction, t_max: f64) -> Vec<(f64, usize)> {
        let mut cuts = Vec::new();
        self.core.circle_crossings(r, u, t_max, &mut cuts);
        let c = self.core.center();
        for plane in [Surface::XPlane { x0: c.x }, Surface::YPlane { y0: c.y }] {
            if let Some(t) = plane.distance(r, u) {
                if t < t_max - CUT_MERGE_TOL {
                    cuts.push(t);
                }
            }
        }
        build_segments(cuts, t_max, r, u, |mid| self.locate(mid))
    }

    fn fsr_volume(&self, fsr: usize) -> f64 {
        if fsr < self.core.radii.len() {
            self.core.ring_volume(fsr)
        } else {
            0.25 * self.core.background_volume()
        }
    }

    fn fsr_xs(&self, fsr: usize) -> &Arc<CrossSection> {
        &self.core.mats[fsr.min(self.core.radii.len())]
    }
}

/// A cell of the cartesian tiling: a pin cell flavor or a nested
/// lattice.
#[derive(Debug, Clone)]
pub enum Cell {
    Simple(SimplePinCell),
    Pin(PinCell),
    Lattice(Box<Cartesian2D>),
}

impl Cell {
    pub fn dx(&self) -> f64 {
        match self {
            Cell::Simple(c) => c.core.dx,
            Cell::Pin(c) => c.core.dx,
            Cell::Lattice(l) => l.lx(),
        }
    }

    pub fn dy(&self) -> f64 {
        match self {
            Cell::Simple(c) => c.core.dy,
            Cell::Pin(c) => c.core.dy,
            Cell::Lattice(l) => l.ly(),
        }
    }

    pub fn num_fsrs(&self) -> usize {
        match self {
            Cell::Simple(c) => c.num_fsrs(),
            Cell::Pin(c) => c.num_fsrs(),
            Cell::Lattice(l) => l.num_fsrs(),
        }
    }

    /// Local region index of a point inside the cell; the direction
    /// resolves points sitting on internal boundaries. `None` when the
    /// point falls outside a nested lattice.
    pub fn locate(&self, r: &Vector, u: &Direction) -> Option<usize> {
        // A small advance along the direction makes boundary points
        // unambiguous for every region shape at once.
        let eps = 1.0e-10 * self.dx().min(self.dy());
        let probe = *r + u.scaled(eps);
        match self {
            Cell::Simple(c) => Some(c.locate(&probe)),
            Cell::Pin(c) => Some(c.locate(&probe)),
            Cell::Lattice(l) => l.locate(&probe, u),
        }
    }

    /// Cut the ray (local start `r`, direction `u`, length `t_max`)
    /// into per-region segments.
    pub fn trace(&self, r: &Vector, u: &Direction, t_max: f64) -> LatticeResult<Vec<(f64, usize)>> {
        match self {
            Cell::Simple(c) => Ok(c.trace(r, u, t_max)),
            Cell::Pin(c) => Ok(c.trace(r, u, t_max)),
            Cell::Lattice(l) => l.trace_within(r, u, t_max),
        }
    }

    pub fn fsr_volume(&self, fsr: usize) -> f64 {
        match self {
            Cell::Simple(c) => c.fsr_volume(fsr),
            Cell::Pin(c) => c.fsr_volume(fsr),
            Cell::Lattice(l) => l.fsr_volume(fsr),
        }
    }

    pub fn fsr_xs(&self, fsr: usize) -> &Arc<CrossSection> {
        match self {
            Cell::Simple(c) => c.fsr_xs(fsr),
            Cell::Pin(c) => c.fsr_xs(fsr),
            Cell::Lattice(l) => l.fsr_xs(fsr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn xs(et: f64) -> Arc<CrossSection> {
        Arc::new(
            CrossSection::new(
                array![et],
                array![et],
                array![[0.0]],
                array![0.0],
                array![0.0],
                array![0.0],
            )
            .unwrap(),
        )
    }

    fn two_ring_cell() -> SimplePinCell {
        SimplePinCell::new(
            vec![0.2, 0.4],
            vec![xs(1.0), xs(2.0), xs(3.0)],
            1.27,
            1.27,
        )
        .unwrap()
    }

    #[test]
    fn test_constructor_validation() {
        assert!(SimplePinCell::new(vec![0.4, 0.2], vec![xs(1.0); 3], 1.27, 1.27).is_err());
        assert!(SimplePinCell::new(vec![0.2], vec![xs(1.0)], 1.27, 1.27).is_err());
        assert!(SimplePinCell::new(vec![0.7], vec![xs(1.0); 2], 1.27, 1.27).is_err());
        assert!(SimplePinCell::new(vec![], vec![xs(1.0)], -1.0, 1.27).is_err());
        assert!(SimplePinCell::new(vec![], vec![xs(1.0)], 1.27, 1.27).is_ok());
    }

    #[test]
    fn test_locate_rings_and_background() {
        let cell = Cell::Simple(two_ring_cell());
        let u = Direction::from_angle(0.3);
        let c = Vector::new(0.635, 0.635);
        assert_eq!(cell.locate(&c, &u), Some(0));
        assert_eq!(cell.locate(&Vector::new(0.635 + 0.3, 0.635), &u), Some(1));
        assert_eq!(cell.locate(&Vector::new(0.05, 0.05), &u), Some(2));
    }

    #[test]
    fn test_pin_cell_quadrants() {
        let cell = Cell::Pin(
            PinCell::new(vec![0.3], vec![xs(1.0), xs(2.0)], 1.27, 1.27).unwrap(),
        );
        assert_eq!(cell.num_fsrs(), 5);
        let u = Direction::from_angle(0.1);
        assert_eq!(cell.locate(&Vector::new(1.1, 1.1), &u), Some(1));
        assert_eq!(cell.locate(&Vector::new(0.1, 1.1), &u), Some(2));
        assert_eq!(cell.locate(&Vector::new(0.1, 0.1), &u), Some(3));
        assert_eq!(cell.locate(&Vector::new(1.1, 0.1), &u), Some(4));
    }

    #[test]
    fn test_trace_through_center() {
        let cell = Cell::Simple(two_ring_cell());
        // Horizontal ray through the pin center.
        let r = Vector::new(0.0, 0.635);
        let u = Direction::from_angle(0.0);
        let segs = cell.trace(&r, &u, 1.27).unwrap();
        let fsrs: Vec<usize> = segs.iter().map(|s| s.1).collect();
        assert_eq!(fsrs, vec![2, 1, 0, 1, 2]);
        let total: f64 = segs.iter().map(|s| s.0).sum();
        assert!((total - 1.27).abs() < 1e-10, "total = {total}");
        // Chord lengths inside each circle.
        assert!((segs[2].0 - 0.4).abs() < 1e-10, "inner = {}", segs[2].0);
        assert!((segs[1].0 - 0.2).abs() < 1e-10);
        assert!((segs[3].0 - 0.2).abs() < 1e-10);
    }

    #[test]
    fn test_trace_missing_the_pin() {
        let cell = Cell::Simple(two_ring_cell());
        let r = Vector::new(0.0, 0.05);
        let u = Direction::from_angle(0.0);
        let segs = cell.trace(&r, &u, 1.27).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].1, 2);
        assert!((segs[0].0 - 1.27).abs() < 1e-12);
    }

    #[test]
    fn test_pin_trace_crosses_quadrant_plane() {
        let cell = Cell::Pin(
            PinCell::new(vec![0.3], vec![xs(1.0), xs(2.0)], 1.27, 1.27).unwrap(),
        );
        // Horizontal ray below the pin: two background quadrants.
        let r = Vector::new(0.0, 0.05);
        let u = Direction::from_angle(0.0);
        let segs = cell.trace(&r, &u, 1.27).unwrap();
        let fsrs: Vec<usize> = segs.iter().map(|s| s.1).collect();
        assert_eq!(fsrs, vec![3, 4]);
        assert!((segs[0].0 - 0.635).abs() < 1e-10);
        assert!((segs[1].0 - 0.635).abs() < 1e-10);
    }

    #[test]
    fn test_volumes_sum_to_cell_area() {
        let cell = Cell::Simple(two_ring_cell());
        let total: f64 = (0..cell.num_fsrs()).map(|i| cell.fsr_volume(i)).sum();
        assert!((total - 1.27 * 1.27).abs() < 1e-12);
        assert!(
            (cell.fsr_volume(0) - std::f64::consts::PI * 0.04).abs() < 1e-12,
            "inner ring area"
        );

        let pin = Cell::Pin(
            PinCell::new(vec![0.3], vec![xs(1.0), xs(2.0)], 1.27, 1.27).unwrap(),
        );
        let total: f64 = (0..pin.num_fsrs()).map(|i| pin.fsr_volume(i)).sum();
        assert!((total - 1.27 * 1.27).abs() < 1e-12);
        assert!((pin.fsr_volume(1) - pin.fsr_volume(3)).abs() < 1e-12);
    }

    #[test]
    fn test_xs_assignment() {
        let cell = Cell::Simple(two_ring_cell());
        assert!((cell.fsr_xs(0).et(0) - 1.0).abs() < 1e-12);
        assert!((cell.fsr_xs(1).et(0) - 2.0).abs() < 1e-12);
        assert!((cell.fsr_xs(2).et(0) - 3.0).abs() < 1e-12);
    }
}
