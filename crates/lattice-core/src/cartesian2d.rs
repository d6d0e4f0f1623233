// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — Cartesian 2D
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Cartesian tiling of cells with a flattened region registry.
//!
//! Tiles align to the x/y surface lists built from the tile widths; the
//! domain spans (0, Lx) × (0, Ly). Tiles are stored row-major from the
//! lower-left corner: `cells[iy * nx + ix]`. Nested lattices are
//! allowed; their regions flatten into the same global registry at
//! construction.

use crate::cell::Cell;
use crate::vector::{Direction, Vector};
use lattice_types::constants::TRACE_BUMP;
use lattice_types::error::{LatticeError, LatticeResult};
use lattice_types::xs::CrossSection;
use std::sync::Arc;

/// Tile-width mismatch accepted between a cell and its slot.
const WIDTH_TOL: f64 = 1.0e-10;

#[derive(Debug, Clone)]
struct Tile {
    cell: Cell,
    offset: usize,
}

#[derive(Debug, Clone)]
pub struct Cartesian2D {
    x_bounds: Vec<f64>,
    y_bounds: Vec<f64>,
    nx: usize,
    ny: usize,
    tiles: Vec<Tile>,
    num_fsrs: usize,
}

impl Cartesian2D {
    /// Tile the plane with `cells[iy * nx + ix]`, where `dx`/`dy` list
    /// the column widths and row heights from the lower-left corner.
    pub fn new(dx: &[f64], dy: &[f64], cells: Vec<Cell>) -> LatticeResult<Self> {
        if dx.is_empty() || dy.is_empty() {
            return Err(LatticeError::Config(
                "Tiling needs at least one column and one row".to_string(),
            ));
        }
        if dx.iter().chain(dy.iter()).any(|&w| !(w > 0.0)) {
            return Err(LatticeError::Config(
                "Tile widths must be positive".to_string(),
            ));
        }
        let nx = dx.len();
        let ny = dy.len();
        if cells.len() != nx * ny {
            return Err(LatticeError::Config(format!(
                "A {nx} x {ny} tiling needs {} cells, got {}",
                nx * ny,
                cells.len()
            )));
        }

        let mut x_bounds = Vec::with_capacity(nx + 1);
        x_bounds.push(0.0);
        for &w in dx {
            x_bounds.push(x_bounds.last().copied().unwrap_or(0.0) + w);
        }
        let mut y_bounds = Vec::with_capacity(ny + 1);
        y_bounds.push(0.0);
        for &h in dy {
            y_bounds.push(y_bounds.last().copied().unwrap_or(0.0) + h);
        }

        // Freeze the region registry: offsets assigned tile by tile.
        let mut tiles = Vec::with_capacity(cells.len());
        let mut offset = 0;
        for (k, cell) in cells.into_iter().enumerate() {
            let (ix, iy) = (k % nx, k / nx);
            if (cell.dx() - dx[ix]).abs() > WIDTH_TOL || (cell.dy() - dy[iy]).abs() > WIDTH_TOL {
                return Err(LatticeError::Config(format!(
                    "Cell at ({ix}, {iy}) is {} x {} but the tile is {} x {}",
                    cell.dx(),
                    cell.dy(),
                    dx[ix],
                    dy[iy]
                )));
            }
            let n = cell.num_fsrs();
            tiles.push(Tile { cell, offset });
            offset += n;
        }

        Ok(Cartesian2D {
            x_bounds,
            y_bounds,
            nx,
            ny,
            tiles,
            num_fsrs: offset,
        })
    }

    pub fn lx(&self) -> f64 {
        *self.x_bounds.last().expect("bounds are non-empty")
    }

    pub fn ly(&self) -> f64 {
        *self.y_bounds.last().expect("bounds are non-empty")
    }

    pub fn num_fsrs(&self) -> usize {
        self.num_fsrs
    }

    fn diagonal(&self) -> f64 {
        (self.lx() * self.lx() + self.ly() * self.ly()).sqrt()
    }

    fn tile_index(&self, r: &Vector) -> Option<(usize, usize)> {
        if r.x < 0.0 || r.x >= self.lx() || r.y < 0.0 || r.y >= self.ly() {
            return None;
        }
        let ix = self.x_bounds.partition_point(|&b| b <= r.x) - 1;
        let iy = self.y_bounds.partition_point(|&b| b <= r.y) - 1;
        Some((ix.min(self.nx - 1), iy.min(self.ny - 1)))
    }

    fn tile(&self, ix: usize, iy: usize) -> &Tile {
        &self.tiles[iy * self.nx + ix]
    }

    /// Global region index of a point; the direction disambiguates
    /// points on tile boundaries. `None` outside the domain.
    pub fn locate(&self, r: &Vector, u: &Direction) -> Option<usize> {
        let probe = *r + u.scaled(TRACE_BUMP * self.diagonal());
        let (ix, iy) = self.tile_index(&probe)?;
        let tile = self.tile(ix, iy);
        let local = Vector::new(probe.x - self.x_bounds[ix], probe.y - self.y_bounds[iy]);
        tile.cell.locate(&local, u).map(|f| f + tile.offset)
    }

    /// Segment the ray from `entry` until it leaves the domain.
    /// Returns (length, global region) pairs covering the full chord.
    pub fn trace(&self, entry: &Vector, u: &Direction) -> LatticeResult<Vec<(f64, usize)>> {
        let t_exit = self.exit_distance(entry, u)?;
        self.trace_within(entry, u, t_exit)
    }

    /// Segment a ray of length `t_max` starting at `r` (domain-local
    /// coordinates). Used directly for rays spanning nested lattices.
    pub fn trace_within(
        &self,
        r: &Vector,
        u: &Direction,
        t_max: f64,
    ) -> LatticeResult<Vec<(f64, usize)>> {
        let bump = TRACE_BUMP * self.diagonal();
        let mut segments = Vec::new();
        let mut t_done = 0.0;
        let max_steps = 4 * (self.nx + self.ny) + 16;

        for _ in 0..max_steps {
            if t_done >= t_max - bump {
                return Ok(segments);
            }
            // Advance just past the boundary crossed last, so the next
            // tile lookup cannot re-hit the same surface.
            let probe = *r + u.scaled(t_done + bump);
            let (ix, iy) = self.tile_index(&probe).ok_or_else(|| {
                LatticeError::Config(format!(
                    "Ray left the geometry at ({:.6}, {:.6}): hole in the tiling",
                    probe.x, probe.y
                ))
            })?;
            let tile = self.tile(ix, iy);

            let mut t_tile = t_max;
            if u.u().abs() > 1.0e-14 {
                let x_far = if u.u() > 0.0 {
                    self.x_bounds[ix + 1]
                } else {
                    self.x_bounds[ix]
                };
                t_tile = t_tile.min((x_far - r.x) / u.u());
            }
            if u.v().abs() > 1.0e-14 {
                let y_far = if u.v() > 0.0 {
                    self.y_bounds[iy + 1]
                } else {
                    self.y_bounds[iy]
                };
                t_tile = t_tile.min((y_far - r.y) / u.v());
            }
            if t_tile <= t_done {
                // Numerical stall on a corner; skip forward.
                t_done += bump;
                continue;
            }

            let start = *r + u.scaled(t_done);
            let local = Vector::new(start.x - self.x_bounds[ix], start.y - self.y_bounds[iy]);
            let local_segs = tile.cell.trace(&local, u, t_tile - t_done)?;
            for (len, fsr) in local_segs {
                segments.push((len, fsr + tile.offset));
            }
            t_done = t_tile;
        }

        Err(LatticeError::Config(
            "Ray tracing did not terminate: degenerate tiling".to_string(),
        ))
    }

    /// Distance to the domain boundary along `u`.
    pub(crate) fn exit_distance(&self, r: &Vector, u: &Direction) -> LatticeResult<f64> {
        let mut t = f64::INFINITY;
        if u.u() > 1.0e-14 {
            t = t.min((self.lx() - r.x) / u.u());
        } else if u.u() < -1.0e-14 {
            t = t.min(-r.x / u.u());
        }
        if u.v() > 1.0e-14 {
            t = t.min((self.ly() - r.y) / u.v());
        } else if u.v() < -1.0e-14 {
            t = t.min(-r.y / u.v());
        }
        if !t.is_finite() || t <= 0.0 {
            return Err(LatticeError::Config(format!(
                "Ray at ({:.6}, {:.6}) does not enter the geometry",
                r.x, r.y
            )));
        }
        Ok(t)
    }

    /// Analytic region volumes in registry order.
    pub fn fsr_volumes(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.num_fsrs);
        for tile in &self.tiles {
            for f in 0..tile.cell.num_fsrs() {
                out.push(tile.cell.fsr_volume(f));
            }
        }
        out
    }

    /// Cross-section registry in region order (shared handles).
    pub fn xs_registry(&self) -> Vec<Arc<CrossSection>> {
        let mut out = Vec::with_capacity(self.num_fsrs);
        for tile in &self.tiles {
            for f in 0..tile.cell.num_fsrs() {
                out.push(Arc::clone(tile.cell.fsr_xs(f)));
            }
        }
        out
    }

    fn tile_of_fsr(&self, fsr: usize) -> (&Tile, usize) {
        let idx = self
            .tiles
            .partition_point(|t| t.offset <= fsr)
            .saturating_sub(1);
        let tile = &self.tiles[idx];
        (tile, fsr - tile.offset)
    }

    pub fn fsr_volume(&self, fsr: usize) -> f64 {
        let (tile, local) = self.tile_of_fsr(fsr);
        tile.cell.fsr_volume(local)
    }

    pub fn fsr_xs(&self, fsr: usize) -> &Arc<CrossSection> {
        let (tile, local) = self.tile_of_fsr(fsr);
        tile.cell.fsr_xs(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::SimplePinCell;
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

    fn pin(et_pin: f64, et_bg: f64, pitch: f64) -> Cell {
        Cell::Simple(
            SimplePinCell::new(vec![0.4], vec![xs(et_pin), xs(et_bg)], pitch, pitch).unwrap(),
        )
    }

    fn two_by_two() -> Cartesian2D {
        let cells = vec![
            pin(1.0, 0.5, 1.27),
            pin(2.0, 0.5, 1.27),
            pin(3.0, 0.5, 1.27),
            pin(4.0, 0.5, 1.27),
        ];
        Cartesian2D::new(&[1.27, 1.27], &[1.27, 1.27], cells).unwrap()
    }

    #[test]
    fn test_construction_and_registry() {
        let geom = two_by_two();
        assert_eq!(geom.num_fsrs(), 8);
        assert!((geom.lx() - 2.54).abs() < 1e-12);
        assert!((geom.ly() - 2.54).abs() < 1e-12);
        // Pin of the lower-left tile, then its background, then the
        // lower-right tile.
        let reg = geom.xs_registry();
        assert!((reg[0].et(0) - 1.0).abs() < 1e-12);
        assert!((reg[1].et(0) - 0.5).abs() < 1e-12);
        assert!((reg[2].et(0) - 2.0).abs() < 1e-12);
        assert!((reg[6].et(0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_construction_rejects_mismatches() {
        assert!(Cartesian2D::new(&[1.27], &[1.27], vec![]).is_err());
        assert!(
            Cartesian2D::new(&[1.0], &[1.27], vec![pin(1.0, 0.5, 1.27)]).is_err(),
            "cell width must match the tile"
        );
        assert!(Cartesian2D::new(&[], &[1.27], vec![]).is_err());
        assert!(Cartesian2D::new(&[-1.0], &[1.27], vec![pin(1.0, 0.5, 1.27)]).is_err());
    }

    #[test]
    fn test_locate_across_tiles() {
        let geom = two_by_two();
        let u = Direction::from_angle(0.7);
        // Center of each tile is inside that tile's pin.
        let f = geom.locate(&Vector::new(0.635, 0.635), &u).unwrap();
        assert!((geom.fsr_xs(f).et(0) - 1.0).abs() < 1e-12);
        let f = geom.locate(&Vector::new(1.905, 0.635), &u).unwrap();
        assert!((geom.fsr_xs(f).et(0) - 2.0).abs() < 1e-12);
        let f = geom.locate(&Vector::new(0.635, 1.905), &u).unwrap();
        assert!((geom.fsr_xs(f).et(0) - 3.0).abs() < 1e-12);
        let f = geom.locate(&Vector::new(1.905, 1.905), &u).unwrap();
        assert!((geom.fsr_xs(f).et(0) - 4.0).abs() < 1e-12);
        // Outside the domain.
        assert!(geom.locate(&Vector::new(-0.5, 0.5), &u).is_none());
    }

    #[test]
    fn test_trace_full_row() {
        let geom = two_by_two();
        // Horizontal chord through the pin centers of the bottom row.
        let segs = geom
            .trace(&Vector::new(0.0, 0.635), &Direction::from_angle(0.0))
            .unwrap();
        let total: f64 = segs.iter().map(|s| s.0).sum();
        assert!((total - 2.54).abs() < 1e-9, "total = {total}");
        // Pattern: bg, pin1, bg, bg, pin2, bg.
        let ets: Vec<f64> = segs.iter().map(|s| geom.fsr_xs(s.1).et(0)).collect();
        assert_eq!(ets.len(), 6, "segments: {ets:?}");
        assert!((ets[1] - 1.0).abs() < 1e-12);
        assert!((ets[4] - 2.0).abs() < 1e-12);
        // Pin chords through the center have length 2R.
        assert!((segs[1].0 - 0.8).abs() < 1e-9);
        assert!((segs[4].0 - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_trace_diagonal() {
        let geom = two_by_two();
        let u = Direction::from_angle(std::f64::consts::FRAC_PI_4);
        let segs = geom.trace(&Vector::new(0.0, 0.0), &u).unwrap();
        let total: f64 = segs.iter().map(|s| s.0).sum();
        assert!(
            (total - 2.54 * 2.0_f64.sqrt()).abs() < 1e-9,
            "diagonal chord length = {total}"
        );
    }

    #[test]
    fn test_volumes_cover_domain() {
        let geom = two_by_two();
        let total: f64 = geom.fsr_volumes().iter().sum();
        assert!((total - 2.54 * 2.54).abs() < 1e-10);
    }

    #[test]
    fn test_nested_lattice_flattens() {
        let inner = Cartesian2D::new(
            &[1.27, 1.27],
            &[1.27, 1.27],
            vec![
                pin(1.0, 0.5, 1.27),
                pin(2.0, 0.5, 1.27),
                pin(3.0, 0.5, 1.27),
                pin(4.0, 0.5, 1.27),
            ],
        )
        .unwrap();
        let geom = Cartesian2D::new(
            &[2.54],
            &[2.54],
            vec![Cell::Lattice(Box::new(inner))],
        )
        .unwrap();
        assert_eq!(geom.num_fsrs(), 8);

        let u = Direction::from_angle(0.7);
        let f = geom.locate(&Vector::new(1.905, 1.905), &u).unwrap();
        assert!((geom.fsr_xs(f).et(0) - 4.0).abs() < 1e-12);

        let segs = geom
            .trace(&Vector::new(0.0, 0.635), &Direction::from_angle(0.0))
            .unwrap();
        let total: f64 = segs.iter().map(|s| s.0).sum();
        assert!((total - 2.54).abs() < 1e-9);
    }
}
