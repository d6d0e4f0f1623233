// ─────────────────────────────────────────────────────────────────────
// SCPN Lattice Core — MOC Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Method-of-characteristics transport sweep and k-eigenvalue driver.
//!
//! Tracks are laid as a cyclic quadrature: the azimuths are snapped so
//! that entry points on the two lower boundaries close into loops under
//! reflection, which lets every track end link to exactly one partner.
//! The sweep runs single-threaded in a fixed order (angle-major,
//! track-minor, polar innermost), so results are bit-reproducible.

use crate::cartesian2d::Cartesian2D;
use crate::track::{AngleInfo, EndLink, Segment, Track};
use crate::vector::{Direction, Vector};
use lattice_math::polar::PolarQuadrature;
use lattice_types::config::{BoundaryCondition, SolverSettings, TrackingSettings};
use lattice_types::constants::FOUR_PI;
use lattice_types::error::{LatticeError, LatticeResult};
use lattice_types::xs::CrossSection;
use log::{info, warn};
use ndarray::Array2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Accepted mismatch between a track's traced length and its chord,
/// relative to the domain diagonal.
const CHORD_GAP_TOL: f64 = 1.0e-8;

/// Endpoint coordinate tolerance when matching reflective partners,
/// relative to Lx + Ly.
const LINK_POINT_TOL: f64 = 1.0e-9;

/// Direction tolerance when matching reflective partners.
const LINK_DIR_TOL: f64 = 1.0e-9;

/// Which domain boundary a track end sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundarySide {
    XMin,
    XMax,
    YMin,
    YMax,
}

pub struct MocDriver {
    geometry: Cartesian2D,
    polar: PolarQuadrature,
    settings: TrackingSettings,
    xs: Vec<Arc<CrossSection>>,
    /// Total cross section per region and group, `[nfsr, G]`.
    sigt: Array2<f64>,
    ngroups: usize,
    angle_info: Vec<AngleInfo>,
    tracks: Vec<Vec<Track>>,
    /// Incoming angular-flux arena, one `[G, P]` buffer per track end.
    boundary: Vec<Array2<f64>>,
    /// Tracked region volumes, renormalized to the geometric area.
    volumes: Vec<f64>,
    flux: Array2<f64>,
    source: Array2<f64>,
    keff: f64,
    solved: bool,
    cancel: Option<Arc<AtomicBool>>,
}

impl MocDriver {
    pub fn new(
        geometry: Cartesian2D,
        polar: PolarQuadrature,
        settings: TrackingSettings,
    ) -> LatticeResult<Self> {
        settings.validate()?;

        let xs = geometry.xs_registry();
        if xs.is_empty() {
            return Err(LatticeError::Config(
                "Geometry holds no source regions".to_string(),
            ));
        }
        let ngroups = xs[0].ngroups();
        for (f, x) in xs.iter().enumerate() {
            if x.ngroups() != ngroups {
                return Err(LatticeError::Config(format!(
                    "Region {f} has {} groups, expected {ngroups}",
                    x.ngroups()
                )));
            }
            for g in 0..ngroups {
                if !(x.et(g) > 0.0) {
                    return Err(LatticeError::Config(format!(
                        "Region {f} has a non-positive total cross section in group {g}"
                    )));
                }
            }
        }

        let nfsr = xs.len();
        let mut sigt = Array2::zeros((nfsr, ngroups));
        for f in 0..nfsr {
            for g in 0..ngroups {
                sigt[[f, g]] = xs[f].et(g);
            }
        }

        Ok(MocDriver {
            geometry,
            polar,
            settings,
            xs,
            sigt,
            ngroups,
            angle_info: Vec::new(),
            tracks: Vec::new(),
            boundary: Vec::new(),
            volumes: Vec::new(),
            flux: Array2::zeros((nfsr, ngroups)),
            source: Array2::zeros((nfsr, ngroups)),
            keff: 1.0,
            solved: false,
            cancel: None,
        })
    }

    /// Install a flag checked between outer iterations; raising it
    /// aborts the solve before the next sweep. A sweep in flight always
    /// runs to completion.
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    pub fn drawn(&self) -> bool {
        !self.angle_info.is_empty()
    }

    pub fn ngroups(&self) -> usize {
        self.ngroups
    }

    pub fn keff(&self) -> f64 {
        self.keff
    }

    pub fn geometry(&self) -> &Cartesian2D {
        &self.geometry
    }

    pub fn angle_info(&self) -> &[AngleInfo] {
        &self.angle_info
    }

    pub fn tracks(&self, angle: usize) -> &[Track] {
        &self.tracks[angle]
    }

    /// Global region index under the point; the direction
    /// disambiguates boundary points.
    pub fn get_fsr(&self, r: &Vector, u: &Direction) -> LatticeResult<usize> {
        self.geometry.locate(r, u).ok_or_else(|| {
            LatticeError::Config(format!(
                "Point ({:.6}, {:.6}) lies outside the geometry",
                r.x, r.y
            ))
        })
    }

    /// Scalar flux of a region and group, from the latest solve.
    pub fn flux(&self, fsr: usize, g: usize) -> f64 {
        self.flux[[fsr, g]]
    }

    /// Tracked (renormalized) region volume.
    pub fn volume(&self, fsr: usize) -> f64 {
        self.volumes[fsr]
    }

    /// Lay the cyclic tracks, segment them through the geometry, link
    /// their endpoints, tally region volumes and freeze the per-segment
    /// attenuation tables.
    pub fn draw_tracks(&mut self) -> LatticeResult<()> {
        self.generate_azimuthal_quadrature();
        self.generate_tracks()?;
        self.link_track_ends()?;
        self.tally_volumes()?;
        self.compute_segment_exps();
        self.solved = false;

        let n_tracks: usize = self.tracks.iter().map(|t| t.len()).sum();
        let n_segments: usize = self
            .tracks
            .iter()
            .flat_map(|a| a.iter())
            .map(|t| t.segments.len())
            .sum();
        info!(
            "Drew {} tracks over {} azimuths ({} segments)",
            n_tracks,
            self.angle_info.len(),
            n_segments
        );
        Ok(())
    }

    fn generate_azimuthal_quadrature(&mut self) {
        let n = self.settings.n_angles as usize;
        let n_quad = n / 4;
        let lx = self.geometry.lx();
        let ly = self.geometry.ly();
        let d = self.settings.track_spacing;
        let delta = 2.0 * std::f64::consts::PI / n as f64;

        // First-quadrant azimuths snapped onto the cyclic set.
        let mut quad: Vec<(f64, f64, u32, u32)> = Vec::with_capacity(n_quad);
        for k in 0..n_quad {
            let phi_req = delta * (k as f64 + 0.5);
            let nx = ((lx / d) * phi_req.sin()).ceil().max(1.0) as u32;
            let ny = ((ly / d) * phi_req.cos()).ceil().max(1.0) as u32;
            let phi = (ly * nx as f64).atan2(lx * ny as f64);
            let spacing = (lx / nx as f64) * phi.sin();
            quad.push((phi, spacing, nx, ny));
        }

        // Mirror across π/2 onto (0, π); weights from angle midpoints.
        let m = n / 2;
        let mut info = Vec::with_capacity(m);
        for i in 0..m {
            let (phi, spacing, nx, ny) = if i < n_quad {
                quad[i]
            } else {
                let q = quad[m - 1 - i];
                (std::f64::consts::PI - q.0, q.1, q.2, q.3)
            };
            info.push(AngleInfo {
                phi,
                spacing,
                weight: 0.0,
                nx,
                ny,
            });
        }
        for i in 0..m {
            let prev = if i == 0 { -info[0].phi } else { info[i - 1].phi };
            let next = if i == m - 1 {
                2.0 * std::f64::consts::PI - info[m - 1].phi
            } else {
                info[i + 1].phi
            };
            info[i].weight = 0.5 * (next - prev) / std::f64::consts::PI;
        }
        self.angle_info = info;
    }

    fn generate_tracks(&mut self) -> LatticeResult<()> {
        let lx = self.geometry.lx();
        let ly = self.geometry.ly();
        let diag = (lx * lx + ly * ly).sqrt();
        let mut tracks = Vec::with_capacity(self.angle_info.len());
        let mut flat = 0usize;

        for info in &self.angle_info {
            let dir = Direction::from_angle(info.phi);
            let forward_quadrant = info.phi < std::f64::consts::FRAC_PI_2;
            let mut angle_tracks = Vec::with_capacity((info.nx + info.ny) as usize);

            let mut entries = Vec::with_capacity((info.nx + info.ny) as usize);
            let dx = lx / info.nx as f64;
            for k in 0..info.nx {
                let x = (k as f64 + 0.5) * dx;
                let x = if forward_quadrant { x } else { lx - x };
                entries.push(Vector::new(x, 0.0));
            }
            let dy = ly / info.ny as f64;
            for k in 0..info.ny {
                let x_side = if forward_quadrant { 0.0 } else { lx };
                entries.push(Vector::new(x_side, (k as f64 + 0.5) * dy));
            }

            for entry in entries {
                let segs = self.geometry.trace(&entry, &dir)?;
                let chord: f64 = segs.iter().map(|s| s.0).sum();
                let t_exit = self.geometry.exit_distance(&entry, &dir)?;
                if (chord - t_exit).abs() > CHORD_GAP_TOL * diag {
                    return Err(LatticeError::Config(format!(
                        "Track from ({:.6}, {:.6}) lost {:.3e} cm of chord: \
                         hole in the geometry",
                        entry.x,
                        entry.y,
                        (chord - t_exit).abs()
                    )));
                }
                let segments = segs
                    .into_iter()
                    .map(|(length, fsr)| Segment {
                        length,
                        fsr,
                        exp: Array2::zeros((0, 0)),
                    })
                    .collect();
                angle_tracks.push(Track {
                    entry,
                    exit: entry + dir.scaled(t_exit),
                    direction: dir,
                    phi: info.phi,
                    weight: info.weight * info.spacing,
                    segments,
                    slots: [2 * flat, 2 * flat + 1],
                    links: [EndLink::Vacuum, EndLink::Vacuum],
                });
                flat += 1;
            }
            tracks.push(angle_tracks);
        }

        self.tracks = tracks;
        self.boundary = vec![
            Array2::zeros((self.ngroups, self.polar.n_polar()));
            2 * flat
        ];
        Ok(())
    }

    fn boundary_side(&self, p: &Vector) -> LatticeResult<BoundarySide> {
        let tol = LINK_POINT_TOL * (self.geometry.lx() + self.geometry.ly());
        if p.x.abs() < tol {
            Ok(BoundarySide::XMin)
        } else if (p.x - self.geometry.lx()).abs() < tol {
            Ok(BoundarySide::XMax)
        } else if p.y.abs() < tol {
            Ok(BoundarySide::YMin)
        } else if (p.y - self.geometry.ly()).abs() < tol {
            Ok(BoundarySide::YMax)
        } else {
            Err(LatticeError::Config(format!(
                "Track end ({:.6}, {:.6}) is not on a domain boundary",
                p.x, p.y
            )))
        }
    }

    fn side_bc(&self, side: BoundarySide) -> BoundaryCondition {
        match side {
            BoundarySide::XMin => self.settings.x_min_bc,
            BoundarySide::XMax => self.settings.x_max_bc,
            BoundarySide::YMin => self.settings.y_min_bc,
            BoundarySide::YMax => self.settings.y_max_bc,
        }
    }

    /// Find the partner slot fed by the flux leaving at `point` with
    /// incident direction `incident`.
    fn resolve_link(
        &self,
        point: &Vector,
        incident: &Direction,
        partners: &[Track],
    ) -> LatticeResult<EndLink> {
        let side = self.boundary_side(point)?;
        match self.side_bc(side) {
            BoundaryCondition::Vacuum => return Ok(EndLink::Vacuum),
            BoundaryCondition::Reflective => {}
            other => {
                return Err(LatticeError::Config(format!(
                    "Boundary condition {other:?} reached the tracked sweep"
                )));
            }
        }

        let reflected = match side {
            BoundarySide::XMin | BoundarySide::XMax => incident.mirror_x(),
            BoundarySide::YMin | BoundarySide::YMax => incident.mirror_y(),
        };
        let tol = LINK_POINT_TOL * (self.geometry.lx() + self.geometry.ly());

        for partner in partners {
            if partner.entry.distance(point) < tol
                && partner.direction.approx_eq(&reflected, LINK_DIR_TOL)
            {
                return Ok(EndLink::Neighbor {
                    slot: partner.slots[0],
                });
            }
            if partner.exit.distance(point) < tol
                && partner.direction.reverse().approx_eq(&reflected, LINK_DIR_TOL)
            {
                return Ok(EndLink::Neighbor {
                    slot: partner.slots[1],
                });
            }
        }
        Err(LatticeError::Config(format!(
            "No reflective partner at ({:.6}, {:.6})",
            point.x, point.y
        )))
    }

    fn link_track_ends(&mut self) -> LatticeResult<()> {
        let m = self.angle_info.len();
        let mut resolved: Vec<(usize, usize, [EndLink; 2])> = Vec::new();

        for a in 0..m {
            // Reflection flips the azimuth onto its complement.
            let comp = m - 1 - a;
            let partners = &self.tracks[comp];
            for (ti, track) in self.tracks[a].iter().enumerate() {
                let fwd = self.resolve_link(&track.exit, &track.direction, partners)?;
                let bwd =
                    self.resolve_link(&track.entry, &track.direction.reverse(), partners)?;
                resolved.push((a, ti, [fwd, bwd]));
            }
        }

        for (a, ti, links) in resolved {
            self.tracks[a][ti].links = links;
        }
        Ok(())
    }

    fn tally_volumes(&mut self) -> LatticeResult<()> {
        let nfsr = self.xs.len();
        let mut volumes = vec![0.0; nfsr];
        for (a, info) in self.angle_info.iter().enumerate() {
            let w = info.weight * info.spacing;
            for track in &self.tracks[a] {
                for seg in &track.segments {
                    volumes[seg.fsr] += w * seg.length;
                }
            }
        }

        let area = self.geometry.lx() * self.geometry.ly();
        let tallied: f64 = volumes.iter().sum();
        let scale = area / tallied;
        for (f, v) in volumes.iter_mut().enumerate() {
            *v *= scale;
            if !(*v > 0.0) {
                return Err(LatticeError::Config(format!(
                    "Region {f} is never crossed by a track; refine the track spacing"
                )));
            }
        }
        self.volumes = volumes;
        Ok(())
    }

    fn compute_segment_exps(&mut self) {
        let ng = self.ngroups;
        let np = self.polar.n_polar();
        let sins: Vec<f64> = self.polar.sin_thetas().to_vec();
        for angle_tracks in &mut self.tracks {
            for track in angle_tracks {
                for seg in &mut track.segments {
                    let mut exp = Array2::zeros((ng, np));
                    for g in 0..ng {
                        let tau0 = self.sigt[[seg.fsr, g]] * seg.length;
                        for (p, &sin_p) in sins.iter().enumerate().take(np) {
                            exp[[g, p]] = 1.0 - (-tau0 / sin_p).exp();
                        }
                    }
                    seg.exp = exp;
                }
            }
        }
    }

    /// Power iteration on the fission source, one transport sweep per
    /// outer iteration.
    pub fn solve_keff(&mut self, settings: &SolverSettings) -> LatticeResult<f64> {
        settings.validate()?;
        if !self.drawn() {
            return Err(LatticeError::Config(
                "Tracks must be drawn before solving".to_string(),
            ));
        }
        let fissile = (0..self.xs.len())
            .any(|f| (0..self.ngroups).any(|g| self.xs[f].nu_ef(g) > 0.0));
        if !fissile {
            return Err(LatticeError::Config(
                "The geometry holds no fissile material".to_string(),
            ));
        }

        if !self.solved {
            self.keff = 1.0;
            self.flux.fill(1.0);
            for buf in &mut self.boundary {
                buf.fill(1.0 / FOUR_PI);
            }
            // Vacuum sides see zero incoming for the whole solve.
            for angle_tracks in &self.tracks {
                for track in angle_tracks {
                    if track.links[1] == EndLink::Vacuum {
                        self.boundary[track.slots[0]].fill(0.0);
                    }
                    if track.links[0] == EndLink::Vacuum {
                        self.boundary[track.slots[1]].fill(0.0);
                    }
                }
            }
        }

        let mut negative_last_iter = false;
        for outer in 1..=settings.max_iterations {
            if self.cancelled() {
                return Err(LatticeError::Numerical {
                    iteration: outer,
                    message: "Solve cancelled".to_string(),
                });
            }
            self.update_source();
            let old_flux = self.flux.clone();
            let old_production = self.production(&old_flux);
            if !(old_production > 0.0) {
                return Err(LatticeError::Numerical {
                    iteration: outer,
                    message: format!("Fission production collapsed to {old_production}"),
                });
            }

            self.sweep();

            let new_production = self.production(&self.flux);
            let keff_new = self.keff * new_production / old_production;
            if !keff_new.is_finite() {
                return Err(LatticeError::Numerical {
                    iteration: outer,
                    message: format!("k became non-finite ({keff_new})"),
                });
            }

            let negative_now = self.flux.iter().any(|&v| v < 0.0);
            if negative_now {
                if negative_last_iter {
                    return Err(LatticeError::Numerical {
                        iteration: outer,
                        message: "Negative scalar flux persisted across sweeps".to_string(),
                    });
                }
                warn!("Negative scalar flux after sweep {outer}; continuing");
            }
            negative_last_iter = negative_now;

            let dk = (keff_new - self.keff).abs() / keff_new.abs();
            self.keff = keff_new;

            let mut dphi: f64 = 0.0;
            for (new, old) in self.flux.iter().zip(old_flux.iter()) {
                if new.abs() > 0.0 {
                    dphi = dphi.max(((new - old) / new).abs());
                }
            }

            info!(
                "Outer {outer:4}: k = {:.6}, dk = {dk:.3e}, dphi = {dphi:.3e}",
                self.keff
            );

            if dk < settings.k_tolerance && dphi < settings.flux_tolerance {
                self.solved = true;
                info!("Converged after {outer} iterations: k = {:.6}", self.keff);
                return Ok(self.keff);
            }
        }

        Err(LatticeError::Numerical {
            iteration: settings.max_iterations,
            message: format!(
                "Eigenvalue not converged after {} outer iterations",
                settings.max_iterations
            ),
        })
    }

    /// Isotropic source per steradian: (fission/k + in-scatter) / 4π.
    fn update_source(&mut self) {
        let ng = self.ngroups;
        for f in 0..self.xs.len() {
            let x = &self.xs[f];
            let mut fission_rate = 0.0;
            for gp in 0..ng {
                fission_rate += x.nu_ef(gp) * self.flux[[f, gp]];
            }
            for g in 0..ng {
                let mut scatter = 0.0;
                for gp in 0..ng {
                    scatter += x.es(gp, g) * self.flux[[f, gp]];
                }
                self.source[[f, g]] =
                    (x.chi(g) * fission_rate / self.keff + scatter) / FOUR_PI;
            }
        }
    }

    fn production(&self, flux: &Array2<f64>) -> f64 {
        let mut total = 0.0;
        for f in 0..self.xs.len() {
            let mut rate = 0.0;
            for g in 0..self.ngroups {
                rate += self.xs[f].nu_ef(g) * flux[[f, g]];
            }
            total += self.volumes[f] * rate;
        }
        total
    }

    /// One full transport sweep: every track forward then backward, in
    /// a fixed order. Updates the scalar flux in place.
    fn sweep(&mut self) {
        let ng = self.ngroups;
        let np = self.polar.n_polar();
        let nfsr = self.xs.len();

        // Q/Σt per region and group.
        let mut q_over_sig = Array2::zeros((nfsr, ng));
        for f in 0..nfsr {
            for g in 0..ng {
                q_over_sig[[f, g]] = self.source[[f, g]] / self.sigt[[f, g]];
            }
        }

        let polar_sin: Vec<f64> = self.polar.sin_thetas().to_vec();
        let polar_wgt: Vec<f64> = self.polar.weights().to_vec();
        let mut tally = Array2::<f64>::zeros((nfsr, ng));

        let tracks = &self.tracks;
        let boundary = &mut self.boundary;

        let mut psi = Array2::<f64>::zeros((ng, np));
        for angle_tracks in tracks {
            for track in angle_tracks {
                // Forward traversal.
                psi.assign(&boundary[track.slots[0]]);
                for seg in &track.segments {
                    propagate(
                        &mut psi,
                        &mut tally,
                        seg,
                        &q_over_sig,
                        track.weight,
                        &polar_sin,
                        &polar_wgt,
                    );
                }
                if let EndLink::Neighbor { slot } = track.links[0] {
                    boundary[slot].assign(&psi);
                }

                // Backward traversal over the reversed segment order.
                psi.assign(&boundary[track.slots[1]]);
                for seg in track.segments.iter().rev() {
                    propagate(
                        &mut psi,
                        &mut tally,
                        seg,
                        &q_over_sig,
                        track.weight,
                        &polar_sin,
                        &polar_wgt,
                    );
                }
                if let EndLink::Neighbor { slot } = track.links[1] {
                    boundary[slot].assign(&psi);
                }
            }
        }

        for f in 0..nfsr {
            for g in 0..ng {
                self.flux[[f, g]] = tally[[f, g]] / (self.sigt[[f, g]] * self.volumes[f])
                    + FOUR_PI * q_over_sig[[f, g]];
            }
        }
    }
}

/// Attenuate the angular flux through one segment and tally the scalar
/// flux contribution.
///
/// The azimuthal weights are fractions of the full circle (an angle and
/// its reverse share one weight) and the polar weights integrate one
/// hemisphere, so the angular measure carried by a traversal is
/// 2π·w_a·w_p; the sinθ converts the slant attenuation back to the
/// in-plane chord. With these factors the streaming limit of a
/// transparent region reproduces 4π·Q·⟨chord⟩ exactly.
#[inline]
fn propagate(
    psi: &mut Array2<f64>,
    tally: &mut Array2<f64>,
    seg: &Segment,
    q_over_sig: &Array2<f64>,
    track_weight: f64,
    polar_sin: &[f64],
    polar_wgt: &[f64],
) {
    let f = seg.fsr;
    let (ng, np) = psi.dim();
    let two_pi = 2.0 * std::f64::consts::PI;
    for g in 0..ng {
        let q = q_over_sig[[f, g]];
        for p in 0..np {
            let dpsi = (psi[[g, p]] - q) * seg.exp[[g, p]];
            tally[[f, g]] += two_pi * track_weight * polar_wgt[p] * polar_sin[p] * dpsi;
            psi[[g, p]] -= dpsi;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, SimplePinCell};
    use crate::cylindrical_cell::CylindricalCell;
    use crate::cylindrical_flux_solver::CylindricalFluxSolver;
    use ndarray::array;

    fn fuel_1g() -> Arc<CrossSection> {
        Arc::new(
            CrossSection::new(
                array![0.4526487],
                array![0.06938952],
                array![[0.3832592]],
                array![0.03976306],
                array![2.5 * 0.03976306],
                array![1.0],
            )
            .unwrap(),
        )
    }

    fn water_1g() -> Arc<CrossSection> {
        Arc::new(
            CrossSection::new(
                array![0.84155],
                array![0.003751],
                array![[0.83779]],
                array![0.0],
                array![0.0],
                array![0.0],
            )
            .unwrap(),
        )
    }

    fn full_fuel_geometry(pitch: f64) -> Cartesian2D {
        let cell = Cell::Simple(
            SimplePinCell::new(vec![], vec![fuel_1g()], pitch, pitch).unwrap(),
        );
        Cartesian2D::new(&[pitch], &[pitch], vec![cell]).unwrap()
    }

    fn pin_geometry(pitch: f64) -> Cartesian2D {
        let radii = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let mats = vec![
            fuel_1g(),
            fuel_1g(),
            fuel_1g(),
            fuel_1g(),
            water_1g(),
            water_1g(),
            water_1g(),
        ];
        let cell = Cell::Simple(SimplePinCell::new(radii, mats, pitch, pitch).unwrap());
        Cartesian2D::new(&[pitch], &[pitch], vec![cell]).unwrap()
    }

    fn reflective(n_angles: u32, track_spacing: f64) -> TrackingSettings {
        TrackingSettings {
            n_angles,
            track_spacing,
            ..TrackingSettings::default()
        }
    }

    fn vacuum(n_angles: u32, track_spacing: f64) -> TrackingSettings {
        TrackingSettings {
            n_angles,
            track_spacing,
            x_min_bc: BoundaryCondition::Vacuum,
            x_max_bc: BoundaryCondition::Vacuum,
            y_min_bc: BoundaryCondition::Vacuum,
            y_max_bc: BoundaryCondition::Vacuum,
        }
    }

    fn yt6() -> PolarQuadrature {
        PolarQuadrature::yamamoto_tabuchi(6).unwrap()
    }

    #[test]
    fn test_settings_validated_at_construction() {
        let geom = full_fuel_geometry(1.27);
        assert!(MocDriver::new(geom, yt6(), reflective(30, 0.1)).is_err());
        let geom = full_fuel_geometry(1.27);
        assert!(MocDriver::new(geom, yt6(), reflective(32, -0.1)).is_err());
    }

    #[test]
    fn test_solve_requires_drawn_tracks() {
        let geom = full_fuel_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), reflective(16, 0.1)).unwrap();
        let err = driver.solve_keff(&SolverSettings::default()).unwrap_err();
        assert!(matches!(err, LatticeError::Config(_)));
    }

    #[test]
    fn test_cyclic_quadrature_invariants() {
        let geom = pin_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), reflective(16, 0.1)).unwrap();
        driver.draw_tracks().unwrap();

        let lx = 1.27;
        let ly = 1.27;
        let mut weight_sum = 0.0;
        for (a, info) in driver.angle_info().iter().enumerate() {
            // Cyclic closure: |tan(φ)| Lx ny = Ly nx (the complement
            // angle carries the mirrored tangent).
            let closure =
                info.phi.tan().abs() * lx * info.ny as f64 - ly * info.nx as f64;
            assert!(
                closure.abs() < 1e-9,
                "angle {a}: closure residual {closure}"
            );
            // Every track of this angle is present.
            assert_eq!(
                driver.tracks(a).len(),
                (info.nx + info.ny) as usize,
                "angle {a}: track count"
            );
            // The two entry families share one perpendicular spacing.
            let from_x = (lx / info.nx as f64) * info.phi.sin();
            let from_y = (ly / info.ny as f64) * info.phi.cos().abs();
            assert!(
                (from_x - from_y).abs() < 1e-12,
                "angle {a}: spacing mismatch {from_x} vs {from_y}"
            );
            assert!((info.spacing - from_x).abs() < 1e-12);
            weight_sum += info.weight;
        }
        assert!((weight_sum - 1.0).abs() < 1e-12, "Σw = {weight_sum}");
    }

    #[test]
    fn test_reflective_links_form_a_bijection() {
        let geom = pin_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), reflective(16, 0.1)).unwrap();
        driver.draw_tracks().unwrap();

        let mut targeted = std::collections::BTreeSet::new();
        let mut n_ends = 0usize;
        for a in 0..driver.angle_info().len() {
            for track in driver.tracks(a) {
                for link in track.links {
                    n_ends += 1;
                    match link {
                        EndLink::Neighbor { slot } => {
                            assert!(
                                targeted.insert(slot),
                                "slot {slot} fed by two track ends"
                            );
                        }
                        EndLink::Vacuum => panic!("reflective problem produced a vacuum link"),
                    }
                }
            }
        }
        // Every incoming buffer is fed by exactly one outgoing end.
        assert_eq!(targeted.len(), n_ends);
    }

    #[test]
    fn test_vacuum_links_everywhere() {
        let geom = pin_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), vacuum(16, 0.1)).unwrap();
        driver.draw_tracks().unwrap();
        for a in 0..driver.angle_info().len() {
            for track in driver.tracks(a) {
                assert_eq!(track.links[0], EndLink::Vacuum);
                assert_eq!(track.links[1], EndLink::Vacuum);
            }
        }
    }

    #[test]
    fn test_volume_tally_matches_analytic_areas() {
        let geom = pin_geometry(1.27);
        let analytic = geom.fsr_volumes();
        let mut driver = MocDriver::new(geom, yt6(), reflective(64, 0.005)).unwrap();
        driver.draw_tracks().unwrap();

        let mut total = 0.0;
        for (f, &exact) in analytic.iter().enumerate() {
            let v = driver.volume(f);
            assert!(v > 0.0, "region {f} has zero tracked volume");
            assert!(
                ((v - exact) / exact).abs() < 0.05,
                "region {f}: tracked {v}, analytic {exact}"
            );
            total += v;
        }
        assert!((total - 1.27 * 1.27).abs() < 1e-9, "total volume {total}");
    }

    #[test]
    fn test_get_fsr() {
        let geom = pin_geometry(1.27);
        let driver = MocDriver::new(geom, yt6(), reflective(16, 0.1)).unwrap();
        let u = Direction::from_angle(0.3);
        let f = driver.get_fsr(&Vector::new(0.635, 0.635), &u).unwrap();
        assert_eq!(f, 0);
        assert!(driver
            .get_fsr(&Vector::new(5.0, 5.0), &u)
            .is_err());
    }

    #[test]
    fn test_infinite_medium_k() {
        // Homogeneous fuel with reflective boundaries reproduces the
        // analytic one-group k-infinity.
        let geom = full_fuel_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), reflective(128, 0.01)).unwrap();
        driver.draw_tracks().unwrap();
        let k = driver.solve_keff(&SolverSettings::default()).unwrap();
        let k_inf = 2.5 * 0.03976306 / 0.06938952;
        assert!(
            (k - k_inf).abs() < 1e-3,
            "k = {k}, analytic k-infinity = {k_inf}"
        );
    }

    #[test]
    fn test_solve_twice_from_converged_state() {
        let geom = full_fuel_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), reflective(32, 0.05)).unwrap();
        driver.draw_tracks().unwrap();
        let settings = SolverSettings {
            k_tolerance: 1.0e-11,
            flux_tolerance: 1.0e-11,
            max_iterations: 2000,
        };
        let k1 = driver.solve_keff(&settings).unwrap();
        let k2 = driver.solve_keff(&settings).unwrap();
        assert!((k1 - k2).abs() < 1e-9, "k drifted: {k1} vs {k2}");
    }

    #[test]
    fn test_cancel_flag_aborts_between_iterations() {
        let geom = full_fuel_geometry(1.27);
        let mut driver = MocDriver::new(geom, yt6(), reflective(16, 0.1)).unwrap();
        driver.draw_tracks().unwrap();

        let flag = Arc::new(AtomicBool::new(true));
        driver.set_cancel_flag(Arc::clone(&flag));
        let err = driver.solve_keff(&SolverSettings::default()).unwrap_err();
        assert!(matches!(err, LatticeError::Numerical { .. }));

        flag.store(false, Ordering::Relaxed);
        assert!(driver.solve_keff(&SolverSettings::default()).is_ok());
    }

    #[test]
    fn test_no_fissile_material_rejected() {
        let cell = Cell::Simple(
            SimplePinCell::new(vec![], vec![water_1g()], 1.27, 1.27).unwrap(),
        );
        let geom = Cartesian2D::new(&[1.27], &[1.27], vec![cell]).unwrap();
        let mut driver = MocDriver::new(geom, yt6(), reflective(16, 0.1)).unwrap();
        driver.draw_tracks().unwrap();
        assert!(driver.solve_keff(&SolverSettings::default()).is_err());
    }

    #[test]
    fn test_pin_cell_against_collision_probability_reference() {
        // Tracked square pin cell versus the cylindrized cell with a
        // white boundary at the equal-area radius.
        let pitch = 1.27;
        let geom = pin_geometry(pitch);
        let mut driver = MocDriver::new(geom, yt6(), reflective(128, 0.01)).unwrap();
        driver.draw_tracks().unwrap();
        // The moderator's scattering ratio is close to one, so the
        // source iteration contracts slowly; tight tolerances keep the
        // stopping residual well below the comparison band.
        let settings = SolverSettings {
            k_tolerance: 1.0e-6,
            flux_tolerance: 1.0e-6,
            max_iterations: 8000,
        };
        let k_moc = driver.solve_keff(&settings).unwrap();

        let r_cell = pitch / std::f64::consts::PI.sqrt();
        let radii = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, r_cell];
        let mats = vec![
            fuel_1g(),
            fuel_1g(),
            fuel_1g(),
            fuel_1g(),
            water_1g(),
            water_1g(),
            water_1g(),
        ];
        let cell = CylindricalCell::new(radii, mats).unwrap();
        let mut reference = CylindricalFluxSolver::new(cell, 1.0).unwrap();
        let k_cp = reference.solve(&settings).unwrap();

        assert!(
            (k_moc - k_cp).abs() < 5e-3,
            "tracked k = {k_moc}, collision-probability k = {k_cp}"
        );
    }
}
