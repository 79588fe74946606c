//! Regular simulation grid with border padding and cached diffusion
//! coefficients.
//!
//! Extents are stored after padding: every face listed in `borders` adds
//! [`PADDING`] cells on that side of its axis. The per-axis diffusion
//! coefficients `D = 1 / (Ra * Cm * h^2)` are kept as a dependent cache; any
//! write to a spacing, a resistivity, or the membrane capacitance goes
//! through a setter that refreshes them.

use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Cells of padding added on every face that carries a border.
pub const PADDING: usize = 2;

/// Attenuation applied to the diffusion term inside padding slabs.
pub const BORDER_DAMPING: f64 = 1e-4;

/// Grid geometry and passive membrane properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    dimensionality: usize,
    nx: usize,
    ny: usize,
    nz: usize,
    borders: [bool; 6],
    cylindrical: bool,
    cm: f64,
    rax: f64,
    ray: f64,
    raz: f64,
    hx: f64,
    hy: f64,
    hz: f64,
    dx: f64,
    dy: f64,
    dz: f64,
}

impl Grid {
    /// Builds a grid from unpadded extents. Unused extents are zero; a single
    /// cell (`nx <= 1`, `ny == nz == 0`) yields a dimensionless model.
    pub fn new(nx: usize, ny: usize, nz: usize, mut borders: [bool; 6], cylindrical: bool) -> Self {
        let dimensionality = Self::dimensionality_for(nx, ny, nz);
        if cylindrical {
            // A cylinder is periodic along y, so the y faces carry no border.
            borders[2] = false;
            borders[3] = false;
        }
        let pad = |n: usize, lo: bool, hi: bool| n + PADDING * lo as usize + PADDING * hi as usize;
        let (nx, ny, nz) = match dimensionality {
            3 => (
                pad(nx, borders[0], borders[1]),
                pad(ny, borders[2], borders[3]),
                pad(nz, borders[4], borders[5]),
            ),
            2 => (
                pad(nx, borders[0], borders[1]),
                pad(ny, borders[2], borders[3]),
                1,
            ),
            1 => (pad(nx, borders[0], borders[1]), 1, 1),
            _ => (1, 1, 1),
        };
        let mut grid = Self {
            dimensionality,
            nx,
            ny,
            nz,
            borders,
            cylindrical,
            cm: 1.0,
            rax: 4500.0,
            ray: 4500.0,
            raz: 4500.0,
            hx: 0.03,
            hy: 0.03,
            hz: 0.03,
            dx: 0.0,
            dy: 0.0,
            dz: 0.0,
        };
        grid.refresh_dx();
        grid.refresh_dy();
        grid.refresh_dz();
        grid
    }

    /// Number of active spatial axes implied by unpadded extents.
    pub fn dimensionality_for(nx: usize, ny: usize, nz: usize) -> usize {
        if nx * ny * nz > 0 {
            3
        } else if nx * ny > 0 {
            2
        } else if nx > 1 {
            1
        } else {
            0
        }
    }

    pub fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// Padded extents `[nx, ny, nz]`.
    pub fn shape(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub fn borders(&self) -> [bool; 6] {
        self.borders
    }

    pub fn is_cylindrical(&self) -> bool {
        self.cylindrical
    }

    pub fn cm(&self) -> f64 {
        self.cm
    }

    pub fn hx(&self) -> f64 {
        self.hx
    }

    pub fn hy(&self) -> f64 {
        self.hy
    }

    pub fn hz(&self) -> f64 {
        self.hz
    }

    pub fn rax(&self) -> f64 {
        self.rax
    }

    pub fn ray(&self) -> f64 {
        self.ray
    }

    pub fn raz(&self) -> f64 {
        self.raz
    }

    /// Cached `[Dx, Dy, Dz]`.
    pub fn diffusion_coefficients(&self) -> [f64; 3] {
        [self.dx, self.dy, self.dz]
    }

    pub fn set_cm(&mut self, cm: f64) {
        self.cm = cm;
        self.refresh_dx();
        self.refresh_dy();
        self.refresh_dz();
    }

    pub fn set_hx(&mut self, hx: f64) {
        self.hx = hx;
        self.refresh_dx();
    }

    pub fn set_hy(&mut self, hy: f64) {
        self.hy = hy;
        self.refresh_dy();
    }

    pub fn set_hz(&mut self, hz: f64) {
        self.hz = hz;
        self.refresh_dz();
    }

    pub fn set_rax(&mut self, rax: f64) {
        self.rax = rax;
        self.refresh_dx();
    }

    pub fn set_ray(&mut self, ray: f64) {
        self.ray = ray;
        self.refresh_dy();
    }

    pub fn set_raz(&mut self, raz: f64) {
        self.raz = raz;
        self.refresh_dz();
    }

    fn refresh_dx(&mut self) {
        match coefficient(self.rax, self.cm, self.hx) {
            Some(dx) => self.dx = dx,
            None => warn!(
                rax = self.rax,
                cm = self.cm,
                hx = self.hx,
                "Dx recompute is not finite, keeping the previous value"
            ),
        }
    }

    fn refresh_dy(&mut self) {
        match coefficient(self.ray, self.cm, self.hy) {
            Some(dy) => self.dy = dy,
            None => warn!(
                ray = self.ray,
                cm = self.cm,
                hy = self.hy,
                "Dy recompute is not finite, keeping the previous value"
            ),
        }
    }

    fn refresh_dz(&mut self) {
        match coefficient(self.raz, self.cm, self.hz) {
            Some(dz) => self.dz = dz,
            None => warn!(
                raz = self.raz,
                cm = self.cm,
                hz = self.hz,
                "Dz recompute is not finite, keeping the previous value"
            ),
        }
    }

    /// Damping mask over the padded grid: 1 in the interior,
    /// [`BORDER_DAMPING`] inside padding slabs.
    pub fn border_mask(&self) -> Array3<f64> {
        let mut mask = Array3::from_elem((self.nx, self.ny, self.nz), BORDER_DAMPING);
        let (x0, x1) = self.interior(0, self.nx);
        let (y0, y1) = self.interior(1, self.ny);
        let (z0, z1) = self.interior(2, self.nz);
        mask.slice_mut(s![x0..x1, y0..y1, z0..z1]).fill(1.0);
        mask
    }

    /// Interior range of `axis` (0 = x, 1 = y, 2 = z) in padded coordinates.
    fn interior(&self, axis: usize, extent: usize) -> (usize, usize) {
        if self.dimensionality <= axis {
            return (0, extent);
        }
        let lo = PADDING * self.borders[2 * axis] as usize;
        let hi = PADDING * self.borders[2 * axis + 1] as usize;
        (lo, extent - hi)
    }
}

fn coefficient(ra: f64, cm: f64, h: f64) -> Option<f64> {
    let d = 1.0 / (ra * cm * h * h);
    d.is_finite().then_some(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_present_borders() {
        let grid = Grid::new(30, 0, 0, [true; 6], false);
        assert_eq!(grid.dimensionality(), 1);
        assert_eq!(grid.shape(), [34, 1, 1]);

        let grid = Grid::new(20, 20, 0, [true, true, false, true, true, true], false);
        assert_eq!(grid.dimensionality(), 2);
        assert_eq!(grid.shape(), [24, 22, 1]);
    }

    #[test]
    fn single_cell_grid_has_no_padding() {
        let grid = Grid::new(1, 0, 0, [true; 6], false);
        assert_eq!(grid.dimensionality(), 0);
        assert_eq!(grid.shape(), [1, 1, 1]);
        assert!(grid.border_mask().iter().all(|&m| m == 1.0));
    }

    #[test]
    fn cylindrical_grid_drops_y_borders() {
        let grid = Grid::new(20, 20, 0, [true; 6], true);
        assert!(!grid.borders()[2]);
        assert!(!grid.borders()[3]);
        // No padding along y, only along x.
        assert_eq!(grid.shape(), [24, 20, 1]);
    }

    #[test]
    fn coefficients_track_their_inputs_exactly() {
        let mut grid = Grid::new(10, 0, 0, [true; 6], false);
        grid.set_hx(0.05);
        assert_eq!(
            grid.diffusion_coefficients()[0],
            1.0 / (grid.rax() * grid.cm() * 0.05 * 0.05)
        );
        grid.set_rax(2000.0);
        assert_eq!(
            grid.diffusion_coefficients()[0],
            1.0 / (2000.0 * grid.cm() * 0.05 * 0.05)
        );
        grid.set_cm(2.0);
        for (d, (ra, h)) in grid.diffusion_coefficients().into_iter().zip([
            (grid.rax(), grid.hx()),
            (grid.ray(), grid.hy()),
            (grid.raz(), grid.hz()),
        ]) {
            assert_eq!(d, 1.0 / (ra * 2.0 * h * h));
        }
    }

    #[test]
    fn rewriting_the_same_spacing_is_a_no_op() {
        let mut grid = Grid::new(10, 0, 0, [true; 6], false);
        let before = grid.diffusion_coefficients();
        grid.set_hx(grid.hx());
        assert_eq!(grid.diffusion_coefficients(), before);
    }

    #[test]
    fn bad_spacing_keeps_previous_coefficient() {
        let mut grid = Grid::new(10, 0, 0, [true; 6], false);
        let before = grid.diffusion_coefficients()[0];
        grid.set_hx(0.0);
        assert_eq!(grid.diffusion_coefficients()[0], before);
        assert_eq!(grid.hx(), 0.0);
    }

    #[test]
    fn mask_is_one_inside_and_damped_in_padding() {
        let grid = Grid::new(6, 6, 0, [true; 6], false);
        let mask = grid.border_mask();
        assert_eq!(mask.dim(), (10, 10, 1));
        for ((i, j, _), &m) in mask.indexed_iter() {
            let interior = (2..8).contains(&i) && (2..8).contains(&j);
            if interior {
                assert_eq!(m, 1.0);
            } else {
                assert_eq!(m, BORDER_DAMPING);
            }
        }
    }
}
