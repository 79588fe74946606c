//! The tissue model: state field, stimulus bookkeeping, and the forward-Euler
//! step combining reaction and diffusion.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array3, Array4, ArrayView3, Axis};
use rand::Rng;

use crate::diffusion::add_membrane_coupling;
use crate::grid::Grid;
use crate::reaction::{react_field, Kernel, Red3, Red6};
use crate::stimulus::{inject, StimRegion};
use crate::{Result, TissueError};

/// Resting extracellular calcium (mmol).
pub const CA0_DEFAULT: f64 = 3.0;

/// A sheet (or fiber, or volume) of excitable cells.
///
/// The state field `Y` has shape `(Nx, Ny, Nz, dim)` over the padded grid;
/// channel 0 is the membrane potential and the only channel subject to
/// diffusion. `dY` is overwritten in place on every step.
#[derive(Debug, Clone)]
pub struct Tissue {
    grid: Grid,
    kernel: Kernel,
    y: Array4<f64>,
    dy: Array4<f64>,
    istim: Array3<f64>,
    mask: Array3<f64>,
    ca0: f64,
    masktempo: f64,
    time: f64,
    stimulating: bool,
    stim: Option<StimRegion>,
    stim2: Option<StimRegion>,
}

impl Tissue {
    /// Builds a tissue over an `nx` by `ny` by `nz` grid of cells driven by
    /// `kernel`. `noise` perturbs every initial entry multiplicatively by a
    /// uniform factor in `1 +- noise/2`.
    pub fn new(
        kernel: Kernel,
        nx: usize,
        ny: usize,
        nz: usize,
        noise: f64,
        borders: [bool; 6],
        cylindrical: bool,
    ) -> Self {
        let grid = Grid::new(nx, ny, nz, borders, cylindrical);
        let [px, py, pz] = grid.shape();
        let dim = kernel.dim();
        let mut y = Array4::zeros((px, py, pz, dim));
        for (channel, &value) in kernel.resting().iter().enumerate() {
            y.index_axis_mut(Axis(3), channel).fill(value);
        }
        if noise != 0.0 {
            let mut rng = rand::thread_rng();
            y.mapv_inplace(|v| v * (1.0 + (rng.gen::<f64>() - 0.5) * noise));
        }
        let mask = grid.border_mask();
        Self {
            kernel,
            dy: Array4::zeros(y.raw_dim()),
            istim: Array3::zeros((px, py, pz)),
            mask,
            y,
            grid,
            ca0: CA0_DEFAULT,
            masktempo: 1.0,
            time: 0.0,
            stimulating: true,
            stim: None,
            stim2: None,
        }
    }

    /// As [`Tissue::new`], selecting the kernel by its state dimension
    /// (3 or 6) with default parameters.
    pub fn with_dim(
        dim: usize,
        nx: usize,
        ny: usize,
        nz: usize,
        noise: f64,
        borders: [bool; 6],
        cylindrical: bool,
    ) -> Result<Self> {
        let kernel = match dim {
            3 => Kernel::Red3(Red3::default()),
            6 => Kernel::Red6(Red6::default()),
            other => return Err(TissueError::UnsupportedDim(other)),
        };
        Ok(Self::new(kernel, nx, ny, nz, noise, borders, cylindrical))
    }

    /// Restores the nominal initial state and clock without reallocating.
    /// Initial noise is not reapplied.
    pub fn reset(&mut self) {
        self.time = 0.0;
        self.stimulating = true;
        for (channel, &value) in self.kernel.resting().iter().enumerate() {
            self.y.index_axis_mut(Axis(3), channel).fill(value);
        }
        self.istim.fill(0.0);
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    pub fn state(&self) -> &Array4<f64> {
        &self.y
    }

    /// Membrane-potential slice of the state field.
    pub fn vm(&self) -> ArrayView3<'_, f64> {
        self.y.index_axis(Axis(3), 0)
    }

    pub fn mask(&self) -> &Array3<f64> {
        &self.mask
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn ca0(&self) -> f64 {
        self.ca0
    }

    pub fn set_ca0(&mut self, ca0: f64) {
        self.ca0 = ca0;
    }

    pub fn masktempo(&self) -> f64 {
        self.masktempo
    }

    pub fn set_masktempo(&mut self, masktempo: f64) {
        self.masktempo = masktempo;
    }

    pub fn stim_regions(&self) -> [Option<StimRegion>; 2] {
        [self.stim, self.stim2]
    }

    pub fn set_stim(&mut self, region: Option<StimRegion>) {
        self.stim = region;
    }

    pub fn set_stim2(&mut self, region: Option<StimRegion>) {
        self.stim2 = region;
    }

    /// Reopens the stimulation window at the start of a run.
    pub fn arm_stimulus(&mut self) {
        self.stimulating = true;
    }

    pub fn is_stimulating(&self) -> bool {
        self.stimulating
    }

    /// Writes the momentary stimulus current into both regions, closing the
    /// stimulation window the first time the waveform returns to zero.
    pub fn apply_stimulus(&mut self, value: f64) {
        if self.stimulating && self.time != 0.0 && value == 0.0 {
            self.stimulating = false;
        }
        inject(&mut self.istim, self.stim.as_ref(), value);
        inject(&mut self.istim, self.stim2.as_ref(), value);
    }

    /// Fills `dY` with the reaction term of every cell plus the masked
    /// diffusion of the membrane potential.
    pub fn compute_derivative(&mut self) {
        let cm = self.grid.cm();
        react_field(
            &self.kernel,
            self.y.view(),
            self.istim.view(),
            self.ca0,
            cm,
            self.masktempo,
            &mut self.dy,
        );
        add_membrane_coupling(
            self.y.index_axis(Axis(3), 0),
            0..self.grid.shape()[0],
            self.grid.diffusion_coefficients(),
            self.grid.dimensionality(),
            self.stimulating,
            [self.stim, self.stim2],
            self.mask.view(),
            self.dy.index_axis_mut(Axis(3), 0),
        );
    }

    /// One forward-Euler step: `Y += dY * dt`, advancing the clock.
    pub fn step(&mut self, dt: f64) {
        self.compute_derivative();
        self.y.scaled_add(dt, &self.dy);
        self.time += dt;
    }

    /// Replaces the state field and clock, e.g. after an external integrator
    /// advanced a copy of the state.
    pub fn adopt_state(&mut self, y: Array4<f64>, time: f64) {
        debug_assert_eq!(y.raw_dim(), self.y.raw_dim());
        self.y = y;
        self.time = time;
    }

    /// Kernel registry plus the passive membrane quantities.
    pub fn params(&self) -> BTreeMap<String, f64> {
        let mut params = self.kernel.params();
        params.insert("Cm".to_string(), self.grid.cm());
        params.insert("Rax".to_string(), self.grid.rax());
        params.insert("Ray".to_string(), self.grid.ray());
        params.insert("Raz".to_string(), self.grid.raz());
        params.insert("hx".to_string(), self.grid.hx());
        params.insert("hy".to_string(), self.grid.hy());
        params.insert("hz".to_string(), self.grid.hz());
        params.insert("Ca0".to_string(), self.ca0);
        params.insert("masktempo".to_string(), self.masktempo);
        params
    }

    /// Applies a parameter map produced by [`Tissue::params`] on a same-kind
    /// model. Membrane quantities go through the coefficient-refreshing
    /// setters.
    pub fn set_params(&mut self, params: &BTreeMap<String, f64>) -> Result<()> {
        for (name, &value) in params {
            if self.kernel.set_param(name, value) {
                continue;
            }
            match name.as_str() {
                "Cm" => self.grid.set_cm(value),
                "Rax" => self.grid.set_rax(value),
                "Ray" => self.grid.set_ray(value),
                "Raz" => self.grid.set_raz(value),
                "hx" => self.grid.set_hx(value),
                "hy" => self.grid.set_hy(value),
                "hz" => self.grid.set_hz(value),
                "Ca0" => self.ca0 = value,
                "masktempo" => self.masktempo = value,
                _ => return Err(TissueError::UnknownParameter(name.clone())),
            }
        }
        Ok(())
    }
}

impl fmt::Display for Tissue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [nx, ny, nz] = self.grid.shape();
        write!(
            f,
            "{} tissue, {}x{}x{} cells, {} state variables",
            self.kernel.name(),
            nx,
            ny,
            nz,
            self.kernel.dim()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiber(nx: usize) -> Tissue {
        Tissue::with_dim(3, nx, 0, 0, 0.0, [true; 6], false).unwrap()
    }

    #[test]
    fn initial_state_replicates_the_resting_vector() {
        let tissue = fiber(10);
        assert_eq!(tissue.state().dim(), (14, 1, 1, 3));
        for lane in tissue.state().lanes(Axis(3)) {
            assert_eq!(lane[0], -50.0);
            assert_eq!(lane[1], 0.079257);
            assert_eq!(lane[2], 0.001);
        }
    }

    #[test]
    fn unsupported_dim_is_rejected() {
        assert!(matches!(
            Tissue::with_dim(4, 10, 0, 0, 0.0, [true; 6], false),
            Err(TissueError::UnsupportedDim(4))
        ));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut tissue = fiber(10);
        tissue.set_stim(Some(StimRegion::from_coords(&[4, 7], 1).unwrap()));
        tissue.apply_stimulus(0.2);
        for _ in 0..200 {
            tissue.step(0.05);
        }
        tissue.reset();
        let first = tissue.clone();
        tissue.reset();
        assert_eq!(tissue.state(), first.state());
        assert_eq!(tissue.time(), 0.0);
        assert!(tissue.is_stimulating());
    }

    #[test]
    fn noise_perturbs_within_the_advertised_band() {
        let tissue = Tissue::with_dim(3, 10, 0, 0, 0.1, [true; 6], false).unwrap();
        for lane in tissue.state().lanes(Axis(3)) {
            assert!(lane[0] <= -50.0 * 0.95 && lane[0] >= -50.0 * 1.05);
        }
    }

    #[test]
    fn stimulus_window_closes_once_and_stays_closed() {
        let mut tissue = fiber(10);
        tissue.set_stim(Some(StimRegion::from_coords(&[4, 7], 1).unwrap()));
        tissue.apply_stimulus(0.0);
        assert!(tissue.is_stimulating(), "value 0 at t = 0 must not close");
        tissue.step(0.05);
        tissue.apply_stimulus(0.1);
        assert!(tissue.is_stimulating());
        tissue.apply_stimulus(0.0);
        assert!(!tissue.is_stimulating());
        tissue.apply_stimulus(0.1);
        assert!(!tissue.is_stimulating(), "the window never reopens mid-run");
    }

    #[test]
    fn coupling_is_masked_inside_the_driven_box_while_open() {
        let mut tissue = fiber(30);
        let region = StimRegion::from_coords(&[4, 7], 1).unwrap();
        tissue.set_stim(Some(region));
        // Make the field inhomogeneous so neighbouring cells would couple.
        for _ in 0..100 {
            tissue.apply_stimulus(0.2);
            tissue.step(0.05);
        }
        assert!(tissue.is_stimulating());
        tissue.apply_stimulus(0.2);
        tissue.compute_derivative();

        // With the window open, `dVm` inside the box is the bare reaction
        // term: the diffusion contribution there is exactly zero.
        let reaction_only = |tissue: &Tissue, i: usize, istim: f64| {
            let mut expected = ndarray::Array1::zeros(3);
            tissue.kernel.derive(
                tissue.y.slice(ndarray::s![i, 0, 0, ..]),
                istim,
                tissue.ca0,
                tissue.grid.cm(),
                expected.view_mut(),
            );
            expected[0]
        };
        for i in 4..7 {
            assert_eq!(tissue.dy[[i, 0, 0, 0]], reaction_only(&tissue, i, 0.2));
        }
        // A cell just outside the box still couples to its neighbours.
        assert_ne!(tissue.dy[[8, 0, 0, 0]], reaction_only(&tissue, 8, 0.0));
    }

    #[test]
    fn parameter_round_trip_between_same_kind_models() {
        let mut a = fiber(10);
        a.set_params(&BTreeMap::from([
            ("Gk".to_string(), 0.1),
            ("hx".to_string(), 0.05),
            ("Ca0".to_string(), 2.5),
        ]))
        .unwrap();
        let mut b = fiber(10);
        b.set_params(&a.params()).unwrap();
        assert_eq!(a.params(), b.params());
        assert_eq!(
            a.grid().diffusion_coefficients(),
            b.grid().diffusion_coefficients()
        );

        assert!(matches!(
            b.set_params(&BTreeMap::from([("Gx".to_string(), 1.0)])),
            Err(TissueError::UnknownParameter(_))
        ));
    }
}
