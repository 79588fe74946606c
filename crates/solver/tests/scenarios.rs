//! End-to-end behaviour of the serial integrator on the reference scenarios.

use ndarray::Axis;
use solver::{serial_compute, Recording, RunConfig};
use tissue::{StimRegion, Tissue};

fn fiber(dim: usize, nx: usize) -> Tissue {
    Tissue::with_dim(dim, nx, 0, 0, 0.0, [true; 6], false).unwrap()
}

fn stim_1d(x0: i64, x1: i64) -> Option<StimRegion> {
    Some(StimRegion::from_coords(&[x0, x1], 1).unwrap())
}

/// First sample index where the site's membrane potential exceeds the level.
fn first_crossing(recording: &Recording, site: [usize; 3], level: f64) -> Option<usize> {
    recording.trace(site).iter().position(|&v| v > level)
}

#[test]
fn red3_settles_near_rest_without_stimulus() {
    let mut cell = fiber(3, 1);
    let cfg = RunConfig {
        tmax: 1000.0,
        ..RunConfig::default()
    };
    let recording = serial_compute(&mut cell, &cfg).unwrap();
    assert_eq!(recording.samples(), 1000);

    let trace = recording.trace([0, 0, 0]);
    let last = trace[trace.len() - 1];
    assert!(
        (last + 50.0).abs() < 1.0,
        "unstimulated cell ended at {last} mV"
    );
    for &v in trace {
        assert!((v + 50.0).abs() < 5.0, "unstimulated cell reached {v} mV");
    }
}

#[test]
fn red3_pulse_propagates_along_a_fiber() {
    let mut fiber = fiber(3, 30);
    let cfg = RunConfig {
        tmax: 200.0,
        stim: stim_1d(4, 7),
        ..RunConfig::default()
    };
    let recording = serial_compute(&mut fiber, &cfg).unwrap();

    let near = first_crossing(&recording, [10, 0, 0], 0.0)
        .expect("the wave never reached the near site");
    let far = first_crossing(&recording, [20, 0, 0], 0.0)
        .expect("the wave never reached the far site");
    assert!(
        far > near,
        "far site fired at sample {far}, near site at {near}"
    );
}

#[test]
fn red6_peaks_higher_than_red3_at_the_driven_site() {
    let cfg = RunConfig {
        tmax: 200.0,
        stim: stim_1d(4, 7),
        ..RunConfig::default()
    };
    let peak_at_site = |dim: usize| {
        let mut tissue = fiber(dim, 30);
        let recording = serial_compute(&mut tissue, &cfg).unwrap();
        recording
            .trace([5, 0, 0])
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    };
    let red3 = peak_at_site(3);
    let red6 = peak_at_site(6);
    assert!(
        red6 >= red3 + 5.0,
        "Red6 peaked at {red6} mV, Red3 at {red3} mV"
    );
}

#[test]
fn padding_stays_quiescent_while_the_interior_fires() {
    let sheet = || Tissue::with_dim(3, 20, 20, 0, 0.0, [true; 6], false).unwrap();
    let stim = Some(StimRegion::from_coords(&[8, 12, 8, 12], 2).unwrap());
    let cfg = RunConfig {
        tmax: 150.0,
        stim,
        ..RunConfig::default()
    };
    let driven = serial_compute(&mut sheet(), &cfg).unwrap();

    // Reference trajectory of the same sheet with nothing injected: the
    // reaction term drifts identically everywhere, so any difference in the
    // padding is leakage through the damped border.
    let quiet_cfg = RunConfig {
        tmax: 150.0,
        ..RunConfig::default()
    };
    let quiet = serial_compute(&mut sheet(), &quiet_cfg).unwrap();

    let (nx, ny, _, samples) = driven.vm.dim();
    assert_eq!(driven.vm.dim(), quiet.vm.dim());
    let mut worst = 0.0f64;
    for idx in 0..samples {
        let d = driven.vm.index_axis(Axis(3), idx);
        let q = quiet.vm.index_axis(Axis(3), idx);
        for i in 0..nx {
            for j in 0..ny {
                if i == 0 || i == nx - 1 || j == 0 || j == ny - 1 {
                    worst = worst.max((d[[i, j, 0]] - q[[i, j, 0]]).abs());
                }
            }
        }
    }
    assert!(worst < 1e-3, "outer padding moved by {worst} mV");

    // The driven site itself departs hard from the quiet trajectory.
    let site_shift = driven
        .trace([9, 9, 0])
        .iter()
        .zip(quiet.trace([9, 9, 0]))
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f64, f64::max);
    assert!(site_shift > 10.0, "stimulated site only moved {site_shift} mV");
}

#[test]
fn rerunning_after_reset_is_bit_identical() {
    let mut fiber = fiber(3, 30);
    let cfg = RunConfig {
        tmax: 50.0,
        stim: stim_1d(4, 7),
        ..RunConfig::default()
    };
    let first = serial_compute(&mut fiber, &cfg).unwrap();
    fiber.reset();
    let second = serial_compute(&mut fiber, &cfg).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cylindrical_sheets_skip_y_borders() {
    let tissue = Tissue::with_dim(3, 20, 20, 0, 0.0, [true; 6], true).unwrap();
    let borders = tissue.grid().borders();
    assert!(!borders[2]);
    assert!(!borders[3]);
    assert_eq!(tissue.grid().shape(), [24, 20, 1]);
    // Every y column is interior: the mask is damped only along x.
    let mask = tissue.mask();
    for ((i, _, _), &m) in mask.indexed_iter() {
        if (2..22).contains(&i) {
            assert_eq!(m, 1.0);
        } else {
            assert_eq!(m, 1e-4);
        }
    }
}
