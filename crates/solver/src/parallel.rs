//! Domain-decomposed integration across shared-memory workers.
//!
//! The leading grid axis is split into slabs with a two-row ghost overlap
//! (see [`crate::partition`]). Every worker drives the tissue step over its
//! own slab against the shared state field; a step is two barrier phases,
//! one in which everyone reads the state committed last step, and one in
//! which everyone commits its interior rows. Ghost rows are committed by the
//! neighbour that owns them. Rank 0 additionally samples the shared field on
//! the record cadence, which always lands on a phase boundary.

use std::num::NonZeroUsize;
use std::ops::Range;

use ndarray::{s, Array3, Array4, ArrayView3, Axis};
use tracing::{debug, warn};

use tissue::diffusion::add_membrane_coupling;
use tissue::reaction::react_field;
use tissue::stimulus::inject;
use tissue::{Kernel, StimRegion, StimWaveform, Tissue};

use crate::barrier::Rendezvous;
use crate::partition::partition_rows;
use crate::recording::Recording;
use crate::shared::SharedState;
use crate::{apply_stim_overrides, Result, RunConfig, SolverError};

/// Integrates `tissue` up to `cfg.tmax` across `cfg.workers` threads,
/// recording the membrane potential every `cfg.decim` steps. Produces the
/// same trajectory as [`crate::serial_compute`].
pub fn parallel_compute(tissue: &mut Tissue, cfg: &RunConfig) -> Result<Recording> {
    cfg.validate()?;
    apply_stim_overrides(tissue, cfg);

    let [nx, ny, nz] = tissue.grid().shape();
    let workers = resolve_workers(cfg.workers, nx);
    let parts = partition_rows(nx, workers)?;

    let shared = SharedState::new(tissue.state());
    let barrier = Rendezvous::new(workers);
    let slots = cfg.sample_slots();
    let mut t = vec![tissue.time(); slots];
    let mut vm = Array4::zeros((nx, ny, nz, slots));
    let mut recorded = 0;

    let ctx = SlabContext {
        shared: &shared,
        barrier: &barrier,
        kernel: tissue.kernel(),
        mask: tissue.mask(),
        stim: tissue.stim_regions(),
        waveform: cfg.waveform(),
        coefficients: tissue.grid().diffusion_coefficients(),
        dimensionality: tissue.grid().dimensionality(),
        dim: tissue.kernel().dim(),
        ny,
        nz,
        cm: tissue.grid().cm(),
        ca0: tissue.ca0(),
        masktempo: tissue.masktempo(),
        dt: cfg.dt,
        tmax: cfg.tmax,
        decim: cfg.decim,
        t0: tissue.time(),
        workers,
    };
    debug!(%tissue, workers, tmax = cfg.tmax, "parallel integration started");

    let final_time = crossbeam::thread::scope(|scope| {
        let ctx = &ctx;
        for (rank, part) in parts.iter().enumerate().skip(1) {
            let part = part.clone();
            scope.spawn(move |_| {
                integrate_slab(ctx, rank, part, None);
            });
        }
        integrate_slab(
            ctx,
            0,
            parts[0].clone(),
            Some(Recorder {
                t: &mut t,
                vm: &mut vm,
                count: &mut recorded,
            }),
        )
    })
    .map_err(|_| SolverError::WorkerPanic)?;

    tissue.adopt_state(shared.into_array(), final_time);
    debug!(samples = recorded, "parallel integration finished");
    Ok(Recording::collect(t, vm, recorded))
}

/// Caps the requested worker count at the CPU count and at what the grid can
/// host, logging when the request is reduced.
fn resolve_workers(requested: Option<usize>, nx: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let mut workers = requested.unwrap_or(available);
    if workers > available {
        warn!(
            requested = workers,
            available, "more workers requested than available CPUs, capping"
        );
        workers = available;
    }
    // Each slab besides its ghosts needs at least one interior row.
    let hosting = nx.saturating_sub(2).max(1);
    if workers > hosting {
        warn!(
            requested = workers,
            rows = nx,
            "grid too small for the requested partition, capping"
        );
        workers = hosting;
    }
    workers
}

/// Everything a worker shares or copies, borrowed from the driver.
struct SlabContext<'a> {
    shared: &'a SharedState,
    barrier: &'a Rendezvous,
    kernel: &'a Kernel,
    mask: &'a Array3<f64>,
    stim: [Option<StimRegion>; 2],
    waveform: StimWaveform,
    coefficients: [f64; 3],
    dimensionality: usize,
    dim: usize,
    ny: usize,
    nz: usize,
    cm: f64,
    ca0: f64,
    masktempo: f64,
    dt: f64,
    tmax: f64,
    decim: usize,
    t0: f64,
    workers: usize,
}

/// Rank 0's handle on the output buffers.
struct Recorder<'a> {
    t: &'a mut [f64],
    vm: &'a mut Array4<f64>,
    count: &'a mut usize,
}

impl Recorder<'_> {
    fn sample(&mut self, time: f64, vm: ArrayView3<'_, f64>) {
        let idx = *self.count + 1;
        if idx < self.t.len() {
            self.t[idx] = time;
            self.vm.index_axis_mut(Axis(3), idx).assign(&vm);
            *self.count = idx;
        }
    }
}

/// Worker loop: advances rows `rows` of the shared field until `tmax`.
/// Returns the final clock value.
fn integrate_slab(
    ctx: &SlabContext<'_>,
    rank: usize,
    rows: Range<usize>,
    mut recorder: Option<Recorder<'_>>,
) -> f64 {
    let lx = rows.len();
    let keep_first = usize::from(rank > 0);
    let keep_last = usize::from(rank + 1 < ctx.workers);

    let mut mask = ctx.mask.slice(s![rows.clone(), .., ..]).to_owned();
    if ctx.workers > 1 {
        // Ghost rows belong to the neighbouring slab; their derivative is
        // never committed here, so their coupling term is irrelevant.
        if rank == 0 {
            mask.index_axis_mut(Axis(0), lx - 1).fill(0.0);
        }
        if rank + 1 == ctx.workers {
            mask.index_axis_mut(Axis(0), 0).fill(0.0);
        }
    }
    let stim = ctx
        .stim
        .map(|region| region.and_then(|r| r.localized(rows.start, rows.end)));

    let mut istim = Array3::zeros(mask.raw_dim());
    let mut dy = Array4::zeros((lx, ctx.ny, ctx.nz, ctx.dim));
    let mut time = ctx.t0;
    let mut stimulating = true;

    while time < ctx.tmax {
        let value = ctx.waveform.value(time);
        if stimulating && time != 0.0 && value == 0.0 {
            stimulating = false;
        }
        inject(&mut istim, stim[0].as_ref(), value);
        inject(&mut istim, stim[1].as_ref(), value);

        {
            // Read phase: every worker sees the state committed last step.
            let y = unsafe { ctx.shared.view() };
            react_field(
                ctx.kernel,
                y.slice(s![rows.clone(), .., .., ..]),
                istim.view(),
                ctx.ca0,
                ctx.cm,
                ctx.masktempo,
                &mut dy,
            );
            add_membrane_coupling(
                y.index_axis(Axis(3), 0),
                rows.clone(),
                ctx.coefficients,
                ctx.dimensionality,
                stimulating,
                stim,
                mask.view(),
                dy.index_axis_mut(Axis(3), 0),
            );
        }
        ctx.barrier.wait();
        {
            // Commit phase: interior rows only, disjoint across workers.
            let lo = rows.start + keep_first;
            let hi = rows.end - keep_last;
            let mut interior = unsafe { ctx.shared.rows_mut(lo, hi) };
            interior.scaled_add(ctx.dt, &dy.slice(s![keep_first..lx - keep_last, .., .., ..]));
        }
        time += ctx.dt;
        ctx.barrier.wait();

        if (time / ctx.dt).round() as usize % ctx.decim == 0 {
            if let Some(recorder) = recorder.as_mut() {
                // Until the next commit phase the field is read-only, so the
                // snapshot is a consistent post-step state.
                let y = unsafe { ctx.shared.view() };
                recorder.sample(time, y.index_axis(Axis(3), 0));
            }
        }
    }
    time
}
