//! Single-threaded reference integrator.

use ndarray::{Array4, Axis};
use tracing::debug;

use tissue::Tissue;

use crate::recording::Recording;
use crate::{apply_stim_overrides, Result, RunConfig};

/// Integrates `tissue` up to `cfg.tmax`, recording the membrane potential
/// every `cfg.decim` steps.
pub fn serial_compute(tissue: &mut Tissue, cfg: &RunConfig) -> Result<Recording> {
    cfg.validate()?;
    apply_stim_overrides(tissue, cfg);

    let [nx, ny, nz] = tissue.grid().shape();
    let slots = cfg.sample_slots();
    let mut t = vec![tissue.time(); slots];
    let mut vm = Array4::zeros((nx, ny, nz, slots));
    let mut recorded = 0;
    let waveform = cfg.waveform();
    tissue.arm_stimulus();
    debug!(%tissue, tmax = cfg.tmax, "serial integration started");

    while tissue.time() < cfg.tmax {
        let value = waveform.value(tissue.time());
        tissue.apply_stimulus(value);
        tissue.step(cfg.dt);
        let step = (tissue.time() / cfg.dt).round() as usize;
        if step % cfg.decim == 0 && recorded + 1 < slots {
            recorded += 1;
            t[recorded] = tissue.time();
            vm.index_axis_mut(Axis(3), recorded).assign(&tissue.vm());
        }
    }

    debug!(samples = recorded, "serial integration finished");
    Ok(Recording::collect(t, vm, recorded))
}
