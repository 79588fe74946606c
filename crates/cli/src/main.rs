//! Command-line driver: build a tissue model, integrate it, report summary
//! statistics, and optionally serialize the recording.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;

use solver::{parallel_compute, serial_compute, Recording, RunConfig};
use tissue::{Grid, Kernel, StimRegion, Tissue};

#[derive(Parser, Debug)]
#[command(
    name = "uterus-sim",
    about = "Reaction-diffusion simulation of uterine smooth-muscle tissue"
)]
struct Args {
    /// Reaction model (red3 or red6)
    #[arg(long, default_value = "red3")]
    model: String,

    /// Cells along x (before border padding)
    #[arg(long, default_value_t = 40)]
    nx: usize,

    /// Cells along y; 0 for a fiber
    #[arg(long, default_value_t = 0)]
    ny: usize,

    /// Cells along z; 0 for a sheet
    #[arg(long, default_value_t = 0)]
    nz: usize,

    /// Initial-state noise coefficient
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// Treat the sheet as a cylinder (periodic along y, no y borders)
    #[arg(long)]
    cylindrical: bool,

    /// Simulation horizon in ms
    #[arg(long, default_value_t = 500.0)]
    tmax: f64,

    /// Stimulated box, e.g. "6,10" (fiber) or "6,10,2,8" (sheet)
    #[arg(long)]
    stim: Option<String>,

    /// Second stimulated box
    #[arg(long)]
    stim2: Option<String>,

    /// Peak stimulus current
    #[arg(long, default_value_t = 0.2)]
    iamp: f64,

    /// Worker threads; omit to use every CPU
    #[arg(long)]
    workers: Option<usize>,

    /// Integrate on a single thread
    #[arg(long)]
    serial: bool,

    /// Write the recording here (.json, anything else is bincode)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Serialize)]
struct SavedRun<'a> {
    model: &'a str,
    params: BTreeMap<String, f64>,
    config: &'a RunConfig,
    t: Vec<f64>,
    shape: [usize; 4],
    vm: Vec<f64>,
}

fn parse_region(text: &str, dimensionality: usize) -> Result<StimRegion> {
    let coords: Vec<i64> = text
        .split(',')
        .map(|part| part.trim().parse())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("cannot parse stimulus box {text:?}"))?;
    Ok(StimRegion::from_coords(&coords, dimensionality)?)
}

fn save(path: &Path, tissue: &Tissue, cfg: &RunConfig, recording: &Recording) -> Result<()> {
    let (nx, ny, nz, samples) = recording.vm.dim();
    let run = SavedRun {
        model: tissue.kernel().name(),
        params: tissue.params(),
        config: cfg,
        t: recording.t.to_vec(),
        shape: [nx, ny, nz, samples],
        vm: recording.vm.iter().copied().collect(),
    };
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let writer = BufWriter::new(file);
    if path.extension().and_then(OsStr::to_str) == Some("json") {
        serde_json::to_writer(writer, &run)?;
    } else {
        bincode::serialize_into(writer, &run)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let kernel = Kernel::from_name(&args.model)?;
    let mut tissue = Tissue::new(
        kernel,
        args.nx,
        args.ny,
        args.nz,
        args.noise,
        [true; 6],
        args.cylindrical,
    );
    let dimensionality = Grid::dimensionality_for(args.nx, args.ny, args.nz);

    let cfg = RunConfig {
        tmax: args.tmax,
        iamp: args.iamp,
        workers: args.workers,
        stim: args
            .stim
            .as_deref()
            .map(|text| parse_region(text, dimensionality))
            .transpose()?,
        stim2: args
            .stim2
            .as_deref()
            .map(|text| parse_region(text, dimensionality))
            .transpose()?,
        ..RunConfig::default()
    };

    let recording = if args.serial {
        serial_compute(&mut tissue, &cfg)?
    } else {
        parallel_compute(&mut tissue, &cfg)?
    };

    let peak = recording
        .vm
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    println!("{tissue}");
    println!(
        "{} samples over {:.1} ms, peak Vm {:.2} mV",
        recording.samples(),
        args.tmax,
        peak
    );

    if let Some(path) = &args.out {
        save(path, &tissue, &cfg, &recording)?;
        println!("recording written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stimulus_boxes() {
        let region = parse_region("6,10", 1).unwrap();
        assert_eq!(region.x, (6, 10));
        assert_eq!(region.y, (0, 1));
        let region = parse_region(" 6, 10, 2, 8 ", 2).unwrap();
        assert_eq!(region.y, (2, 8));
        assert!(parse_region("6,10", 2).is_err());
        assert!(parse_region("6,ten", 1).is_err());
    }
}
