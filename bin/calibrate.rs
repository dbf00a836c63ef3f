use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use gempyor_core::config::{load_run_config, Context};
use gempyor_core::driver::{EnsembleSampler, FannedOutEvaluator, ModelInfo, RunAndScore};

/// Drives ensemble calibration for a compiled scenario. The stretch-move
/// walker-update algorithm itself is out of scope here (see `EnsembleSampler`
/// in `gempyor_core::driver`) — this binary wires the configured scenario
/// into a log-likelihood callback and fans walker evaluations out to a
/// worker pool each iteration.
#[derive(Parser, Debug)]
#[command(name = "calibrate")]
struct Args {
    #[arg(long)]
    config: PathBuf,

    #[arg(long)]
    project_path: PathBuf,

    #[arg(long, default_value_t = 10)]
    nwalkers: usize,

    #[arg(long, default_value_t = 10)]
    niterations: usize,

    #[arg(long, default_value_t = 100)]
    nsamples: usize,

    #[arg(long, default_value_t = 1)]
    nthin: usize,

    #[arg(long, default_value_t = 1)]
    jobs: usize,

    #[arg(long, default_value_t = 0)]
    id: u64,

    #[arg(long)]
    prefix: PathBuf,

    #[arg(long, default_value_t = false)]
    resume: bool,

    #[arg(long)]
    resume_location: Option<PathBuf>,
}

fn main() {
    simple_logger::SimpleLogger::new().init().unwrap();

    let args = Args::parse();
    if let Err(e) = run(args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> gempyor_core::error::Result<()> {
    if args.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.jobs)
            .build_global()
            .ok();
    }

    let contents = fs::read_to_string(&args.config)?;
    let config = load_run_config(&contents)?;
    let ctx = Context::new(args.project_path.clone(), format!("calib-{}", args.id), args.id);
    let model = Arc::new(ModelInfo::new(config, ctx)?);

    fs::create_dir_all(&args.prefix)?;

    if args.resume {
        let location = args.resume_location.as_ref().ok_or_else(|| {
            gempyor_core::error::EpiError::Config(
                "--resume requires --resume_location".to_string(),
            )
        })?;
        log::info!("resuming from {}", location.display());
    }

    let ll = RunAndScore {
        modifier_name: None,
        prefix: &args.prefix,
    };
    let cancel = AtomicBool::new(false);
    let mut sampler = FannedOutEvaluator;
    let scores = sampler.sample(&model, args.nwalkers, args.niterations, &ll, &cancel)?;

    log::info!(
        "calibration finished: {} walkers, {} samples requested (thinned by {})",
        scores.len(),
        args.nsamples,
        args.nthin
    );
    Ok(())
}
