use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use gempyor_core::config::{load_run_config, Context};
use gempyor_core::driver::{run_one_sim, ModelInfo};

/// Runs a single simulation id for a compiled scenario.
#[derive(Parser, Debug)]
#[command(name = "simulate")]
struct Args {
    /// Path to the scenario's TOML config.
    #[arg(long)]
    config: PathBuf,

    /// Base directory CSV side-tables (geodata, mobility, timeseries) are
    /// resolved relative to.
    #[arg(long)]
    project_path: PathBuf,

    /// Sim id; also XORed into the RNG seed.
    #[arg(long, default_value_t = 0)]
    id: u64,

    /// Directory artifacts are written under.
    #[arg(long)]
    prefix: PathBuf,

    /// Name of a modifier in `seir_modifiers.modifiers` to apply (usually a
    /// top-level `StackedModifier`); omit to run unmodified.
    #[arg(long)]
    modifier: Option<String>,
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
    let contents = fs::read_to_string(&args.config)?;
    let config = load_run_config(&contents)?;
    let ctx = Context::new(args.project_path, format!("sim-{}", args.id), args.id);

    let model = ModelInfo::new(config, ctx)?;
    fs::create_dir_all(&args.prefix)?;

    let cancel = AtomicBool::new(false);
    let out = run_one_sim(&model, args.id, args.modifier.as_deref(), &args.prefix, &cancel)?;
    log::info!(
        "sim {} written: {} {} {}",
        out.sim_id,
        out.seir_path.display(),
        out.spar_path.display(),
        out.snpi_path.display()
    );
    Ok(())
}
