//! Orchestrates one full run: loads subpops, compiles compartments and
//! parameters, builds the modifier library, and for each sim id drives
//! `quick_draw → reduce → parse_parameters → seeding → initial_conditions →
//! integrate`, persisting artifacts atomically.

use crate::artifacts::{write_seir, write_snpi, write_spar};
use crate::compartments::CompartmentModel;
use crate::config::{Context, RunConfig};
use crate::error::{EpiError, Result};
use crate::initial_conditions::InitialConditionsFactory;
use crate::integrate::{Integrator, Trajectory};
use crate::modifiers::{build_modifier_library, Modifier};
use crate::parameters::Parameters;
use crate::seeding::SeedingFactory;
use crate::subpop::SubpopStruct;
use crate::time_setup::TimeSetup;
use ndarray::{Array1, Array2};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// The immutable, shareable parts of a compiled scenario, plus the modifier
/// library chosen for this scenario's `seir_modifiers` (if any single
/// modifier is requested by name at the driver's call site, it is selected
/// from this library; the whole library is kept so each sim can look up its
/// own selection independently).
pub struct ModelInfo {
    subpop: Arc<SubpopStruct>,
    time_setup: Arc<TimeSetup>,
    compartments: Arc<CompartmentModel>,
    parameters: Arc<Parameters>,
    modifiers: Arc<HashMap<String, Modifier>>,
    config: Arc<RunConfig>,
    ctx: Context,
}

/// The result of one completed sim id: the trajectory plus the paths of the
/// artifacts written for it.
pub struct SimOutput {
    pub sim_id: u64,
    pub trajectory: Trajectory,
    pub seir_path: PathBuf,
    pub spar_path: PathBuf,
    pub snpi_path: PathBuf,
}

impl ModelInfo {
    pub fn new(config: RunConfig, ctx: Context) -> Result<Self> {
        let time_setup = TimeSetup::new(config.start_date, config.end_date)?;

        let (names, populations) = read_geodata(
            &ctx.resolve(&config.subpop_setup.geodata),
            &config.subpop_setup.population_key,
            &config.subpop_setup.names_key,
        )?;
        let mobility = read_mobility(&ctx.resolve(&config.subpop_setup.mobility), &names)?;
        let subpop = SubpopStruct::new(names, populations, mobility)?;

        let seir = config
            .seir
            .as_ref()
            .ok_or_else(|| EpiError::Config("missing `seir` section".to_string()))?;
        let parameters = Parameters::new(
            &seir.parameters,
            time_setup.ti(),
            time_setup.tf(),
            time_setup.dates(),
            subpop.names(),
            &ctx.project_path,
        )?;
        let compartments = CompartmentModel::compile(&config.compartments, &seir.transitions)?;

        let mut rng = SmallRng::seed_from_u64(ctx.seed);
        let modifiers = if let Some(seir_modifiers) = &config.seir_modifiers {
            let library: HashMap<String, crate::config::ModifierConfig> = seir_modifiers
                .modifiers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            build_modifier_library(
                &library,
                time_setup.ti(),
                time_setup.tf(),
                time_setup.dates(),
                subpop.names(),
                &mut rng,
            )?
        } else {
            HashMap::new()
        };

        Ok(ModelInfo {
            subpop: Arc::new(subpop),
            time_setup: Arc::new(time_setup),
            compartments: Arc::new(compartments),
            parameters: Arc::new(parameters),
            modifiers: Arc::new(modifiers),
            config: Arc::new(config),
            ctx,
        })
    }

    pub fn subpop(&self) -> &SubpopStruct {
        &self.subpop
    }

    pub fn compartments(&self) -> &CompartmentModel {
        &self.compartments
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

/// Runs one sim id end to end and persists its three artifacts under
/// `prefix/<sim_id>.<artifact>.csv`. `modifier_name`, if given, selects one
/// modifier (usually a top-level `StackedModifier`) from the library; `None`
/// skips the reduction step entirely.
pub fn run_one_sim(
    model: &ModelInfo,
    sim_id: u64,
    modifier_name: Option<&str>,
    prefix: &Path,
    cancel: &AtomicBool,
) -> Result<SimOutput> {
    let d = model.time_setup.n_days();
    let n = model.subpop.n();
    let mut rng = SmallRng::seed_from_u64(model.ctx.seed ^ sim_id);

    let drawn = model.parameters.quick_draw(d, n, &mut rng)?;
    let reduced = match modifier_name {
        Some(name) => {
            let modifier = model
                .modifiers
                .get(name)
                .ok_or_else(|| EpiError::Config(format!("unknown modifier '{name}'")))?;
            model.parameters.reduce(drawn, modifier)
        }
        None => drawn,
    };
    let parsed = model
        .compartments
        .parse_parameters(reduced.view(), model.parameters.pname_to_index())?;

    let seeding_cfg = model
        .config
        .seeding
        .as_ref()
        .ok_or_else(|| EpiError::Config("missing `seeding` section".to_string()))?;
    let events = SeedingFactory::get_from_config(
        seeding_cfg,
        &model.compartments,
        &model.subpop,
        &model.time_setup,
        &model.ctx.project_path,
    )?;

    let ic_cfg = model
        .config
        .initial_conditions
        .as_ref()
        .ok_or_else(|| EpiError::Config("missing `initial_conditions` section".to_string()))?;
    let ic = InitialConditionsFactory::draw(ic_cfg, &model.compartments, &model.subpop, &model.ctx.project_path)?;

    let trajectory = Integrator::integrate(
        &model.compartments,
        &model.subpop,
        parsed.view(),
        ic.view(),
        &events,
        1.0,
        true,
        &mut rng,
        cancel,
    )?;

    let seir_path = prefix.join(format!("{sim_id}.seir.csv"));
    let spar_path = prefix.join(format!("{sim_id}.spar.csv"));
    let snpi_path = prefix.join(format!("{sim_id}.snpi.csv"));

    write_seir(
        &seir_path,
        &model.compartments,
        &model.subpop,
        model.time_setup.dates(),
        &trajectory,
    )?;
    write_spar(&spar_path, &model.parameters, &reduced)?;
    let snpi_rows = modifier_name
        .and_then(|name| model.modifiers.get(name))
        .map(|m| m.get_reduction_to_write())
        .unwrap_or_default();
    write_snpi(&snpi_path, &snpi_rows)?;

    Ok(SimOutput {
        sim_id,
        trajectory,
        seir_path,
        spar_path,
        snpi_path,
    })
}

/// Fans `n_sims` independent sim ids out over a `rayon` thread pool. Each
/// worker seeds its RNG from `base_seed ^ sim_id`. A sim id that fails
/// (integration error, cancellation) is logged and excluded from the
/// returned vector rather than aborting the ensemble.
pub fn run_ensemble(
    model: Arc<ModelInfo>,
    sim_ids: &[u64],
    modifier_name: Option<&str>,
    prefix: &Path,
    cancel: &AtomicBool,
) -> Vec<SimOutput> {
    sim_ids
        .par_iter()
        .filter_map(|&sim_id| match run_one_sim(&model, sim_id, modifier_name, prefix, cancel) {
            Ok(out) => Some(out),
            Err(e) => {
                log::error!("sim {sim_id} failed: {e}");
                None
            }
        })
        .collect()
}

/// Scores one sim id against whatever external ground truth a calibration
/// run is comparing against. Implementations outside this crate (the
/// stretch-move sampler's host application) typically compare a written
/// `seir` artifact against observed outcome data; a failed sim is scored
/// `f64::NEG_INFINITY` so the sampler can reject it.
pub trait LogLikelihood: Sync {
    fn evaluate(&self, model: &ModelInfo, sim_id: u64, cancel: &AtomicBool) -> f64;
}

/// Runs a sim and treats any failure as `-inf`; does not compare its output
/// against observed data on its own; a real calibration host wraps this (or
/// implements `LogLikelihood` directly) to do that comparison.
pub struct RunAndScore<'a> {
    pub modifier_name: Option<&'a str>,
    pub prefix: &'a Path,
}

impl LogLikelihood for RunAndScore<'_> {
    fn evaluate(&self, model: &ModelInfo, sim_id: u64, cancel: &AtomicBool) -> f64 {
        match run_one_sim(model, sim_id, self.modifier_name, self.prefix, cancel) {
            Ok(_) => 0.0,
            Err(e) => {
                log::error!("sim {sim_id} failed during calibration: {e}");
                f64::NEG_INFINITY
            }
        }
    }
}

/// The affine-invariant ensemble (stretch-move) sampler driving calibration.
/// Its actual walker-update algorithm is assumed to be supplied by the host
/// application; this crate only specifies and drives the interface, per the
/// ensemble-sampler non-goal.
pub trait EnsembleSampler {
    /// Runs `niterations` rounds of `nwalkers` log-likelihood evaluations,
    /// fanned out to `jobs` workers per round, and returns the final round's
    /// scores. Does not update walker positions itself.
    fn sample(
        &mut self,
        model: &Arc<ModelInfo>,
        nwalkers: usize,
        niterations: usize,
        ll: &dyn LogLikelihood,
        cancel: &AtomicBool,
    ) -> Result<Vec<f64>>;
}

/// A minimal `EnsembleSampler` that fans every walker's evaluation out via
/// `rayon` each round and reports the scores of the final round; it does not
/// perform the stretch-move walker update (non-goal).
pub struct FannedOutEvaluator;

impl EnsembleSampler for FannedOutEvaluator {
    fn sample(
        &mut self,
        model: &Arc<ModelInfo>,
        nwalkers: usize,
        niterations: usize,
        ll: &dyn LogLikelihood,
        cancel: &AtomicBool,
    ) -> Result<Vec<f64>> {
        let mut scores = vec![0.0; nwalkers];
        for iteration in 0..niterations.max(1) {
            scores = (0..nwalkers as u64)
                .into_par_iter()
                .map(|walker| ll.evaluate(model, walker, cancel))
                .collect();
            log::info!(
                "calibration iteration {iteration}: mean log-likelihood {}",
                scores.iter().sum::<f64>() / scores.len().max(1) as f64
            );
        }
        Ok(scores)
    }
}

fn read_geodata(path: &Path, population_key: &str, names_key: &str) -> Result<(Vec<String>, Array1<f64>)> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let name_col = headers.iter().position(|h| h == names_key).ok_or_else(|| {
        EpiError::Validation(format!("geodata file has no '{names_key}' column"))
    })?;
    let pop_col = headers.iter().position(|h| h == population_key).ok_or_else(|| {
        EpiError::Validation(format!("geodata file has no '{population_key}' column"))
    })?;

    let mut names = vec![];
    let mut populations = vec![];
    for record in reader.records() {
        let record = record?;
        names.push(record.get(name_col).unwrap_or("").to_string());
        let pop: f64 = record
            .get(pop_col)
            .unwrap_or("")
            .parse()
            .map_err(|e| EpiError::Validation(format!("invalid population value: {e}")))?;
        populations.push(pop);
    }
    Ok((names, Array1::from(populations)))
}

/// Long-form mobility file with `ori, dest, amount` columns, expanded into a
/// dense `N×N` matrix indexed by `names`' order.
fn read_mobility(path: &Path, names: &[String]) -> Result<Array2<f64>> {
    let n = names.len();
    let index_of: HashMap<&str, usize> = names.iter().map(|s| s.as_str()).zip(0..n).collect();

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let ori_col = headers
        .iter()
        .position(|h| h == "ori")
        .ok_or_else(|| EpiError::Validation("mobility file has no 'ori' column".to_string()))?;
    let dest_col = headers
        .iter()
        .position(|h| h == "dest")
        .ok_or_else(|| EpiError::Validation("mobility file has no 'dest' column".to_string()))?;
    let amount_col = headers.iter().position(|h| h == "amount").ok_or_else(|| {
        EpiError::Validation("mobility file has no 'amount' column".to_string())
    })?;

    let mut mobility = Array2::zeros((n, n));
    for record in reader.records() {
        let record = record?;
        let ori_name = record.get(ori_col).unwrap_or("");
        let dest_name = record.get(dest_col).unwrap_or("");
        let &i = index_of
            .get(ori_name)
            .ok_or_else(|| EpiError::Validation(format!("mobility references unknown subpop '{ori_name}'")))?;
        let &j = index_of.get(dest_name).ok_or_else(|| {
            EpiError::Validation(format!("mobility references unknown subpop '{dest_name}'"))
        })?;
        let amount: f64 = record
            .get(amount_col)
            .unwrap_or("")
            .parse()
            .map_err(|e| EpiError::Validation(format!("invalid mobility amount: {e}")))?;
        mobility[(i, j)] = amount;
    }
    Ok(mobility)
}
