//! Deserializable mirror of the hierarchical configuration map described in
//! the external interfaces section: `serde` + `toml` parse the scenario
//! file, `csv` side-tables carry geodata, mobility, timeseries parameters,
//! and seeding, exactly as `covid-rs`'s `bin/sim.rs` reads `conf.toml` plus
//! a `params.csv` side-table.

use crate::distributions::Distribution;
use crate::modifiers::StackedMethod;
use crate::prelude::Date;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub setup_name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub subpop_setup: SubpopSetupConfig,
    #[serde(default)]
    pub compartments: IndexMap<String, Vec<String>>,
    pub seir: Option<SeirConfig>,
    pub seeding: Option<SeedingConfig>,
    pub initial_conditions: Option<InitialConditionsConfig>,
    pub seir_modifiers: Option<SeirModifiersConfig>,
    /// Parsed but not acted on: outcomes are out of scope for the core.
    pub outcomes: Option<toml::Value>,
    pub outcome_modifiers: Option<toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubpopSetupConfig {
    pub geodata: PathBuf,
    pub mobility: PathBuf,
    #[serde(default = "default_population_key")]
    pub population_key: String,
    #[serde(default = "default_names_key")]
    pub names_key: String,
}

fn default_population_key() -> String {
    "population".to_string()
}

fn default_names_key() -> String {
    "subpop".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeirConfig {
    pub transitions: Vec<TransitionConfig>,
    pub parameters: IndexMap<String, ParameterConfigEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionConfig {
    /// Per-dimension value selectors (same order as `compartments`); their
    /// cross product is the list of source elements.
    pub source: Vec<Vec<String>>,
    /// Same shape as `source`; its cross product must have the same length.
    pub destination: Vec<Vec<String>>,
    /// Tokens multiplied to form the rate: each is either a numeric literal
    /// or a parameter name.
    pub rate: Vec<String>,
    /// One selector set per term; each term's cross product is summed to
    /// form that term's contribution to the proportional-population factor.
    pub proportional_to: Vec<Vec<Vec<String>>>,
    /// Exponent applied to each term in `proportional_to`, same length (or
    /// shorter, defaulting remaining entries to `1.0`).
    #[serde(default)]
    pub proportion_exponent: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParameterConfigEntry {
    Number {
        value: f64,
        #[serde(default)]
        stacked_modifier_method: Option<StackedMethod>,
    },
    Distribution {
        value: Distribution,
        #[serde(default)]
        stacked_modifier_method: Option<StackedMethod>,
    },
    TimeSeries {
        timeseries: PathBuf,
        #[serde(default)]
        stacked_modifier_method: Option<StackedMethod>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedingConfig {
    pub method: String,
    pub seeding_file_type: String,
    #[serde(default)]
    pub seeding_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InitialConditionsConfig {
    pub method: String,
    #[serde(default)]
    pub initial_conditions_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeirModifiersConfig {
    pub modifiers: IndexMap<String, ModifierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModifierConfig {
    pub method: ModifierMethod,
    pub parameter: String,
    #[serde(default)]
    pub period_start_date: Option<Date>,
    #[serde(default)]
    pub period_end_date: Option<Date>,
    #[serde(default)]
    pub periods: Option<Vec<PeriodConfig>>,
    #[serde(default)]
    pub value: Option<Distribution>,
    #[serde(default)]
    pub subpop: Option<SubpopSelector>,
    #[serde(default)]
    pub spatial_groups: Option<Vec<Vec<String>>>,
    #[serde(default)]
    pub modifiers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeriodConfig {
    pub start_date: Date,
    pub end_date: Date,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubpopSelector {
    All(String),
    Subset(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ModifierMethod {
    SinglePeriodModifier,
    MultiPeriodModifier,
    StackedModifier,
}

/// Threads config view, RNG seed, output path prefix and run id into every
/// constructor, replacing a process-wide singleton.
#[derive(Debug, Clone)]
pub struct Context {
    pub project_path: PathBuf,
    pub run_id: String,
    pub seed: u64,
}

impl Context {
    pub fn new(project_path: PathBuf, run_id: String, seed: u64) -> Self {
        Context {
            project_path,
            run_id,
            seed,
        }
    }

    pub fn resolve(&self, relative: &PathBuf) -> PathBuf {
        self.project_path.join(relative)
    }
}

pub fn load_run_config(contents: &str) -> crate::error::Result<RunConfig> {
    toml::from_str(contents).map_err(|e| crate::error::EpiError::Config(e.to_string()))
}
