//! Builds the initial compartment occupancy `IC[c, s]`, either from a
//! simple "everyone susceptible" rule or from a persisted long-form CSV.

use crate::compartments::CompartmentModel;
use crate::config::InitialConditionsConfig;
use crate::error::{EpiError, Result};
use crate::subpop::SubpopStruct;
use ndarray::Array2;
use std::path::Path;

const POPULATION_TOLERANCE: f64 = 1e-3;

pub struct InitialConditionsFactory;

impl InitialConditionsFactory {
    /// `"seedallfirstcompartment"` (case-insensitive) puts each subpop's
    /// entire population in its first declared compartment; any other
    /// method reads a `subpop, compartment, amount` CSV. Column sums are
    /// validated against each subpop's population within tolerance.
    pub fn draw(
        cfg: &InitialConditionsConfig,
        compartments: &CompartmentModel,
        subpop: &SubpopStruct,
        project_path: &Path,
    ) -> Result<Array2<f64>> {
        let c = compartments.cardinality();
        let n = subpop.n();
        let ic = match cfg.method.to_lowercase().as_str() {
            "seedallfirstcompartment" | "default" => {
                let mut ic = Array2::zeros((c, n));
                for s in 0..n {
                    ic[(0, s)] = subpop.populations()[s];
                }
                ic
            }
            "fromfile" | "setinitialconditions" => {
                let rel = cfg.initial_conditions_file.clone().ok_or_else(|| {
                    EpiError::Config(
                        "initial_conditions method requires 'initial_conditions_file'".to_string(),
                    )
                })?;
                read_ic_csv(&project_path.join(rel), compartments, subpop)?
            }
            other => {
                return Err(EpiError::Config(format!(
                    "unknown initial_conditions method '{other}'"
                )))
            }
        };

        for s in 0..n {
            let total: f64 = ic.column(s).sum();
            let pop = subpop.populations()[s];
            if (total - pop).abs() > POPULATION_TOLERANCE {
                return Err(EpiError::Validation(format!(
                    "initial conditions for subpop '{}' sum to {total} but population is {pop}",
                    subpop.names()[s]
                )));
            }
        }
        Ok(ic)
    }
}

fn read_ic_csv(
    path: &Path,
    compartments: &CompartmentModel,
    subpop: &SubpopStruct,
) -> Result<Array2<f64>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EpiError::Validation(format!("initial conditions file has no '{name}' column")))
    };
    let subpop_col = col("subpop")?;
    let compartment_col = col("compartment")?;
    let amount_col = col("amount")?;

    let mut ic = Array2::zeros((compartments.cardinality(), subpop.n()));
    for record in reader.records() {
        let record = record?;
        let subpop_name = record.get(subpop_col).unwrap_or("");
        let s = subpop.index_of(subpop_name).ok_or_else(|| {
            EpiError::Validation(format!(
                "initial conditions reference unknown subpop '{subpop_name}'"
            ))
        })?;
        let compartment_name = record.get(compartment_col).unwrap_or("");
        let c = compartments
            .id_of_joined(compartment_name)
            .ok_or_else(|| {
                EpiError::Validation(format!(
                    "initial conditions reference unknown compartment '{compartment_name}'"
                ))
            })?;
        let amount: f64 = record
            .get(amount_col)
            .unwrap_or("")
            .parse()
            .map_err(|e| EpiError::Validation(format!("invalid initial conditions amount: {e}")))?;
        ic[(c.0, s)] += amount;
    }
    Ok(ic)
}
