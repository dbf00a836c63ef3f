//! Reads seeding events: discrete compartment-to-compartment transfers
//! applied at the start of a given day, used to introduce an epidemic
//! (or any other discrete perturbation) into an otherwise closed system.

use crate::compartments::{CompartmentId, CompartmentModel};
use crate::config::SeedingConfig;
use crate::error::{EpiError, Result};
use crate::prelude::Date;
use crate::subpop::SubpopStruct;
use crate::time_setup::TimeSetup;
use std::path::Path;

/// `(day_index, source, destination, amount)` within one named subpop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedingEvent {
    pub day_index: usize,
    pub subpop: usize,
    pub source: CompartmentId,
    pub destination: CompartmentId,
    pub amount: f64,
}

pub struct SeedingFactory;

impl SeedingFactory {
    /// Resolves the configured seeding method into a list of events.
    /// `"noseeding"`/`"none"` (case-insensitive) yields no events; any
    /// other method reads a long-form CSV of
    /// `date, subpop, source, destination, amount` rows, naming compartments
    /// by their underscore-joined dimension values.
    pub fn get_from_config(
        cfg: &SeedingConfig,
        compartments: &CompartmentModel,
        subpop: &SubpopStruct,
        time_setup: &TimeSetup,
        project_path: &Path,
    ) -> Result<Vec<SeedingEvent>> {
        match cfg.method.to_lowercase().as_str() {
            "noseeding" | "none" => Ok(vec![]),
            "seedingfile" | "fromfile" | "folderdraw" => {
                let rel = cfg.seeding_file.clone().ok_or_else(|| {
                    EpiError::Config(
                        "seeding method requires a 'seeding_file' path".to_string(),
                    )
                })?;
                let path = project_path.join(rel);
                read_seeding_csv(&path, compartments, subpop, time_setup)
            }
            other => Err(EpiError::Config(format!(
                "unknown seeding method '{other}'"
            ))),
        }
    }
}

fn read_seeding_csv(
    path: &Path,
    compartments: &CompartmentModel,
    subpop: &SubpopStruct,
    time_setup: &TimeSetup,
) -> Result<Vec<SeedingEvent>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| EpiError::Validation(format!("seeding file has no '{name}' column")))
    };
    let date_col = col("date")?;
    let subpop_col = col("subpop")?;
    let source_col = col("source")?;
    let dest_col = col("destination")?;
    let amount_col = col("amount")?;

    let mut events = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date: Date = record
            .get(date_col)
            .ok_or_else(|| EpiError::Validation("missing date field".to_string()))?
            .parse()
            .map_err(|e| EpiError::Validation(format!("invalid date: {e}")))?;
        let day_index = time_setup.index_of(date).ok_or_else(|| {
            EpiError::Validation(format!("seeding date {date} falls outside the scenario range"))
        })?;

        let subpop_name = record.get(subpop_col).unwrap_or("");
        let s = subpop.index_of(subpop_name).ok_or_else(|| {
            EpiError::Validation(format!("seeding references unknown subpop '{subpop_name}'"))
        })?;

        let source_name = record.get(source_col).unwrap_or("");
        let source = compartments.id_of_joined(source_name).ok_or_else(|| {
            EpiError::Validation(format!(
                "seeding references unknown source compartment '{source_name}'"
            ))
        })?;

        let dest_name = record.get(dest_col).unwrap_or("");
        let destination = compartments.id_of_joined(dest_name).ok_or_else(|| {
            EpiError::Validation(format!(
                "seeding references unknown destination compartment '{dest_name}'"
            ))
        })?;

        let amount: f64 = record
            .get(amount_col)
            .unwrap_or("")
            .parse()
            .map_err(|e| EpiError::Validation(format!("invalid seeding amount: {e}")))?;

        events.push(SeedingEvent {
            day_index,
            subpop: s,
            source,
            destination,
            amount,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitionConfig;
    use chrono::NaiveDate;
    use indexmap::IndexMap;
    use ndarray::{Array1, Array2};
    use std::io::Write;

    fn simple_compartments() -> CompartmentModel {
        let mut dims = IndexMap::new();
        dims.insert("infection_stage".to_string(), vec!["S".into(), "I".into()]);
        CompartmentModel::compile(&dims, &[] as &[TransitionConfig]).unwrap()
    }

    fn simple_subpop() -> SubpopStruct {
        SubpopStruct::new(
            vec!["a".into(), "b".into()],
            Array1::from(vec![100.0, 200.0]),
            Array2::zeros((2, 2)),
        )
        .unwrap()
    }

    #[test]
    fn no_seeding_yields_empty() {
        let cfg = SeedingConfig {
            method: "NoSeeding".into(),
            seeding_file_type: "seed".into(),
            seeding_file: None,
        };
        let compartments = simple_compartments();
        let subpop = simple_subpop();
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let time_setup = TimeSetup::new(ti, tf).unwrap();
        let events = SeedingFactory::get_from_config(
            &cfg,
            &compartments,
            &subpop,
            &time_setup,
            Path::new("."),
        )
        .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn reads_events_from_csv() {
        let dir = std::env::temp_dir().join(format!("gempyor-core-test-seeding-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file_path = dir.join("seeding.csv");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "date,subpop,source,destination,amount").unwrap();
        writeln!(f, "2024-01-02,a,S,I,5").unwrap();

        let cfg = SeedingConfig {
            method: "SeedingFile".into(),
            seeding_file_type: "seed".into(),
            seeding_file: Some(std::path::PathBuf::from("seeding.csv")),
        };
        let compartments = simple_compartments();
        let subpop = simple_subpop();
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let time_setup = TimeSetup::new(ti, tf).unwrap();
        let events =
            SeedingFactory::get_from_config(&cfg, &compartments, &subpop, &time_setup, &dir)
                .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].day_index, 1);
        assert_eq!(events[0].subpop, 0);
        assert_eq!(events[0].amount, 5.0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
