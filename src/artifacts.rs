//! Persists the three per-sim-id artifacts (`seir`, `spar`, `snpi`) as CSV,
//! writing to a temporary sibling path and renaming into place so a reader
//! never observes a partially written file.

use crate::compartments::CompartmentModel;
use crate::error::Result;
use crate::integrate::{Trajectory, ValueType};
use crate::modifiers::SnpiRow;
use crate::parameters::Parameters;
use crate::subpop::SubpopStruct;
use std::path::{Path, PathBuf};

fn atomic_write<F>(path: &Path, write_body: F) -> Result<()>
where
    F: FnOnce(&mut csv::Writer<std::fs::File>) -> Result<()>,
{
    let tmp_path = tmp_sibling(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(&tmp_path)?;
    let mut writer = csv::Writer::from_writer(file);
    write_body(&mut writer)?;
    writer.flush()?;
    drop(writer);
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Writes the `seir` artifact: one row per `(value_type, day)`, columns
/// `date, mc_value_type, mc_<dim>..., <subpop>...`.
pub fn write_seir(
    path: &Path,
    compartments: &CompartmentModel,
    subpop: &SubpopStruct,
    dates: &[chrono::NaiveDate],
    trajectory: &Trajectory,
) -> Result<()> {
    atomic_write(path, |writer| {
        let dim_names: Vec<String> = (0..compartments.names().first().map_or(0, |t| t.len()))
            .map(|i| format!("mc_dim{i}"))
            .collect();
        let mut header = vec!["date".to_string(), "mc_value_type".to_string()];
        header.extend(dim_names);
        header.extend(subpop.names().iter().cloned());
        writer.write_record(&header)?;

        for (kind, label) in [
            (ValueType::Prevalence, "prevalence"),
            (ValueType::Incidence, "incidence"),
        ] {
            for (day, date) in dates.iter().enumerate() {
                let slab = trajectory.get(kind, day);
                for (c, name_tuple) in compartments.names().iter().enumerate() {
                    let mut row = vec![date.to_string(), label.to_string()];
                    row.extend(name_tuple.iter().cloned());
                    for s in 0..subpop.n() {
                        row.push(format!("{}", slab[(c, s)]));
                    }
                    writer.write_record(&row)?;
                }
            }
        }
        Ok(())
    })
}

/// Writes the `spar` artifact: `parameter, value` for scalar (non-timeseries)
/// parameters, using the first draw of the realized tensor.
pub fn write_spar(
    path: &Path,
    parameters: &Parameters,
    realized: &ndarray::Array3<f64>,
) -> Result<()> {
    atomic_write(path, |writer| {
        writer.write_record(["parameter", "value"])?;
        for name in parameters.scalar_names() {
            let &p = parameters.pname_to_index().get(name).unwrap();
            let value = realized[(p, 0, 0)];
            writer.write_record([name, &format!("{value}")])?;
        }
        Ok(())
    })
}

/// Writes the `snpi` artifact: the flattened long-form rows from every
/// modifier's `get_reduction_to_write()`.
pub fn write_snpi(path: &Path, rows: &[SnpiRow]) -> Result<()> {
    atomic_write(path, |writer| {
        writer.write_record([
            "subpop",
            "modifier_name",
            "parameter",
            "start_date",
            "end_date",
            "value",
        ])?;
        for row in rows {
            writer.write_record([
                row.subpop.clone(),
                row.modifier_name.clone(),
                row.parameter.clone(),
                row.start_date.to_string(),
                row.end_date.to_string(),
                format!("{}", row.value),
            ])?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransitionConfig;
    use indexmap::IndexMap;
    use ndarray::Array1;

    #[test]
    fn snpi_round_trips_through_csv() {
        let dir = std::env::temp_dir().join(format!("gempyor-core-test-artifacts-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snpi.csv");

        let rows = vec![SnpiRow {
            subpop: "a".into(),
            modifier_name: "m1".into(),
            parameter: "gamma".into(),
            start_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            value: 0.5,
        }];
        write_snpi(&path, &rows).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let mut count = 0;
        for record in reader.records() {
            let record = record.unwrap();
            assert_eq!(record.get(0).unwrap(), "a");
            assert_eq!(record.get(1).unwrap(), "m1");
            count += 1;
        }
        assert_eq!(count, 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn seir_has_one_row_per_compartment_per_day_per_value_type() {
        let dir = std::env::temp_dir().join(format!("gempyor-core-test-artifacts-seir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("seir.csv");

        let mut dims = IndexMap::new();
        dims.insert("infection_stage".to_string(), vec!["S".into(), "I".into()]);
        let compartments = CompartmentModel::compile(&dims, &[] as &[TransitionConfig]).unwrap();
        let subpop = SubpopStruct::new(
            vec!["a".into()],
            Array1::from(vec![10.0]),
            ndarray::Array2::zeros((1, 1)),
        )
        .unwrap();
        let dates = vec![chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()];

        use crate::integrate::Integrator;
        use rand::SeedableRng;
        let cancel = std::sync::atomic::AtomicBool::new(false);
        let reduced = ndarray::Array3::<f64>::zeros((0, 1, 1));
        let ic = ndarray::Array2::<f64>::from_shape_fn((2, 1), |(c, _)| if c == 0 { 10.0 } else { 0.0 });
        let mut rng = rand::rngs::SmallRng::seed_from_u64(0);
        let trajectory = Integrator::integrate(
            &compartments,
            &subpop,
            reduced.view(),
            ic.view(),
            &[],
            1.0,
            false,
            &mut rng,
            &cancel,
        )
        .unwrap();

        write_seir(&path, &compartments, &subpop, &dates, &trajectory).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<_> = reader.records().collect();
        // 2 value types * 1 day * 2 compartments
        assert_eq!(rows.len(), 4);

        std::fs::remove_dir_all(&dir).ok();
    }
}
