//! Resolves named parameters from fixed values, random distributions, and
//! indexed time-series, and produces the `(param, day, subpop)` tensor that
//! feeds the compartment compiler and integrator.

use crate::config::ParameterConfigEntry;
use crate::distributions::Distribution;
use crate::error::{EpiError, Result};
use crate::modifiers::{Modifier, StackedMethod};
use crate::prelude::Date;
use indexmap::IndexMap;
use ndarray::{s, Array2, Array3};
use rand::Rng;
use std::collections::HashMap;
use std::path::Path;

/// One resolved parameter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSpec {
    Fixed(f64),
    Distribution(Distribution),
    TimeSeries(Array2<f64>),
}

#[derive(Debug, Clone)]
pub struct Parameters {
    pnames: Vec<String>,
    pname_to_index: HashMap<String, usize>,
    specs: Vec<ParamSpec>,
    methods: Vec<StackedMethod>,
}

impl Parameters {
    /// Build from the declared config map. `read_timeseries` loads a
    /// parameter's CSV file and validates its date coverage and subpop
    /// column count against `ti, tf, subpop_names`.
    pub fn new(
        config: &IndexMap<String, ParameterConfigEntry>,
        ti: Date,
        tf: Date,
        dates: &[Date],
        subpop_names: &[String],
        project_path: &Path,
    ) -> Result<Self> {
        let mut pnames = vec![];
        let mut pname_to_index = HashMap::new();
        let mut specs = vec![];
        let mut methods = vec![];

        for (raw_name, entry) in config {
            let lname = raw_name.to_lowercase();
            if pname_to_index.contains_key(&lname) {
                return Err(EpiError::Config(format!(
                    "parameter '{raw_name}' has the same name (case-insensitively) as another parameter"
                )));
            }

            let (spec, method) = match entry {
                ParameterConfigEntry::Number {
                    value,
                    stacked_modifier_method,
                } => (
                    ParamSpec::Fixed(*value),
                    stacked_modifier_method.unwrap_or_default(),
                ),
                ParameterConfigEntry::Distribution {
                    value,
                    stacked_modifier_method,
                } => (
                    ParamSpec::Distribution(value.clone()),
                    stacked_modifier_method.unwrap_or_default(),
                ),
                ParameterConfigEntry::TimeSeries {
                    timeseries,
                    stacked_modifier_method,
                } => {
                    let path = project_path.join(timeseries);
                    let matrix =
                        load_timeseries(&path, ti, tf, dates, subpop_names).map_err(|e| {
                            EpiError::Validation(format!(
                                "parameter '{raw_name}' timeseries '{}': {e}",
                                timeseries.display()
                            ))
                        })?;
                    (ParamSpec::TimeSeries(matrix), stacked_modifier_method.unwrap_or_default())
                }
            };

            pname_to_index.insert(lname.clone(), pnames.len());
            pnames.push(lname);
            specs.push(spec);
            methods.push(method);
        }

        Ok(Parameters {
            pnames,
            pname_to_index,
            specs,
            methods,
        })
    }

    pub fn pnames(&self) -> &[String] {
        &self.pnames
    }

    pub fn pname_to_index(&self) -> &HashMap<String, usize> {
        &self.pname_to_index
    }

    pub fn method_of(&self, name: &str) -> Option<StackedMethod> {
        self.pname_to_index.get(name).map(|&i| self.methods[i])
    }

    /// Bucket parameter names by their stacked method, in declaration order.
    pub fn by_method(&self) -> HashMap<StackedMethod, Vec<String>> {
        let mut out: HashMap<StackedMethod, Vec<String>> = HashMap::new();
        for (name, method) in self.pnames.iter().zip(self.methods.iter()) {
            out.entry(*method).or_default().push(name.clone());
        }
        out
    }

    /// Names backed by `Fixed` or `Distribution` (i.e. excluded from the
    /// `spar` artifact's counterpart, time series).
    pub fn scalar_names(&self) -> Vec<&str> {
        self.pnames
            .iter()
            .zip(self.specs.iter())
            .filter(|(_, spec)| !matches!(spec, ParamSpec::TimeSeries(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Fresh sample: draw once per `Fixed`/`Distribution` parameter and
    /// broadcast across `(d, n)`; write the stored matrix for `TimeSeries`.
    pub fn quick_draw(&self, d: usize, n: usize, rng: &mut impl Rng) -> Result<Array3<f64>> {
        let mut tensor = Array3::zeros((self.pnames.len(), d, n));
        for (p, spec) in self.specs.iter().enumerate() {
            let mut slab = tensor.slice_mut(s![p, .., ..]);
            match spec {
                ParamSpec::Fixed(v) => slab.fill(*v),
                ParamSpec::Distribution(dist) => {
                    let v = dist.draw(1, rng)?[0];
                    slab.fill(v);
                }
                ParamSpec::TimeSeries(matrix) => {
                    if matrix.nrows() != d || matrix.ncols() != n {
                        return Err(EpiError::Validation(format!(
                            "could not broadcast input array from shape ({},{}) into shape ({d},{n})",
                            matrix.nrows(),
                            matrix.ncols()
                        )));
                    }
                    slab.assign(matrix);
                }
            }
        }
        Ok(tensor)
    }

    /// Like `quick_draw`, but an override table entry for a parameter's name
    /// replaces its slab with a constant, even for a time-series-backed
    /// parameter. Unknown override names are ignored silently.
    pub fn load(
        &self,
        overrides: &HashMap<String, f64>,
        d: usize,
        n: usize,
        rng: &mut impl Rng,
    ) -> Result<Array3<f64>> {
        let mut tensor = self.quick_draw(d, n, rng)?;
        for (name, &value) in overrides {
            let lname = name.to_lowercase();
            if let Some(&p) = self.pname_to_index.get(&lname) {
                tensor.slice_mut(s![p, .., ..]).fill(value);
            }
        }
        Ok(tensor)
    }

    /// Apply a modifier's reduction to every parameter it targets, leaving
    /// the rest untouched.
    pub fn reduce(&self, tensor: Array3<f64>, modifier: &Modifier) -> Array3<f64> {
        let mut out = tensor;
        for (p, name) in self.pnames.iter().enumerate() {
            let method = self.methods[p];
            let slab_dn = out.slice(s![p, .., ..]).to_owned();
            let slab_nd = slab_dn.t().to_owned();
            let reduced_nd = modifier.reduce(name, &slab_nd, method);
            out.slice_mut(s![p, .., ..]).assign(&reduced_nd.t());
        }
        out
    }
}

/// Loads a parameter time series CSV (`date` column plus either `N` subpop
/// columns in `subpop_names` order, or one `value` column broadcast to all
/// subpops) into a `(D, N)` matrix.
fn load_timeseries(
    path: &Path,
    ti: Date,
    tf: Date,
    dates: &[Date],
    subpop_names: &[String],
) -> Result<Array2<f64>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let date_col = headers
        .iter()
        .position(|h| h == "date")
        .ok_or_else(|| EpiError::Validation("timeseries file has no 'date' column".to_string()))?;

    let data_cols: Vec<usize> = (0..headers.len()).filter(|&i| i != date_col).collect();
    let n = subpop_names.len();
    if data_cols.len() != n && data_cols.len() != 1 {
        return Err(EpiError::Validation(format!(
            "timeseries has {} non-date columns, expected {n} or 1",
            data_cols.len()
        )));
    }

    let mut by_date: HashMap<Date, Vec<f64>> = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let date: Date = record
            .get(date_col)
            .ok_or_else(|| EpiError::Validation("missing date field".to_string()))?
            .parse()
            .map_err(|e| EpiError::Validation(format!("invalid date: {e}")))?;
        let mut row = Vec::with_capacity(data_cols.len());
        for &c in &data_cols {
            let v: f64 = record
                .get(c)
                .unwrap_or("")
                .parse()
                .map_err(|e| EpiError::Validation(format!("invalid numeric value: {e}")))?;
            row.push(v);
        }
        by_date.insert(date, row);
    }

    let file_min = by_date.keys().min().copied();
    let file_max = by_date.keys().max().copied();
    if file_min != Some(ti) || file_max != Some(tf) {
        return Err(EpiError::Validation(format!(
            "timeseries covers [{}, {}] but the scenario needs [{ti}, {tf}]",
            file_min.map(|d| d.to_string()).unwrap_or_default(),
            file_max.map(|d| d.to_string()).unwrap_or_default()
        )));
    }

    let d = dates.len();
    let mut matrix = Array2::zeros((d, n));
    for (day, date) in dates.iter().enumerate() {
        let row = by_date.get(date).ok_or_else(|| {
            EpiError::Validation(format!("timeseries is missing a row for {date}"))
        })?;
        if row.len() == n {
            for (s, &v) in row.iter().enumerate() {
                matrix[(day, s)] = v;
            }
        } else {
            matrix.row_mut(day).fill(row[0]);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{Modifier, SinglePeriodModifier};
    use chrono::NaiveDate;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn cfg_map(entries: Vec<(&str, ParameterConfigEntry)>) -> IndexMap<String, ParameterConfigEntry> {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn case_insensitive_duplicate_rejected() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let dates: Vec<Date> = (0..3).map(|d| ti + chrono::Duration::days(d)).collect();
        let cfg = cfg_map(vec![
            (
                "sigma",
                ParameterConfigEntry::Number {
                    value: 1.0,
                    stacked_modifier_method: None,
                },
            ),
            (
                "GAMMA",
                ParameterConfigEntry::Number {
                    value: 1.0,
                    stacked_modifier_method: None,
                },
            ),
            (
                "gamma",
                ParameterConfigEntry::Number {
                    value: 1.0,
                    stacked_modifier_method: None,
                },
            ),
        ]);
        let err = Parameters::new(&cfg, ti, tf, &dates, &["a".into()], Path::new(".")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("same name"), "message was: {msg}");
    }

    #[test]
    fn quick_draw_broadcasts_fixed_and_distribution() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let dates: Vec<Date> = (0..3).map(|d| ti + chrono::Duration::days(d)).collect();
        let cfg = cfg_map(vec![(
            "gamma",
            ParameterConfigEntry::Number {
                value: 0.1234,
                stacked_modifier_method: None,
            },
        )]);
        let params = Parameters::new(&cfg, ti, tf, &dates, &["a".into(), "b".into()], Path::new(".")).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        let tensor = params.quick_draw(3, 2, &mut rng).unwrap();
        assert!(tensor.iter().all(|&x| (x - 0.1234).abs() < 1e-12));
    }

    #[test]
    fn load_override_replaces_slab() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let dates: Vec<Date> = (0..3).map(|d| ti + chrono::Duration::days(d)).collect();
        let cfg = cfg_map(vec![(
            "sigma",
            ParameterConfigEntry::Number {
                value: 1.0,
                stacked_modifier_method: None,
            },
        )]);
        let params = Parameters::new(&cfg, ti, tf, &dates, &["a".into()], Path::new(".")).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        let mut overrides = HashMap::new();
        overrides.insert("sigma".to_string(), 12.34);
        overrides.insert("unknown_param".to_string(), 99.0);
        let tensor = params.load(&overrides, 3, 1, &mut rng).unwrap();
        assert!(tensor.iter().all(|&x| (x - 12.34).abs() < 1e-9));
    }

    #[test]
    fn reduce_dispatches_to_modifier() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let dates: Vec<Date> = (0..3).map(|d| ti + chrono::Duration::days(d)).collect();
        let cfg = cfg_map(vec![(
            "gamma",
            ParameterConfigEntry::Number {
                value: 2.0,
                stacked_modifier_method: Some(StackedMethod::Sum),
            },
        )]);
        let params = Parameters::new(&cfg, ti, tf, &dates, &["a".into()], Path::new(".")).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        let tensor = params.quick_draw(3, 1, &mut rng).unwrap();

        let modifier_cfg = crate::config::ModifierConfig {
            method: crate::config::ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(ti),
            period_end_date: Some(tf),
            periods: None,
            value: Some(Distribution::Fixed(0.5)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let spm = SinglePeriodModifier::build(
            "m", &modifier_cfg, ti, tf, &dates, &["a".to_string()], 0.0, None, &mut rng,
        )
        .unwrap();
        let modifier = Modifier::SinglePeriod(spm);

        let reduced = params.reduce(tensor, &modifier);
        assert!(reduced.iter().all(|&x| (x - 2.5).abs() < 1e-9));
    }
}
