//! NPI (non-pharmaceutical intervention) modifier algebra: `SinglePeriod`,
//! `MultiPeriod`, and `Stacked` modifiers, composed under `product`, `sum`,
//! or `reduction_product` semantics per parameter.

use crate::config::{ModifierConfig, ModifierMethod, SubpopSelector};
use crate::distributions::Distribution;
use crate::error::{EpiError, Result};
use crate::prelude::Date;
use ndarray::Array2;
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// The algebraic combinator used to merge multiple modifiers that target the
/// same parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackedMethod {
    Product,
    Sum,
    ReductionProduct,
}

impl Default for StackedMethod {
    fn default() -> Self {
        StackedMethod::Product
    }
}

/// One row of the long-form `(subpop, modifier_name, parameter, start_date,
/// end_date, value)` table persisted as the `snpi` artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct SnpiRow {
    pub subpop: String,
    pub modifier_name: String,
    pub parameter: String,
    pub start_date: Date,
    pub end_date: Date,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SpatialGroups {
    pub ungrouped: Vec<String>,
    pub grouped: Vec<Vec<String>>,
}

fn spatial_groups(affected: &[String], groups_cfg: Option<&[Vec<String>]>) -> SpatialGroups {
    let mut grouped_members: HashSet<&str> = HashSet::new();
    let mut grouped = vec![];
    if let Some(groups) = groups_cfg {
        for group in groups {
            let members: Vec<String> = group
                .iter()
                .filter(|m| affected.contains(m))
                .cloned()
                .collect();
            for m in &members {
                grouped_members.insert(m.as_str());
            }
            if !members.is_empty() {
                grouped.push(members);
            }
        }
    }
    let ungrouped = affected
        .iter()
        .filter(|s| !grouped_members.contains(s.as_str()))
        .cloned()
        .collect();
    SpatialGroups { ungrouped, grouped }
}

fn resolve_affected_subpops(selector: Option<&SubpopSelector>, all: &[String]) -> Vec<String> {
    match selector {
        None => all.to_vec(),
        Some(SubpopSelector::All(s)) if s == "all" => all.to_vec(),
        Some(SubpopSelector::All(s)) => all.iter().filter(|n| *n == s).cloned().collect(),
        Some(SubpopSelector::Subset(list)) => {
            all.iter().filter(|n| list.contains(n)).cloned().collect()
        }
    }
}

/// `value` may be `None` on artifact reconstruction (`from_loaded`), in
/// which case a draw would come from `loaded_df` for subpops present there.
fn draw_values(
    dist: &Distribution,
    groups: &SpatialGroups,
    rng: &mut impl Rng,
) -> Result<HashMap<String, f64>> {
    let mut values = HashMap::new();
    if !groups.ungrouped.is_empty() {
        let draws = dist.draw(groups.ungrouped.len(), rng)?;
        for (name, v) in groups.ungrouped.iter().zip(draws.iter()) {
            values.insert(name.clone(), *v);
        }
    }
    for group in &groups.grouped {
        let draw = dist.draw(1, rng)?[0];
        for name in group {
            values.insert(name.clone(), draw);
        }
    }
    Ok(values)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SinglePeriodModifier {
    name: String,
    param_name: String,
    start_date: Date,
    end_date: Date,
    affected_subpops: Vec<String>,
    groups: SpatialGroups,
    period_start: Date,
    period_end: Date,
    values: HashMap<String, f64>,
    npi: Array2<f64>,
    dates: Vec<Date>,
}

impl SinglePeriodModifier {
    pub fn build(
        name: &str,
        cfg: &ModifierConfig,
        ti: Date,
        tf: Date,
        dates: &[Date],
        subpop_names: &[String],
        default_cell: f64,
        loaded: Option<&HashMap<String, f64>>,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let param_name = cfg.parameter.to_lowercase().replace(' ', "");
        let period_start = cfg.period_start_date.unwrap_or(ti);
        let period_end = cfg.period_end_date.unwrap_or(tf);
        if period_start < ti || period_end > tf {
            return Err(EpiError::Validation(format!(
                "{name}: period [{period_start}, {period_end}] is not within global dates [{ti}, {tf}]"
            )));
        }
        if period_start > period_end {
            return Err(EpiError::Validation(format!(
                "{name}: period_start_date is after period_end_date"
            )));
        }

        let affected_subpops = resolve_affected_subpops(cfg.subpop.as_ref(), subpop_names);
        for s in &affected_subpops {
            if !subpop_names.contains(s) {
                return Err(EpiError::Validation(format!(
                    "{name}: subpop '{s}' is not a member of the subpop set"
                )));
            }
        }
        let groups = spatial_groups(&affected_subpops, cfg.spatial_groups.as_deref());

        let values = if let Some(loaded) = loaded {
            let mut v = HashMap::new();
            for s in affected_subpops.iter() {
                if let Some(&x) = loaded.get(s) {
                    v.insert(s.clone(), x);
                }
            }
            v
        } else {
            let dist = cfg.value.as_ref().ok_or_else(|| {
                EpiError::Config(format!("{name}: modifier has no `value` distribution"))
            })?;
            draw_values(dist, &groups, rng)?
        };

        let n = subpop_names.len();
        let d = dates.len();
        let mut npi = Array2::from_elem((n, d), default_cell);
        for (i, subpop) in subpop_names.iter().enumerate() {
            if let Some(&value) = values.get(subpop) {
                for (j, date) in dates.iter().enumerate() {
                    if *date >= period_start && *date <= period_end {
                        npi[(i, j)] = value;
                    }
                }
            }
        }

        Ok(SinglePeriodModifier {
            name: name.to_string(),
            param_name,
            start_date: ti,
            end_date: tf,
            affected_subpops,
            groups,
            period_start,
            period_end,
            values,
            npi,
            dates: dates.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    /// `slab` is `(N, D)` for this parameter; `npi` is combined in per the
    /// parameter's stacked method.
    pub fn reduce(&self, param_name: &str, slab: &Array2<f64>, method: StackedMethod) -> Array2<f64> {
        if param_name != self.param_name {
            return slab.clone();
        }
        match method {
            StackedMethod::Product | StackedMethod::ReductionProduct => {
                slab * &self.npi.mapv(|x| 1.0 - x)
            }
            StackedMethod::Sum => slab + &self.npi,
        }
    }

    pub fn get_reduction_to_write(&self) -> Vec<SnpiRow> {
        let mut rows = vec![];
        for subpop in &self.groups.ungrouped {
            if let Some(&value) = self.values.get(subpop) {
                rows.push(SnpiRow {
                    subpop: subpop.clone(),
                    modifier_name: self.name.clone(),
                    parameter: self.param_name.clone(),
                    start_date: self.period_start,
                    end_date: self.period_end,
                    value,
                });
            }
        }
        for group in &self.groups.grouped {
            if let Some(&value) = group.first().and_then(|s| self.values.get(s)) {
                rows.push(SnpiRow {
                    subpop: group.join(","),
                    modifier_name: self.name.clone(),
                    parameter: self.param_name.clone(),
                    start_date: self.period_start,
                    end_date: self.period_end,
                    value,
                });
            }
        }
        rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiPeriodModifier {
    name: String,
    param_name: String,
    affected_subpops: Vec<String>,
    groups: SpatialGroups,
    periods: Vec<(Date, Date)>,
    values: HashMap<String, f64>,
    npi: Array2<f64>,
}

impl MultiPeriodModifier {
    pub fn build(
        name: &str,
        cfg: &ModifierConfig,
        ti: Date,
        tf: Date,
        dates: &[Date],
        subpop_names: &[String],
        default_cell: f64,
        loaded: Option<&HashMap<String, f64>>,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let param_name = cfg.parameter.to_lowercase().replace(' ', "");
        let periods_cfg = cfg.periods.as_ref().ok_or_else(|| {
            EpiError::Config(format!("{name}: MultiPeriodModifier requires `periods`"))
        })?;
        let mut periods = vec![];
        for p in periods_cfg {
            if p.start_date < ti || p.end_date > tf {
                return Err(EpiError::Validation(format!(
                    "{name}: period [{}, {}] is not within global dates [{ti}, {tf}]",
                    p.start_date, p.end_date
                )));
            }
            if p.start_date > p.end_date {
                return Err(EpiError::Validation(format!(
                    "{name}: a period's start_date is after its end_date"
                )));
            }
            periods.push((p.start_date, p.end_date));
        }
        for i in 0..periods.len() {
            for j in (i + 1)..periods.len() {
                let (s1, e1) = periods[i];
                let (s2, e2) = periods[j];
                if s1 <= e2 && s2 <= e1 {
                    return Err(EpiError::Validation(format!(
                        "{name}: overlapping windows [{s1}, {e1}] and [{s2}, {e2}]"
                    )));
                }
            }
        }

        let affected_subpops = resolve_affected_subpops(cfg.subpop.as_ref(), subpop_names);
        for s in &affected_subpops {
            if !subpop_names.contains(s) {
                return Err(EpiError::Validation(format!(
                    "{name}: subpop '{s}' is not a member of the subpop set"
                )));
            }
        }
        let groups = spatial_groups(&affected_subpops, cfg.spatial_groups.as_deref());

        let values = if let Some(loaded) = loaded {
            let mut v = HashMap::new();
            for s in affected_subpops.iter() {
                if let Some(&x) = loaded.get(s) {
                    v.insert(s.clone(), x);
                }
            }
            v
        } else {
            let dist = cfg.value.as_ref().ok_or_else(|| {
                EpiError::Config(format!("{name}: modifier has no `value` distribution"))
            })?;
            draw_values(dist, &groups, rng)?
        };

        let n = subpop_names.len();
        let d = dates.len();
        let mut npi = Array2::from_elem((n, d), default_cell);
        for (i, subpop) in subpop_names.iter().enumerate() {
            if let Some(&value) = values.get(subpop) {
                for (j, date) in dates.iter().enumerate() {
                    if periods.iter().any(|(s, e)| *date >= *s && *date <= *e) {
                        npi[(i, j)] = value;
                    }
                }
            }
        }

        Ok(MultiPeriodModifier {
            name: name.to_string(),
            param_name,
            affected_subpops,
            groups,
            periods,
            values,
            npi,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    pub fn reduce(&self, param_name: &str, slab: &Array2<f64>, method: StackedMethod) -> Array2<f64> {
        if param_name != self.param_name {
            return slab.clone();
        }
        match method {
            StackedMethod::Product | StackedMethod::ReductionProduct => {
                slab * &self.npi.mapv(|x| 1.0 - x)
            }
            StackedMethod::Sum => slab + &self.npi,
        }
    }

    pub fn get_reduction_to_write(&self) -> Vec<SnpiRow> {
        let mut rows = vec![];
        let span = |periods: &[(Date, Date)]| -> (Date, Date) {
            let start = periods.iter().map(|(s, _)| *s).min().unwrap();
            let end = periods.iter().map(|(_, e)| *e).max().unwrap();
            (start, end)
        };
        let (start, end) = span(&self.periods);
        for subpop in &self.groups.ungrouped {
            if let Some(&value) = self.values.get(subpop) {
                rows.push(SnpiRow {
                    subpop: subpop.clone(),
                    modifier_name: self.name.clone(),
                    parameter: self.param_name.clone(),
                    start_date: start,
                    end_date: end,
                    value,
                });
            }
        }
        for group in &self.groups.grouped {
            if let Some(&value) = group.first().and_then(|s| self.values.get(s)) {
                rows.push(SnpiRow {
                    subpop: group.join(","),
                    modifier_name: self.name.clone(),
                    parameter: self.param_name.clone(),
                    start_date: start,
                    end_date: end,
                    value,
                });
            }
        }
        rows
    }
}

/// An ordered list of child modifiers, combined per parameter according to
/// the parameter's own `stacked_modifier_method`.
#[derive(Debug, Clone, PartialEq)]
pub struct StackedModifier {
    name: String,
    children: Vec<Modifier>,
}

impl StackedModifier {
    pub fn new(name: &str, children: Vec<Modifier>) -> Self {
        StackedModifier {
            name: name.to_string(),
            children,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reduce(&self, param_name: &str, slab: &Array2<f64>, method: StackedMethod) -> Array2<f64> {
        let mut out = slab.clone();
        for child in &self.children {
            out = child.reduce(param_name, &out, method);
        }
        out
    }

    pub fn get_reduction_to_write(&self) -> Vec<SnpiRow> {
        self.children
            .iter()
            .flat_map(|c| c.get_reduction_to_write())
            .collect()
    }
}

/// Tagged union over the three modifier kinds. Replaces base-class
/// polymorphism with an explicit `reduce`/`realize` match, per the design
/// notes.
#[derive(Debug, Clone, PartialEq)]
pub enum Modifier {
    SinglePeriod(SinglePeriodModifier),
    MultiPeriod(MultiPeriodModifier),
    Stacked(StackedModifier),
}

impl Modifier {
    pub fn name(&self) -> &str {
        match self {
            Modifier::SinglePeriod(m) => m.name(),
            Modifier::MultiPeriod(m) => m.name(),
            Modifier::Stacked(m) => m.name(),
        }
    }

    pub fn reduce(&self, param_name: &str, slab: &Array2<f64>, method: StackedMethod) -> Array2<f64> {
        match self {
            Modifier::SinglePeriod(m) => m.reduce(param_name, slab, method),
            Modifier::MultiPeriod(m) => m.reduce(param_name, slab, method),
            Modifier::Stacked(m) => m.reduce(param_name, slab, method),
        }
    }

    pub fn get_reduction_to_write(&self) -> Vec<SnpiRow> {
        match self {
            Modifier::SinglePeriod(m) => m.get_reduction_to_write(),
            Modifier::MultiPeriod(m) => m.get_reduction_to_write(),
            Modifier::Stacked(m) => m.get_reduction_to_write(),
        }
    }
}

/// Resolves the named modifier library into `Modifier` values, building
/// `StackedModifier`s recursively and rejecting cycles (a name that appears
/// in its own transitive child set).
pub fn build_modifier_library(
    library: &HashMap<String, ModifierConfig>,
    ti: Date,
    tf: Date,
    dates: &[Date],
    subpop_names: &[String],
    rng: &mut impl Rng,
) -> Result<HashMap<String, Modifier>> {
    let mut built = HashMap::new();
    let mut in_progress = HashSet::new();
    for name in library.keys() {
        build_one(
            name,
            library,
            ti,
            tf,
            dates,
            subpop_names,
            rng,
            &mut built,
            &mut in_progress,
        )?;
    }
    Ok(built)
}

#[allow(clippy::too_many_arguments)]
fn build_one(
    name: &str,
    library: &HashMap<String, ModifierConfig>,
    ti: Date,
    tf: Date,
    dates: &[Date],
    subpop_names: &[String],
    rng: &mut impl Rng,
    built: &mut HashMap<String, Modifier>,
    in_progress: &mut HashSet<String>,
) -> Result<Modifier> {
    if let Some(m) = built.get(name) {
        return Ok(m.clone());
    }
    if in_progress.contains(name) {
        return Err(EpiError::Validation(format!(
            "cyclic StackedModifier composition detected at '{name}'"
        )));
    }
    let cfg = library
        .get(name)
        .ok_or_else(|| EpiError::Config(format!("unknown modifier '{name}'")))?;

    in_progress.insert(name.to_string());
    let modifier = match cfg.method {
        ModifierMethod::SinglePeriodModifier => {
            Modifier::SinglePeriod(SinglePeriodModifier::build(
                name,
                cfg,
                ti,
                tf,
                dates,
                subpop_names,
                NEUTRAL_CELL,
                None,
                rng,
            )?)
        }
        ModifierMethod::MultiPeriodModifier => {
            Modifier::MultiPeriod(MultiPeriodModifier::build(
                name,
                cfg,
                ti,
                tf,
                dates,
                subpop_names,
                NEUTRAL_CELL,
                None,
                rng,
            )?)
        }
        ModifierMethod::StackedModifier => {
            let child_names = cfg.modifiers.as_ref().ok_or_else(|| {
                EpiError::Config(format!("{name}: StackedModifier requires `modifiers`"))
            })?;
            let mut children = vec![];
            for child_name in child_names {
                children.push(build_one(
                    child_name,
                    library,
                    ti,
                    tf,
                    dates,
                    subpop_names,
                    rng,
                    built,
                    in_progress,
                )?);
            }
            Modifier::Stacked(StackedModifier::new(name, children))
        }
    };
    in_progress.remove(name);
    built.insert(name.to_string(), modifier.clone());
    Ok(modifier)
}

/// Every method's `reduce` leaves an untouched parameter unchanged under
/// this default cell: `0.0` is the identity for `sum`'s addition and, since
/// `product`/`reduction_product` both fold as `slab * (1 - npi)`, also the
/// identity for those (`1 - 0 = 1`). Only the window (and the affected
/// subpops) are overwritten with drawn values; every other cell keeps this
/// default regardless of method.
const NEUTRAL_CELL: f64 = 0.0;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array2;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn dates(n: usize) -> Vec<Date> {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|d| ti + Duration::days(d as i64)).collect()
    }

    #[test]
    fn idempotent_at_zero_under_product() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ds = dates(5);
        let cfg = ModifierConfig {
            method: ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(ti),
            period_end_date: Some(tf),
            periods: None,
            value: Some(Distribution::Fixed(0.0)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let subpops = vec!["a".to_string(), "b".to_string()];
        let m = SinglePeriodModifier::build(
            "m1", &cfg, ti, tf, &ds, &subpops, 1.0, None, &mut rng,
        )
        .unwrap();
        let slab = Array2::from_elem((2, 5), 3.0);
        let reduced = m.reduce("gamma", &slab, StackedMethod::Product);
        assert!(reduced.iter().all(|&x| (x - 3.0).abs() < 1e-9));
    }

    #[test]
    fn zeroes_inside_window_at_value_one() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ds = dates(5);
        let cfg = ModifierConfig {
            method: ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(ti),
            period_end_date: Some(tf),
            periods: None,
            value: Some(Distribution::Fixed(1.0)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let subpops = vec!["a".to_string()];
        let m = SinglePeriodModifier::build(
            "m1", &cfg, ti, tf, &ds, &subpops, 1.0, None, &mut rng,
        )
        .unwrap();
        let slab = Array2::from_elem((1, 5), 3.0);
        let reduced = m.reduce("gamma", &slab, StackedMethod::Product);
        assert!(reduced.iter().all(|&x| x.abs() < 1e-9));
    }

    #[test]
    fn product_leaves_days_outside_window_unchanged() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ds = dates(5);
        let window_start = ti + Duration::days(1);
        let window_end = ti + Duration::days(2);
        let cfg = ModifierConfig {
            method: ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(window_start),
            period_end_date: Some(window_end),
            periods: None,
            value: Some(Distribution::Fixed(1.0)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let subpops = vec!["a".to_string()];
        let m = SinglePeriodModifier::build(
            "m1",
            &cfg,
            ti,
            tf,
            &ds,
            &subpops,
            NEUTRAL_CELL,
            None,
            &mut rng,
        )
        .unwrap();
        let slab = Array2::from_elem((1, 5), 3.0);
        let reduced = m.reduce("gamma", &slab, StackedMethod::Product);
        for (day, &value) in reduced.row(0).iter().enumerate() {
            if day == 1 || day == 2 {
                assert!(value.abs() < 1e-9, "day {day} should be zeroed, got {value}");
            } else {
                assert!(
                    (value - 3.0).abs() < 1e-9,
                    "day {day} outside the window should be unchanged, got {value}"
                );
            }
        }
    }

    #[test]
    fn rejects_window_outside_global_dates() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ds = dates(5);
        let cfg = ModifierConfig {
            method: ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            period_end_date: Some(tf),
            periods: None,
            value: Some(Distribution::Fixed(1.0)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let mut rng = SmallRng::seed_from_u64(0);
        let subpops = vec!["a".to_string()];
        let err = SinglePeriodModifier::build(
            "m1", &cfg, ti, tf, &ds, &subpops, 1.0, None, &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, EpiError::Validation(_)));
    }

    #[test]
    fn stacked_sum_equals_child_sum() {
        let ti = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let tf = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let ds = dates(5);
        let subpops = vec!["a".to_string()];
        let mut rng = SmallRng::seed_from_u64(7);

        let cfg_a = ModifierConfig {
            method: ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(ti),
            period_end_date: Some(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
            periods: None,
            value: Some(Distribution::Fixed(1.0)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let cfg_b = ModifierConfig {
            method: ModifierMethod::SinglePeriodModifier,
            parameter: "gamma".into(),
            period_start_date: Some(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()),
            period_end_date: Some(tf),
            periods: None,
            value: Some(Distribution::Fixed(2.0)),
            subpop: None,
            spatial_groups: None,
            modifiers: None,
        };
        let a = Modifier::SinglePeriod(
            SinglePeriodModifier::build("a", &cfg_a, ti, tf, &ds, &subpops, 0.0, None, &mut rng)
                .unwrap(),
        );
        let b = Modifier::SinglePeriod(
            SinglePeriodModifier::build("b", &cfg_b, ti, tf, &ds, &subpops, 0.0, None, &mut rng)
                .unwrap(),
        );
        let stacked = StackedModifier::new("ab", vec![a.clone(), b.clone()]);

        let slab = Array2::zeros((1, 5));
        let sum_a = a.reduce("gamma", &slab, StackedMethod::Sum);
        let sum_b = b.reduce("gamma", &slab, StackedMethod::Sum);
        let expect = &sum_a + &sum_b;
        let got = stacked.reduce("gamma", &slab, StackedMethod::Sum);
        assert_eq!(got, expect);
    }
}
