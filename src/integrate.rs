//! The stochastic (or deterministic) SEIR integrator: walks the compiled
//! transition rows day by day, applying seeding events, mobility-weighted
//! mixing, and binomial (or mass-action) draws, and accumulates a
//! prevalence/incidence trajectory.

use crate::compartments::CompartmentModel;
use crate::error::{EpiError, Result};
use crate::seeding::SeedingEvent;
use crate::subpop::SubpopStruct;
use ndarray::{Array3, ArrayView2, ArrayView3};
use rand::Rng;
use rand_distr::{Binomial, Distribution as _};
use std::sync::atomic::{AtomicBool, Ordering};

const CONSERVATION_TOLERANCE: f64 = 1e-3;

/// Which axis of a `Trajectory` slab is being read: running occupancy, or
/// the daily flow into each compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Prevalence,
    Incidence,
}

/// `Y[k, d, c, s]`: prevalence and incidence, one `(C, N)` slab per day.
#[derive(Debug, Clone)]
pub struct Trajectory {
    prevalence: Array3<f64>,
    incidence: Array3<f64>,
}

impl Trajectory {
    fn new(n_days: usize, c: usize, n: usize) -> Self {
        Trajectory {
            prevalence: Array3::zeros((n_days, c, n)),
            incidence: Array3::zeros((n_days, c, n)),
        }
    }

    pub fn get(&self, kind: ValueType, day: usize) -> ArrayView2<f64> {
        match kind {
            ValueType::Prevalence => self.prevalence.index_axis(ndarray::Axis(0), day),
            ValueType::Incidence => self.incidence.index_axis(ndarray::Axis(0), day),
        }
    }

    pub fn prevalence(&self) -> &Array3<f64> {
        &self.prevalence
    }

    pub fn incidence(&self) -> &Array3<f64> {
        &self.incidence
    }
}

pub struct Integrator;

impl Integrator {
    /// Advances the compartment vector across every day in the grid, one
    /// sub-step per `dt` fraction of a day.
    #[allow(clippy::too_many_arguments)]
    pub fn integrate(
        compartments: &CompartmentModel,
        subpop: &SubpopStruct,
        reduced: ArrayView3<f64>,
        ic: ArrayView2<f64>,
        seeding: &[SeedingEvent],
        dt: f64,
        stochastic: bool,
        rng: &mut impl Rng,
        cancel: &AtomicBool,
    ) -> Result<Trajectory> {
        let c = compartments.cardinality();
        let n = subpop.n();
        let (_, n_days, n_check) = reduced.dim();
        if n_check != n {
            return Err(EpiError::Validation(format!(
                "reduced parameter tensor has {n_check} subpops but the model has {n}"
            )));
        }
        if dt <= 0.0 || dt > 1.0 {
            return Err(EpiError::Config(format!(
                "sub-daily step dt must lie in (0, 1], got {dt}"
            )));
        }

        let mobility = subpop.mobility();
        let populations = subpop.populations();
        let n_substeps = (1.0 / dt).round() as usize;

        let mut trajectory = Trajectory::new(n_days, c, n);
        let mut occupancy = ic.to_owned();

        for day in 0..n_days {
            if cancel.load(Ordering::Relaxed) {
                return Err(EpiError::Cancelled);
            }

            for event in seeding.iter().filter(|e| e.day_index == day) {
                let available = occupancy[(event.source.0, event.subpop)];
                let amount = event.amount.min(available.max(0.0));
                occupancy[(event.source.0, event.subpop)] -= amount;
                occupancy[(event.destination.0, event.subpop)] += amount;
            }

            let mut incidence_today = ndarray::Array2::<f64>::zeros((c, n));

            for _ in 0..n_substeps {
                let mut flows: Vec<(usize, usize, ndarray::Array1<f64>)> = Vec::new();

                for row in compartments.transitions() {
                    let rate_tokens = compartments.rate_token_indices(row);
                    let mut rate = ndarray::Array1::<f64>::ones(n);
                    for &tok in rate_tokens {
                        let slab = reduced.index_axis(ndarray::Axis(0), tok);
                        let day_slice = slab.index_axis(ndarray::Axis(0), day);
                        rate = rate * &day_slice;
                    }

                    let mut factor = ndarray::Array1::<f64>::ones(n);
                    let prop_start = row.prop_start;
                    let prop_len = row.prop_len;
                    for info in &compartments.proportion_info()[prop_start..prop_start + prop_len] {
                        let term_ids = &compartments.proportion_array()
                            [info.start..info.start + info.len];
                        let mut local_pop = ndarray::Array1::<f64>::zeros(n);
                        for &cid in term_ids {
                            let occ = occupancy.row(cid).to_owned();
                            // Mobility-weighted mixing: `M · x + diag · x`, where
                            // `diag` is the fraction of each subpop's own
                            // occupancy that stays home (1 - outflow/pop).
                            let mixed = mobility.dot(&occ) + &occ * &diag_retained(mobility, populations);
                            local_pop = local_pop + mixed;
                        }
                        let exponentiated = local_pop.mapv(|v| v.powf(info.exponent));
                        factor = factor * exponentiated;
                    }

                    let combined_rate = rate * factor;

                    let source_occ = occupancy.row(row.source.0).to_owned();
                    let mut moved = ndarray::Array1::<f64>::zeros(n);
                    for s in 0..n {
                        let n_avail = source_occ[s];
                        let r = combined_rate[s];
                        if !r.is_finite() {
                            return Err(EpiError::Integration {
                                day,
                                message: format!(
                                    "non-finite rate for transition {:?} -> {:?}",
                                    row.source, row.destination
                                ),
                            });
                        }
                        let amount = if stochastic {
                            let p = (1.0 - (-r * dt).exp()).clamp(0.0, 1.0);
                            if n_avail < 0.0 {
                                return Err(EpiError::Integration {
                                    day,
                                    message: format!(
                                        "negative source occupancy at subpop {s} before drawing transition {:?} -> {:?}",
                                        row.source, row.destination
                                    ),
                                });
                            }
                            let draw = Binomial::new(n_avail.round() as u64, p).map_err(|e| {
                                EpiError::Integration {
                                    day,
                                    message: format!("invalid binomial draw: {e}"),
                                }
                            })?;
                            draw.sample(rng) as f64
                        } else {
                            r * dt * n_avail
                        };
                        moved[s] = amount;
                    }
                    flows.push((row.source.0, row.destination.0, moved));
                }

                for (src, dst, moved) in flows {
                    for s in 0..n {
                        let amount = moved[s].min(occupancy[(src, s)].max(0.0));
                        occupancy[(src, s)] -= amount;
                        occupancy[(dst, s)] += amount;
                        incidence_today[(dst, s)] += amount;
                    }
                }
            }

            for s in 0..n {
                let total: f64 = occupancy.column(s).sum();
                let pop = populations[s];
                if (total - pop).abs() > CONSERVATION_TOLERANCE {
                    return Err(EpiError::Integration {
                        day,
                        message: format!(
                            "population conservation violated at subpop {s}: total {total} vs pop {pop}"
                        ),
                    });
                }
                for cc in 0..c {
                    if occupancy[(cc, s)] < -CONSERVATION_TOLERANCE {
                        return Err(EpiError::Integration {
                            day,
                            message: format!(
                                "negative occupancy at compartment {cc}, subpop {s}: {}",
                                occupancy[(cc, s)]
                            ),
                        });
                    }
                }
            }

            trajectory
                .prevalence
                .index_axis_mut(ndarray::Axis(0), day)
                .assign(&occupancy);
            trajectory
                .incidence
                .index_axis_mut(ndarray::Axis(0), day)
                .assign(&incidence_today);
        }

        Ok(trajectory)
    }
}

/// The fraction of each subpop's population that stays home rather than
/// moving under the mobility matrix, i.e. `1 - row_sum(M)/pop`.
fn diag_retained(
    mobility: &ndarray::Array2<f64>,
    populations: &ndarray::Array1<f64>,
) -> ndarray::Array1<f64> {
    let n = mobility.nrows();
    ndarray::Array1::from_shape_fn(n, |i| {
        let out = mobility.row(i).sum();
        1.0 - out / populations[i]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compartments::CompartmentModel;
    use crate::config::TransitionConfig;
    use indexmap::IndexMap;
    use ndarray::{Array1, Array2};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn sir_compartments() -> CompartmentModel {
        let mut dims = IndexMap::new();
        dims.insert(
            "infection_stage".to_string(),
            vec!["S".into(), "I".into(), "R".into()],
        );
        let transitions = vec![
            TransitionConfig {
                source: vec![vec!["S".into()]],
                destination: vec![vec!["I".into()]],
                rate: vec!["beta".into()],
                proportional_to: vec![vec![vec!["I".into()]]],
                proportion_exponent: vec![1.0],
            },
            TransitionConfig {
                source: vec![vec!["I".into()]],
                destination: vec![vec!["R".into()]],
                rate: vec!["gamma".into()],
                proportional_to: vec![],
                proportion_exponent: vec![],
            },
        ];
        CompartmentModel::compile(&dims, &transitions).unwrap()
    }

    #[test]
    fn no_spread_with_zero_mobility_keeps_other_subpops_clean() {
        let compartments = sir_compartments();
        let subpop = SubpopStruct::new(
            vec!["s0".into(), "s1".into()],
            Array1::from(vec![1000.0, 1000.0]),
            Array2::zeros((2, 2)),
        )
        .unwrap();

        let n_days = 10;
        let mut reduced = Array3::<f64>::zeros((2, n_days, 2));
        reduced.index_axis_mut(ndarray::Axis(0), 0).fill(0.0005); // beta
        reduced.index_axis_mut(ndarray::Axis(0), 1).fill(0.1); // gamma

        let mut ic = Array2::<f64>::zeros((3, 2));
        ic[(0, 0)] = 999.0;
        ic[(1, 0)] = 1.0;
        ic[(0, 1)] = 1000.0;

        let events = vec![];
        let cancel = AtomicBool::new(false);
        let mut rng = SmallRng::seed_from_u64(7);
        let traj = Integrator::integrate(
            &compartments,
            &subpop,
            reduced.view(),
            ic.view(),
            &events,
            1.0,
            true,
            &mut rng,
            &cancel,
        )
        .unwrap();

        let last = traj.get(ValueType::Prevalence, n_days - 1);
        assert_eq!(last[(2, 1)], 0.0);
    }

    #[test]
    fn conservation_holds_every_day() {
        let compartments = sir_compartments();
        let subpop = SubpopStruct::new(
            vec!["s0".into()],
            Array1::from(vec![500.0]),
            Array2::zeros((1, 1)),
        )
        .unwrap();

        let n_days = 5;
        let mut reduced = Array3::<f64>::zeros((2, n_days, 1));
        reduced.index_axis_mut(ndarray::Axis(0), 0).fill(0.001);
        reduced.index_axis_mut(ndarray::Axis(0), 1).fill(0.2);

        let mut ic = Array2::<f64>::zeros((3, 1));
        ic[(0, 0)] = 490.0;
        ic[(1, 0)] = 10.0;

        let events = vec![];
        let cancel = AtomicBool::new(false);
        let mut rng = SmallRng::seed_from_u64(1);
        let traj = Integrator::integrate(
            &compartments,
            &subpop,
            reduced.view(),
            ic.view(),
            &events,
            1.0,
            false,
            &mut rng,
            &cancel,
        )
        .unwrap();

        for day in 0..n_days {
            let slab = traj.get(ValueType::Prevalence, day);
            let total: f64 = slab.sum();
            assert!((total - 500.0).abs() < 1e-6, "day {day}: total {total}");
            assert!(slab.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn cancellation_is_observed_before_first_day() {
        let compartments = sir_compartments();
        let subpop = SubpopStruct::new(
            vec!["s0".into()],
            Array1::from(vec![500.0]),
            Array2::zeros((1, 1)),
        )
        .unwrap();
        let n_days = 3;
        let reduced = Array3::<f64>::zeros((2, n_days, 1));
        let ic = Array2::<f64>::zeros((3, 1));
        let events = vec![];
        let cancel = AtomicBool::new(true);
        let mut rng = SmallRng::seed_from_u64(1);
        let err = Integrator::integrate(
            &compartments,
            &subpop,
            reduced.view(),
            ic.view(),
            &events,
            1.0,
            false,
            &mut rng,
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, EpiError::Cancelled));
    }
}
