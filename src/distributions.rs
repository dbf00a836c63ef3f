//! Builds callable samplers for the distribution kinds that parameters and
//! modifiers may draw from.

use crate::error::{EpiError, Result};
use ndarray::Array1;
use rand::Rng;
use rand_distr::{Binomial, Distribution as _, LogNormal, Normal, Poisson, Uniform};
use serde::Deserialize;

/// A distribution descriptor, deserialized directly from a config's `value`
/// field. A bare number deserializes to `Fixed`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum Distribution {
    Fixed(f64),
    Uniform { low: f64, high: f64 },
    #[serde(rename = "truncnorm")]
    TruncNorm { mean: f64, sd: f64, a: f64, b: f64 },
    #[serde(rename = "lognorm")]
    LogNorm { meanlog: f64, sdlog: f64 },
    Poisson { lam: f64 },
    Binomial { n: u64, p: f64 },
}

impl Distribution {
    /// Draw `size` i.i.d. samples using `rng`.
    pub fn draw(&self, size: usize, rng: &mut impl Rng) -> Result<Array1<f64>> {
        let values: Vec<f64> = match self {
            Distribution::Fixed(v) => vec![*v; size],
            Distribution::Uniform { low, high } => {
                let d = Uniform::new(*low, *high);
                (0..size).map(|_| d.sample(rng)).collect()
            }
            Distribution::TruncNorm { mean, sd, a, b } => {
                let d = Normal::new(*mean, *sd).map_err(|e| {
                    EpiError::Config(format!("invalid truncnorm parameters: {e}"))
                })?;
                (0..size)
                    .map(|_| {
                        loop {
                            let x = d.sample(rng);
                            if x >= *a && x <= *b {
                                return x;
                            }
                        }
                    })
                    .collect()
            }
            Distribution::LogNorm { meanlog, sdlog } => {
                let d = LogNormal::new(*meanlog, *sdlog).map_err(|e| {
                    EpiError::Config(format!("invalid lognorm parameters: {e}"))
                })?;
                (0..size).map(|_| d.sample(rng)).collect()
            }
            Distribution::Poisson { lam } => {
                let d = Poisson::new(*lam)
                    .map_err(|e| EpiError::Config(format!("invalid poisson lambda: {e}")))?;
                (0..size).map(|_| d.sample(rng)).collect()
            }
            Distribution::Binomial { n, p } => {
                let d = Binomial::new(*n, *p)
                    .map_err(|e| EpiError::Config(format!("invalid binomial parameters: {e}")))?;
                (0..size).map(|_| d.sample(rng) as f64).collect()
            }
        };
        Ok(Array1::from(values))
    }
}
