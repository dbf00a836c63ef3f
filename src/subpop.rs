//! Subpopulation structure: names, populations, and the mobility matrix that
//! couples them.

use crate::error::{EpiError, Result};
use getset::Getters;
use ndarray::{Array1, Array2};
use std::collections::HashSet;

/// Ordered set of subpopulations with read-only population and mobility
/// data. Immutable after construction: nothing in this crate ever mutates a
/// `SubpopStruct` once built, so it can be shared by reference (or wrapped
/// in `Arc`) across ensemble workers.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct SubpopStruct {
    #[getset(get = "pub")]
    names: Vec<String>,
    #[getset(get = "pub")]
    populations: Array1<f64>,
    #[getset(get = "pub")]
    mobility: Array2<f64>,
}

impl SubpopStruct {
    /// Build from a geodata table (`names`/`populations`, same order) and a
    /// mobility matrix indexed by that same order.
    pub fn new(names: Vec<String>, populations: Array1<f64>, mobility: Array2<f64>) -> Result<Self> {
        let n = names.len();
        if populations.len() != n {
            return Err(EpiError::Validation(format!(
                "geodata has {} names but {} populations",
                n,
                populations.len()
            )));
        }
        if mobility.nrows() != n || mobility.ncols() != n {
            return Err(EpiError::Validation(format!(
                "mobility matrix is {}x{} but there are {} subpops",
                mobility.nrows(),
                mobility.ncols(),
                n
            )));
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &names {
            if !seen.insert(name.clone()) {
                return Err(EpiError::Validation(format!(
                    "duplicate subpop name: {name}"
                )));
            }
        }

        for (i, &pop) in populations.iter().enumerate() {
            if pop <= 0.0 {
                return Err(EpiError::Validation(format!(
                    "subpop '{}' has non-positive population {}",
                    names[i], pop
                )));
            }
        }

        for i in 0..n {
            if mobility[(i, i)] != 0.0 {
                return Err(EpiError::Validation(format!(
                    "mobility matrix has non-zero diagonal at subpop '{}'",
                    names[i]
                )));
            }
            let row_sum: f64 = mobility.row(i).sum();
            if row_sum > populations[i] {
                return Err(EpiError::Validation(format!(
                    "mobility out of subpop '{}' ({row_sum}) exceeds its population ({})",
                    names[i], populations[i]
                )));
            }
        }

        Ok(SubpopStruct {
            names,
            populations,
            mobility,
        })
    }

    pub fn n(&self) -> usize {
        self.names.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn ok_struct() -> SubpopStruct {
        SubpopStruct::new(
            vec!["a".into(), "b".into()],
            Array1::from(vec![100.0, 200.0]),
            arr2(&[[0.0, 10.0], [5.0, 0.0]]),
        )
        .unwrap()
    }

    #[test]
    fn builds_with_valid_inputs() {
        let s = ok_struct();
        assert_eq!(s.n(), 2);
        assert_eq!(s.index_of("b"), Some(1));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = SubpopStruct::new(
            vec!["a".into(), "a".into()],
            Array1::from(vec![1.0, 1.0]),
            arr2(&[[0.0, 0.0], [0.0, 0.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, EpiError::Validation(_)));
    }

    #[test]
    fn rejects_nonpositive_population() {
        let err = SubpopStruct::new(
            vec!["a".into()],
            Array1::from(vec![0.0]),
            arr2(&[[0.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, EpiError::Validation(_)));
    }

    #[test]
    fn rejects_nonzero_diagonal() {
        let err = SubpopStruct::new(
            vec!["a".into(), "b".into()],
            Array1::from(vec![100.0, 100.0]),
            arr2(&[[1.0, 0.0], [0.0, 0.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, EpiError::Validation(_)));
    }

    #[test]
    fn rejects_row_sum_exceeding_population() {
        let err = SubpopStruct::new(
            vec!["a".into(), "b".into()],
            Array1::from(vec![5.0, 100.0]),
            arr2(&[[0.0, 10.0], [0.0, 0.0]]),
        )
        .unwrap_err();
        assert!(matches!(err, EpiError::Validation(_)));
    }
}
