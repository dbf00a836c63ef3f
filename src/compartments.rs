//! Expands the declared compartment dimensions into a cross-product
//! enumeration and compiles transitions into the dense, index-based arrays
//! the integrator drives: the transition array `X`, the proportion array
//! `P`, and the proportion info `Q`.

use crate::config::TransitionConfig;
use crate::error::{EpiError, Result};
use indexmap::IndexMap;
use ndarray::{Array3, ArrayView3};
use std::collections::HashMap;

/// A stable integer id identifying one compartment. Kept as a newtype at
/// public boundaries; dense arrays internally index with raw `usize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompartmentId(pub usize);

/// One atomic transition: `source -> destination` at a rate given by the
/// product of `unique_strings[rate_start..rate_start+rate_len]`, scaled by
/// the product of the proportion terms
/// `proportion_info[prop_start..prop_start+prop_len]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRow {
    pub source: CompartmentId,
    pub destination: CompartmentId,
    pub rate_start: usize,
    pub rate_len: usize,
    pub prop_start: usize,
    pub prop_len: usize,
}

/// Describes one proportion term: a span within `P` (the compartments whose
/// occupancy is summed) and the exponent that sum is raised to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProportionInfo {
    pub start: usize,
    pub len: usize,
    pub exponent: f64,
}

#[derive(Debug, Clone)]
pub struct CompartmentModel {
    dims: IndexMap<String, Vec<String>>,
    names: Vec<Vec<String>>,
    index_of: HashMap<Vec<String>, usize>,
    /// `names[i]` joined with `_`, the convention external artifacts and
    /// seeding/initial-conditions files use to name a single compartment.
    joined_names: Vec<String>,
    joined_index: HashMap<String, usize>,
    unique_strings: Vec<String>,
    /// Flat list of `unique_strings` indices referenced by transitions, in
    /// declaration order; each `TransitionRow` spans a slice of this.
    rate_tokens: Vec<usize>,
    transitions: Vec<TransitionRow>,
    proportion_array: Vec<usize>,
    proportion_info: Vec<ProportionInfo>,
}

impl CompartmentModel {
    pub fn compile(
        dims: &IndexMap<String, Vec<String>>,
        transitions_cfg: &[TransitionConfig],
    ) -> Result<Self> {
        if dims.is_empty() {
            return Err(EpiError::Config(
                "compartments config declares no dimensions".to_string(),
            ));
        }

        let names = cross_product(dims);
        let mut index_of = HashMap::with_capacity(names.len());
        let mut joined_names = Vec::with_capacity(names.len());
        let mut joined_index = HashMap::with_capacity(names.len());
        for (i, tuple) in names.iter().enumerate() {
            index_of.insert(tuple.clone(), i);
            let joined = tuple.join("_");
            joined_index.insert(joined.clone(), i);
            joined_names.push(joined);
        }

        let mut model = CompartmentModel {
            dims: dims.clone(),
            names,
            index_of,
            joined_names,
            joined_index,
            unique_strings: vec![],
            rate_tokens: vec![],
            transitions: vec![],
            proportion_array: vec![],
            proportion_info: vec![],
        };

        for (t_idx, t_cfg) in transitions_cfg.iter().enumerate() {
            model.compile_one(t_idx, t_cfg)?;
        }

        Ok(model)
    }

    fn compile_one(&mut self, t_idx: usize, cfg: &TransitionConfig) -> Result<()> {
        let src_ids = self.expand_selector(&cfg.source)?;
        let dst_ids = self.expand_selector(&cfg.destination)?;
        if src_ids.len() != dst_ids.len() {
            return Err(EpiError::Validation(format!(
                "transition #{t_idx} lists {} source elements but {} destination elements",
                src_ids.len(),
                dst_ids.len()
            )));
        }

        let mut rate_indices = Vec::with_capacity(cfg.rate.len());
        for token in &cfg.rate {
            rate_indices.push(self.intern_token(token));
        }
        // `unique_strings` is globally deduplicated, so a transition's rate
        // tokens are not necessarily contiguous; store the flat index list
        // directly rather than pretending at a contiguous span.
        let rate_start = self.rate_token_flat_len();
        self.push_rate_tokens(&rate_indices);
        let rate_len = rate_indices.len();

        let prop_start = self.proportion_info.len();
        if cfg.proportional_to.len() != cfg.proportion_exponent.len()
            && !cfg.proportion_exponent.is_empty()
        {
            return Err(EpiError::Config(format!(
                "transition #{t_idx} has {} proportional_to terms but {} exponents",
                cfg.proportional_to.len(),
                cfg.proportion_exponent.len()
            )));
        }
        for (term_idx, term_selector) in cfg.proportional_to.iter().enumerate() {
            let term_ids = self.expand_selector(term_selector)?;
            let start = self.proportion_array.len();
            self.proportion_array.extend(term_ids.iter().copied());
            let exponent = cfg.proportion_exponent.get(term_idx).copied().unwrap_or(1.0);
            self.proportion_info.push(ProportionInfo {
                start,
                len: term_ids.len(),
                exponent,
            });
        }
        let prop_len = self.proportion_info.len() - prop_start;

        for (src, dst) in src_ids.into_iter().zip(dst_ids.into_iter()) {
            self.transitions.push(TransitionRow {
                source: CompartmentId(src),
                destination: CompartmentId(dst),
                rate_start,
                rate_len,
                prop_start,
                prop_len,
            });
        }
        Ok(())
    }

    /// Interns one rate token (numeric literal or parameter name) into
    /// `unique_strings`, returning its index.
    fn intern_token(&mut self, token: &str) -> usize {
        let key = if let Ok(v) = token.parse::<f64>() {
            format!("{v}")
        } else {
            token.to_lowercase().replace(' ', "")
        };
        if let Some(pos) = self.unique_strings.iter().position(|s| s == &key) {
            pos
        } else {
            self.unique_strings.push(key);
            self.unique_strings.len() - 1
        }
    }

    fn rate_token_flat_len(&self) -> usize {
        self.rate_tokens.len()
    }

    fn push_rate_tokens(&mut self, indices: &[usize]) {
        self.rate_tokens.extend_from_slice(indices);
    }

    /// Cross product of a per-dimension selector (same dimension order as
    /// `compartments`), where `["*"]` means "every value of that dimension".
    fn expand_selector(&self, selector: &[Vec<String>]) -> Result<Vec<usize>> {
        if selector.len() != self.dims.len() {
            return Err(EpiError::Validation(format!(
                "selector has {} dimensions but the model declares {}",
                selector.len(),
                self.dims.len()
            )));
        }
        let mut resolved: Vec<Vec<String>> = Vec::with_capacity(selector.len());
        for (dim_idx, (_dim_name, values)) in self.dims.iter().enumerate() {
            let sel = &selector[dim_idx];
            if sel.len() == 1 && sel[0] == "*" {
                resolved.push(values.clone());
            } else {
                for v in sel {
                    if !values.contains(v) {
                        return Err(EpiError::Validation(format!(
                            "selector value '{v}' is not declared in dimension '{_dim_name}'"
                        )));
                    }
                }
                resolved.push(sel.clone());
            }
        }

        let tuples = cross_product_of(&resolved);
        let mut ids = Vec::with_capacity(tuples.len());
        for tuple in tuples {
            match self.index_of.get(&tuple) {
                Some(&id) => ids.push(id),
                None => {
                    return Err(EpiError::Validation(format!(
                        "selector references a compartment that does not exist: {tuple:?}"
                    )))
                }
            }
        }
        Ok(ids)
    }

    pub fn cardinality(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[Vec<String>] {
        &self.names
    }

    /// The compartment's dimension values joined with `_`, e.g. `S_unvaccinated`.
    pub fn joined_name(&self, id: CompartmentId) -> &str {
        &self.joined_names[id.0]
    }

    pub fn joined_names(&self) -> &[String] {
        &self.joined_names
    }

    /// Looks up a compartment id from its underscore-joined name.
    pub fn id_of_joined(&self, joined: &str) -> Option<CompartmentId> {
        self.joined_index.get(joined).map(|&i| CompartmentId(i))
    }

    pub fn unique_strings(&self) -> &[String] {
        &self.unique_strings
    }

    pub fn transitions(&self) -> &[TransitionRow] {
        &self.transitions
    }

    pub fn proportion_array(&self) -> &[usize] {
        &self.proportion_array
    }

    pub fn proportion_info(&self) -> &[ProportionInfo] {
        &self.proportion_info
    }

    /// A transition's rate tokens, resolved from its `rate_start`/`rate_len`
    /// into `unique_strings` indices.
    pub fn rate_token_indices(&self, row: &TransitionRow) -> &[usize] {
        &self.rate_tokens[row.rate_start..row.rate_start + row.rate_len]
    }

    /// Expands each entry of `unique_strings` into a `(D, N)` slab: a copy
    /// of the named parameter's slab, or a constant fill for a numeric
    /// literal key. Returns `(len(unique_strings), D, N)`.
    pub fn parse_parameters(
        &self,
        tensor: ArrayView3<f64>,
        pname_to_index: &HashMap<String, usize>,
    ) -> Result<Array3<f64>> {
        let (_, d, n) = tensor.dim();
        let mut out = Array3::zeros((self.unique_strings.len(), d, n));
        for (i, key) in self.unique_strings.iter().enumerate() {
            if let Ok(v) = key.parse::<f64>() {
                out.index_axis_mut(ndarray::Axis(0), i).fill(v);
            } else {
                let &p = pname_to_index.get(key).ok_or_else(|| {
                    EpiError::Validation(format!(
                        "rate references unknown parameter '{key}'"
                    ))
                })?;
                out.index_axis_mut(ndarray::Axis(0), i)
                    .assign(&tensor.index_axis(ndarray::Axis(0), p));
            }
        }
        Ok(out)
    }
}

fn cross_product(dims: &IndexMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let value_lists: Vec<&Vec<String>> = dims.values().collect();
    cross_product_of(&value_lists.into_iter().cloned().collect::<Vec<_>>())
}

fn cross_product_of(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    let mut out: Vec<Vec<String>> = vec![vec![]];
    for list in lists {
        let mut next = Vec::with_capacity(out.len() * list.len().max(1));
        for prefix in &out {
            for value in list {
                let mut tuple = prefix.clone();
                tuple.push(value.clone());
                next.push(tuple);
            }
        }
        out = next;
    }
    out
}
