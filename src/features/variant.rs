//! Trace variants: label-encode each case's activity sequence.

use super::{FeatureMatrix, Transformer};
use crate::error::{FeatureError, Result};
use crate::event_log::EventLog;
use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct VariantExtractor {
    /// Known variants in code order; code = position + 1, 0 = unseen
    variants: Option<Vec<Vec<String>>>,
    codes: BTreeMap<Vec<String>, usize>,
}

fn sequences(log: &EventLog) -> Vec<(&str, Vec<String>)> {
    let events = log.events();
    log.cases()
        .into_iter()
        .map(|case| {
            let seq = case.rows.iter().map(|&r| events[r].activity.clone()).collect();
            (case.id, seq)
        })
        .collect()
}

impl VariantExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn n_variants(&self) -> Option<usize> {
        self.variants.as_ref().map(Vec::len)
    }

    /// Activity sequence for a variant code.
    pub fn inverse(&self, code: usize) -> Option<&[String]> {
        let variants = self.variants.as_ref()?;
        code.checked_sub(1)
            .and_then(|ix| variants.get(ix))
            .map(Vec::as_slice)
    }
}

impl Transformer for VariantExtractor {
    type Input = EventLog;

    fn fit(&mut self, log: &EventLog) -> Result<()> {
        let distinct: BTreeSet<Vec<String>> = sequences(log).into_iter().map(|(_, s)| s).collect();
        let variants: Vec<Vec<String>> = distinct.into_iter().collect();
        self.codes = variants
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i + 1))
            .collect();
        debug!(variants = variants.len(), "fitted variant extractor");
        self.variants = Some(variants);
        Ok(())
    }

    fn transform(&self, log: &EventLog) -> Result<FeatureMatrix> {
        if self.variants.is_none() {
            return Err(FeatureError::NotFitted("VariantExtractor"));
        }
        let seqs = sequences(log);
        let mut unseen = 0;
        let values = Array2::from_shape_fn((seqs.len(), 1), |(i, _)| {
            match self.codes.get(&seqs[i].1) {
                Some(&code) => code as f64,
                None => {
                    unseen += 1;
                    0.0
                }
            }
        });
        if unseen > 0 {
            warn!(cases = unseen, "variants unseen during fit mapped to 0");
        }
        let index = seqs.iter().map(|(id, _)| id.to_string()).collect();
        FeatureMatrix::new(self.feature_names_out(), values)?.with_index(index)
    }

    fn feature_names_out(&self) -> Vec<String> {
        vec!["variant".to_string()]
    }
}
