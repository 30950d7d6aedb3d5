//! Label vocabulary in first-occurrence order.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    index: HashMap<String, usize>,
    labels: Vec<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert if absent; returns the label's index either way.
    pub fn insert(&mut self, label: &str) -> usize {
        if let Some(&ix) = self.index.get(label) {
            return ix;
        }
        let ix = self.labels.len();
        self.index.insert(label.to_string(), ix);
        self.labels.push(label.to_string());
        ix
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut vocab = Vocabulary::new();
        for label in iter {
            vocab.insert(label);
        }
        vocab
    }
}
