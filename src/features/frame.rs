//! Aggregator input: a case-id column plus numeric or categorical columns.

use super::FeatureMatrix;
use crate::error::{FeatureError, Result};
use crate::event_log::{group_cases, Case, EventLog};

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// NaN marks a missing value
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFrame {
    case_ids: Vec<String>,
    columns: Vec<(String, Column)>,
}

impl CaseFrame {
    pub fn new(case_ids: Vec<String>) -> Self {
        Self {
            case_ids,
            columns: Vec::new(),
        }
    }

    /// Frame with one row per event of `log` and no feature columns yet.
    pub fn from_log(log: &EventLog) -> Self {
        Self::new(log.iter().map(|e| e.case_id.clone()).collect())
    }

    pub fn len(&self) -> usize {
        self.case_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.case_ids.is_empty()
    }

    pub fn case_ids(&self) -> &[String] {
        &self.case_ids
    }

    pub fn cases(&self) -> Vec<Case<'_>> {
        group_cases(self.case_ids.iter().map(String::as_str))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn columns(&self) -> &[(String, Column)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
    }

    /// Add or replace a column.
    pub fn push(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        if column.len() != self.len() {
            return Err(FeatureError::ShapeMismatch {
                expected: self.len(),
                actual: column.len(),
            });
        }
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = column,
            None => self.columns.push((name, column)),
        }
        Ok(())
    }

    pub fn push_numeric(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        self.push(name, Column::Numeric(values))
    }

    pub fn push_categorical(&mut self, name: impl Into<String>, values: Vec<String>) -> Result<()> {
        self.push(name, Column::Categorical(values))
    }

    /// Append every column of an event-aligned matrix.
    pub fn push_matrix(&mut self, matrix: &FeatureMatrix) -> Result<()> {
        if matrix.nrows() != self.len() {
            return Err(FeatureError::ShapeMismatch {
                expected: self.len(),
                actual: matrix.nrows(),
            });
        }
        for (j, name) in matrix.columns().iter().enumerate() {
            self.push_numeric(name.clone(), matrix.values().column(j).to_vec())?;
        }
        Ok(())
    }
}
