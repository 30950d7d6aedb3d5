//! Labeled numeric feature matrix.

use crate::error::{FeatureError, Result};
use crate::logging::RowRecord;
use ndarray::{concatenate, Array2, ArrayView1, Axis};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    /// Row labels (case ids) for case-level output
    index: Option<Vec<String>>,
    values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(FeatureError::ShapeMismatch {
                expected: values.ncols(),
                actual: columns.len(),
            });
        }
        Ok(Self {
            columns,
            index: None,
            values,
        })
    }

    pub fn with_index(mut self, index: Vec<String>) -> Result<Self> {
        if index.len() != self.values.nrows() {
            return Err(FeatureError::ShapeMismatch {
                expected: self.values.nrows(),
                actual: index.len(),
            });
        }
        self.index = Some(index);
        Ok(self)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> Option<&[String]> {
        self.index.as_deref()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        let ix = self.columns.iter().position(|c| c == name)?;
        Some(self.values.column(ix))
    }

    /// Concatenate columns of two matrices with the same row count.
    pub fn hstack(&self, other: &FeatureMatrix) -> Result<FeatureMatrix> {
        if self.nrows() != other.nrows() {
            return Err(FeatureError::ShapeMismatch {
                expected: self.nrows(),
                actual: other.nrows(),
            });
        }
        let values = concatenate(Axis(1), &[self.values.view(), other.values.view()])
            .map_err(|e| FeatureError::InvalidConfig(e.to_string()))?;
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Ok(FeatureMatrix {
            columns,
            index: self.index.clone().or_else(|| other.index.clone()),
            values,
        })
    }

    /// One record per row, keyed by column name, for JSON-lines output.
    pub fn records(&self) -> Vec<RowRecord<'_>> {
        self.values
            .outer_iter()
            .enumerate()
            .map(|(i, row)| RowRecord {
                case_id: self.index.as_ref().map(|ix| ix[i].as_str()),
                features: self
                    .columns
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().copied())
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rejects_column_count_mismatch() {
        let err = FeatureMatrix::new(vec!["a".into()], array![[1.0, 2.0]]).unwrap_err();
        assert!(matches!(err, FeatureError::ShapeMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn hstack_joins_columns_in_order() {
        let a = FeatureMatrix::new(vec!["a".into()], array![[1.0], [2.0]]).unwrap();
        let b = FeatureMatrix::new(vec!["b".into()], array![[3.0], [4.0]]).unwrap();
        let ab = a.hstack(&b).unwrap();
        assert_eq!(ab.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(ab.values(), &array![[1.0, 3.0], [2.0, 4.0]]);
        assert_eq!(ab.column("b").unwrap().to_vec(), vec![3.0, 4.0]);
    }
}
