//! Count matrix representation for reporter assay data

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{MpraError, Result};

/// A count matrix of sequencing reads.
/// Rows are enhancers, columns are observations (barcode/batch/condition
/// combinations).
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Raw count data (enhancers x observations)
    counts: Array2<f64>,
    /// Enhancer identifiers
    row_ids: Vec<String>,
    /// Observation identifiers
    column_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new count matrix from raw data
    pub fn new(counts: Array2<f64>, row_ids: Vec<String>, column_ids: Vec<String>) -> Result<Self> {
        let (n_rows, n_cols) = counts.dim();

        if row_ids.len() != n_rows {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} row IDs", n_rows),
                got: format!("{} row IDs", row_ids.len()),
            });
        }

        if column_ids.len() != n_cols {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} column IDs", n_cols),
                got: format!("{} column IDs", column_ids.len()),
            });
        }

        if counts.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(MpraError::InvalidCounts {
                reason: "counts must be non-negative finite values".to_string(),
            });
        }

        Ok(Self {
            counts,
            row_ids,
            column_ids,
        })
    }

    /// Create from integer counts
    pub fn from_integers(
        counts: Array2<u32>,
        row_ids: Vec<String>,
        column_ids: Vec<String>,
    ) -> Result<Self> {
        Self::new(counts.mapv(|x| x as f64), row_ids, column_ids)
    }

    pub fn n_rows(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.counts.ncols()
    }

    /// Raw counts as a view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    pub fn column_ids(&self) -> &[String] {
        &self.column_ids
    }

    /// Counts for a single enhancer
    pub fn row(&self, row_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.row(row_idx)
    }

    /// Row index for an enhancer identifier
    pub fn row_index(&self, row_id: &str) -> Option<usize> {
        self.row_ids.iter().position(|id| id == row_id)
    }

    /// Total counts per observation column
    pub fn column_totals(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(1)).map(|col| col.sum()).collect()
    }

    /// Subset to specific rows, preserving the given order
    pub fn select_rows(&self, row_indices: &[usize]) -> Result<Self> {
        if row_indices.is_empty() {
            return Err(MpraError::EmptyData {
                reason: "row selection is empty".to_string(),
            });
        }
        let new_counts = self.counts.select(Axis(0), row_indices);
        let new_ids: Vec<String> = row_indices.iter().map(|&i| self.row_ids[i].clone()).collect();
        Self::new(new_counts, new_ids, self.column_ids.clone())
    }
}
