//! MpraObject - paired DNA/RNA container for MPRA analysis

use ndarray::Array1;
use std::collections::HashSet;

use super::{ColumnAnnotations, CountMatrix};
use crate::error::{MpraError, Result};

/// Which count matrix a depth factor set (or estimation run) applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthTarget {
    Dna,
    Rna,
    /// Estimate once and apply the same factors to both matrices.
    /// Requires DNA and RNA observations to share the same column structure.
    Both,
}

/// Container for one MPRA experiment: paired DNA/RNA count matrices,
/// per-column annotations, negative-control flags, and depth factors.
///
/// The matrices must agree on enhancer identity (row ids) and align
/// positionally on columns; annotations may carry different factors for DNA
/// and RNA. Enhancers with all-zero counts in both matrices are dropped at
/// construction with a warning.
#[derive(Debug, Clone)]
pub struct MpraObject {
    dna: CountMatrix,
    rna: CountMatrix,
    dna_annotations: ColumnAnnotations,
    rna_annotations: ColumnAnnotations,
    /// Control flag per retained enhancer row
    controls: Vec<bool>,
    dna_depth: Option<Array1<f64>>,
    rna_depth: Option<Array1<f64>>,
}

impl MpraObject {
    pub fn new(
        dna: CountMatrix,
        rna: CountMatrix,
        dna_annotations: ColumnAnnotations,
        rna_annotations: ColumnAnnotations,
    ) -> Result<Self> {
        if dna.n_columns() != rna.n_columns() {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} RNA columns to match DNA", dna.n_columns()),
                got: format!("{} RNA columns", rna.n_columns()),
            });
        }
        if dna_annotations.n_columns() != dna.n_columns() {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} DNA annotation rows", dna.n_columns()),
                got: format!("{} DNA annotation rows", dna_annotations.n_columns()),
            });
        }
        if rna_annotations.n_columns() != rna.n_columns() {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} RNA annotation rows", rna.n_columns()),
                got: format!("{} RNA annotation rows", rna_annotations.n_columns()),
            });
        }
        if dna.row_ids() != rna.row_ids() {
            return Err(MpraError::InvalidCounts {
                reason: "DNA and RNA matrices must carry the same enhancer ids in the same order"
                    .to_string(),
            });
        }

        // Drop enhancers with no signal in either assay
        let keep: Vec<usize> = (0..dna.n_rows())
            .filter(|&i| {
                dna.row(i).iter().any(|&x| x > 0.0) || rna.row(i).iter().any(|&x| x > 0.0)
            })
            .collect();

        if keep.is_empty() {
            return Err(MpraError::EmptyData {
                reason: "all enhancers have zero counts in both matrices".to_string(),
            });
        }

        let (dna, rna) = if keep.len() < dna.n_rows() {
            let dropped: Vec<&str> = (0..dna.n_rows())
                .filter(|i| !keep.contains(i))
                .map(|i| dna.row_ids()[i].as_str())
                .collect();
            log::warn!(
                "dropping {} enhancer(s) with all-zero counts in both matrices: {}",
                dropped.len(),
                dropped.join(", ")
            );
            (dna.select_rows(&keep)?, rna.select_rows(&keep)?)
        } else {
            (dna, rna)
        };

        let n_rows = dna.n_rows();
        Ok(Self {
            dna,
            rna,
            dna_annotations,
            rna_annotations,
            controls: vec![false; n_rows],
            dna_depth: None,
            rna_depth: None,
        })
    }

    /// Flag the named enhancers as negative controls. Unknown identifiers
    /// are a configuration error (a silently ignored control id would skew
    /// the null distribution).
    pub fn with_controls<S: AsRef<str>>(mut self, control_ids: &[S]) -> Result<Self> {
        let known: HashSet<&str> = self.dna.row_ids().iter().map(|s| s.as_str()).collect();
        for id in control_ids {
            if !known.contains(id.as_ref()) {
                return Err(MpraError::Config {
                    reason: format!("control id '{}' not found among enhancers", id.as_ref()),
                });
            }
        }
        let wanted: HashSet<&str> = control_ids.iter().map(|s| s.as_ref()).collect();
        for (i, id) in self.dna.row_ids().iter().enumerate() {
            self.controls[i] = wanted.contains(id.as_str());
        }
        Ok(self)
    }

    pub fn dna(&self) -> &CountMatrix {
        &self.dna
    }

    pub fn rna(&self) -> &CountMatrix {
        &self.rna
    }

    pub fn dna_annotations(&self) -> &ColumnAnnotations {
        &self.dna_annotations
    }

    pub fn rna_annotations(&self) -> &ColumnAnnotations {
        &self.rna_annotations
    }

    pub fn enhancer_ids(&self) -> &[String] {
        self.dna.row_ids()
    }

    pub fn n_enhancers(&self) -> usize {
        self.dna.n_rows()
    }

    pub fn n_columns(&self) -> usize {
        self.dna.n_columns()
    }

    /// Control flag per retained enhancer
    pub fn control_flags(&self) -> &[bool] {
        &self.controls
    }

    /// Indices of enhancers flagged as controls
    pub fn control_indices(&self) -> Vec<usize> {
        self.controls
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn n_controls(&self) -> usize {
        self.controls.iter().filter(|&&c| c).count()
    }

    pub fn dna_depth_factors(&self) -> Option<&Array1<f64>> {
        self.dna_depth.as_ref()
    }

    pub fn rna_depth_factors(&self) -> Option<&Array1<f64>> {
        self.rna_depth.as_ref()
    }

    pub fn has_depth_factors(&self) -> bool {
        self.dna_depth.is_some() && self.rna_depth.is_some()
    }

    /// Set depth factors directly, e.g. from an external normalization.
    /// Factors must be strictly positive, one per column of the target matrix.
    pub fn set_depth_factors(&mut self, target: DepthTarget, factors: Array1<f64>) -> Result<()> {
        let expected = self.n_columns();
        if factors.len() != expected {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} depth factors", expected),
                got: format!("{} depth factors", factors.len()),
            });
        }
        if factors.iter().any(|&f| f <= 0.0 || !f.is_finite()) {
            return Err(MpraError::Config {
                reason: "depth factors must be strictly positive and finite".to_string(),
            });
        }
        match target {
            DepthTarget::Dna => self.dna_depth = Some(factors),
            DepthTarget::Rna => self.rna_depth = Some(factors),
            DepthTarget::Both => {
                self.dna_depth = Some(factors.clone());
                self.rna_depth = Some(factors);
            }
        }
        Ok(())
    }
}
