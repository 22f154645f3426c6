//! Transcription-rate ("alpha") extraction from fitted RNA models

use ndarray::Array2;
use serde::Serialize;

use crate::error::{MpraError, Result};
use crate::glm::QuantificationResult;

/// Per-enhancer transcription-rate estimates on the count scale, one column
/// per requested factor level (or a single `alpha` column).
#[derive(Debug, Clone, Serialize)]
pub struct AlphaTable {
    pub enhancer_ids: Vec<String>,
    /// Column labels: factor levels, or `["alpha"]`
    pub level_names: Vec<String>,
    /// enhancers x levels
    pub values: Array2<f64>,
}

impl AlphaTable {
    pub fn n_enhancers(&self) -> usize {
        self.enhancer_ids.len()
    }

    pub fn n_levels(&self) -> usize {
        self.level_names.len()
    }

    /// One column of the table, by level name
    pub fn column(&self, level: &str) -> Option<Vec<f64>> {
        self.level_names
            .iter()
            .position(|l| l == level)
            .map(|j| self.values.column(j).to_vec())
    }

    /// One row of the table, by enhancer id
    pub fn row(&self, enhancer_id: &str) -> Option<Vec<f64>> {
        self.enhancer_ids
            .iter()
            .position(|id| id == enhancer_id)
            .map(|i| self.values.row(i).to_vec())
    }
}

/// Extract transcription-rate estimates from the fitted RNA models,
/// back-transformed out of the log link.
///
/// With `by_factor = Some(name)` the table has one column per level of that
/// factor: `exp(intercept)` for the reference level and
/// `exp(intercept + coefficient)` for the others. The factor must be part of
/// the RNA design. With `None`, a single column holds `exp(intercept)`.
///
/// Rows whose fit did not converge get NaN estimates; they stay out of the
/// control null and the FDR pool downstream.
pub fn get_alpha(result: &QuantificationResult, by_factor: Option<&str>) -> Result<AlphaTable> {
    let n = result.n_enhancers();
    let info = &result.rna_design;

    let (level_names, coef_offsets): (Vec<String>, Vec<Option<usize>>) = match by_factor {
        None => (vec!["alpha".to_string()], vec![None]),
        Some(factor) => {
            if !info.has_factor(factor) {
                return Err(MpraError::Config {
                    reason: format!(
                        "factor '{}' is not part of the RNA design '{}'",
                        factor, info.formula
                    ),
                });
            }
            let levels = info.factor_levels[factor].clone();
            let cols = &info.factor_columns[factor];
            // reference level first (intercept only), then one contrast each
            let offsets: Vec<Option<usize>> = std::iter::once(None)
                .chain(cols.iter().map(|&c| Some(c)))
                .collect();
            (levels, offsets)
        }
    };

    let mut values = Array2::from_elem((n, level_names.len()), f64::NAN);
    for (i, fit) in result.fits.iter().enumerate() {
        if !fit.is_usable() {
            continue;
        }
        let coefs = &fit.rna.coefficients;
        for (j, offset) in coef_offsets.iter().enumerate() {
            let log_alpha = match offset {
                None => coefs[0],
                Some(c) => coefs[0] + coefs[*c],
            };
            values[[i, j]] = log_alpha.exp();
        }
    }

    Ok(AlphaTable {
        enhancer_ids: result.enhancer_ids.clone(),
        level_names,
        values,
    })
}
