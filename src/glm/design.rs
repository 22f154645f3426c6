//! Design matrix construction from annotations and a formula

use ndarray::Array2;
use std::collections::HashMap;

use super::formula::Formula;
use crate::data::ColumnAnnotations;
use crate::error::{MpraError, Result};

/// Metadata about a built design matrix
#[derive(Debug, Clone)]
pub struct DesignInfo {
    /// The formula the matrix was built from
    pub formula: Formula,
    /// Names of the coefficients, in column order
    pub coef_names: Vec<String>,
    /// Factor name -> design matrix column indices of its contrasts
    pub factor_columns: HashMap<String, Vec<usize>>,
    /// Factor name -> reference level (coded as zero)
    pub reference_levels: HashMap<String, String>,
    /// Factor name -> all levels, sorted
    pub factor_levels: HashMap<String, Vec<String>>,
}

impl DesignInfo {
    pub fn n_coefficients(&self) -> usize {
        self.coef_names.len()
    }

    pub fn has_factor(&self, name: &str) -> bool {
        self.factor_columns.contains_key(name)
    }
}

/// Build a treatment-coded design matrix for the formula.
///
/// Column 0 is the intercept. Each factor contributes one indicator column
/// per non-reference level, in formula order; the reference level is the
/// alphabetically first level. Fails fast with a configuration error on
/// unresolved factor names and validates full column rank.
pub fn build_design_matrix(
    annotations: &ColumnAnnotations,
    formula: &Formula,
) -> Result<(Array2<f64>, DesignInfo)> {
    let n_obs = annotations.n_columns();
    if n_obs == 0 {
        return Err(MpraError::EmptyData {
            reason: "annotation table has no observation columns".to_string(),
        });
    }

    let mut coef_names = vec!["Intercept".to_string()];
    let mut factor_columns: HashMap<String, Vec<usize>> = HashMap::new();
    let mut reference_levels: HashMap<String, String> = HashMap::new();
    let mut factor_levels: HashMap<String, Vec<String>> = HashMap::new();

    // Resolve every term before touching the matrix
    for term in formula.term_names() {
        let levels = annotations.levels(term).map_err(|_| MpraError::Config {
            reason: format!(
                "design formula '{}' references factor '{}' which is absent from the annotations",
                formula, term
            ),
        })?;
        let reference = levels[0].clone();

        let mut cols = Vec::new();
        for level in levels.iter().skip(1) {
            coef_names.push(format!("{}_{}_vs_{}", term, level, reference));
            cols.push(coef_names.len() - 1);
        }
        factor_columns.insert(term.clone(), cols);
        reference_levels.insert(term.clone(), reference);
        factor_levels.insert(term.clone(), levels);
    }

    let n_coefs = coef_names.len();
    let mut design = Array2::zeros((n_obs, n_coefs));

    for i in 0..n_obs {
        design[[i, 0]] = 1.0;
        for term in formula.term_names() {
            let value = annotations.value(term, i)?;
            let levels = &factor_levels[term];
            let cols = &factor_columns[term];
            for (level, &col) in levels.iter().skip(1).zip(cols.iter()) {
                if value == level {
                    design[[i, col]] = 1.0;
                }
            }
        }
    }

    check_full_rank(&design)?;

    let info = DesignInfo {
        formula: formula.clone(),
        coef_names,
        factor_columns,
        reference_levels,
        factor_levels,
    };
    Ok((design, info))
}

/// Validate that a design matrix has full column rank.
///
/// Rank is computed with Householder QR with column pivoting; diagonal
/// entries of R below `max(nrow, ncol) * eps * max|diag(R)|` do not count
/// toward the rank. The error message distinguishes all-zero columns
/// (a factor level with no observations) from linear combinations.
pub fn check_full_rank(matrix: &Array2<f64>) -> Result<()> {
    let (nrow, ncol) = matrix.dim();
    if nrow == 0 || ncol == 0 {
        return Err(MpraError::InvalidDesignMatrix {
            reason: "design matrix has zero rows or columns".to_string(),
        });
    }

    if qr_rank(matrix) < ncol {
        let has_zero_column =
            (0..ncol).any(|j| matrix.column(j).iter().all(|&v| v == 0.0));
        let reason = if has_zero_column {
            "the design matrix is not full rank: a factor level has no observations, \
             producing a column of zeros"
        } else {
            "the design matrix is not full rank: one or more factors are linear \
             combinations of the others and must be removed"
        };
        return Err(MpraError::InvalidDesignMatrix {
            reason: reason.to_string(),
        });
    }
    Ok(())
}

/// Numerical rank via Householder QR with column pivoting.
fn qr_rank(matrix: &Array2<f64>) -> usize {
    let (nrow, ncol) = matrix.dim();
    let k = nrow.min(ncol);
    let mut r = matrix.to_owned();

    let mut col_norms_sq: Vec<f64> = (0..ncol)
        .map(|j| r.column(j).iter().map(|&v| v * v).sum())
        .collect();

    for step in 0..k {
        // Pivot: bring the column with the largest remaining norm forward
        let best = (step..ncol)
            .max_by(|&a, &b| col_norms_sq[a].partial_cmp(&col_norms_sq[b]).unwrap())
            .unwrap();
        if best != step {
            for i in 0..nrow {
                r.swap([i, step], [i, best]);
            }
            col_norms_sq.swap(step, best);
        }

        let mut alpha: f64 = (step..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>().sqrt();
        if alpha < f64::EPSILON * 1e3 {
            break; // remaining columns are effectively zero
        }
        if r[[step, step]] > 0.0 {
            alpha = -alpha;
        }

        let v0 = r[[step, step]] - alpha;
        r[[step, step]] = alpha;

        let v_norm_sq: f64 =
            v0 * v0 + (step + 1..nrow).map(|i| r[[i, step]] * r[[i, step]]).sum::<f64>();
        if v_norm_sq < f64::MIN_POSITIVE {
            continue;
        }
        let tau = 2.0 / v_norm_sq;

        for j in (step + 1)..ncol {
            let mut dot = v0 * r[[step, j]];
            for i in (step + 1)..nrow {
                dot += r[[i, step]] * r[[i, j]];
            }
            let scale = tau * dot;
            r[[step, j]] -= scale * v0;
            for i in (step + 1)..nrow {
                r[[i, j]] -= scale * r[[i, step]];
            }
            col_norms_sq[j] = (col_norms_sq[j] - r[[step, j]] * r[[step, j]]).max(0.0);
        }
    }

    let max_abs_diag = (0..k).map(|i| r[[i, i]].abs()).fold(0.0f64, f64::max);
    let tol = nrow.max(ncol) as f64 * f64::EPSILON * max_abs_diag;
    (0..k).filter(|&i| r[[i, i]].abs() > tol).count()
}
