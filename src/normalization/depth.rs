//! Depth factor estimation, grouped by library identity
//!
//! Observation columns are grouped into libraries by the distinct
//! combinations of the named annotation factors. Each library receives one
//! scalar depth factor, shared by all of its columns, and the factor set is
//! rescaled so its geometric mean is 1.

use ndarray::{Array1, ArrayView2};

use crate::data::{ColumnAnnotations, DepthTarget, MpraObject};
use crate::error::{MpraError, Result};
use crate::stats::{geometric_mean, median, quantile};

/// Method for computing a library's depth factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMethod {
    /// 75th percentile of the non-zero counts in the library
    UpperQuartile,
    /// Mean total count per column in the library
    TotalSum,
    /// Median of ratios against a pseudo-reference profile built from all
    /// libraries (DESeq-style)
    SizeFactor,
}

impl std::str::FromStr for DepthMethod {
    type Err = MpraError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "uq" | "upper-quartile" => Ok(DepthMethod::UpperQuartile),
            "totalsum" | "total-sum" => Ok(DepthMethod::TotalSum),
            "rle" | "size-factor" => Ok(DepthMethod::SizeFactor),
            other => Err(MpraError::Config {
                reason: format!(
                    "unknown depth method '{}' (expected upper-quartile, total-sum or size-factor)",
                    other
                ),
            }),
        }
    }
}

/// Column grouping by library identity: distinct combinations of the values
/// of the named factors.
struct LibraryGrouping {
    /// Group index per column
    assignment: Vec<usize>,
    /// Human-readable key per group, e.g. "batch=1:condition=stim"
    keys: Vec<String>,
}

fn group_columns(annotations: &ColumnAnnotations, factors: &[&str]) -> Result<LibraryGrouping> {
    if factors.is_empty() {
        return Err(MpraError::Config {
            reason: "at least one library factor is required for depth estimation".to_string(),
        });
    }
    for &f in factors {
        if !annotations.has_factor(f) {
            return Err(MpraError::Config {
                reason: format!("library factor '{}' not found in annotations", f),
            });
        }
    }

    let n = annotations.n_columns();
    let mut assignment = Vec::with_capacity(n);
    let mut keys: Vec<String> = Vec::new();

    for col in 0..n {
        let key = factors
            .iter()
            .map(|&f| Ok(format!("{}={}", f, annotations.value(f, col)?)))
            .collect::<Result<Vec<String>>>()?
            .join(":");
        let group = match keys.iter().position(|k| *k == key) {
            Some(g) => g,
            None => {
                keys.push(key);
                keys.len() - 1
            }
        };
        assignment.push(group);
    }

    Ok(LibraryGrouping { assignment, keys })
}

/// Estimate depth factors for the requested target matrix and store them on
/// the container.
///
/// With `DepthTarget::Both`, the grouping is read from the DNA annotations
/// and the identical factor vector is applied to both matrices (the
/// container guarantees positional column alignment).
pub fn estimate_depth_factors(
    obj: &mut MpraObject,
    lib_factors: &[&str],
    target: DepthTarget,
    method: DepthMethod,
) -> Result<()> {
    match target {
        DepthTarget::Dna => {
            let grouping = group_columns(obj.dna_annotations(), lib_factors)?;
            let factors = library_factors(obj.dna().counts(), &grouping, method)?;
            obj.set_depth_factors(DepthTarget::Dna, factors)
        }
        DepthTarget::Rna => {
            let grouping = group_columns(obj.rna_annotations(), lib_factors)?;
            let factors = library_factors(obj.rna().counts(), &grouping, method)?;
            obj.set_depth_factors(DepthTarget::Rna, factors)
        }
        DepthTarget::Both => {
            let grouping = group_columns(obj.dna_annotations(), lib_factors)?;
            let factors = library_factors(obj.dna().counts(), &grouping, method)?;
            obj.set_depth_factors(DepthTarget::Both, factors)
        }
    }
}

/// Compute per-column depth factors from the grouping: one scalar per
/// library, broadcast to its columns, geometric-mean centered.
fn library_factors(
    counts: ArrayView2<'_, f64>,
    grouping: &LibraryGrouping,
    method: DepthMethod,
) -> Result<Array1<f64>> {
    let n_groups = grouping.keys.len();
    let columns_of: Vec<Vec<usize>> = (0..n_groups)
        .map(|g| {
            grouping
                .assignment
                .iter()
                .enumerate()
                .filter(|(_, &a)| a == g)
                .map(|(c, _)| c)
                .collect()
        })
        .collect();

    // Every library must carry signal; a zero-count group has no defined depth
    for (g, cols) in columns_of.iter().enumerate() {
        let total: f64 = cols.iter().map(|&c| counts.column(c).sum()).sum();
        if total <= 0.0 {
            return Err(MpraError::DegenerateLibrary {
                library: grouping.keys[g].clone(),
            });
        }
    }

    let raw: Vec<f64> = match method {
        DepthMethod::TotalSum => columns_of
            .iter()
            .map(|cols| {
                let total: f64 = cols.iter().map(|&c| counts.column(c).sum()).sum();
                total / cols.len() as f64
            })
            .collect(),
        DepthMethod::UpperQuartile => columns_of
            .iter()
            .enumerate()
            .map(|(g, cols)| {
                let nonzero: Vec<f64> = cols
                    .iter()
                    .flat_map(|&c| counts.column(c).to_vec())
                    .filter(|&x| x > 0.0)
                    .collect();
                if nonzero.is_empty() {
                    return Err(MpraError::DegenerateLibrary {
                        library: grouping.keys[g].clone(),
                    });
                }
                Ok(quantile(&nonzero, 0.75))
            })
            .collect::<Result<Vec<f64>>>()?,
        DepthMethod::SizeFactor => size_factor_ratios(counts, grouping, &columns_of)?,
    };

    for (g, &r) in raw.iter().enumerate() {
        if r <= 0.0 || !r.is_finite() {
            return Err(MpraError::DegenerateLibrary {
                library: grouping.keys[g].clone(),
            });
        }
    }

    // Center so the geometric mean of the library factors is 1
    let center = geometric_mean(&raw);
    let factors: Vec<f64> = grouping
        .assignment
        .iter()
        .map(|&g| raw[g] / center)
        .collect();

    Ok(Array1::from_vec(factors))
}

/// Median-of-ratios against a pseudo-reference: each library is summarized
/// by its mean per-enhancer profile, the reference is the row-wise geometric
/// mean across libraries, and the library factor is the median ratio over
/// enhancers positive in every library.
fn size_factor_ratios(
    counts: ArrayView2<'_, f64>,
    grouping: &LibraryGrouping,
    columns_of: &[Vec<usize>],
) -> Result<Vec<f64>> {
    let n_rows = counts.nrows();
    let n_groups = columns_of.len();

    // Mean profile per library (rows x groups)
    let mut profiles = vec![vec![0.0; n_groups]; n_rows];
    for (g, cols) in columns_of.iter().enumerate() {
        for i in 0..n_rows {
            let sum: f64 = cols.iter().map(|&c| counts[[i, c]]).sum();
            profiles[i][g] = sum / cols.len() as f64;
        }
    }

    // Pseudo-reference: geometric mean over libraries, rows positive everywhere
    let mut reference = Vec::with_capacity(n_rows);
    for profile in &profiles {
        if profile.iter().all(|&x| x > 0.0) {
            reference.push(Some(geometric_mean(profile)));
        } else {
            reference.push(None);
        }
    }

    let mut factors = Vec::with_capacity(n_groups);
    for (g, _) in columns_of.iter().enumerate() {
        let ratios: Vec<f64> = profiles
            .iter()
            .zip(reference.iter())
            .filter_map(|(profile, reference)| reference.map(|r| profile[g] / r))
            .collect();
        if ratios.is_empty() {
            return Err(MpraError::DegenerateLibrary {
                library: grouping.keys[g].clone(),
            });
        }
        factors.push(median(&ratios));
    }
    Ok(factors)
}
