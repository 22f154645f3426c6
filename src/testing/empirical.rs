//! Empirical hypothesis testing against a control-derived null
//!
//! A statistic (typically one alpha column) is compared to its distribution
//! over the negative-control enhancers. Three p-value families are computed:
//! rank-based empirical, z-score (control mean/sd), and MAD-score (control
//! median/MAD, robust to outlier controls). All are upper-tail: small
//! p-values mean the enhancer's statistic exceeds the control null.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::data::MpraObject;
use crate::error::{MpraError, Result};
use crate::stats::{mad, mean, median, sample_sd};

use super::fdr::benjamini_hochberg;

/// Per-enhancer p-values for the three families, with BH q-values each.
#[derive(Debug, Clone, Serialize)]
pub struct EmpiricalResults {
    pub enhancer_ids: Vec<String>,
    /// The tested statistic, as given
    pub statistic: Vec<f64>,
    pub pval_empirical: Vec<f64>,
    pub pval_zscore: Vec<f64>,
    pub pval_mad: Vec<f64>,
    pub fdr_empirical: Vec<f64>,
    pub fdr_zscore: Vec<f64>,
    pub fdr_mad: Vec<f64>,
    /// Number of controls that entered the null distribution
    pub n_controls: usize,
}

impl EmpiricalResults {
    pub fn n_enhancers(&self) -> usize {
        self.enhancer_ids.len()
    }

    /// All three p-value families for one enhancer:
    /// (empirical, z-score, MAD-score)
    pub fn pvalues(&self, enhancer_id: &str) -> Option<(f64, f64, f64)> {
        self.enhancer_ids
            .iter()
            .position(|id| id == enhancer_id)
            .map(|i| (self.pval_empirical[i], self.pval_zscore[i], self.pval_mad[i]))
    }
}

/// Test a per-enhancer statistic against the control null.
///
/// `statistic` must align positionally with the container's retained
/// enhancers. NaN entries (rows whose fit did not converge) are excluded
/// from the null and receive NaN p-values; q-values are BH-adjusted across
/// all finite entries, controls included.
pub fn test_empirical(obj: &MpraObject, statistic: &[f64]) -> Result<EmpiricalResults> {
    let n = obj.n_enhancers();
    if statistic.len() != n {
        return Err(MpraError::DimensionMismatch {
            expected: format!("{} statistic values", n),
            got: format!("{} statistic values", statistic.len()),
        });
    }
    if obj.n_controls() == 0 {
        return Err(MpraError::Config {
            reason: "empirical testing requires a control set on the container".to_string(),
        });
    }

    let null: Vec<f64> = obj
        .control_indices()
        .into_iter()
        .map(|i| statistic[i])
        .filter(|s| s.is_finite())
        .collect();
    if null.len() < 2 {
        return Err(MpraError::EmptyData {
            reason: format!(
                "only {} control(s) with a finite statistic; need at least 2 for a null",
                null.len()
            ),
        });
    }

    let null_mean = mean(&null);
    let null_sd = sample_sd(&null);
    let null_median = median(&null);
    let null_mad = mad(&null);

    log::debug!(
        "control null from {} controls: mean={:.4} sd={:.4} median={:.4} mad={:.4}",
        null.len(),
        null_mean,
        null_sd,
        null_median,
        null_mad
    );

    let normal = Normal::new(0.0, 1.0).expect("standard normal is well defined");
    let n_null = null.len() as f64;

    let mut pval_empirical = vec![f64::NAN; n];
    let mut pval_zscore = vec![f64::NAN; n];
    let mut pval_mad = vec![f64::NAN; n];

    for (i, &s) in statistic.iter().enumerate() {
        if !s.is_finite() {
            continue;
        }

        let exceeding = null.iter().filter(|&&c| c >= s).count() as f64;
        pval_empirical[i] = (1.0 + exceeding) / (n_null + 1.0);

        if null_sd > 0.0 {
            pval_zscore[i] = normal.sf((s - null_mean) / null_sd);
        }
        if null_mad > 0.0 {
            pval_mad[i] = normal.sf((s - null_median) / null_mad);
        }
    }

    Ok(EmpiricalResults {
        enhancer_ids: obj.enhancer_ids().to_vec(),
        statistic: statistic.to_vec(),
        fdr_empirical: benjamini_hochberg(&pval_empirical),
        fdr_zscore: benjamini_hochberg(&pval_zscore),
        fdr_mad: benjamini_hochberg(&pval_mad),
        pval_empirical,
        pval_zscore,
        pval_mad,
        n_controls: null.len(),
    })
}
