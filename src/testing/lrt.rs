//! Likelihood-ratio testing of full vs reduced RNA models
//!
//! The statistic is twice the log-likelihood difference between the nested
//! fits, referred to a chi-squared distribution with degrees of freedom equal
//! to the difference in free coefficients. For a two-condition comparison
//! (exactly one extra coefficient) the extra RNA coefficient is reported as a
//! natural-log fold change.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{MpraError, Result};
use crate::glm::ComparativeResult;

use super::fdr::benjamini_hochberg;

/// Per-enhancer likelihood-ratio test results.
#[derive(Debug, Clone, Serialize)]
pub struct LrtResults {
    pub enhancer_ids: Vec<String>,
    /// 2 * (logLik_full - logLik_reduced), floored at zero
    pub stat: Vec<f64>,
    pub pvalue: Vec<f64>,
    pub fdr: Vec<f64>,
    /// Natural-log fold change, present only for single-coefficient
    /// comparisons
    pub log_fc: Option<Vec<f64>>,
    /// Degrees of freedom of the test
    pub df: f64,
}

impl LrtResults {
    pub fn n_enhancers(&self) -> usize {
        self.enhancer_ids.len()
    }

    /// (statistic, p-value, q-value) for one enhancer
    pub fn row(&self, enhancer_id: &str) -> Option<(f64, f64, f64)> {
        self.enhancer_ids
            .iter()
            .position(|id| id == enhancer_id)
            .map(|i| (self.stat[i], self.pvalue[i], self.fdr[i]))
    }
}

/// Run the likelihood-ratio test over a comparative fit.
///
/// Rows where any stage failed to converge get NaN statistics and p-values
/// and stay out of the BH pool.
pub fn test_lrt(result: &ComparativeResult) -> Result<LrtResults> {
    let p_full = result.rna_design_full.n_coefficients();
    let p_reduced = result.rna_design_reduced.n_coefficients();
    if p_full <= p_reduced {
        return Err(MpraError::InvalidDesignMatrix {
            reason: format!(
                "full model ({} coefficients) must have more parameters than the reduced model ({})",
                p_full, p_reduced
            ),
        });
    }
    let df = (p_full - p_reduced) as f64;

    let chi2 = ChiSquared::new(df).map_err(|e| MpraError::Config {
        reason: format!("invalid degrees of freedom {}: {}", df, e),
    })?;

    // For a single extra coefficient, identify it to report a fold change
    let fc_index = if p_full - p_reduced == 1 {
        result
            .rna_design_full
            .coef_names
            .iter()
            .position(|name| !result.rna_design_reduced.coef_names.contains(name))
    } else {
        None
    };

    let n = result.n_enhancers();
    let mut stat = vec![f64::NAN; n];
    let mut pvalue = vec![f64::NAN; n];
    let mut log_fc = fc_index.map(|_| vec![f64::NAN; n]);

    for (i, fit) in result.fits.iter().enumerate() {
        if !fit.is_usable() {
            continue;
        }
        // negative values only arise from optimizer tolerance; the truth is 0
        let s = (2.0 * (fit.full.log_likelihood - fit.reduced.log_likelihood)).max(0.0);
        stat[i] = s;
        pvalue[i] = chi2.sf(s);
        if let (Some(fc), Some(idx)) = (log_fc.as_mut(), fc_index) {
            fc[i] = fit.full.coefficients[idx];
        }
    }

    let n_tested = pvalue.iter().filter(|p| p.is_finite()).count();
    log::info!(
        "LRT over {} enhancers ({} tested, df={})",
        n,
        n_tested,
        df
    );

    Ok(LrtResults {
        enhancer_ids: result.enhancer_ids.clone(),
        fdr: benjamini_hochberg(&pvalue),
        stat,
        pvalue,
        log_fc,
        df,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glm::{ComparativeFit, DesignInfo, FitStatus, Formula, GlmFit};
    use std::collections::HashMap;

    fn fit(ll: f64, coefs: Vec<f64>, status: FitStatus) -> GlmFit {
        GlmFit {
            coefficients: coefs,
            dispersion: 0.1,
            mu: vec![1.0],
            log_likelihood: ll,
            status,
        }
    }

    fn design(coef_names: Vec<&str>, formula: Formula) -> DesignInfo {
        DesignInfo {
            formula,
            coef_names: coef_names.into_iter().map(String::from).collect(),
            factor_columns: HashMap::new(),
            reference_levels: HashMap::new(),
            factor_levels: HashMap::new(),
        }
    }

    fn comparative_result() -> ComparativeResult {
        ComparativeResult {
            enhancer_ids: vec!["e1".into(), "e2".into(), "e3".into()],
            dna_design: design(vec!["Intercept"], Formula::intercept_only()),
            rna_design_full: design(
                vec!["Intercept", "condition_stim_vs_ctrl"],
                Formula::terms(["condition"]),
            ),
            rna_design_reduced: design(vec!["Intercept"], Formula::intercept_only()),
            fits: vec![
                // strong effect
                ComparativeFit {
                    dna: fit(-10.0, vec![4.0], FitStatus::Converged),
                    full: fit(-100.0, vec![1.0, 1.2], FitStatus::Converged),
                    reduced: fit(-115.0, vec![1.5], FitStatus::Converged),
                },
                // no effect
                ComparativeFit {
                    dna: fit(-10.0, vec![4.0], FitStatus::Converged),
                    full: fit(-100.0, vec![1.0, 0.01], FitStatus::Converged),
                    reduced: fit(-100.05, vec![1.0], FitStatus::Converged),
                },
                // failed row
                ComparativeFit {
                    dna: fit(-10.0, vec![4.0], FitStatus::Converged),
                    full: fit(f64::NAN, vec![f64::NAN, f64::NAN], FitStatus::Failed),
                    reduced: fit(-100.0, vec![1.0], FitStatus::Converged),
                },
            ],
        }
    }

    #[test]
    fn test_lrt_statistic_non_negative() {
        let res = test_lrt(&comparative_result()).unwrap();
        for &s in res.stat.iter().filter(|s| s.is_finite()) {
            assert!(s >= 0.0);
        }
    }

    #[test]
    fn test_lrt_pvalues_and_ordering() {
        let res = test_lrt(&comparative_result()).unwrap();
        assert_eq!(res.df, 1.0);
        // 30-point likelihood gap is overwhelming evidence
        assert!(res.pvalue[0] < 1e-6);
        // 0.1-point gap is not
        assert!(res.pvalue[1] > 0.5);
        assert!(res.pvalue[0] < res.pvalue[1]);
    }

    #[test]
    fn test_two_condition_comparison_reports_log_fc() {
        let res = test_lrt(&comparative_result()).unwrap();
        let fc = res.log_fc.as_ref().expect("df=1 comparison carries log_fc");
        assert!((fc[0] - 1.2).abs() < 1e-12);
        assert!(fc[2].is_nan());
    }

    #[test]
    fn test_failed_rows_get_nan_and_skip_fdr() {
        let res = test_lrt(&comparative_result()).unwrap();
        assert!(res.stat[2].is_nan());
        assert!(res.pvalue[2].is_nan());
        assert!(res.fdr[2].is_nan());
        assert!(res.fdr[0].is_finite());
    }

    #[test]
    fn test_multi_df_comparison_has_no_log_fc() {
        let mut result = comparative_result();
        result.rna_design_full = design(
            vec!["Intercept", "condition_b_vs_a", "condition_c_vs_a"],
            Formula::terms(["condition"]),
        );
        for fit in &mut result.fits {
            fit.full.coefficients = vec![1.0, 0.5, 0.7];
        }
        let res = test_lrt(&result).unwrap();
        assert_eq!(res.df, 2.0);
        assert!(res.log_fc.is_none());
    }

    #[test]
    fn test_degenerate_nesting_rejected() {
        let mut result = comparative_result();
        result.rna_design_reduced = result.rna_design_full.clone();
        assert!(test_lrt(&result).is_err());
    }
}
