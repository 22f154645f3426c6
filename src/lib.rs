//! rust_mpranalyze: massively parallel reporter assay analysis in Rust
//!
//! This crate models paired DNA/RNA count matrices from an MPRA experiment
//! with nested generalized linear models: a DNA model estimates plasmid copy
//! number per enhancer, and an RNA model, offset by the fitted copy estimate,
//! measures the transcription rate. Activity is tested either empirically
//! against negative controls or by a likelihood-ratio test between nested
//! RNA models.
//!
//! # Example
//!
//! ```ignore
//! use rust_mpranalyze::prelude::*;
//!
//! // Build the container from paired count matrices and annotations
//! let mut obj = MpraObject::new(dna, rna, dna_annotations, rna_annotations)?
//!     .with_controls(&control_ids)?;
//!
//! // Normalize sequencing depth per library
//! estimate_depth_factors(&mut obj, &["batch", "condition"],
//!     DepthTarget::Both, DepthMethod::UpperQuartile)?;
//!
//! // Fit the nested models and extract per-condition activity
//! let fit = analyze_quantification(&obj,
//!     &"~ barcode + batch + condition".parse()?,
//!     &"~ condition".parse()?)?;
//! let alpha = get_alpha(&fit, Some("condition"))?;
//!
//! // Test one condition's activity against the control null
//! let results = test_empirical(&obj, &alpha.column("stim").unwrap())?;
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod glm;
pub mod io;
pub mod normalization;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{ColumnAnnotations, CountMatrix, DepthTarget, MpraObject};
    pub use crate::error::{MpraError, Result};
    pub use crate::glm::{
        analyze_comparative, analyze_quantification, ComparativeResult, FitStatus, Formula,
        QuantificationResult,
    };
    pub use crate::io::{
        read_annotations, read_control_ids, read_count_matrix, write_alpha_table,
        write_depth_factors, write_empirical_results, write_json, write_lrt_results,
    };
    pub use crate::normalization::{estimate_depth_factors, DepthMethod};
    pub use crate::testing::{
        benjamini_hochberg, get_alpha, test_empirical, test_lrt, AlphaTable, EmpiricalResults,
        LrtResults,
    };
}

use prelude::*;

/// Run the quantification pipeline: depth factor estimation (skipped when
/// factors are already set), nested model fitting, and alpha extraction.
pub fn run_quantification(
    obj: &mut MpraObject,
    lib_factors: &[&str],
    dna_design: &Formula,
    rna_design: &Formula,
    by_factor: Option<&str>,
) -> Result<(QuantificationResult, AlphaTable)> {
    if !obj.has_depth_factors() {
        estimate_depth_factors(obj, lib_factors, DepthTarget::Both, DepthMethod::UpperQuartile)?;
    }
    let fit = analyze_quantification(obj, dna_design, rna_design)?;
    let alpha = get_alpha(&fit, by_factor)?;
    Ok((fit, alpha))
}

/// Run the comparative pipeline: depth factor estimation (skipped when
/// factors are already set), full/reduced model fitting, and the
/// likelihood-ratio test.
pub fn run_comparative(
    obj: &mut MpraObject,
    lib_factors: &[&str],
    dna_design: &Formula,
    rna_design: &Formula,
    reduced_design: &Formula,
) -> Result<LrtResults> {
    if !obj.has_depth_factors() {
        estimate_depth_factors(obj, lib_factors, DepthTarget::Both, DepthMethod::UpperQuartile)?;
    }
    let fit = analyze_comparative(obj, dna_design, rna_design, reduced_design)?;
    test_lrt(&fit)
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use ndarray::Array2;

    /// Deterministic multiplicative jitter in [0.8, 1.2), keyed on (row, col).
    fn jittered(mean: f64, row: usize, col: usize) -> f64 {
        let seed = (row as u64 * 1009 + col as u64 + 1)
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let u = ((seed >> 33) as f64) / (u32::MAX as f64 + 1.0);
        (mean * (0.8 + 0.4 * u)).round().max(0.0)
    }

    /// 110 enhancers x 40 observations: barcode(10) x batch(2) x condition(2),
    /// 10 negative controls, the last enhancer silent in both assays.
    fn simulated_object() -> MpraObject {
        let n_enhancers = 110;
        let n_cols = 40;

        let enhancer_ids: Vec<String> = (0..n_enhancers).map(|e| format!("enh{:03}", e)).collect();
        let column_ids: Vec<String> = (0..n_cols).map(|j| format!("obs{:02}", j)).collect();

        let barcode = |j: usize| j % 10;
        let batch = |j: usize| (j / 10) % 2;
        let condition = |j: usize| j / 20;

        let mut dna = Array2::zeros((n_enhancers, n_cols));
        let mut rna = Array2::zeros((n_enhancers, n_cols));
        for e in 0..n_enhancers {
            if e == n_enhancers - 1 {
                continue; // stays all-zero, dropped at construction
            }
            // active candidates respond to the condition, controls do not
            let is_control = e < 10;
            let base_rate = 1.0 + (e % 5) as f64 * 0.3;
            let fold = if !is_control && e % 3 == 0 { 2.5 } else { 1.0 };

            for j in 0..n_cols {
                let copy = 80.0
                    * (0.8 + 0.04 * barcode(j) as f64)
                    * if batch(j) == 0 { 1.0 } else { 1.3 };
                dna[[e, j]] = jittered(copy, e, j);

                let rate = if condition(j) == 0 { base_rate } else { base_rate * fold };
                rna[[e, j]] = jittered(copy * rate, e + 500, j);
            }
        }

        let dna = CountMatrix::new(dna, enhancer_ids.clone(), column_ids.clone()).unwrap();
        let rna = CountMatrix::new(rna, enhancer_ids.clone(), column_ids.clone()).unwrap();

        let mut ann = ColumnAnnotations::new(column_ids);
        ann.add_factor(
            "barcode",
            (0..n_cols).map(|j| format!("bc{:02}", barcode(j))).collect(),
        )
        .unwrap();
        ann.add_factor(
            "batch",
            (0..n_cols).map(|j| format!("b{}", batch(j) + 1)).collect(),
        )
        .unwrap();
        ann.add_factor(
            "condition",
            (0..n_cols)
                .map(|j| if condition(j) == 0 { "a".to_string() } else { "b".to_string() })
                .collect(),
        )
        .unwrap();

        let controls: Vec<String> = enhancer_ids[..10].to_vec();
        MpraObject::new(dna, rna, ann.clone(), ann)
            .unwrap()
            .with_controls(&controls)
            .unwrap()
    }

    #[test]
    fn test_quantification_pipeline_end_to_end() {
        let mut obj = simulated_object();
        assert_eq!(obj.n_enhancers(), 109, "the silent enhancer is dropped");

        let (_fit, alpha) = crate::run_quantification(
            &mut obj,
            &["batch", "condition"],
            &"~ barcode + batch + condition".parse().unwrap(),
            &"~ condition".parse().unwrap(),
            Some("condition"),
        )
        .unwrap();
        assert_eq!(alpha.n_enhancers(), 109);
        assert_eq!(alpha.n_levels(), 2);
        assert_eq!(alpha.level_names, vec!["a", "b"]);

        // count-scale estimates are non-negative wherever the fit converged
        for &v in alpha.values.iter() {
            assert!(v.is_nan() || v >= 0.0);
        }

        let statistic = alpha.column("b").unwrap();
        let results = test_empirical(&obj, &statistic).unwrap();
        assert_eq!(results.n_enhancers(), 109);

        let mut n_finite = 0;
        for i in 0..109 {
            for p in [
                results.pval_empirical[i],
                results.pval_zscore[i],
                results.pval_mad[i],
            ] {
                if p.is_finite() {
                    assert!((0.0..=1.0).contains(&p));
                    n_finite += 1;
                }
            }
        }
        assert!(n_finite > 250, "most rows should be tested, got {}", n_finite);

        // a strongly responding candidate should beat the control null
        let active = results.pvalues("enh012").unwrap();
        assert!(active.0 < 0.1, "empirical p for an active enhancer: {}", active.0);
    }

    #[test]
    fn test_comparative_pipeline_end_to_end() {
        let mut obj = simulated_object();
        estimate_depth_factors(
            &mut obj,
            &["batch", "condition"],
            DepthTarget::Both,
            DepthMethod::TotalSum,
        )
        .unwrap();

        let fit = analyze_comparative(
            &obj,
            &"~ barcode + batch + condition".parse().unwrap(),
            &"~ condition".parse().unwrap(),
            &"~ 1".parse().unwrap(),
        )
        .unwrap();

        let lrt = test_lrt(&fit).unwrap();
        assert_eq!(lrt.n_enhancers(), 109);
        assert_eq!(lrt.df, 1.0);

        // two-condition comparison carries a fold-change column
        let log_fc = lrt.log_fc.as_ref().expect("two-condition comparison");
        assert_eq!(log_fc.len(), 109);

        for i in 0..109 {
            if lrt.stat[i].is_finite() {
                assert!(lrt.stat[i] >= 0.0);
                assert!((0.0..=1.0).contains(&lrt.pvalue[i]));
            }
        }

        // a 2.5x responder: clearly significant, fold change near ln(2.5)
        let (stat, p, _) = lrt.row("enh012").unwrap();
        assert!(stat > 4.0, "LRT stat for a responder: {}", stat);
        assert!(p < 0.05);
        let idx = lrt.enhancer_ids.iter().position(|id| id == "enh012").unwrap();
        assert!(
            (log_fc[idx] - 2.5f64.ln()).abs() < 0.4,
            "log fold change near ln(2.5), got {}",
            log_fc[idx]
        );

        // a flat candidate shows no effect
        let idx_flat = lrt.enhancer_ids.iter().position(|id| id == "enh013").unwrap();
        assert!(log_fc[idx_flat].abs() < 0.4);
    }
}
