//! P-value adjustment for multiple testing
//!
//! Benjamini-Hochberg is the default throughout; Bonferroni is provided for
//! callers that need family-wise control. NaN p-values (rows excluded from
//! testing) stay NaN and do not count toward the number of tests.

/// Benjamini-Hochberg FDR correction.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    if n == 0 {
        return vec![];
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| {
        let pa = pvalues[a];
        let pb = pvalues[b];
        if pa.is_nan() && pb.is_nan() {
            std::cmp::Ordering::Equal
        } else if pa.is_nan() {
            std::cmp::Ordering::Greater
        } else if pb.is_nan() {
            std::cmp::Ordering::Less
        } else {
            pa.partial_cmp(&pb).unwrap()
        }
    });

    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let mut padj = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;
    let mut rank = m;

    for &i in indices.iter().rev() {
        let p = pvalues[i];
        if p.is_finite() {
            let adj = (p * m as f64 / rank as f64).min(1.0);
            cummin = cummin.min(adj);
            padj[i] = cummin;
            rank -= 1;
        }
    }

    padj
}

/// Bonferroni family-wise error rate correction.
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = pvalues.iter().filter(|p| p.is_finite()).count();
    if m == 0 {
        return vec![f64::NAN; pvalues.len()];
    }
    pvalues
        .iter()
        .map(|&p| if p.is_nan() { f64::NAN } else { (p * m as f64).min(1.0) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bh_monotone_and_bounded() {
        let pvalues = vec![0.01, 0.04, 0.03, 0.02];
        let padj = benjamini_hochberg(&pvalues);

        for (p, adj) in pvalues.iter().zip(padj.iter()) {
            assert!(*adj >= *p);
            assert!(*adj <= 1.0);
        }
    }

    #[test]
    fn test_bh_preserves_ordering() {
        let pvalues = vec![0.001, 0.01, 0.05, 0.1];
        let padj = benjamini_hochberg(&pvalues);
        for w in padj.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }

    #[test]
    fn test_bh_skips_nan() {
        let pvalues = vec![0.01, f64::NAN, 0.03];
        let padj = benjamini_hochberg(&pvalues);
        assert!(padj[0].is_finite());
        assert!(padj[1].is_nan());
        assert!(padj[2].is_finite());
        // two finite tests, not three
        assert!((padj[2] - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_bonferroni() {
        let padj = bonferroni(&[0.01, 0.2, 0.6]);
        assert!((padj[0] - 0.03).abs() < 1e-12);
        assert!((padj[2] - 1.0).abs() < 1e-12);
    }
}
