//! Result table writers

use ndarray::Array1;
use serde::Serialize;
use std::path::Path;

use crate::error::Result;
use crate::testing::{AlphaTable, EmpiricalResults, LrtResults};

/// Serialize any result table to pretty-printed JSON.
pub fn write_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}

fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6e}", v)
    }
}

/// Write an alpha table: one row per enhancer, one column per level.
pub fn write_alpha_table<P: AsRef<Path>>(table: &AlphaTable, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    let mut header = vec!["id".to_string()];
    header.extend(table.level_names.iter().cloned());
    writer.write_record(&header)?;

    for (i, id) in table.enhancer_ids.iter().enumerate() {
        let mut record = vec![id.clone()];
        for j in 0..table.n_levels() {
            record.push(format_value(table.values[[i, j]]));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write empirical test results: statistic, the three p-value families, and
/// their q-values.
pub fn write_empirical_results<P: AsRef<Path>>(
    results: &EmpiricalResults,
    path: P,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        "id",
        "statistic",
        "pval_empirical",
        "pval_zscore",
        "pval_mad",
        "fdr_empirical",
        "fdr_zscore",
        "fdr_mad",
    ])?;

    for (i, id) in results.enhancer_ids.iter().enumerate() {
        writer.write_record([
            id.clone(),
            format_value(results.statistic[i]),
            format_value(results.pval_empirical[i]),
            format_value(results.pval_zscore[i]),
            format_value(results.pval_mad[i]),
            format_value(results.fdr_empirical[i]),
            format_value(results.fdr_zscore[i]),
            format_value(results.fdr_mad[i]),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write LRT results; the `log_fc` column is present only for
/// two-condition comparisons.
pub fn write_lrt_results<P: AsRef<Path>>(results: &LrtResults, path: P) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;

    let mut header = vec!["id", "stat", "pvalue", "fdr"];
    if results.log_fc.is_some() {
        header.push("log_fc");
    }
    writer.write_record(&header)?;

    for (i, id) in results.enhancer_ids.iter().enumerate() {
        let mut record = vec![
            id.clone(),
            format_value(results.stat[i]),
            format_value(results.pvalue[i]),
            format_value(results.fdr[i]),
        ];
        if let Some(fc) = &results.log_fc {
            record.push(format_value(fc[i]));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write depth factors: one row per observation column.
pub fn write_depth_factors<P: AsRef<Path>>(
    column_ids: &[String],
    dna: &Array1<f64>,
    rna: &Array1<f64>,
    path: P,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record(["id", "dna_depth", "rna_depth"])?;
    for (i, id) in column_ids.iter().enumerate() {
        writer.write_record([id.clone(), format_value(dna[i]), format_value(rna[i])])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_write_alpha_table_roundtrips_header() {
        let table = AlphaTable {
            enhancer_ids: vec!["e1".into(), "e2".into()],
            level_names: vec!["ctrl".into(), "stim".into()],
            values: array![[1.0, 2.0], [f64::NAN, 4.0]],
        };
        let path = std::env::temp_dir().join("rust_mpranalyze_test_alpha.csv");
        write_alpha_table(&table, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "id,ctrl,stim");
        assert!(lines.next().unwrap().starts_with("e1,"));
        assert!(content.contains("NA"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_json() {
        let table = AlphaTable {
            enhancer_ids: vec!["e1".into()],
            level_names: vec!["alpha".into()],
            values: array![[2.5]],
        };
        let path = std::env::temp_dir().join("rust_mpranalyze_test_alpha.json");
        write_json(&table, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"enhancer_ids\""));
        assert!(content.contains("e1"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_lrt_results_conditional_log_fc() {
        let results = LrtResults {
            enhancer_ids: vec!["e1".into()],
            stat: vec![3.2],
            pvalue: vec![0.07],
            fdr: vec![0.07],
            log_fc: None,
            df: 2.0,
        };
        let path = std::env::temp_dir().join("rust_mpranalyze_test_lrt.csv");
        write_lrt_results(&results, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("log_fc"));
        std::fs::remove_file(path).ok();
    }
}
