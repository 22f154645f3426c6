//! CSV readers for count matrices and annotation tables

use ndarray::Array2;
use std::path::Path;

use crate::data::{ColumnAnnotations, CountMatrix};
use crate::error::{MpraError, Result};

/// Read a count matrix from CSV: first column enhancer ids, header row
/// observation ids, cells non-negative counts.
pub fn read_count_matrix<P: AsRef<Path>>(path: P) -> Result<CountMatrix> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(MpraError::EmptyData {
            reason: "count matrix needs an id column and at least one observation column"
                .to_string(),
        });
    }
    let column_ids: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut row_ids = Vec::new();
    let mut values: Vec<f64> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id = record.get(0).unwrap_or("").to_string();
        if record.len() != column_ids.len() + 1 {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} fields in row '{}'", column_ids.len() + 1, id),
                got: format!("{} fields", record.len()),
            });
        }
        for field in record.iter().skip(1) {
            let value: f64 = field.trim().parse().map_err(|_| MpraError::InvalidCounts {
                reason: format!("non-numeric count '{}' in row '{}'", field, id),
            })?;
            values.push(value);
        }
        row_ids.push(id);
    }

    if row_ids.is_empty() {
        return Err(MpraError::EmptyData {
            reason: "count matrix has no data rows".to_string(),
        });
    }

    let counts = Array2::from_shape_vec((row_ids.len(), column_ids.len()), values)
        .map_err(|e| MpraError::InvalidCounts {
            reason: format!("malformed count matrix: {}", e),
        })?;
    CountMatrix::new(counts, row_ids, column_ids)
}

/// Read an annotation table from CSV: first column observation ids, every
/// remaining column a categorical factor.
pub fn read_annotations<P: AsRef<Path>>(path: P) -> Result<ColumnAnnotations> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let headers = reader.headers()?.clone();
    let factor_names: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut column_ids = Vec::new();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); factor_names.len()];
    for record in reader.records() {
        let record = record?;
        column_ids.push(record.get(0).unwrap_or("").to_string());
        for (j, field) in record.iter().skip(1).enumerate() {
            if j < columns.len() {
                columns[j].push(field.trim().to_string());
            }
        }
    }

    let mut annotations = ColumnAnnotations::new(column_ids);
    for (name, values) in factor_names.iter().zip(columns) {
        annotations.add_factor(name, values)?;
    }
    Ok(annotations)
}

/// Read control enhancer ids, one per line (a header line named `id` or
/// `enhancer` is skipped).
pub fn read_control_ids<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && *l != "id" && *l != "enhancer")
        .map(String::from)
        .collect())
}
