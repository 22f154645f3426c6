//! Per-observation annotations: named categorical factors

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{MpraError, Result};

/// Annotations for the observation columns of a count matrix.
/// Each named factor assigns one categorical level to every column
/// (batch, barcode, condition, library identity, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnAnnotations {
    /// Observation identifiers, one per matrix column
    column_ids: Vec<String>,
    /// Factor name -> level per column
    factors: HashMap<String, Vec<String>>,
}

impl ColumnAnnotations {
    pub fn new(column_ids: Vec<String>) -> Self {
        Self {
            column_ids,
            factors: HashMap::new(),
        }
    }

    /// Add a categorical factor column
    pub fn add_factor(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.column_ids.len() {
            return Err(MpraError::DimensionMismatch {
                expected: format!("{} values for factor '{}'", self.column_ids.len(), name),
                got: format!("{} values", values.len()),
            });
        }
        self.factors.insert(name.to_string(), values);
        Ok(())
    }

    pub fn has_factor(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }

    /// Level vector for a factor
    pub fn factor(&self, name: &str) -> Option<&Vec<String>> {
        self.factors.get(name)
    }

    /// Level of a factor for a single column
    pub fn value(&self, factor: &str, column_idx: usize) -> Result<&str> {
        self.factors
            .get(factor)
            .and_then(|v| v.get(column_idx))
            .map(|s| s.as_str())
            .ok_or_else(|| MpraError::Config {
                reason: format!(
                    "factor '{}' or column index {} not found in annotations",
                    factor, column_idx
                ),
            })
    }

    /// Sorted unique levels of a factor
    pub fn levels(&self, name: &str) -> Result<Vec<String>> {
        self.factors
            .get(name)
            .map(|values| {
                let mut unique: Vec<String> = values.clone();
                unique.sort();
                unique.dedup();
                unique
            })
            .ok_or_else(|| MpraError::Config {
                reason: format!("factor '{}' not found in annotations", name),
            })
    }

    pub fn factor_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factors.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn column_ids(&self) -> &[String] {
        &self.column_ids
    }

    pub fn n_columns(&self) -> usize {
        self.column_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annotations() -> ColumnAnnotations {
        let mut ann = ColumnAnnotations::new(vec![
            "c1".to_string(),
            "c2".to_string(),
            "c3".to_string(),
            "c4".to_string(),
        ]);
        ann.add_factor(
            "condition",
            vec![
                "ctrl".to_string(),
                "ctrl".to_string(),
                "stim".to_string(),
                "stim".to_string(),
            ],
        )
        .unwrap();
        ann
    }

    #[test]
    fn test_levels_sorted_unique() {
        let ann = annotations();
        assert_eq!(ann.levels("condition").unwrap(), vec!["ctrl", "stim"]);
        assert!(ann.levels("batch").is_err());
    }

    #[test]
    fn test_value_lookup() {
        let ann = annotations();
        assert_eq!(ann.value("condition", 2).unwrap(), "stim");
        assert!(ann.value("condition", 9).is_err());
    }

    #[test]
    fn test_factor_length_validated() {
        let mut ann = annotations();
        let err = ann.add_factor("batch", vec!["b1".to_string()]);
        assert!(matches!(err, Err(MpraError::DimensionMismatch { .. })));
    }
}
