//! Design formula grammar
//!
//! A formula is an ordered list of references to named annotation factors,
//! written in the familiar tilde syntax: `~ batch + condition`, or `~ 1` for
//! an intercept-only model. Names are resolved against the annotation table
//! when the design matrix is built, never at parse time.

use std::fmt;
use std::str::FromStr;

use crate::error::{MpraError, Result};

/// A symbolic model specification: which annotation factors enter the model.
/// The intercept is always implied; an empty term list is the intercept-only
/// model `~ 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    terms: Vec<String>,
}

impl Formula {
    /// Intercept-only model, `~ 1`
    pub fn intercept_only() -> Self {
        Self { terms: Vec::new() }
    }

    /// Model with the given factor terms, in order
    pub fn terms<S: Into<String>, I: IntoIterator<Item = S>>(terms: I) -> Self {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
        }
    }

    pub fn term_names(&self) -> &[String] {
        &self.terms
    }

    pub fn is_intercept_only(&self) -> bool {
        self.terms.is_empty()
    }
}

impl FromStr for Formula {
    type Err = MpraError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('~').unwrap_or(trimmed).trim();

        if body.is_empty() {
            return Err(MpraError::InvalidFormula {
                formula: s.to_string(),
                reason: "empty formula (use '~ 1' for an intercept-only model)".to_string(),
            });
        }
        if body == "1" {
            return Ok(Formula::intercept_only());
        }

        let mut terms = Vec::new();
        for raw in body.split('+') {
            let term = raw.trim();
            if term.is_empty() {
                return Err(MpraError::InvalidFormula {
                    formula: s.to_string(),
                    reason: "empty term between '+' separators".to_string(),
                });
            }
            if term == "1" {
                // explicit intercept, always present anyway
                continue;
            }
            if !term.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                return Err(MpraError::InvalidFormula {
                    formula: s.to_string(),
                    reason: format!("invalid factor name '{}'", term),
                });
            }
            if terms.iter().any(|t| t == term) {
                return Err(MpraError::InvalidFormula {
                    formula: s.to_string(),
                    reason: format!("factor '{}' listed twice", term),
                });
            }
            terms.push(term.to_string());
        }

        Ok(Formula { terms })
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            write!(f, "~ 1")
        } else {
            write!(f, "~ {}", self.terms.join(" + "))
        }
    }
}
