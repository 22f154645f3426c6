//! Statistical testing: alpha extraction, empirical nulls, likelihood-ratio
//! tests, and multiple-testing correction

mod alpha;
mod empirical;
mod fdr;
mod lrt;

pub use alpha::{get_alpha, AlphaTable};
pub use empirical::{test_empirical, EmpiricalResults};
pub use fdr::{benjamini_hochberg, bonferroni};
pub use lrt::{test_lrt, LrtResults};
