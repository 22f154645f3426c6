//! Generalized linear model layer: design formulas, design matrices, and
//! the nested DNA/RNA model fitter

mod design;
mod fitting;
mod formula;
mod negative_binomial;

pub use design::{build_design_matrix, check_full_rank, DesignInfo};
pub use fitting::{
    analyze_comparative, analyze_quantification, fit_enhancer_glm, ComparativeFit,
    ComparativeResult, EnhancerFit, FitStatus, GlmFit, QuantificationResult,
};
pub use formula::Formula;
pub use negative_binomial::{CountModel, NegativeBinomial, MAX_COEF, MAX_ETA, MIN_MU};
