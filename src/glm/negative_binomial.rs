//! Count distribution strategy
//!
//! The fitter is written against the [`CountModel`] trait so the
//! distributional family can be swapped without touching the IRLS machinery.
//! The negative binomial with a log link and mean/dispersion
//! parameterization (Var = mu + disp * mu^2) is the default.

use statrs::function::gamma::ln_gamma;

/// Floor on mu during IRLS iterations; keeps weights and working responses
/// finite for observations fitted near zero.
pub const MIN_MU: f64 = 0.5;

/// Clamp on the linear predictor to prevent exp() overflow.
pub const MAX_ETA: f64 = 700.0;

/// Bound on coefficient magnitude; a fit that walks past this is flagged
/// rather than clamped in place.
pub const MAX_COEF: f64 = 30.0;

/// Lower and upper bounds for the per-enhancer dispersion search.
pub const MIN_DISPERSION: f64 = 1e-8;
pub const MAX_DISPERSION: f64 = 100.0;

/// A count distribution usable by the GLM fitter: log-likelihood for the
/// final fit, IRLS weights for the mean update, variance for diagnostics.
pub trait CountModel: Sync {
    /// Log probability mass of observing `y` at mean `mu`.
    fn log_likelihood(&self, y: f64, mu: f64, dispersion: f64) -> f64;

    /// IRLS weight at mean `mu` for the log link.
    fn irls_weight(&self, mu: f64, dispersion: f64) -> f64;

    /// Variance of the distribution at mean `mu`.
    fn variance(&self, mu: f64, dispersion: f64) -> f64;
}

/// Negative binomial parameterized by mean and dispersion:
/// `size = 1/dispersion`, `Var(Y) = mu + dispersion * mu^2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NegativeBinomial;

impl CountModel for NegativeBinomial {
    fn log_likelihood(&self, y: f64, mu: f64, dispersion: f64) -> f64 {
        if dispersion <= 0.0 {
            return f64::NEG_INFINITY;
        }
        // zero mean carries all mass at zero
        if y == 0.0 && mu == 0.0 {
            return 0.0;
        }
        if mu <= 0.0 {
            return f64::NEG_INFINITY;
        }

        let size = 1.0 / dispersion;
        ln_gamma(y + size) - ln_gamma(size) - ln_gamma(y + 1.0)
            + size * (size / (size + mu)).ln()
            + y * (mu / (size + mu)).ln()
    }

    fn irls_weight(&self, mu: f64, dispersion: f64) -> f64 {
        mu / (1.0 + dispersion * mu)
    }

    fn variance(&self, mu: f64, dispersion: f64) -> f64 {
        mu + dispersion * mu * mu
    }
}
