//! Sequencing depth normalization

mod depth;

pub use depth::{estimate_depth_factors, DepthMethod};
