//! Data structures: count matrices, column annotations, and the MPRA container

mod annotations;
mod count_matrix;
mod object;

pub use annotations::ColumnAnnotations;
pub use count_matrix::CountMatrix;
pub use object::{DepthTarget, MpraObject};
