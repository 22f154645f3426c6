//! Tabular input and output for the command-line surface

mod csv;
mod results;

pub use self::csv::{read_annotations, read_control_ids, read_count_matrix};
pub use results::{
    write_alpha_table, write_depth_factors, write_empirical_results, write_json,
    write_lrt_results,
};
