//! Command-line interface for rust_mpranalyze

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_mpranalyze")]
#[command(author = "SunJu Kim")]
#[command(version)]
#[command(about = "MPRA activity analysis: nested DNA/RNA count models")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Quantify enhancer activity and test it against negative controls
    #[command(
        about = "Quantify enhancer activity and test it against negative controls",
        after_long_help = "\
Examples:
  # Per-condition activity with empirical testing
  rust_mpranalyze quantify --dna-counts dna.csv --rna-counts rna.csv \\
    --dna-annotations dna_ann.csv --rna-annotations rna_ann.csv \\
    --dna-design \"~ barcode + batch + condition\" --rna-design \"~ condition\" \\
    --lib-factors batch,condition --controls controls.txt \\
    --test-level stim -o results.csv --alpha-out alpha.csv"
    )]
    Quantify {
        #[arg(long)]
        dna_counts: String,
        #[arg(long)]
        rna_counts: String,
        #[arg(long)]
        dna_annotations: String,
        #[arg(long)]
        rna_annotations: String,
        /// DNA design formula, e.g. "~ barcode + batch + condition"
        #[arg(long)]
        dna_design: String,
        /// RNA design formula, e.g. "~ condition"
        #[arg(long)]
        rna_design: String,
        /// Comma-separated annotation factors identifying libraries
        #[arg(long)]
        lib_factors: String,
        /// Depth factor method: upper-quartile, total-sum or size-factor
        #[arg(long, default_value = "upper-quartile")]
        depth_method: String,
        /// File with negative-control enhancer ids, one per line
        #[arg(long)]
        controls: String,
        /// Factor whose levels the alpha estimates are split by; omit for a
        /// single intercept-level estimate
        #[arg(long)]
        by_factor: Option<String>,
        /// Alpha column to test empirically (a level of --by-factor);
        /// defaults to the first column
        #[arg(long)]
        test_level: Option<String>,
        /// Output CSV for empirical test results
        #[arg(short, long)]
        output: String,
        /// Optional output CSV for the alpha table
        #[arg(long)]
        alpha_out: Option<String>,
    },

    /// Compare conditions with a likelihood-ratio test
    #[command(
        about = "Compare conditions with a likelihood-ratio test",
        after_long_help = "\
Examples:
  # Two-condition comparison against an intercept-only null
  rust_mpranalyze compare --dna-counts dna.csv --rna-counts rna.csv \\
    --dna-annotations dna_ann.csv --rna-annotations rna_ann.csv \\
    --dna-design \"~ barcode + batch + condition\" --rna-design \"~ condition\" \\
    --reduced-design \"~ 1\" --lib-factors batch,condition -o lrt.csv"
    )]
    Compare {
        #[arg(long)]
        dna_counts: String,
        #[arg(long)]
        rna_counts: String,
        #[arg(long)]
        dna_annotations: String,
        #[arg(long)]
        rna_annotations: String,
        #[arg(long)]
        dna_design: String,
        /// Full RNA design formula
        #[arg(long)]
        rna_design: String,
        /// Reduced (null) RNA design formula, e.g. "~ 1"
        #[arg(long, default_value = "~ 1")]
        reduced_design: String,
        #[arg(long)]
        lib_factors: String,
        #[arg(long, default_value = "upper-quartile")]
        depth_method: String,
        /// Output CSV for LRT results
        #[arg(short, long)]
        output: String,
    },

    /// Estimate depth factors only
    #[command(about = "Estimate depth factors only")]
    Normalize {
        #[arg(long)]
        dna_counts: String,
        #[arg(long)]
        rna_counts: String,
        #[arg(long)]
        dna_annotations: String,
        #[arg(long)]
        rna_annotations: String,
        #[arg(long)]
        lib_factors: String,
        #[arg(long, default_value = "upper-quartile")]
        depth_method: String,
        /// Output CSV for per-column depth factors
        #[arg(short, long)]
        output: String,
    },
}
