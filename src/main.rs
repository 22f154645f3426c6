//! rust_mpranalyze command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_mpranalyze::cli::{Cli, Commands};
use rust_mpranalyze::prelude::*;

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Quantify {
            dna_counts,
            rna_counts,
            dna_annotations,
            rna_annotations,
            dna_design,
            rna_design,
            lib_factors,
            depth_method,
            controls,
            by_factor,
            test_level,
            output,
            alpha_out,
        } => {
            let control_ids = read_control_ids(&controls)?;
            let mut obj = load_object(&dna_counts, &rna_counts, &dna_annotations, &rna_annotations)?
                .with_controls(&control_ids)?;
            estimate(&mut obj, &lib_factors, &depth_method)?;

            let dna_formula: Formula = dna_design.parse()?;
            let rna_formula: Formula = rna_design.parse()?;
            let result = analyze_quantification(&obj, &dna_formula, &rna_formula)?;

            // default split: the last RNA design factor, the covariate of interest
            let split = by_factor.or_else(|| rna_formula.term_names().last().cloned());
            let alpha = get_alpha(&result, split.as_deref())?;
            info!(
                "alpha estimates for {} enhancers across {} level(s)",
                alpha.n_enhancers(),
                alpha.n_levels()
            );

            let statistic = match &test_level {
                Some(level) => alpha.column(level).ok_or_else(|| MpraError::Config {
                    reason: format!("'{}' is not a level of the alpha table", level),
                })?,
                None => alpha.values.column(0).to_vec(),
            };
            let empirical = test_empirical(&obj, &statistic)?;
            write_empirical_results(&empirical, &output)?;
            info!("wrote empirical test results to {}", output);

            if let Some(path) = alpha_out {
                write_alpha_table(&alpha, &path)?;
                info!("wrote alpha table to {}", path);
            }
        }

        Commands::Compare {
            dna_counts,
            rna_counts,
            dna_annotations,
            rna_annotations,
            dna_design,
            rna_design,
            reduced_design,
            lib_factors,
            depth_method,
            output,
        } => {
            let mut obj = load_object(&dna_counts, &rna_counts, &dna_annotations, &rna_annotations)?;
            estimate(&mut obj, &lib_factors, &depth_method)?;

            let result = analyze_comparative(
                &obj,
                &dna_design.parse()?,
                &rna_design.parse()?,
                &reduced_design.parse()?,
            )?;
            let lrt = test_lrt(&result)?;
            write_lrt_results(&lrt, &output)?;
            info!("wrote LRT results to {}", output);
        }

        Commands::Normalize {
            dna_counts,
            rna_counts,
            dna_annotations,
            rna_annotations,
            lib_factors,
            depth_method,
            output,
        } => {
            let mut obj = load_object(&dna_counts, &rna_counts, &dna_annotations, &rna_annotations)?;
            estimate(&mut obj, &lib_factors, &depth_method)?;
            write_depth_factors(
                obj.dna().column_ids(),
                obj.dna_depth_factors().expect("just estimated"),
                obj.rna_depth_factors().expect("just estimated"),
                &output,
            )?;
            info!("wrote depth factors to {}", output);
        }
    }
    Ok(())
}

fn load_object(
    dna_counts: &str,
    rna_counts: &str,
    dna_annotations: &str,
    rna_annotations: &str,
) -> Result<MpraObject> {
    let dna = read_count_matrix(dna_counts)?;
    let rna = read_count_matrix(rna_counts)?;
    info!(
        "loaded {} enhancers x {} DNA / {} RNA observations",
        dna.n_rows(),
        dna.n_columns(),
        rna.n_columns()
    );
    MpraObject::new(
        dna,
        rna,
        read_annotations(dna_annotations)?,
        read_annotations(rna_annotations)?,
    )
}

fn estimate(obj: &mut MpraObject, lib_factors: &str, depth_method: &str) -> Result<()> {
    let factors: Vec<&str> = lib_factors.split(',').map(str::trim).collect();
    let method: DepthMethod = depth_method.parse()?;
    estimate_depth_factors(obj, &factors, DepthTarget::Both, method)
}
