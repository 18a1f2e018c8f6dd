use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use indicatif::ProgressBar;
use midcor::models::LabelledChemical;
use midcor::{
    CorrectionError,
    CorrectionResult,
    Corrector,
    IsotopeTable,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{
    error,
    info,
    warn,
};

use crate::cli::CorrectArgs;
use crate::database::{
    load_isotope_table,
    load_measurements,
    FormulaDatabases,
    MeasurementGroup,
    TracerCode,
};
use crate::errors::CliError;

/// One output line: the raw measurement next to everything the
/// correction produced for that mass fraction. The computed columns stay
/// empty for groups whose correction failed.
#[derive(Debug, Clone, Serialize)]
struct OutputRow {
    sample: String,
    metabolite: String,
    derivative: String,
    isotopologue: usize,
    area: f64,
    corrected_area: Option<f64>,
    isotopologue_fraction: Option<f64>,
    residuum: Option<f64>,
    mean_enrichment: Option<f64>,
}

pub fn run_correct(args: &CorrectArgs) -> Result<(), CliError> {
    let started = Instant::now();

    let table = match &args.isotopes_db {
        Some(path) => load_isotope_table(path)?,
        None => IsotopeTable::natural_abundance(),
    };
    let tracer: TracerCode = args.tracer.parse()?;
    let n_isotopes = table.abundance(&tracer.element)?.len();
    let purity = match &args.purity {
        Some(purity) => purity.clone(),
        None => tracer.perfect_purity(n_isotopes)?,
    };
    info!(
        "Correcting for tracer {} (purity {:?}, correct_na_tracer: {})",
        args.tracer, purity, args.correct_na_tracer,
    );

    let databases = FormulaDatabases::load(
        args.metabolites_db.as_deref(),
        args.derivatives_db.as_deref(),
    )?;
    let groups = load_measurements(&args.measurements)?;

    // One corrector per (metabolite, derivative) pair; several samples
    // usually share it.
    let mut correctors: HashMap<(String, String), Result<Corrector, CliError>> =
        HashMap::new();
    for group in groups.iter() {
        let key = (group.metabolite.clone(), group.derivative.clone());
        if correctors.contains_key(&key) {
            continue;
        }
        let corrector = build_corrector(
            &table,
            &databases,
            &key.0,
            &key.1,
            &tracer.element,
            purity.clone(),
            args.correct_na_tracer,
            args.no_mean_enrichment,
        );
        if let Err(err) = &corrector {
            error!("Cannot construct corrector for ({}, {}): {}", key.0, key.1, err);
        }
        correctors.insert(key, corrector);
    }

    info!("Correcting {} measurement groups...", groups.len());
    let progress = ProgressBar::new(groups.len() as u64);
    let rows = groups
        .par_iter()
        .map(|group| {
            let key = (group.metabolite.clone(), group.derivative.clone());
            let rows = match &correctors[&key] {
                Ok(corrector) => correct_group(corrector, group),
                Err(_) => failed_rows(group),
            };
            progress.inc(1);
            rows
        })
        .collect::<Vec<_>>();
    progress.finish_and_clear();

    let n_failed = rows
        .iter()
        .filter(|rows| rows.iter().all(|row| row.corrected_area.is_none()))
        .count();
    write_rows(rows.into_iter().flatten(), args.output.as_ref())?;

    info!(
        "Processed {} groups ({} failed) in {:.2?}",
        groups.len(),
        n_failed,
        started.elapsed(),
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_corrector(
    table: &IsotopeTable,
    databases: &FormulaDatabases,
    metabolite: &str,
    derivative: &str,
    tracer_element: &str,
    purity: Vec<f64>,
    correct_na_tracer: bool,
    no_mean_enrichment: bool,
) -> Result<Corrector, CliError> {
    let formula = databases.metabolite_formula(metabolite)?;
    let derivative_formula = databases.derivative_formula(derivative)?;
    let chemical = LabelledChemical::new(
        &formula,
        &derivative_formula,
        tracer_element,
        Some(purity),
        correct_na_tracer,
        table,
    )?;
    let mut corrector = Corrector::new(chemical, table)?;
    if no_mean_enrichment {
        corrector = corrector.without_mean_enrichment();
    }
    Ok(corrector)
}

fn correct_group(corrector: &Corrector, group: &MeasurementGroup) -> Vec<OutputRow> {
    let result = match corrector.correct(&group.areas) {
        Ok(result) => result,
        Err(CorrectionError::SolverDidNotConverge { iterations, result }) => {
            // The attached solution is the best fit found; keep it but
            // leave a trace in the logs.
            warn!(
                "{} - {}/{}: fit did not converge within {} iterations, \
                 reporting the best solution found",
                group.sample, group.metabolite, group.derivative, iterations,
            );
            *result
        }
        Err(err) => {
            error!(
                "{} - {}/{}: {}",
                group.sample, group.metabolite, group.derivative, err,
            );
            return failed_rows(group);
        }
    };
    result_rows(group, &result)
}

fn result_rows(group: &MeasurementGroup, result: &CorrectionResult) -> Vec<OutputRow> {
    group
        .areas
        .iter()
        .enumerate()
        .map(|(i, &area)| OutputRow {
            sample: group.sample.clone(),
            metabolite: group.metabolite.clone(),
            derivative: group.derivative.clone(),
            isotopologue: i,
            area,
            corrected_area: result.corrected_area.get(i).copied(),
            isotopologue_fraction: result.isotopologue_fraction.get(i).copied(),
            residuum: result.residuum.get(i).copied(),
            mean_enrichment: result.mean_enrichment,
        })
        .collect()
}

fn failed_rows(group: &MeasurementGroup) -> Vec<OutputRow> {
    group
        .areas
        .iter()
        .enumerate()
        .map(|(i, &area)| OutputRow {
            sample: group.sample.clone(),
            metabolite: group.metabolite.clone(),
            derivative: group.derivative.clone(),
            isotopologue: i,
            area,
            corrected_area: None,
            isotopologue_fraction: None,
            residuum: None,
            mean_enrichment: None,
        })
        .collect()
}

fn write_rows(
    rows: impl Iterator<Item = OutputRow>,
    output: Option<&PathBuf>,
) -> Result<(), CliError> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(std::fs::File::create(path).map_err(|source| {
            CliError::Io {
                source,
                path: Some(path.clone()),
            }
        })?),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(|err| CliError::ParseError {
            msg: format!("Cannot write output row: {}", err),
        })?;
    }
    wtr.flush()?;
    Ok(())
}
