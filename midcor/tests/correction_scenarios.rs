//! End-to-end regression scenarios for the correction pipeline.

use std::collections::BTreeMap;

use midcor::errors::CorrectionError;
use midcor::models::{
    IsotopeTable,
    LabelledChemical,
};
use midcor::{
    correct,
    Corrector,
};

/// Toy table where only carbon has more than one isotope.
fn toy_table() -> IsotopeTable {
    IsotopeTable::new(BTreeMap::from([
        ("C".to_string(), vec![0.9893, 0.0107]),
        ("H".to_string(), vec![1.0]),
        ("O".to_string(), vec![1.0]),
    ]))
    .unwrap()
}

fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "entry {}: {} vs {} (tolerance {}), full: {:?}",
            i,
            a,
            e,
            tolerance,
            actual,
        );
    }
}

#[test]
fn test_unlabelled_pyruvate_without_tracer_natab_correction() {
    let result = correct(
        &toy_table(),
        "C3H4O3",
        "",
        &[1.0, 0.0, 0.0, 0.0],
        "C",
        Some(vec![0.0, 1.0]),
        false,
        true,
        None,
    )
    .unwrap();
    assert_close(&result.isotopologue_fraction, &[1.0, 0.0, 0.0, 0.0], 1e-12);
    assert_close(&result.residuum, &[0.0; 4], 1e-12);
    assert_eq!(result.mean_enrichment, Some(0.0));
}

#[test]
fn test_natural_abundance_pattern_corrects_to_unlabelled() {
    // Two carbons measured at (almost exactly) their natural-abundance
    // pattern must come back as the pure M0 isotopologue.
    let result = correct(
        &toy_table(),
        "C2",
        "",
        &[0.9787, 0.0212, 0.0001],
        "C",
        Some(vec![0.0, 1.0]),
        true,
        true,
        None,
    )
    .unwrap();
    assert_close(&result.isotopologue_fraction, &[1.0, 0.0, 0.0], 1e-3);
    assert!(result.mean_enrichment.unwrap() < 1e-3);
}

#[test]
fn test_derivatized_metabolite_with_silicon() {
    // TMS-derivatized alanine-like fragment: the derivative contributes
    // natural abundance for all of its atoms, silicon included.
    let table = IsotopeTable::natural_abundance();
    let chemical = LabelledChemical::new(
        "C3H5O2N",
        "Si2C8H21",
        "C",
        None,
        true,
        &table,
    )
    .unwrap();
    let corrector = Corrector::new(chemical, &table).unwrap();

    // Silicon alone contributes 2 * 2 shift steps on top of the other
    // non-tracer atoms.
    assert!(corrector.mdv().len() > 5);

    let result = corrector.correct(&[1.0, 0.35, 0.12, 0.03]).unwrap();
    assert_eq!(result.isotopologue_fraction.len(), 4);
    assert!(result.isotopologue_fraction.iter().all(|&d| d >= 0.0));
    let total: f64 = result.isotopologue_fraction.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(result.residuum.len(), 4);
}

#[test]
fn test_imperfect_purity_is_deconvolved() {
    let table = toy_table();
    let chemical = LabelledChemical::new(
        "C3H4O3",
        "",
        "C",
        Some(vec![0.01, 0.99]),
        false,
        &table,
    )
    .unwrap();
    let corrector = Corrector::new(chemical, &table).unwrap();

    // Synthetic measurement of the fully labelled isotopologue seen
    // through the impure tracer.
    let matrix = corrector.correction_matrix(4).unwrap();
    let v = matrix.column(3).iter().copied().collect::<Vec<_>>();

    let result = corrector.correct(&v).unwrap();
    assert_close(&result.isotopologue_fraction, &[0.0, 0.0, 0.0, 1.0], 1e-6);
    assert!((result.mean_enrichment.unwrap() - 1.0).abs() < 1e-6);
}

#[test]
fn test_measurement_too_short() {
    let err = correct(
        &toy_table(),
        "C3H4O3",
        "",
        &[1.0, 0.2, 0.1],
        "C",
        None,
        false,
        true,
        None,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        CorrectionError::MeasurementTooShort {
            measured: 3,
            required: 4,
        }
    ));
}

#[test]
fn test_zero_signal_short_circuit() {
    let result = correct(
        &toy_table(),
        "C3H4O3",
        "",
        &[0.0, 0.0, 0.0, 0.0],
        "C",
        None,
        false,
        true,
        None,
    )
    .unwrap();
    assert!(result.diagnostics.zero_signal);
    assert_eq!(result.isotopologue_fraction, vec![0.0; 4]);
    assert_eq!(result.residuum, vec![0.0; 4]);
    assert!(result.mean_enrichment.is_none());
}
