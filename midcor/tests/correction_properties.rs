//! Property-style checks on the correction pipeline.

use rand::rngs::StdRng;
use rand::{
    Rng,
    SeedableRng,
};

use midcor::models::{
    IsotopeTable,
    LabelledChemical,
};
use midcor::utils::{
    convolve,
    fsum,
};
use midcor::{
    correct,
    correction,
    Corrector,
};

fn glucose_corrector(correct_na_tracer: bool) -> Corrector {
    let table = IsotopeTable::natural_abundance();
    let chemical = LabelledChemical::new(
        "C6H12O6",
        "",
        "C",
        Some(vec![0.01, 0.99]),
        correct_na_tracer,
        &table,
    )
    .unwrap();
    Corrector::new(chemical, &table).unwrap()
}

#[test]
fn test_columns_are_stochastic_when_fully_observed() {
    let corrector = glucose_corrector(true);
    let full_window = corrector.mdv().len() + 6;
    let matrix = corrector.correction_matrix(full_window).unwrap();
    for j in 0..matrix.ncols() {
        let col_sum = fsum(matrix.column(j).as_slice());
        assert!(
            (col_sum - 1.0).abs() < 1e-9,
            "column {} sums to {}",
            j,
            col_sum
        );
    }
}

#[test]
fn test_columns_never_exceed_unit_mass() {
    let corrector = glucose_corrector(true);
    for m_rows in 7..20 {
        let matrix = corrector.correction_matrix(m_rows).unwrap();
        for j in 0..matrix.ncols() {
            let col_sum = fsum(matrix.column(j).as_slice());
            assert!(col_sum <= 1.0 + 1e-12);
        }
    }
}

#[test]
fn test_solution_is_a_distribution() {
    let mut rng = StdRng::seed_from_u64(7);
    let corrector = glucose_corrector(true);
    for _ in 0..20 {
        let v = (0..7).map(|_| rng.gen::<f64>()).collect::<Vec<_>>();
        let result = corrector.correct(&v).unwrap();
        assert!(result.isotopologue_fraction.iter().all(|&d| d >= 0.0));
        let total = fsum(&result.isotopologue_fraction);
        assert!((total - 1.0).abs() < 1e-9);
        let enrichment = result.mean_enrichment.unwrap();
        assert!((0.0..=1.0).contains(&enrichment));
    }
}

#[test]
fn test_convolution_order_does_not_matter() {
    // The MDV is a product of per-atom convolutions; any traversal order
    // of the elements must give the same vector.
    let table = IsotopeTable::natural_abundance();
    let elements = [("H", 12u32), ("O", 6), ("N", 2), ("Si", 1)];

    let mut forward = vec![1.0];
    for (element, count) in elements.iter() {
        for _ in 0..*count {
            forward = convolve(&forward, table.abundance(element).unwrap());
        }
    }
    let mut backward = vec![1.0];
    for (element, count) in elements.iter().rev() {
        for _ in 0..*count {
            backward = convolve(&backward, table.abundance(element).unwrap());
        }
    }

    assert_eq!(forward.len(), backward.len());
    for (a, b) in forward.iter().zip(backward.iter()) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_mdv_excludes_the_tracer_element() {
    // The metabolite MDV must equal the hand-built product over the
    // non-tracer atoms only.
    let table = IsotopeTable::natural_abundance();
    let chemical =
        LabelledChemical::new("C3H4O3", "", "C", None, false, &table).unwrap();
    let corrector = Corrector::new(chemical, &table).unwrap();

    let mut expected = vec![1.0];
    for _ in 0..4 {
        expected = convolve(&expected, table.abundance("H").unwrap());
    }
    for _ in 0..3 {
        expected = convolve(&expected, table.abundance("O").unwrap());
    }

    assert_eq!(corrector.mdv().len(), expected.len());
    for (a, b) in corrector.mdv().iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_formula_spelling_does_not_change_the_result() {
    let table = IsotopeTable::natural_abundance();
    let v = [1.0, 0.4, 0.15, 0.05];
    let first = correct(&table, "C3H5O2N", "", &v, "C", None, true, true, None)
        .unwrap();
    let second = correct(&table, "NH5O2C3", "", &v, "C", None, true, true, None)
        .unwrap();
    assert_eq!(first.isotopologue_fraction, second.isotopologue_fraction);
    assert_eq!(first.residuum, second.residuum);
}

#[test]
fn test_perfect_purity_recovers_each_isotopologue() {
    // With a pure tracer and no tracer natab correction, a synthetic
    // measurement of one isotopologue must come back unmixed.
    let table = IsotopeTable::natural_abundance();
    let chemical = LabelledChemical::new(
        "C3H4O3",
        "",
        "C",
        Some(vec![0.0, 1.0]),
        false,
        &table,
    )
    .unwrap();
    let corrector = Corrector::new(chemical, &table).unwrap();
    let matrix = corrector.correction_matrix(4).unwrap();

    for j in 0..4 {
        let v = matrix.column(j).iter().copied().collect::<Vec<_>>();
        let result = corrector.correct(&v).unwrap();
        for (i, &d) in result.isotopologue_fraction.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!(
                (d - expected).abs() < 1e-6,
                "isotopologue {} from synthetic peak {}: {:?}",
                i,
                j,
                result.isotopologue_fraction,
            );
        }
    }
}

#[test]
fn test_round_trip_recovers_random_distributions() {
    let mut rng = StdRng::seed_from_u64(42);
    let corrector = glucose_corrector(true);
    let matrix = corrector.correction_matrix(7).unwrap();

    for _ in 0..25 {
        let mut truth = (0..7).map(|_| rng.gen::<f64>()).collect::<Vec<_>>();
        let total = fsum(&truth);
        for value in truth.iter_mut() {
            *value /= total;
        }

        let v = (0..7)
            .map(|row| {
                (0..7)
                    .map(|col| matrix[(row, col)] * truth[col])
                    .sum::<f64>()
            })
            .collect::<Vec<_>>();

        let result = corrector.correct(&v).unwrap();
        for (recovered, expected) in
            result.isotopologue_fraction.iter().zip(truth.iter())
        {
            assert!(
                (recovered - expected).abs() < 1e-6,
                "{:?} vs {:?}",
                result.isotopologue_fraction,
                truth,
            );
        }
    }
}

#[test]
fn test_cancellation_is_honoured() {
    let corrector = glucose_corrector(true);
    let token = midcor::CancelToken::new();
    token.cancel();
    let result = corrector.correct_cancellable(&[1.0, 0.2, 0.1, 0.05, 0.01, 0.0, 0.0], Some(&token));
    assert!(matches!(
        result,
        Err(midcor::CorrectionError::Cancelled)
    ));
}

#[test]
fn test_correction_matrix_module_is_reachable_directly() {
    // The lower-level builders stay public for callers that want the
    // matrix without running a fit.
    let mdv = [0.98, 0.02];
    let matrix = correction::correction_matrix(
        &mdv,
        &[0.9893, 0.0107],
        &[0.0, 1.0],
        1,
        2,
        false,
    )
    .unwrap();
    assert_eq!(matrix.nrows(), 2);
    assert_eq!(matrix.ncols(), 2);
}
