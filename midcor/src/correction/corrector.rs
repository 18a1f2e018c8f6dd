use nalgebra::{
    DMatrix,
    DVector,
};
use serde::Serialize;
use tracing::{
    debug,
    warn,
};

use crate::correction::matrix::correction_matrix;
use crate::correction::mdv::natural_abundance_mdv;
use crate::errors::{
    CorrectionError,
    Result,
};
use crate::models::{
    ChemicalFormula,
    IsotopeTable,
    LabelledChemical,
};
use crate::solver::{
    solve_nnls,
    CancelToken,
    NnlsConfig,
};
use crate::utils::fsum;

/// The normalized solution must not drift away from a probability
/// distribution; anything beyond this is a bug, not an input problem.
const NORMALIZATION_INVARIANT_TOLERANCE: f64 = 1e-6;

/// Side-channel observations that are worth reporting but are not
/// errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// At least one measured intensity was negative.
    pub negative_measurement: bool,
    /// The measurement summed to zero and the fit was skipped entirely.
    pub zero_signal: bool,
}

/// Outcome of one correction.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionResult {
    /// Raw non-negative solution of the fit, one entry per tracer
    /// isotopologue (not normalized).
    pub corrected_area: Vec<f64>,
    /// `corrected_area` normalized to 1, or all zeros when the fit came
    /// back empty.
    pub isotopologue_fraction: Vec<f64>,
    /// Fit residual, normalized by the total measured signal.
    pub residuum: Vec<f64>,
    /// Mean isotopic enrichment in [0, 1]; absent when not requested or
    /// when the solution sums to zero.
    pub mean_enrichment: Option<f64>,
    pub diagnostics: Diagnostics,
}

/// A validated, reusable correction setup for one (metabolite,
/// derivative, tracer) combination.
///
/// Construction performs all chemistry-side validation and precomputes
/// the natural-abundance MDV; [`Corrector::correct`] can then be applied
/// to any number of measurement vectors. Correcting takes `&self` and
/// allocates per call only, so a `Corrector` can be shared across
/// threads freely.
#[derive(Debug, Clone)]
pub struct Corrector {
    chemical: LabelledChemical,
    tracer_abundance: Vec<f64>,
    mdv: Vec<f64>,
    nnls: NnlsConfig,
    mean_enrichment: bool,
}

impl Corrector {
    pub fn new(chemical: LabelledChemical, table: &IsotopeTable) -> Result<Self> {
        let tracer_abundance = table.abundance(chemical.tracer_element())?.to_vec();
        let mdv = natural_abundance_mdv(&chemical, table)?;
        Ok(Self {
            chemical,
            tracer_abundance,
            mdv,
            nnls: NnlsConfig::default(),
            mean_enrichment: true,
        })
    }

    pub fn with_nnls_config(mut self, config: NnlsConfig) -> Self {
        self.nnls = config;
        self
    }

    pub fn without_mean_enrichment(mut self) -> Self {
        self.mean_enrichment = false;
        self
    }

    pub fn chemical(&self) -> &LabelledChemical {
        &self.chemical
    }

    /// Natural-abundance MDV of the non-tracer atoms (full length).
    pub fn mdv(&self) -> &[f64] {
        &self.mdv
    }

    /// The correction matrix for a measurement of `m_rows` mass
    /// fractions.
    pub fn correction_matrix(&self, m_rows: usize) -> Result<DMatrix<f64>> {
        correction_matrix(
            &self.mdv,
            &self.tracer_abundance,
            self.chemical.tracer_purity(),
            self.chemical.tracer_count(),
            m_rows,
            self.chemical.correct_na_tracer(),
        )
    }

    pub fn correct(&self, measurement: &[f64]) -> Result<CorrectionResult> {
        self.correct_cancellable(measurement, None)
    }

    pub fn correct_cancellable(
        &self,
        measurement: &[f64],
        cancel: Option<&CancelToken>,
    ) -> Result<CorrectionResult> {
        let n_tracers = self.chemical.tracer_count();
        let max_tracer_shift = self.tracer_abundance.len() - 1;
        let m_rows = measurement.len();

        // Length checks run before any look at the values so that error
        // reporting is deterministic.
        let min_rows = n_tracers * max_tracer_shift + 1;
        if m_rows < min_rows {
            return Err(CorrectionError::MeasurementTooShort {
                measured: m_rows,
                required: min_rows,
            });
        }
        let max_peaks = self.mdv.len() + n_tracers * max_tracer_shift;
        if m_rows > max_peaks {
            return Err(CorrectionError::FragmentTooSmall {
                measured: m_rows,
                max_peaks,
            });
        }
        if let Some(index) = measurement.iter().position(|v| !v.is_finite()) {
            return Err(CorrectionError::MeasurementNotFinite { index });
        }

        let mut diagnostics = Diagnostics::default();
        if measurement.iter().any(|&v| v < 0.0) {
            warn!(
                "Measurement for {} contains negative intensities: {:?}",
                self.chemical.formula(),
                measurement,
            );
            diagnostics.negative_measurement = true;
        }

        let total_signal = fsum(measurement);
        if total_signal == 0.0 {
            warn!(
                "Measurement for {} sums to zero, skipping the fit",
                self.chemical.formula(),
            );
            diagnostics.zero_signal = true;
            return Ok(CorrectionResult {
                corrected_area: vec![0.0; n_tracers + 1],
                isotopologue_fraction: vec![0.0; n_tracers + 1],
                residuum: vec![0.0; m_rows],
                mean_enrichment: None,
                diagnostics,
            });
        }

        let matrix = self.correction_matrix(m_rows)?;
        let v_measured = DVector::from_column_slice(measurement);
        let solution = solve_nnls(&matrix, &v_measured, &self.nnls, cancel)?;
        debug!(
            "Fit for {} finished in {} iterations (converged: {})",
            self.chemical.formula(),
            solution.iterations,
            solution.converged,
        );

        let result = self.post_process(
            &matrix,
            &v_measured,
            total_signal,
            &solution.x,
            diagnostics,
        )?;
        if !solution.converged {
            return Err(CorrectionError::SolverDidNotConverge {
                iterations: solution.iterations,
                result: Box::new(result),
            });
        }
        Ok(result)
    }

    fn post_process(
        &self,
        matrix: &DMatrix<f64>,
        v_measured: &DVector<f64>,
        total_signal: f64,
        x: &DVector<f64>,
        diagnostics: Diagnostics,
    ) -> Result<CorrectionResult> {
        let n_tracers = self.chemical.tracer_count();
        // The solver keeps x feasible; the clamp only swallows the float
        // dust a solve can leave behind.
        let corrected_area = x.iter().map(|&v| v.max(0.0)).collect::<Vec<_>>();
        let total_area = fsum(&corrected_area);

        let isotopologue_fraction = if total_area > 0.0 {
            let fraction = corrected_area
                .iter()
                .map(|&v| v / total_area)
                .collect::<Vec<_>>();
            let fraction_sum = fsum(&fraction);
            if (fraction_sum - 1.0).abs() > NORMALIZATION_INVARIANT_TOLERANCE {
                return Err(CorrectionError::InternalInvariant {
                    details: format!(
                        "normalized isotopologue fractions sum to {}",
                        fraction_sum
                    ),
                });
            }
            fraction
        } else {
            warn!(
                "Fit for {} came back all-zero, fractions are undefined",
                self.chemical.formula(),
            );
            vec![0.0; corrected_area.len()]
        };

        let residual = v_measured - matrix * x;
        let residuum = residual
            .iter()
            .map(|&e| e / total_signal)
            .collect::<Vec<_>>();

        let mean_enrichment = if self.mean_enrichment && total_area > 0.0 {
            let weighted = isotopologue_fraction
                .iter()
                .enumerate()
                .map(|(i, &d)| i as f64 * d)
                .collect::<Vec<_>>();
            Some(fsum(&weighted) / n_tracers as f64)
        } else {
            None
        };

        Ok(CorrectionResult {
            corrected_area,
            isotopologue_fraction,
            residuum,
            mean_enrichment,
            diagnostics,
        })
    }
}

/// One-shot correction facade.
///
/// Validates every input, builds the correction matrix, fits and
/// post-processes in a single stateless call. For correcting many
/// measurements of the same chemical, build a [`Corrector`] once
/// instead.
///
/// # Example
///
/// ```
/// use midcor::correct;
/// use midcor::models::IsotopeTable;
///
/// let table = IsotopeTable::natural_abundance();
/// let result = correct(
///     &table,
///     "C3H4O3",
///     "",
///     &[1.0, 0.05, 0.01, 0.001],
///     "C",
///     None,
///     true,
///     true,
///     None,
/// )
/// .unwrap();
/// assert_eq!(result.isotopologue_fraction.len(), 4);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn correct(
    table: &IsotopeTable,
    metabolite_formula: &str,
    derivative_formula: &str,
    measurement: &[f64],
    tracer_element: &str,
    tracer_purity: Option<Vec<f64>>,
    correct_na_tracer: bool,
    want_mean_enrichment: bool,
    cancel: Option<&CancelToken>,
) -> Result<CorrectionResult> {
    let formula = ChemicalFormula::parse(metabolite_formula)?;
    let derivative = ChemicalFormula::parse(derivative_formula)?;
    table.check_formula(&formula)?;
    table.check_formula(&derivative)?;
    let n_tracers = formula.count(tracer_element) as usize;
    if n_tracers == 0 {
        return Err(CorrectionError::TracerAbsent {
            tracer: tracer_element.to_string(),
            formula: formula.to_string(),
        });
    }
    // Reject a too-short measurement before looking at the purity vector
    // so that error reporting order is stable.
    let min_rows = n_tracers * table.max_shift(tracer_element)? + 1;
    if measurement.len() < min_rows {
        return Err(CorrectionError::MeasurementTooShort {
            measured: measurement.len(),
            required: min_rows,
        });
    }
    let chemical = LabelledChemical::from_parts(
        formula,
        derivative,
        tracer_element,
        tracer_purity,
        correct_na_tracer,
        table,
    )?;
    let mut corrector = Corrector::new(chemical, table)?;
    if !want_mean_enrichment {
        corrector = corrector.without_mean_enrichment();
    }
    corrector.correct_cancellable(measurement, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn toy_table() -> IsotopeTable {
        IsotopeTable::new(BTreeMap::from([
            ("C".to_string(), vec![0.9893, 0.0107]),
            ("H".to_string(), vec![1.0]),
            ("O".to_string(), vec![1.0]),
        ]))
        .unwrap()
    }

    #[test]
    fn test_zero_signal_short_circuits() {
        let result = correct(
            &toy_table(),
            "C3H4O3",
            "",
            &[0.0, 0.0, 0.0, 0.0],
            "C",
            Some(vec![0.0, 1.0]),
            false,
            true,
            None,
        )
        .unwrap();
        assert!(result.diagnostics.zero_signal);
        assert_eq!(result.corrected_area, vec![0.0; 4]);
        assert_eq!(result.isotopologue_fraction, vec![0.0; 4]);
        assert_eq!(result.residuum, vec![0.0; 4]);
        assert!(result.mean_enrichment.is_none());
    }

    #[test]
    fn test_negative_entries_warn_but_fit() {
        let result = correct(
            &toy_table(),
            "C3H4O3",
            "",
            &[1.0, -1e-6, 0.0, 0.0],
            "C",
            Some(vec![0.0, 1.0]),
            false,
            true,
            None,
        )
        .unwrap();
        assert!(result.diagnostics.negative_measurement);
        assert!(!result.diagnostics.zero_signal);
    }

    #[test]
    fn test_nan_measurement_is_rejected() {
        let err = correct(
            &toy_table(),
            "C3H4O3",
            "",
            &[1.0, f64::NAN, 0.0, 0.0],
            "C",
            None,
            false,
            true,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CorrectionError::MeasurementNotFinite { index: 1 }
        ));
    }

    #[test]
    fn test_mean_enrichment_not_requested() {
        let result = correct(
            &toy_table(),
            "C2",
            "",
            &[0.5, 0.25, 0.25],
            "C",
            None,
            false,
            false,
            None,
        )
        .unwrap();
        assert!(result.mean_enrichment.is_none());
    }

    #[test]
    fn test_rescaling_leaves_fractions_unchanged() {
        let table = IsotopeTable::natural_abundance();
        let v = [0.6, 0.25, 0.1, 0.05];
        let base = correct(&table, "C3H4O3", "", &v, "C", None, true, true, None)
            .unwrap();
        let scaled_v = v.iter().map(|&x| x * 1e4).collect::<Vec<_>>();
        let scaled =
            correct(&table, "C3H4O3", "", &scaled_v, "C", None, true, true, None)
                .unwrap();
        for (a, b) in base
            .isotopologue_fraction
            .iter()
            .zip(scaled.isotopologue_fraction.iter())
        {
            assert!((a - b).abs() < 1e-9);
        }
        assert!(base.mean_enrichment.is_some());
        assert!(
            (base.mean_enrichment.unwrap() - scaled.mean_enrichment.unwrap()).abs()
                < 1e-9
        );
        for (a, b) in base.residuum.iter().zip(scaled.residuum.iter()) {
            // Residuum is normalized by the total signal, so it matches too.
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_corrector_is_reusable() {
        let table = toy_table();
        let chemical =
            LabelledChemical::new("C2", "", "C", None, true, &table).unwrap();
        let corrector = Corrector::new(chemical, &table).unwrap();
        let first = corrector.correct(&[1.0, 0.0, 0.0]).unwrap();
        let second = corrector.correct(&[0.0, 0.0, 1.0]).unwrap();
        assert!((first.isotopologue_fraction[0] - 1.0).abs() < 1e-6);
        assert!((second.isotopologue_fraction[2] - 1.0).abs() < 1e-6);
    }
}
