use std::fmt::Display;

use crate::correction::CorrectionResult;

/// Everything that can go wrong while setting up or running a correction.
///
/// Input validation problems carry enough context to point the user at the
/// offending value. `SolverDidNotConverge` is special: the best solution
/// found so far is still attached for diagnostic use.
#[derive(Debug, Clone)]
pub enum CorrectionError {
    MalformedFormula {
        formula: String,
        position: usize,
    },
    UnknownElement {
        element: String,
        formula: String,
    },
    TracerAbsent {
        tracer: String,
        formula: String,
    },
    MeasurementTooShort {
        measured: usize,
        required: usize,
    },
    FragmentTooSmall {
        measured: usize,
        max_peaks: usize,
    },
    MeasurementNotFinite {
        index: usize,
    },
    PurityShapeMismatch {
        expected: usize,
        actual: usize,
    },
    PuritySumInvalid {
        sum: f64,
    },
    IsotopeTableInvalid {
        element: String,
        reason: String,
    },
    SolverDidNotConverge {
        iterations: usize,
        result: Box<CorrectionResult>,
    },
    Cancelled,
    InternalInvariant {
        details: String,
    },
}

impl Display for CorrectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedFormula { formula, position } => {
                write!(
                    f,
                    "Malformed elemental formula '{}' at offset {}",
                    formula, position
                )
            }
            Self::UnknownElement { element, formula } => {
                write!(
                    f,
                    "Element '{}' from formula '{}' is not in the isotope table",
                    element, formula
                )
            }
            Self::TracerAbsent { tracer, formula } => {
                write!(
                    f,
                    "The tracer element '{}' must be present in the metabolite formula '{}'",
                    tracer, formula
                )
            }
            Self::MeasurementTooShort { measured, required } => {
                write!(
                    f,
                    "Measurement vector has {} entries but at least {} mass fractions are needed \
                     to cover every tracer isotopologue",
                    measured, required
                )
            }
            Self::FragmentTooSmall { measured, max_peaks } => {
                write!(
                    f,
                    "Measurement vector has {} entries but the declared formula can only \
                     generate {} observable peaks",
                    measured, max_peaks
                )
            }
            Self::MeasurementNotFinite { index } => {
                write!(f, "Measurement entry {} is NaN or infinite", index)
            }
            Self::PurityShapeMismatch { expected, actual } => {
                write!(
                    f,
                    "Tracer purity vector has {} entries, expected {} (one per tracer isotope)",
                    actual, expected
                )
            }
            Self::PuritySumInvalid { sum } => {
                write!(
                    f,
                    "Tracer purity entries must be within [0, 1] and sum to 1 (got sum {})",
                    sum
                )
            }
            Self::IsotopeTableInvalid { element, reason } => {
                write!(f, "Invalid isotope data for element '{}': {}", element, reason)
            }
            Self::SolverDidNotConverge { iterations, .. } => {
                write!(
                    f,
                    "NNLS solver hit the iteration cap ({} iterations) before converging",
                    iterations
                )
            }
            Self::Cancelled => write!(f, "Correction cancelled by caller"),
            Self::InternalInvariant { details } => {
                write!(f, "Internal invariant violated: {}", details)
            }
        }
    }
}

impl std::error::Error for CorrectionError {}

pub type Result<T> = std::result::Result<T, CorrectionError>;
