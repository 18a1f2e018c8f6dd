//! Correction-matrix assembly.
//!
//! The correction matrix A maps a candidate tracer-isotopologue
//! distribution (length n + 1) to the expected measured intensity
//! pattern (length M). Column j encodes the scenario "exactly j tracer
//! positions are occupied by substrate atoms distributed per the purity
//! vector, the remaining n - j positions carry the tracer element at
//! natural abundance, and every non-tracer atom contributes natural
//! abundance".

use nalgebra::{
    DMatrix,
    DVector,
};
use tracing::debug;

use crate::errors::{
    CorrectionError,
    Result,
};
use crate::utils::convolve_truncated;

/// Build the M x (n + 1) correction matrix.
///
/// `mdv` is the natural-abundance mass distribution of the non-tracer
/// atoms, `tracer_abundance` the tracer element's natural abundance
/// vector, `purity` the tracer purity vector, `n_tracers` the tracer
/// atom count of the metabolite and `m_rows` the measurement length.
///
/// Every convolution is truncated to `m_rows` immediately: intensity
/// beyond the measurement window is unobservable and must not fold back
/// into lower mass fractions.
pub fn correction_matrix(
    mdv: &[f64],
    tracer_abundance: &[f64],
    purity: &[f64],
    n_tracers: usize,
    m_rows: usize,
    correct_na_tracer: bool,
) -> Result<DMatrix<f64>> {
    let max_tracer_shift = tracer_abundance.len() - 1;
    let min_rows = n_tracers * max_tracer_shift + 1;
    if m_rows < min_rows {
        return Err(CorrectionError::MeasurementTooShort {
            measured: m_rows,
            required: min_rows,
        });
    }
    let max_peaks = mdv.len() + n_tracers * max_tracer_shift;
    if m_rows > max_peaks {
        return Err(CorrectionError::FragmentTooSmall {
            measured: m_rows,
            max_peaks,
        });
    }

    let mut base = mdv[..mdv.len().min(m_rows)].to_vec();
    base.resize(m_rows, 0.0);

    let mut matrix = DMatrix::<f64>::zeros(m_rows, n_tracers + 1);
    for j in 0..=n_tracers {
        let mut column = base.clone();
        for _ in 0..j {
            column = convolve_truncated(&column, purity, m_rows);
        }
        if correct_na_tracer {
            for _ in 0..(n_tracers - j) {
                column = convolve_truncated(&column, tracer_abundance, m_rows);
            }
        }
        column.resize(m_rows, 0.0);
        matrix.set_column(j, &DVector::from_vec(column));
    }
    debug!(
        "Correction matrix assembled: {} x {} (correct_na_tracer: {})",
        m_rows,
        n_tracers + 1,
        correct_na_tracer,
    );
    Ok(matrix)
}
