//! Natural-abundance mass distribution vector (MDV) construction.
//!
//! The MDV is the probability distribution over integer mass-shift steps
//! induced by the naturally occurring isotopes of the non-tracer part of
//! the molecule. It is obtained by convolving the abundance vector of
//! every relevant atom, one convolution per atom (IsoCor, Millard et al.,
//! 2012), which is much faster than enumerating isotopic combinations.

use tracing::debug;

use crate::errors::Result;
use crate::models::{
    IsotopeTable,
    LabelledChemical,
};
use crate::utils::convolve;

/// Build the natural-abundance MDV for a labelled chemical.
///
/// Covers the non-tracer elements of the metabolite moiety and ALL
/// elements of the derivative moiety. The tracer element of the
/// metabolite is always left out here: its contribution is position
/// dependent and is mixed in column by column when the correction matrix
/// is assembled.
///
/// The result keeps its full length; truncation to the measurement
/// window happens during matrix construction.
pub fn natural_abundance_mdv(
    chemical: &LabelledChemical,
    table: &IsotopeTable,
) -> Result<Vec<f64>> {
    let mut mdv = vec![1.0];
    for (element, count) in chemical.formula().iter() {
        if element == chemical.tracer_element() {
            continue;
        }
        let abundance = table.abundance(element)?;
        for _ in 0..count {
            mdv = convolve(&mdv, abundance);
        }
    }
    for (element, count) in chemical.derivative_formula().iter() {
        let abundance = table.abundance(element)?;
        for _ in 0..count {
            mdv = convolve(&mdv, abundance);
        }
    }
    debug!(
        "Mass distribution vector for non-tracer atoms of {} ({} entries)",
        chemical.formula(),
        mdv.len(),
    );
    Ok(mdv)
}
