use std::collections::BTreeMap;

use crate::errors::{
    CorrectionError,
    Result,
};
use crate::models::ChemicalFormula;
use crate::utils::fsum;

/// Tolerance on the sum of an abundance (or purity) vector.
///
/// The reference isotopic data are given with finite precision, so exact
/// equality against 1.0 is too brittle for f64 inputs.
pub const ABUNDANCE_SUM_TOLERANCE: f64 = 1e-9;

/// Read-only map from element symbol to its isotope abundance vector.
///
/// Each vector lists abundances in ascending mass-shift order, index i
/// being the i-th nominal mass-shift step from the lightest isotope.
/// Physically nonexistent intermediate masses are represented by 0.0
/// entries (e.g. mass 35 of sulfur). Vectors are validated once at
/// construction; a table handed to the correction pipeline is always
/// normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeTable {
    abundances: BTreeMap<String, Vec<f64>>,
}

impl IsotopeTable {
    pub fn new(abundances: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        for (element, abundance) in abundances.iter() {
            if abundance.is_empty() {
                return Err(CorrectionError::IsotopeTableInvalid {
                    element: element.clone(),
                    reason: "empty abundance vector".to_string(),
                });
            }
            for &value in abundance {
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(CorrectionError::IsotopeTableInvalid {
                        element: element.clone(),
                        reason: format!("abundance {} is not a probability", value),
                    });
                }
            }
            let sum = fsum(abundance);
            if (sum - 1.0).abs() > ABUNDANCE_SUM_TOLERANCE {
                return Err(CorrectionError::IsotopeTableInvalid {
                    element: element.clone(),
                    reason: format!("abundances sum to {} instead of 1", sum),
                });
            }
        }
        Ok(Self { abundances })
    }

    /// Natural isotope abundances for the elements of common metabolites
    /// and their derivatization agents.
    ///
    /// Values from: Isotopic Compositions of the Elements 2013,
    /// Pure Appl. Chem., 2016, Vol. 88, No. 3, pp. 293-306.
    pub fn natural_abundance() -> Self {
        let abundances = BTreeMap::from([
            ("C".to_string(), vec![0.9893, 0.0107]),
            ("H".to_string(), vec![0.999885, 0.000115]),
            ("N".to_string(), vec![0.99636, 0.00364]),
            ("O".to_string(), vec![0.99757, 0.00038, 0.00205]),
            ("P".to_string(), vec![1.0]),
            // Mass 35 does not occur in nature, hence the 0.0 gap entry.
            ("S".to_string(), vec![0.9499, 0.0075, 0.0425, 0.0, 0.0001]),
            ("Si".to_string(), vec![0.92223, 0.04685, 0.03092]),
        ]);
        Self::new(abundances).expect("reference isotopic data is normalized")
    }

    pub fn contains(&self, element: &str) -> bool {
        self.abundances.contains_key(element)
    }

    /// Abundance vector for an element.
    ///
    /// A missing element here means the table itself is unfit for the
    /// requested correction, which is distinct from an unknown symbol
    /// inside a user-supplied formula (see [`IsotopeTable::check_formula`]).
    pub fn abundance(&self, element: &str) -> Result<&[f64]> {
        self.abundances
            .get(element)
            .map(|v| v.as_slice())
            .ok_or_else(|| CorrectionError::IsotopeTableInvalid {
                element: element.to_string(),
                reason: "element missing from the isotope table".to_string(),
            })
    }

    /// Verify that every element of a parsed formula is known.
    pub fn check_formula(&self, formula: &ChemicalFormula) -> Result<()> {
        for element in formula.elements() {
            if !self.contains(element) {
                return Err(CorrectionError::UnknownElement {
                    element: element.to_string(),
                    formula: formula.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Maximum mass shift a single atom of `element` can contribute.
    pub fn max_shift(&self, element: &str) -> Result<usize> {
        Ok(self.abundance(element)?.len() - 1)
    }

    pub fn elements(&self) -> impl Iterator<Item = &str> {
        self.abundances.keys().map(|el| el.as_str())
    }
}
