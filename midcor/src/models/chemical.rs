use tracing::debug;

use crate::errors::{
    CorrectionError,
    Result,
};
use crate::models::{
    ChemicalFormula,
    IsotopeTable,
    ABUNDANCE_SUM_TOLERANCE,
};
use crate::utils::fsum;

/// A labelled chemical considered for isotope correction.
///
/// Bundles the metabolite moiety, the optional derivative moiety, the
/// tracer element and its purity vector, and the flag deciding whether
/// the tracer's own natural abundance is corrected. Construction
/// validates everything against the isotope table; a `LabelledChemical`
/// that exists is internally consistent.
///
/// The derivative moiety always contributes natural abundance for all of
/// its atoms, tracer element included: by definition a derivatization
/// agent is not labelled.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledChemical {
    formula: ChemicalFormula,
    derivative_formula: ChemicalFormula,
    tracer_element: String,
    tracer_purity: Vec<f64>,
    correct_na_tracer: bool,
}

impl LabelledChemical {
    /// Parse and validate a chemical from formula strings.
    ///
    /// `tracer_purity` set to `None` means perfect purity is assumed at
    /// the heaviest isotope of the tracer element.
    pub fn new(
        formula: &str,
        derivative_formula: &str,
        tracer_element: &str,
        tracer_purity: Option<Vec<f64>>,
        correct_na_tracer: bool,
        table: &IsotopeTable,
    ) -> Result<Self> {
        let formula = ChemicalFormula::parse(formula)?;
        let derivative_formula = ChemicalFormula::parse(derivative_formula)?;
        table.check_formula(&formula)?;
        table.check_formula(&derivative_formula)?;
        Self::from_parts(
            formula,
            derivative_formula,
            tracer_element,
            tracer_purity,
            correct_na_tracer,
            table,
        )
    }

    /// Validate already-parsed formulas.
    pub fn from_parts(
        formula: ChemicalFormula,
        derivative_formula: ChemicalFormula,
        tracer_element: &str,
        tracer_purity: Option<Vec<f64>>,
        correct_na_tracer: bool,
        table: &IsotopeTable,
    ) -> Result<Self> {
        if formula.count(tracer_element) == 0 {
            return Err(CorrectionError::TracerAbsent {
                tracer: tracer_element.to_string(),
                formula: formula.to_string(),
            });
        }
        let tracer_abundance = table.abundance(tracer_element)?;
        if tracer_abundance.len() < 2 {
            return Err(CorrectionError::IsotopeTableInvalid {
                element: tracer_element.to_string(),
                reason: "a tracer element needs at least two isotopes".to_string(),
            });
        }

        let tracer_purity = match tracer_purity {
            Some(purity) => {
                check_purity(&purity, tracer_abundance.len())?;
                purity
            }
            None => {
                let mut purity = vec![0.0; tracer_abundance.len()];
                *purity.last_mut().unwrap() = 1.0;
                purity
            }
        };

        let chemical = Self {
            formula,
            derivative_formula,
            tracer_element: tracer_element.to_string(),
            tracer_purity,
            correct_na_tracer,
        };
        debug!(
            "New labelled chemical {} (derivative: {}), tracer {}, purity {:?}, \
             correct_na_tracer: {}",
            chemical.formula,
            chemical.derivative_formula,
            chemical.tracer_element,
            chemical.tracer_purity,
            chemical.correct_na_tracer,
        );
        Ok(chemical)
    }

    pub fn formula(&self) -> &ChemicalFormula {
        &self.formula
    }

    pub fn derivative_formula(&self) -> &ChemicalFormula {
        &self.derivative_formula
    }

    pub fn tracer_element(&self) -> &str {
        &self.tracer_element
    }

    pub fn tracer_purity(&self) -> &[f64] {
        &self.tracer_purity
    }

    pub fn correct_na_tracer(&self) -> bool {
        self.correct_na_tracer
    }

    /// Number of tracer atoms in the metabolite moiety (n).
    ///
    /// The corrected isotopologue distribution has n + 1 entries.
    pub fn tracer_count(&self) -> usize {
        self.formula.count(&self.tracer_element) as usize
    }
}

fn check_purity(purity: &[f64], n_isotopes: usize) -> Result<()> {
    if purity.len() != n_isotopes {
        return Err(CorrectionError::PurityShapeMismatch {
            expected: n_isotopes,
            actual: purity.len(),
        });
    }
    let sum = fsum(purity);
    if purity
        .iter()
        .any(|&p| !p.is_finite() || !(0.0..=1.0).contains(&p))
        || (sum - 1.0).abs() > ABUNDANCE_SUM_TOLERANCE
    {
        return Err(CorrectionError::PuritySumInvalid { sum });
    }
    Ok(())
}
