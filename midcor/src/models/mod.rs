mod chemical;
mod formula;
mod isotopes;

pub use chemical::LabelledChemical;
pub use formula::ChemicalFormula;
pub use isotopes::{
    IsotopeTable,
    ABUNDANCE_SUM_TOLERANCE,
};
