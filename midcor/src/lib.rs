//! midcor: correction of mass spectrometry measurements from isotope
//! labelling experiments.
//!
//! Raw isotopologue intensities measured by MS are biased by the
//! naturally occurring isotopes of every element in the molecule and by
//! the imperfect isotopic purity of the tracer substrate. This crate
//! removes both contributions: it builds a correction matrix from the
//! elemental formula, the isotope table and the tracer configuration,
//! fits the measured intensity vector against it with a non-negative
//! least-squares solver, and returns the corrected mass isotopologue
//! distribution together with the fit residuum and the mean isotopic
//! enrichment.
//!
//! The whole pipeline is a pure synchronous computation: no I/O, no
//! globals, no caches. The isotope table is immutable and can be shared
//! across threads; independent corrections can run in parallel.
//!
//! # Quick start
//!
//! ```
//! use midcor::models::{
//!     IsotopeTable,
//!     LabelledChemical,
//! };
//! use midcor::Corrector;
//!
//! let table = IsotopeTable::natural_abundance();
//! let chemical = LabelledChemical::new(
//!     "C3H4O3", // pyruvate
//!     "",       // no derivatization
//!     "C",
//!     None, // perfect tracer purity
//!     true, // correct the tracer's own natural abundance
//!     &table,
//! )
//! .unwrap();
//!
//! let corrector = Corrector::new(chemical, &table).unwrap();
//! let result = corrector.correct(&[1.2e6, 4.1e4, 3.5e3, 2.0e2]).unwrap();
//!
//! assert_eq!(result.isotopologue_fraction.len(), 4);
//! let total: f64 = result.isotopologue_fraction.iter().sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! ```

// Declare modules
pub mod correction;
pub mod errors;
pub mod models;
pub mod solver;
pub mod utils;

// Re-export main structures
pub use crate::correction::{
    correct,
    CorrectionResult,
    Corrector,
    Diagnostics,
};
pub use crate::errors::CorrectionError;
pub use crate::models::{
    ChemicalFormula,
    IsotopeTable,
    LabelledChemical,
};
pub use crate::solver::{
    CancelToken,
    NnlsConfig,
};
