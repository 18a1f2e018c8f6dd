mod corrector;
mod matrix;
mod mdv;

pub use corrector::{
    correct,
    CorrectionResult,
    Corrector,
    Diagnostics,
};
pub use matrix::correction_matrix;
pub use mdv::natural_abundance_mdv;
