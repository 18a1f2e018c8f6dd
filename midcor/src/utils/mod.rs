pub mod math;

pub use math::{
    convolve,
    convolve_truncated,
    fsum,
};
