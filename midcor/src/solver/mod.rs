mod nnls;

pub use nnls::{
    solve_nnls,
    NnlsConfig,
    NnlsSolution,
};

use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::sync::Arc;

/// Cooperative cancellation signal for long-running fits.
///
/// Cloning is cheap and shares the flag. The solver checks the token
/// between iterations; the owning side calls [`CancelToken::cancel`]
/// from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
