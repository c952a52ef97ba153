use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::analysis::AnalysisError;

/// Cooperative cancellation for long-running analyses.
///
/// Clones share one flag. The engine polls it between gates and between
/// batches of probability terms, so a cancelled run stops at the next check
/// without the caller killing the thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every run holding a clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns [`AnalysisError::Cancelled`] once cancellation is requested.
    ///
    /// # Errors
    ///
    /// Fails if [`cancel`](Self::cancel) has been called on any clone.
    pub fn check(&self) -> Result<(), AnalysisError> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();

        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(AnalysisError::Cancelled));
    }
}
