//! Error accumulation for the semantic pipeline.
//!
//! Analysers keep traversing after an error so a single run surfaces many
//! diagnostics; the list is checked by the driver between phases. The cap
//! stops recording, never traversal.

use dusk_core::CompileError;

/// Compilation options carried by the assembly.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Maximum number of errors recorded per run.
    pub max_errors: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { max_errors: 100 }
    }
}

/// Accumulates semantic errors up to the configured cap.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<CompileError>,
    dropped: usize,
    max: usize,
}

impl ErrorList {
    /// Create a list with the given cap. Zero means unlimited.
    pub fn new(max: usize) -> Self {
        Self {
            errors: Vec::new(),
            dropped: 0,
            max,
        }
    }

    /// Record an error, dropping it silently past the cap.
    pub fn push(&mut self, error: CompileError) {
        if self.max > 0 && self.errors.len() >= self.max {
            self.dropped += 1;
            return;
        }
        self.errors.push(error);
    }

    /// Whether anything was recorded or dropped.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.dropped == 0
    }

    /// Total errors seen, including dropped ones.
    pub fn total(&self) -> usize {
        self.errors.len() + self.dropped
    }

    /// The recorded errors.
    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Drain the recorded errors.
    pub fn take(&mut self) -> Vec<CompileError> {
        self.dropped = 0;
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_stops_recording_not_counting() {
        let mut list = ErrorList::new(2);
        for _ in 0..5 {
            list.push(CompileError::Internal {
                message: "x".into(),
            });
        }
        assert_eq!(list.errors().len(), 2);
        assert_eq!(list.total(), 5);
        assert!(!list.is_empty());
    }

    #[test]
    fn zero_cap_is_unlimited() {
        let mut list = ErrorList::new(0);
        for _ in 0..5 {
            list.push(CompileError::Internal {
                message: "x".into(),
            });
        }
        assert_eq!(list.errors().len(), 5);
    }
}
