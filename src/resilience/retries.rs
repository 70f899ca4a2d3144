//! Retry gating.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is retried, based on classifier output
//! - Refuse retries of protection rejections regardless of the classifier flag
//!
//! # Design Decisions
//! - Circuit-open and bulkhead rejections are never retried
//! - Timeouts are not retried
//! - Connection failures and backend overload are the only transient reasons

use crate::resilience::classifier::{CallOutcome, ErrorClassifier, ProtectionEvent};
use crate::transport::TransportError;

/// Retry predicate layered over `ErrorClassifier`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryDecisionPolicy {
    classifier: ErrorClassifier,
}

impl RetryDecisionPolicy {
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }

    /// Whether an already classified outcome should be retried.
    pub fn should_retry(&self, outcome: &CallOutcome) -> bool {
        // Checked even though the classifier already marks these non-retryable.
        if outcome.reason.is_protection() {
            return false;
        }
        outcome.retryable
    }

    /// Classify first, then decide.
    pub fn should_retry_error(
        &self,
        failure: Option<&TransportError>,
        hint: Option<ProtectionEvent>,
    ) -> bool {
        if failure.is_none() && hint.is_none() {
            return false;
        }
        self.should_retry(&self.classifier.classify(failure, hint))
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }
}
