//! Per-call request context.

use std::time::Duration;

/// Identity and deadline of one logical call, shared by all of its attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    /// Per-attempt deadline; `None` when the deadline layer is disabled.
    pub deadline: Option<Duration>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, deadline: Option<Duration>) -> Self {
        Self {
            request_id: request_id.into(),
            deadline,
        }
    }
}
