//! Pooled connection handle.
//!
//! # Responsibilities
//! - Wrap one independent transport connection with its pool slot
//! - Count how many calls were routed to the slot

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::caller::RequestContext;
use crate::transport::{Transport, TransportError, WorkReply};

/// One slot of the connection pool.
pub struct ConnectionHandle {
    slot: usize,
    transport: Arc<dyn Transport>,
    selections: AtomicU64,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("slot", &self.slot)
            .field("selections", &self.selections())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn new(slot: usize, transport: Arc<dyn Transport>) -> Self {
        Self {
            slot,
            transport,
            selections: AtomicU64::new(0),
        }
    }

    /// Position of this connection in the pool.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of logical calls routed to this connection.
    pub fn selections(&self) -> u64 {
        self.selections.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_selected(&self) {
        self.selections.fetch_add(1, Ordering::Relaxed);
    }

    /// Perform one attempt over this connection.
    pub async fn invoke(&self, ctx: &RequestContext) -> Result<WorkReply, TransportError> {
        self.transport.invoke(ctx).await
    }

    pub(crate) async fn close(&self) {
        self.transport.close().await;
    }
}
