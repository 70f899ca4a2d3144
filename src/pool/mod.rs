//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! ResilientCaller construction
//!     → ConnectionPool::connect (one transport per slot, each with its own keepalive)
//! Per logical call
//!     → round_robin.rs (atomic cursor modulo pool size)
//!     → connection.rs (slot handle, delegates to the transport)
//! Shutdown
//!     → ConnectionPool::close (every slot released)
//! ```
//!
//! # Design Decisions
//! - Slots share no connection state; each one reconnects on its own
//! - Losing one connection affects only 1/size of the traffic
//! - Selection takes no part in any resilience decision

pub mod connection;
pub mod round_robin;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;

use crate::config::PoolConfig;
use crate::pool::connection::ConnectionHandle;
use crate::pool::round_robin::RoundRobin;
use crate::transport::http::HttpChannel;
use crate::transport::{Transport, TransportError};

/// Fixed set of independent connections selected round-robin.
#[derive(Debug)]
pub struct ConnectionPool {
    connections: Vec<Arc<ConnectionHandle>>,
    selector: RoundRobin,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Build a pool from already constructed transports.
    pub fn new(transports: Vec<Arc<dyn Transport>>) -> Result<Self, TransportError> {
        if transports.is_empty() {
            return Err(TransportError::Connect(
                "connection pool needs at least one connection".to_string(),
            ));
        }
        let connections = transports
            .into_iter()
            .enumerate()
            .map(|(slot, transport)| Arc::new(ConnectionHandle::new(slot, transport)))
            .collect();
        Ok(Self {
            connections,
            selector: RoundRobin::new(),
            closed: AtomicBool::new(false),
        })
    }

    /// Build `size` connections with `connector`, called once per slot.
    pub fn connect<F>(size: usize, mut connector: F) -> Result<Self, TransportError>
    where
        F: FnMut(usize) -> Result<Arc<dyn Transport>, TransportError>,
    {
        let transports = (0..size)
            .map(&mut connector)
            .collect::<Result<Vec<_>, _>>()?;
        let pool = Self::new(transports)?;
        tracing::info!(size = pool.len(), "Connection pool ready");
        Ok(pool)
    }

    /// Pool of HTTP/2 channels to `target`, configured with keepalive.
    pub fn http(target: &Url, config: &PoolConfig) -> Result<Self, TransportError> {
        Self::connect(config.size, |slot| {
            let channel = HttpChannel::connect(target, config, slot)?;
            Ok(Arc::new(channel) as Arc<dyn Transport>)
        })
    }

    /// Next connection in round-robin order.
    pub fn select(&self) -> Arc<ConnectionHandle> {
        // `new` guarantees at least one connection.
        let index = self.selector.next_index(self.connections.len()).unwrap_or(0);
        let connection = Arc::clone(&self.connections[index]);
        connection.mark_selected();
        connection
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn connections(&self) -> &[Arc<ConnectionHandle>] {
        &self.connections
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Release every connection. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for connection in &self.connections {
            connection.close().await;
        }
        tracing::info!(size = self.len(), "Connection pool closed");
    }
}
