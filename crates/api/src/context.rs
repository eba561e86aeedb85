//! Per-request context derived by middleware and extractors.

use std::net::SocketAddr;

use uuid::Uuid;

use foodscan_infra::CallerOrigin;

/// Correlation id assigned to every request (UUIDv7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Origin of a caller, taken from the TCP peer address.
pub fn caller_origin(peer: SocketAddr) -> CallerOrigin {
    CallerOrigin::new(peer.ip())
}
