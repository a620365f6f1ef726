//! Shared response envelope types for API handlers.
//!
//! Collection endpoints use a `{ "data": ... }` envelope. The submit and poll
//! endpoints return their payloads bare, matching the client protocol.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
