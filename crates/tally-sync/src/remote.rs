// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port for the authoritative player service.
//!
//! The engine never implements this; transports live in other crates.
//! Failure reasons are opaque here: every error on a mutating call rolls back.

use crate::model::{Player, PlayerId, StatField, TempId};
use async_trait::async_trait;
use thiserror::Error;

/// Remote call failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The auth gate refused a mutating call.
    #[error("unauthorized")]
    Unauthorized,
    /// Non-success response.
    #[error("remote returned status {status}: {message}")]
    Status {
        /// HTTP-like status code.
        status: u16,
        /// Server-provided message, if any.
        message: String,
    },
    /// Network or connection failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// What the service answered to a create.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateAck {
    /// The created record itself.
    Echoed(Player),
    /// The full roster after the insert; the new record must be located by name.
    Roster(Vec<Player>),
}

/// Remote player service contract.
#[async_trait]
pub trait RemotePlayerService: Send + Sync {
    /// Fetch every player. Ordering is unspecified.
    async fn list(&self) -> Result<Vec<Player>, RemoteError>;
    /// Create a player. `correlation` is the provisional id the service may echo back.
    async fn create(&self, name: &str, correlation: TempId) -> Result<CreateAck, RemoteError>;
    /// Overwrite a player's balance.
    async fn update_balance(&self, id: &PlayerId, balance: f64) -> Result<(), RemoteError>;
    /// Add `delta` to a win/loss counter.
    async fn adjust_stat(&self, id: &PlayerId, field: StatField, delta: i64) -> Result<(), RemoteError>;
    /// Delete a player.
    async fn delete(&self, id: &PlayerId) -> Result<(), RemoteError>;
}
