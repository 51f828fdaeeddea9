// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Player records and identifiers shared by every engine component.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reserved prefix carried by every locally generated identifier.
pub const TEMP_ID_PREFIX: &str = "temp-player-";

/// Errors raised while parsing or constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Identifier string was empty.
    #[error("identifier is empty")]
    Empty,
    /// A server identifier tried to use the reserved temp prefix.
    #[error("server id `{0}` uses the reserved `temp-player-` prefix")]
    ReservedPrefix(String),
    /// The temp prefix was present but the counter suffix was not a number.
    #[error("malformed temp id `{0}`")]
    MalformedTemp(String),
}

/// Opaque, stable identifier assigned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerId(String);

impl ServerId {
    /// Wrap a server-issued identifier. Rejects empty strings and the temp prefix.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        if raw.starts_with(TEMP_ID_PREFIX) {
            return Err(IdError::ReservedPrefix(raw));
        }
        Ok(Self(raw))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-local identifier for an entity the server has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TempId(u64);

impl TempId {
    pub(crate) const fn from_counter(n: u64) -> Self {
        Self(n)
    }

    /// Counter value this id was allocated from.
    pub const fn counter(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TEMP_ID_PREFIX}{}", self.0)
    }
}

/// Identity of a player: either server-assigned or a provisional temp id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PlayerId {
    /// Persisted identity.
    Server(ServerId),
    /// Provisional identity awaiting reconciliation.
    Temp(TempId),
}

impl PlayerId {
    /// Convenience constructor for server ids.
    pub fn server(raw: impl Into<String>) -> Result<Self, IdError> {
        ServerId::new(raw).map(Self::Server)
    }

    /// True when this id has not been confirmed by the server.
    pub const fn is_temp(&self) -> bool {
        matches!(self, Self::Temp(_))
    }

    /// The temp id, if provisional.
    pub const fn as_temp(&self) -> Option<TempId> {
        match self {
            Self::Temp(t) => Some(*t),
            Self::Server(_) => None,
        }
    }

    /// The server id, if persisted.
    pub const fn as_server(&self) -> Option<&ServerId> {
        match self {
            Self::Server(s) => Some(s),
            Self::Temp(_) => None,
        }
    }
}

impl From<TempId> for PlayerId {
    fn from(value: TempId) -> Self {
        Self::Temp(value)
    }
}

impl From<ServerId> for PlayerId {
    fn from(value: ServerId) -> Self {
        Self::Server(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(s) => s.fmt(f),
            Self::Temp(t) => t.fmt(f),
        }
    }
}

impl FromStr for PlayerId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(TEMP_ID_PREFIX) {
            Some(counter) => counter
                .parse::<u64>()
                .map(|n| Self::Temp(TempId(n)))
                .map_err(|_| IdError::MalformedTemp(s.to_string())),
            None => Self::server(s),
        }
    }
}

impl TryFrom<String> for PlayerId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlayerId> for String {
    fn from(value: PlayerId) -> Self {
        value.to_string()
    }
}

/// Win/loss counters that can be adjusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StatField {
    /// `wins` counter.
    #[serde(rename = "win")]
    Wins,
    /// `losses` counter.
    #[serde(rename = "loss")]
    Losses,
}

impl StatField {
    /// Human label used in notices.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Wins => "wins",
            Self::Losses => "losses",
        }
    }
}

/// Logical field a pending mutation targets; mutations on the same
/// `(PlayerId, Field)` pair are serialized against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    /// The `balance` value.
    Balance,
    /// A win/loss counter.
    Stat(StatField),
    /// The entity as a whole (create/delete).
    Entity,
}

/// A leaderboard entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Identity; the wire field may be spelled `id` or `_id`.
    #[serde(alias = "_id")]
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Current balance.
    #[serde(default)]
    pub balance: f64,
    /// Win count.
    #[serde(default)]
    pub wins: u32,
    /// Loss count.
    #[serde(default)]
    pub losses: u32,
}

impl Player {
    /// A zeroed provisional entry for a pending create.
    pub fn provisional(id: TempId, name: impl Into<String>) -> Self {
        Self {
            id: PlayerId::Temp(id),
            name: name.into(),
            balance: 0.0,
            wins: 0,
            losses: 0,
        }
    }

    /// Read a win/loss counter.
    pub const fn stat(&self, field: StatField) -> u32 {
        match field {
            StatField::Wins => self.wins,
            StatField::Losses => self.losses,
        }
    }

    /// Overwrite a win/loss counter.
    pub fn set_stat(&mut self, field: StatField, value: u32) {
        match field {
            StatField::Wins => self.wins = value,
            StatField::Losses => self.losses = value,
        }
    }
}
