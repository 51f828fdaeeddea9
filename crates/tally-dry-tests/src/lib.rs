// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Tally crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`fixtures`] - Player, roster, and store builders
//! - [`remote`] - Scripted remote player service and a recording notice sink

pub mod config;
pub mod fixtures;
pub mod remote;

pub use config::InMemoryConfigStore;
pub use fixtures::{player, player_with_stats, sample_roster, sid, store_with};
pub use remote::{Gate, RecordingSink, RemoteCall, Reply, ScriptedPlayerService};
