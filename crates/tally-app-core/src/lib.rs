// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Tally tools (config, board prefs, toasts).
//! Keeps the board binary and the sync engine free of storage and UI details.

pub mod config;
pub mod prefs;
pub mod toast;
