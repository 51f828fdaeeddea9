// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request and response bodies of the leaderboard API.

use serde::{Deserialize, Serialize};
use tally_sync::{CreateAck, Player, StatField};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateBalance<'a> {
    pub player_id: &'a str,
    pub new_balance: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreatePlayer<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdjustStat<'a> {
    pub player_id: &'a str,
    #[serde(rename = "type")]
    pub field: StatField,
    pub delta: i64,
}

/// Error payload: `{"error": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// A create answers with either the full roster or the new record.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum CreatedBody {
    Roster(Vec<Player>),
    Record(Player),
}

impl From<CreatedBody> for CreateAck {
    fn from(body: CreatedBody) -> Self {
        match body {
            CreatedBody::Roster(players) => Self::Roster(players),
            CreatedBody::Record(player) => Self::Echoed(player),
        }
    }
}
