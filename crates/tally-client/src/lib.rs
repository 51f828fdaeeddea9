// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP implementation of the remote player service.
//!
//! Talks to the leaderboard REST API mounted at `<endpoint>/api/leaderboard`.
//! Reads are open; every mutating call carries the admin bearer token.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tally_sync::{CreateAck, Player, PlayerId, RemoteError, RemotePlayerService, StatField, TempId};
use thiserror::Error;
use tracing::debug;
use url::Url;

mod wire;

use wire::{AdjustStat, CreatePlayer, CreatedBody, ErrorBody, UpdateBalance};

/// Path of the leaderboard resource under the endpoint.
pub const LEADERBOARD_PATH: &str = "/api/leaderboard";

/// Client construction errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint is not a usable base URL.
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint {
        /// Endpoint as given.
        endpoint: String,
        /// Why it was refused.
        reason: String,
    },
}

/// Remote player service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPlayerService {
    resource: Url,
    client: Client,
    token: Option<String>,
}

impl HttpPlayerService {
    /// Client for the service at `endpoint` (scheme, host, optional path prefix).
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        let invalid = |reason: String| ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };
        let mut resource = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        if resource.cannot_be_a_base() || !matches!(resource.scheme(), "http" | "https") {
            return Err(invalid("expected an http(s) base URL".into()));
        }
        let path = format!("{}{LEADERBOARD_PATH}", resource.path().trim_end_matches('/'));
        resource.set_path(&path);
        resource.set_query(None);
        Ok(Self {
            resource,
            client: Client::new(),
            token: None,
        })
    }

    /// Attach the admin token sent with mutating calls.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use a preconfigured `reqwest` client (timeouts, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Full URL of the leaderboard resource.
    pub fn resource(&self) -> &Url {
        &self.resource
    }

    /// Check the configured token against the auth gate.
    ///
    /// Sends a create with an empty name: the gate answers 401 for a bad token,
    /// while a good token reaches the handler, which refuses the empty name.
    pub async fn verify_token(&self) -> Result<bool, RemoteError> {
        let body = CreatePlayer {
            name: "",
            correlation_id: None,
        };
        let response = self.send(self.authed(self.client.put(self.resource.clone())).json(&body)).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED => Ok(false),
            s if s.is_success() || s == StatusCode::BAD_REQUEST => Ok(true),
            _ => Err(status_error(response).await),
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        builder.send().await.map_err(|e| RemoteError::Transport(e.to_string()))
    }

    async fn call(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = self.send(builder).await?;
        let status = response.status();
        debug!(url = %response.url(), %status, "leaderboard response");
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    async fn mutate(&self, builder: RequestBuilder) -> Result<(), RemoteError> {
        if self.token.is_none() {
            debug!("no admin token configured; mutating call will likely be refused");
        }
        self.call(self.authed(builder)).await.map(drop)
    }
}

async fn status_error(response: Response) -> RemoteError {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return RemoteError::Unauthorized;
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or_default().to_string(),
    };
    RemoteError::Status {
        status: status.as_u16(),
        message,
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    response.json::<T>().await.map_err(|e| RemoteError::Decode(e.to_string()))
}

fn server_id(id: &PlayerId) -> Result<&str, RemoteError> {
    id.as_server().map(|s| s.as_str()).ok_or_else(|| RemoteError::Status {
        status: 400,
        message: format!("player `{id}` has no server id yet"),
    })
}

#[async_trait]
impl RemotePlayerService for HttpPlayerService {
    async fn list(&self) -> Result<Vec<Player>, RemoteError> {
        let response = self.call(self.client.get(self.resource.clone())).await?;
        decode(response).await
    }

    async fn create(&self, name: &str, correlation: TempId) -> Result<CreateAck, RemoteError> {
        let body = CreatePlayer {
            name,
            correlation_id: Some(correlation.to_string()),
        };
        let response = self
            .call(self.authed(self.client.put(self.resource.clone())).json(&body))
            .await?;
        decode::<CreatedBody>(response).await.map(CreateAck::from)
    }

    async fn update_balance(&self, id: &PlayerId, balance: f64) -> Result<(), RemoteError> {
        let body = UpdateBalance {
            player_id: server_id(id)?,
            new_balance: balance,
        };
        self.mutate(self.client.post(self.resource.clone()).json(&body)).await
    }

    async fn adjust_stat(&self, id: &PlayerId, field: StatField, delta: i64) -> Result<(), RemoteError> {
        let body = AdjustStat {
            player_id: server_id(id)?,
            field,
            delta,
        };
        self.mutate(self.client.patch(self.resource.clone()).json(&body)).await
    }

    async fn delete(&self, id: &PlayerId) -> Result<(), RemoteError> {
        let mut url = self.resource.clone();
        url.query_pairs_mut().append_pair("id", server_id(id)?);
        self.mutate(self.client.delete(url)).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn resource_path_keeps_prefixes() {
        let plain = HttpPlayerService::new("http://127.0.0.1:3000").unwrap();
        assert_eq!(plain.resource().as_str(), "http://127.0.0.1:3000/api/leaderboard");
        let prefixed = HttpPlayerService::new("https://example.test/board/").unwrap();
        assert_eq!(prefixed.resource().as_str(), "https://example.test/board/api/leaderboard");
    }

    #[test]
    fn non_http_endpoints_are_refused() {
        assert!(HttpPlayerService::new("ftp://example.test").is_err());
        assert!(HttpPlayerService::new("not a url").is_err());
    }
}
