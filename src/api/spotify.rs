use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SpotifyCredentials;
use crate::error::BotError;
use crate::gateway::ContentGateway;
use crate::models::{ContentItem, Playlist};
use crate::Result;

/// Client for the Spotify Web API, authenticated with an already-issued bearer token
#[derive(Clone)]
pub struct SpotifyClient {
    client: Client,
    api_base: String,
    access_token: String,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct UserRaw {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<TrackRaw>>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TrackRaw {
    name: String,
    uri: String,
    #[serde(default)]
    artists: Vec<ArtistRaw>,
}

#[derive(Debug, Deserialize)]
struct ArtistRaw {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistRaw {
    id: String,
    name: String,
    #[serde(default)]
    external_urls: Option<ExternalUrls>,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatePlaylist<'a> {
    name: &'a str,
    public: bool,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct AddTracks<'a> {
    uris: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl From<TrackRaw> for ContentItem {
    fn from(raw: TrackRaw) -> Self {
        ContentItem {
            name: raw.name,
            uri: raw.uri,
            artist: raw.artists.into_iter().next().map(|a| a.name),
        }
    }
}

impl From<PlaylistRaw> for Playlist {
    fn from(raw: PlaylistRaw) -> Self {
        Playlist {
            id: raw.id,
            name: raw.name,
            url: raw.external_urls.and_then(|u| u.spotify),
        }
    }
}

// ============== Implementation ==============

const PLAYLIST_DESCRIPTION: &str = "Generated from the mood of today's stock moves";

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::StartupFailure(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            api_base: credentials.api_base.trim_end_matches('/').to_string(),
            access_token: credentials.access_token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| BotError::upstream(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            return Err(BotError::upstream(
                operation,
                format!("HTTP {}: {}", status, message),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BotError::upstream(operation, format!("malformed response: {}", e)))
    }
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => envelope.error.message,
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl ContentGateway for SpotifyClient {
    /// Endpoint: GET /me
    async fn current_user_id(&self) -> Result<String> {
        let user: UserRaw = self
            .call("user lookup", self.client.get(self.url("/me")))
            .await?;
        Ok(user.id)
    }

    /// Endpoint: GET /search?q=genre:{label}&type=track&limit={limit}
    async fn search_by_category(&self, label: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let request = self.client.get(self.url("/search")).query(&[
            ("q", format!("genre:{}", label)),
            ("type", "track".to_string()),
            ("limit", limit.to_string()),
        ]);
        let response: SearchResponse = self.call("content search", request).await?;

        let items: Vec<ContentItem> = response
            .tracks
            .map(|page| page.items)
            .unwrap_or_default()
            .into_iter()
            .map(ContentItem::from)
            .collect();

        if items.is_empty() {
            return Err(BotError::NoResults(label.to_string()));
        }
        Ok(items)
    }

    /// Endpoint: POST /users/{owner}/playlists
    async fn create_playlist(&self, owner_id: &str, name: &str) -> Result<Playlist> {
        let body = CreatePlaylist {
            name,
            public: true,
            description: PLAYLIST_DESCRIPTION,
        };
        let request = self
            .client
            .post(self.url(&format!("/users/{}/playlists", owner_id)))
            .json(&body);

        let raw: PlaylistRaw = self.call("playlist creation", request).await?;
        Ok(raw.into())
    }

    /// Endpoint: POST /playlists/{id}/tracks
    async fn add_items(&self, playlist_id: &str, item_refs: &[String]) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/playlists/{}/tracks", playlist_id)))
            .json(&AddTracks { uris: item_refs });

        let _: serde_json::Value = self.call("playlist update", request).await?;
        Ok(())
    }
}
