//! Music-streaming provider client: track search, recommendations, and
//! playlist creation against the provider's web API, authenticated with
//! the access token relayed from the OAuth flow.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Provider-native ids for a search hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub track_id: String,
    pub artist_id: Option<String>,
}

#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Search for one track by title and artist. `None` means no results,
    /// never an error.
    async fn search_track(&self, title: &str, artist: &str, token: &str)
    -> Result<Option<SearchHit>>;

    /// Track ids recommended from the given seed track ids, in the order
    /// the provider returns them.
    async fn recommendations(&self, seed_ids: &[String], token: &str) -> Result<Vec<String>>;

    /// Id of the user the token belongs to.
    async fn current_user(&self, token: &str) -> Result<String>;

    /// Create a playlist owned by `user_id`, returning its id.
    async fn create_playlist(&self, user_id: &str, name: &str, token: &str) -> Result<String>;

    /// Append tracks to a playlist in the given order.
    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String], token: &str)
    -> Result<()>;

    /// Cover image URL of a playlist, if the provider has generated one.
    async fn playlist_cover(&self, playlist_id: &str, token: &str) -> Result<Option<String>>;
}

/// Builds the provider search query for a candidate track.
pub fn search_query(title: &str, artist: &str) -> String {
    urlencoding::encode(&format!("track:{} artist:{}", title, artist)).into_owned()
}

// ========== HTTP IMPLEMENTATION ==========

pub struct HttpMusicProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    id: String,
    #[serde(default)]
    artists: Vec<IdObject>,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    tracks: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct ImageObject {
    url: String,
}

impl HttpMusicProvider {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moodlist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        let response = self.client.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderApi(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderApi(format!(
                "POST {} returned {}: {}",
                url, status, body
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MusicProvider for HttpMusicProvider {
    async fn search_track(
        &self,
        title: &str,
        artist: &str,
        token: &str,
    ) -> Result<Option<SearchHit>> {
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            self.base_url,
            search_query(title, artist)
        );
        tracing::debug!("Searching track '{}' by '{}'", title, artist);

        let response: SearchResponse = self.get_json(&url, token).await?;

        Ok(response.tracks.items.into_iter().next().map(|item| {
            SearchHit {
                track_id: item.id,
                artist_id: item.artists.into_iter().next().map(|a| a.id),
            }
        }))
    }

    async fn recommendations(&self, seed_ids: &[String], token: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/recommendations?seed_tracks={}",
            self.base_url,
            seed_ids.join(",")
        );
        tracing::debug!("Fetching recommendations for {} seeds", seed_ids.len());

        let response: RecommendationsResponse = self.get_json(&url, token).await?;
        Ok(response.tracks.into_iter().map(|t| t.id).collect())
    }

    async fn current_user(&self, token: &str) -> Result<String> {
        let url = format!("{}/me", self.base_url);
        let user: IdObject = self.get_json(&url, token).await?;
        Ok(user.id)
    }

    async fn create_playlist(&self, user_id: &str, name: &str, token: &str) -> Result<String> {
        let url = format!("{}/users/{}/playlists", self.base_url, user_id);
        tracing::debug!("Creating playlist '{}' for user {}", name, user_id);

        let playlist: IdObject = self
            .post_json(&url, token, json!({ "name": name }))
            .await?;
        Ok(playlist.id)
    }

    async fn add_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        token: &str,
    ) -> Result<()> {
        let url = format!("{}/playlists/{}/tracks", self.base_url, playlist_id);
        tracing::debug!(
            "Adding {} tracks to playlist {}",
            track_ids.len(),
            playlist_id
        );

        let _: serde_json::Value = self
            .post_json(&url, token, json!({ "ids": track_ids }))
            .await?;
        Ok(())
    }

    async fn playlist_cover(&self, playlist_id: &str, token: &str) -> Result<Option<String>> {
        let url = format!("{}/playlists/{}/images", self.base_url, playlist_id);
        let images: Vec<ImageObject> = self.get_json(&url, token).await?;
        Ok(images.into_iter().next().map(|i| i.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_shape() {
        let q = search_query("Karma Police", "Radiohead");
        assert_eq!(q, "track%3AKarma%20Police%20artist%3ARadiohead");
    }

    #[test]
    fn test_search_query_escapes_specials() {
        let q = search_query("Don't Stop", "AC/DC");
        assert!(!q.contains('/'));
        assert!(!q.contains(' '));
        assert!(q.starts_with("track%3A"));
    }
}
