use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::Track;

/// State carried from `/upload` to `/get_playlist` for one request flow:
/// the resolved image URL, the candidate tracks, and the caller's access
/// token. Keyed by a correlation token so concurrent uploads never share
/// state.
#[derive(Debug, Clone)]
pub struct Session {
    pub image_url: String,
    pub tracks: Vec<Track>,
    pub access_token: String,
    created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Store a new session and return its correlation token. Expired
    /// entries are purged on the same write lock.
    pub async fn insert(
        &self,
        image_url: String,
        tracks: Vec<Track>,
        access_token: String,
    ) -> Uuid {
        let token = Uuid::new_v4();
        let now = Utc::now();

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| now - s.created_at < self.ttl);
        sessions.insert(
            token,
            Session {
                image_url,
                tracks,
                access_token,
                created_at: now,
            },
        );

        tracing::debug!("Stored session {} ({} active)", token, sessions.len());
        token
    }

    /// Fetch a session by token; returns None when unknown or expired.
    pub async fn get(&self, token: &Uuid) -> Option<Session> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(token)?;

        if Utc::now() - session.created_at >= self.ttl {
            tracing::debug!("Session {} expired", token);
            return None;
        }

        Some(session.clone())
    }

    /// Remove a session once its playlist has been built.
    pub async fn remove(&self, token: &Uuid) {
        self.sessions.write().await.remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let store = SessionStore::new(600);
        let token = store
            .insert(
                "https://store/uploads/img1".to_string(),
                vec![Track::new("Holocene", "Bon Iver")],
                "tok_a".to_string(),
            )
            .await;

        let session = store.get(&token).await.unwrap();
        assert_eq!(session.image_url, "https://store/uploads/img1");
        assert_eq!(session.tracks.len(), 1);
        assert_eq!(session.access_token, "tok_a");
    }

    #[tokio::test]
    async fn test_unknown_token_is_none() {
        let store = SessionStore::new(600);
        assert!(store.get(&Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_expired_session_is_none() {
        let store = SessionStore::new(0);
        let token = store
            .insert("url".to_string(), vec![], "tok".to_string())
            .await;
        assert!(store.get(&token).await.is_none());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SessionStore::new(600);
        let a = store
            .insert(
                "https://store/uploads/a".to_string(),
                vec![Track::new("Song A", "Artist A")],
                "tok_a".to_string(),
            )
            .await;
        let b = store
            .insert(
                "https://store/uploads/b".to_string(),
                vec![Track::new("Song B", "Artist B")],
                "tok_b".to_string(),
            )
            .await;

        let sa = store.get(&a).await.unwrap();
        let sb = store.get(&b).await.unwrap();
        assert_eq!(sa.access_token, "tok_a");
        assert_eq!(sb.access_token, "tok_b");
        assert_eq!(sa.tracks[0].title, "Song A");
        assert_eq!(sb.tracks[0].title, "Song B");
    }
}
