//! The image-to-playlist pipeline stages that run against the music
//! provider: resolving candidate tracks to provider ids, then assembling
//! the playlist from the resolved seeds.

use futures::StreamExt;

use crate::error::{AppError, Result};
use crate::models::{PlaylistResult, SEED_LIMIT, Track};
use crate::music::MusicProvider;

/// Upper bound on in-flight search calls during track resolution.
const RESOLVE_CONCURRENCY: usize = 4;

/// Resolve each candidate track to a provider-native id via search.
///
/// Searches run concurrently (bounded), but results come back in input
/// order, not completion order. A track whose search returns nothing, or
/// fails, keeps a `None` id; partial resolution is not an error. When no
/// track resolved at all and at least one search failed, the provider
/// error is returned instead of a silently empty seed set, so an expired
/// token or a provider outage surfaces as itself.
pub async fn resolve_tracks(
    provider: &dyn MusicProvider,
    tracks: Vec<Track>,
    token: &str,
) -> Result<Vec<Track>> {
    let results: Vec<(Track, Option<AppError>)> = futures::stream::iter(tracks)
        .map(|mut track| async move {
            match provider
                .search_track(&track.title, &track.artist, token)
                .await
            {
                Ok(Some(hit)) => {
                    track.provider_track_id = Some(hit.track_id);
                    track.provider_artist_id = hit.artist_id;
                    (track, None)
                }
                Ok(None) => {
                    tracing::debug!(
                        "No search result for '{}' by '{}', skipping",
                        track.title,
                        track.artist
                    );
                    (track, None)
                }
                Err(e) => {
                    tracing::warn!(
                        "Search failed for '{}' by '{}': {}",
                        track.title,
                        track.artist,
                        e
                    );
                    (track, Some(e))
                }
            }
        })
        .buffered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    let mut last_error = None;
    let resolved: Vec<Track> = results
        .into_iter()
        .map(|(track, error)| {
            if let Some(e) = error {
                last_error = Some(e);
            }
            track
        })
        .collect();

    let count = resolved.iter().filter(|t| t.is_resolved()).count();
    if count == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    tracing::info!("Resolved {}/{} candidate tracks", count, resolved.len());
    Ok(resolved)
}

/// Build the playlist from the resolved tracks: recommend from at most
/// five seeds, create a playlist for the authenticated user, and fill it
/// with the recommended tracks in recommendation order.
pub async fn build_playlist(
    provider: &dyn MusicProvider,
    tracks: &[Track],
    token: &str,
    fallback_cover_url: &str,
) -> Result<PlaylistResult> {
    let seeds: Vec<String> = tracks
        .iter()
        .filter_map(|t| t.provider_track_id.clone())
        .take(SEED_LIMIT)
        .collect();

    if seeds.is_empty() {
        return Err(AppError::NoSeedTracks);
    }
    tracing::debug!("Requesting recommendations from {} seeds", seeds.len());

    let recommended = provider.recommendations(&seeds, token).await?;
    let user_id = provider.current_user(token).await?;

    let name = format!("{}'s playlist", user_id);
    let playlist_id = provider.create_playlist(&user_id, &name, token).await?;
    tracing::info!("Created playlist {} for user {}", playlist_id, user_id);

    if !recommended.is_empty() {
        provider.add_tracks(&playlist_id, &recommended, token).await?;
    }

    // One source variant echoed the uploaded image back as the cover; keep
    // that as the fallback when the provider has no cover yet.
    let cover_image_url = provider
        .playlist_cover(&playlist_id, token)
        .await?
        .unwrap_or_else(|| fallback_cover_url.to_string());

    Ok(PlaylistResult {
        playlist_id,
        cover_image_url,
        owner_id: user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::SearchHit;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Provider stub that resolves only titles it knows, errors on titles
    /// listed as failing, and records the seed list it was asked to
    /// recommend from.
    struct StubProvider {
        known: Vec<(&'static str, &'static str)>,
        failing: Vec<&'static str>,
        seen_seeds: Mutex<Option<Vec<String>>>,
        cover: Option<String>,
    }

    impl StubProvider {
        fn new(known: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                known,
                failing: Vec::new(),
                seen_seeds: Mutex::new(None),
                cover: Some("https://provider/cover.jpg".to_string()),
            }
        }
    }

    #[async_trait]
    impl MusicProvider for StubProvider {
        async fn search_track(
            &self,
            title: &str,
            _artist: &str,
            _token: &str,
        ) -> crate::error::Result<Option<SearchHit>> {
            if self.failing.contains(&title) {
                return Err(AppError::ProviderApi(
                    "search returned 401: expired token".to_string(),
                ));
            }
            Ok(self
                .known
                .iter()
                .find(|(t, _)| *t == title)
                .map(|(_, id)| SearchHit {
                    track_id: id.to_string(),
                    artist_id: None,
                }))
        }

        async fn recommendations(
            &self,
            seed_ids: &[String],
            _token: &str,
        ) -> crate::error::Result<Vec<String>> {
            *self.seen_seeds.lock().unwrap() = Some(seed_ids.to_vec());
            Ok(vec!["rec_1".to_string(), "rec_2".to_string()])
        }

        async fn current_user(&self, _token: &str) -> crate::error::Result<String> {
            Ok("user_42".to_string())
        }

        async fn create_playlist(
            &self,
            user_id: &str,
            name: &str,
            _token: &str,
        ) -> crate::error::Result<String> {
            assert_eq!(name, format!("{}'s playlist", user_id));
            Ok("pl_123".to_string())
        }

        async fn add_tracks(
            &self,
            _playlist_id: &str,
            _track_ids: &[String],
            _token: &str,
        ) -> crate::error::Result<()> {
            Ok(())
        }

        async fn playlist_cover(
            &self,
            _playlist_id: &str,
            _token: &str,
        ) -> crate::error::Result<Option<String>> {
            Ok(self.cover.clone())
        }
    }

    #[tokio::test]
    async fn test_resolve_keeps_order_and_skips_unknown() {
        let provider = StubProvider::new(vec![("Holocene", "id_1"), ("Motion Sickness", "id_3")]);
        let tracks = vec![
            Track::new("Holocene", "Bon Iver"),
            Track::new("Unknown Song", "Nobody"),
            Track::new("Motion Sickness", "Phoebe Bridgers"),
        ];

        let resolved = resolve_tracks(&provider, tracks, "tok").await.unwrap();

        assert_eq!(resolved.len(), 3);
        assert_eq!(resolved[0].provider_track_id.as_deref(), Some("id_1"));
        assert_eq!(resolved[1].provider_track_id, None);
        assert_eq!(resolved[2].provider_track_id.as_deref(), Some("id_3"));
        // Input order survives the concurrent fan-out.
        assert_eq!(resolved[0].title, "Holocene");
        assert_eq!(resolved[2].title, "Motion Sickness");
    }

    #[tokio::test]
    async fn test_all_searches_failing_surfaces_provider_error() {
        let mut provider = StubProvider::new(vec![]);
        provider.failing = vec!["Holocene", "About Today"];
        let tracks = vec![
            Track::new("Holocene", "Bon Iver"),
            Track::new("About Today", "The National"),
        ];

        // An expired token fails every search; that must come back as the
        // provider failure, not an empty seed set.
        let err = resolve_tracks(&provider, tracks, "tok").await.unwrap_err();
        assert!(matches!(err, AppError::ProviderApi(_)));
    }

    #[tokio::test]
    async fn test_partial_search_failure_still_degrades() {
        let mut provider = StubProvider::new(vec![("Holocene", "id_1")]);
        provider.failing = vec!["About Today"];
        let tracks = vec![
            Track::new("Holocene", "Bon Iver"),
            Track::new("About Today", "The National"),
        ];

        let resolved = resolve_tracks(&provider, tracks, "tok").await.unwrap();
        assert_eq!(resolved[0].provider_track_id.as_deref(), Some("id_1"));
        assert_eq!(resolved[1].provider_track_id, None);
    }

    #[tokio::test]
    async fn test_empty_results_without_errors_is_not_a_provider_error() {
        let provider = StubProvider::new(vec![]);
        let tracks = vec![Track::new("Unknown", "Nobody")];

        // Nothing resolved, but no search failed either; the empty-seeds
        // guard in build_playlist owns this case.
        let resolved = resolve_tracks(&provider, tracks, "tok").await.unwrap();
        assert!(resolved.iter().all(|t| !t.is_resolved()));
    }

    #[tokio::test]
    async fn test_build_playlist_caps_seeds_at_five() {
        let known: Vec<(&str, &str)> = vec![
            ("t0", "s0"),
            ("t1", "s1"),
            ("t2", "s2"),
            ("t3", "s3"),
            ("t4", "s4"),
            ("t5", "s5"),
            ("t6", "s6"),
        ];
        let provider = StubProvider::new(known.clone());

        let tracks: Vec<Track> = known
            .iter()
            .map(|(t, id)| {
                let mut track = Track::new(*t, "artist");
                track.provider_track_id = Some(id.to_string());
                track
            })
            .collect();

        let result = build_playlist(&provider, &tracks, "tok", "https://store/uploads/img1")
            .await
            .unwrap();

        let seeds = provider.seen_seeds.lock().unwrap().clone().unwrap();
        assert_eq!(seeds, vec!["s0", "s1", "s2", "s3", "s4"]);
        assert_eq!(result.playlist_id, "pl_123");
        assert_eq!(result.owner_id, "user_42");
    }

    #[tokio::test]
    async fn test_build_playlist_fails_without_seeds() {
        let provider = StubProvider::new(vec![]);
        let tracks = vec![Track::new("Unknown", "Nobody")];

        let err = build_playlist(&provider, &tracks, "tok", "fallback")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoSeedTracks));
        // No recommendation call was made before the guard tripped.
        assert!(provider.seen_seeds.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cover_falls_back_to_uploaded_image() {
        let mut provider = StubProvider::new(vec![("t", "s")]);
        provider.cover = None;

        let mut track = Track::new("t", "a");
        track.provider_track_id = Some("s".to_string());

        let result = build_playlist(&provider, &[track], "tok", "https://store/uploads/img1")
            .await
            .unwrap();
        assert_eq!(result.cover_image_url, "https://store/uploads/img1");
    }
}
