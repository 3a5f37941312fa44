use serde::{Deserialize, Serialize};

/// Number of candidate tracks requested from vibe extraction, and the
/// maximum number of seeds fed into the recommendation endpoint.
pub const SEED_LIMIT: usize = 5;

/// A candidate track suggested for the image's mood.
///
/// Created by vibe extraction with only title and artist; track resolution
/// fills `provider_track_id` when the music provider's search finds a match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    /// Provider-native track id, None until resolved (and staying None when
    /// the search comes back empty).
    pub provider_track_id: Option<String>,
    pub provider_artist_id: Option<String>,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            provider_track_id: None,
            provider_artist_id: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.provider_track_id.is_some()
    }
}

/// Result of vibe extraction: a free-text mood label plus candidate tracks.
/// Produced once per upload and immutable afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub description: String,
    pub sample_tracks: Vec<Track>,
}

/// Metadata of the playlist created at the end of the pipeline. The music
/// provider owns the playlist itself; nothing is persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistResult {
    pub playlist_id: String,
    pub cover_image_url: String,
    pub owner_id: String,
}
