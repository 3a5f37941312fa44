use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use moodlist::auth::{OAuthConfig, OAuthRelay};
use moodlist::server::{self, AppState};
use moodlist::session::SessionStore;
use moodlist::storage::HttpUploadStore;
use moodlist::vibe::{StructuredVibeProvider, TwoStageVibeProvider, VibeConfig, VibeProvider};
use moodlist::{music::HttpMusicProvider, storage::UploadStore};

#[derive(Parser)]
#[command(name = "moodlist")]
#[command(about = "Image-to-playlist backend", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Music provider client id
    #[arg(long, env = "MUSIC_CLIENT_ID")]
    client_id: String,

    /// Music provider client secret
    #[arg(long, env = "MUSIC_CLIENT_SECRET")]
    client_secret: String,

    /// Music provider web API base URL
    #[arg(long, env = "MUSIC_API_URL", default_value = "https://api.spotify.com/v1")]
    music_api_url: String,

    /// Music provider authorize endpoint
    #[arg(
        long,
        env = "MUSIC_AUTHORIZE_URL",
        default_value = "https://accounts.spotify.com/authorize"
    )]
    authorize_url: String,

    /// Music provider token endpoint
    #[arg(
        long,
        env = "MUSIC_TOKEN_URL",
        default_value = "https://accounts.spotify.com/api/token"
    )]
    token_url: String,

    /// OAuth redirect URI registered with the music provider
    #[arg(
        long,
        env = "REDIRECT_URI",
        default_value = "http://localhost:3000/callback"
    )]
    redirect_uri: String,

    /// Front-end origin the callback redirects back to
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    frontend_url: String,

    /// Object storage base URL uploads are served from
    #[arg(long, env = "STORAGE_URL")]
    storage_url: String,

    /// Inference provider API key
    #[arg(long, env = "INFERENCE_API_KEY")]
    inference_api_key: String,

    /// Chat-completions endpoint of the language model
    #[arg(
        long,
        env = "CHAT_ENDPOINT",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    chat_endpoint: String,

    /// Model used for vibe extraction
    #[arg(long, env = "VIBE_MODEL", default_value = "gpt-4o-mini")]
    vibe_model: String,

    /// Async image-classification endpoint (two-stage extraction only)
    #[arg(
        long,
        env = "CLASSIFY_ENDPOINT",
        default_value = "https://api.replicate.com/v1/predictions"
    )]
    classify_endpoint: String,

    /// Classification model version (two-stage extraction only)
    #[arg(long, env = "CLASSIFY_MODEL", default_value = "")]
    classify_model: String,

    /// Use the two-stage classify-then-complete vibe extraction
    #[arg(long)]
    two_stage_vibe: bool,

    /// Timeout per external HTTP call, in seconds
    #[arg(long, default_value = "30")]
    request_timeout_secs: u64,

    /// Overall deadline for the classification poll loop, in seconds
    #[arg(long, default_value = "120")]
    poll_timeout_secs: u64,

    /// How long an upload session stays valid, in seconds
    #[arg(long, default_value = "600")]
    session_ttl_secs: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodlist=debug,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.request_timeout_secs);

    tracing::info!("Starting Moodlist");
    tracing::info!("Music API: {}", cli.music_api_url);
    tracing::info!("Storage: {}", cli.storage_url);

    let oauth = OAuthRelay::new(
        OAuthConfig {
            client_id: cli.client_id,
            client_secret: cli.client_secret,
            authorize_endpoint: cli.authorize_url,
            token_endpoint: cli.token_url,
            redirect_uri: cli.redirect_uri,
            frontend_url: cli.frontend_url,
        },
        timeout,
    )
    .context("Failed to build OAuth relay")?;

    let storage: Arc<dyn UploadStore> = Arc::new(
        HttpUploadStore::new(cli.storage_url, timeout)
            .context("Failed to build storage client")?,
    );

    let vibe_config = VibeConfig {
        api_key: cli.inference_api_key,
        chat_endpoint: cli.chat_endpoint,
        model: cli.vibe_model,
        classify_endpoint: cli.classify_endpoint,
        classify_model: cli.classify_model,
        poll_timeout: Duration::from_secs(cli.poll_timeout_secs),
    };
    let vibe: Arc<dyn VibeProvider> = if cli.two_stage_vibe {
        tracing::info!("Using two-stage vibe extraction");
        Arc::new(
            TwoStageVibeProvider::new(vibe_config, timeout)
                .context("Failed to build vibe provider")?,
        )
    } else {
        Arc::new(
            StructuredVibeProvider::new(vibe_config, timeout)
                .context("Failed to build vibe provider")?,
        )
    };

    let music = Arc::new(
        HttpMusicProvider::new(cli.music_api_url, timeout)
            .context("Failed to build music provider client")?,
    );

    let state = AppState {
        oauth: Arc::new(oauth),
        storage,
        vibe,
        music,
        sessions: SessionStore::new(cli.session_ttl_secs),
    };

    let app = server::create_router(state);
    let addr = format!("0.0.0.0:{}", cli.port);

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API endpoints:");
    tracing::info!("  GET  /              - API info");
    tracing::info!("  GET  /login         - Redirect to provider consent screen");
    tracing::info!("  GET  /callback      - OAuth callback, redirects to front-end");
    tracing::info!("  POST /upload        - Analyze an uploaded image");
    tracing::info!("  GET  /get_playlist  - Build the playlist for a session");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
