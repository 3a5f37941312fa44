//! Vibe extraction: turn an image URL into a mood description plus
//! candidate tracks via an external inference provider.
//!
//! Two provider shapes exist. The structured single-call provider asks a
//! multimodal model for the description and tracks in one request and is
//! the production default. The two-stage provider submits an async
//! image-classification job, polls it to completion (bounded backoff, hard
//! deadline), then asks a text-only model to turn the label into tracks.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::{Analysis, SEED_LIMIT, Track};

const DESCRIBE_INSTRUCTION: &str = "Look at this image and produce a short, comma-separated \
set of mood descriptors for it, plus exactly 5 song recommendations that fit that mood. \
Respond with a single JSON object: {\"description\": \"<descriptors>\", \"sample_tracks\": \
[{\"artist\": \"<artist>\", \"track\": \"<title>\"}]}.";

const LABEL_INSTRUCTION: &str = "An image was classified with the label given below. Produce \
a short, comma-separated set of mood descriptors matching it, plus exactly 5 song \
recommendations that fit that mood. Respond with a single JSON object: {\"description\": \
\"<descriptors>\", \"sample_tracks\": [{\"artist\": \"<artist>\", \"track\": \"<title>\"}]}.";

#[derive(Debug, Clone)]
pub struct VibeConfig {
    pub api_key: String,
    /// Chat-completions style endpoint of the language model.
    pub chat_endpoint: String,
    pub model: String,
    /// Async image-classification endpoint (two-stage provider only).
    pub classify_endpoint: String,
    pub classify_model: String,
    /// Hard deadline for the classification poll loop.
    pub poll_timeout: Duration,
}

#[async_trait]
pub trait VibeProvider: Send + Sync {
    /// Describe the mood of the image and suggest candidate tracks.
    async fn describe_image(&self, image_url: &str) -> Result<Analysis>;
}

/// The JSON object the model is instructed to return.
#[derive(Debug, Deserialize)]
struct VibePayload {
    description: String,
    sample_tracks: Vec<SampleTrack>,
}

#[derive(Debug, Deserialize)]
struct SampleTrack {
    artist: String,
    track: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

fn parse_payload(content: &str) -> Result<Analysis> {
    let payload: VibePayload = serde_json::from_str(content)
        .map_err(|e| AppError::Inference(format!("malformed model output: {}", e)))?;

    if payload.description.trim().is_empty() {
        return Err(AppError::Inference("empty description".to_string()));
    }

    let sample_tracks = payload
        .sample_tracks
        .into_iter()
        .take(SEED_LIMIT)
        .map(|t| Track::new(t.track, t.artist))
        .collect();

    Ok(Analysis {
        description: payload.description,
        sample_tracks,
    })
}

/// Shared chat-completion call used by both provider shapes.
async fn chat_completion(
    client: &reqwest::Client,
    config: &VibeConfig,
    content: serde_json::Value,
) -> Result<Analysis> {
    let body = json!({
        "model": config.model,
        "response_format": { "type": "json_object" },
        "messages": [{ "role": "user", "content": content }],
    });

    let response = client
        .post(&config.chat_endpoint)
        .bearer_auth(&config.api_key)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::Inference(format!(
            "model endpoint returned {}: {}",
            status, body
        )));
    }

    let chat: ChatResponse = response.json().await?;
    let content = chat
        .choices
        .first()
        .map(|c| c.message.content.as_str())
        .ok_or_else(|| AppError::Inference("no choices in model response".to_string()))?;

    parse_payload(content)
}

// ========== SINGLE-CALL STRUCTURED PROVIDER ==========

pub struct StructuredVibeProvider {
    client: reqwest::Client,
    config: VibeConfig,
}

impl StructuredVibeProvider {
    pub fn new(config: VibeConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moodlist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl VibeProvider for StructuredVibeProvider {
    async fn describe_image(&self, image_url: &str) -> Result<Analysis> {
        tracing::debug!("Describing image in one structured call: {}", image_url);

        let content = json!([
            { "type": "text", "text": DESCRIBE_INSTRUCTION },
            { "type": "image_url", "image_url": { "url": image_url } },
        ]);

        let analysis = chat_completion(&self.client, &self.config, content).await?;
        tracing::info!(
            "Vibe extracted: '{}' with {} candidate tracks",
            analysis.description,
            analysis.sample_tracks.len()
        );
        Ok(analysis)
    }
}

// ========== TWO-STAGE CLASSIFY-THEN-COMPLETE PROVIDER ==========

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    output: Option<String>,
}

pub struct TwoStageVibeProvider {
    client: reqwest::Client,
    config: VibeConfig,
}

impl TwoStageVibeProvider {
    pub fn new(config: VibeConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moodlist/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Submit the classification job and poll until it finishes, backing
    /// off from 2s up to 10s between polls, giving up at the deadline.
    async fn classify(&self, image_url: &str) -> Result<String> {
        let body = json!({
            "version": self.config.classify_model,
            "input": { "image": image_url },
        });

        let submitted: Prediction = self
            .client
            .post(&self.config.classify_endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AppError::Inference(format!("classification submit failed: {}", e)))?
            .json()
            .await?;

        tracing::debug!("Classification job {} submitted", submitted.id);

        let deadline = Instant::now() + self.config.poll_timeout;
        let mut delay = Duration::from_secs(2);
        let mut prediction = submitted;

        loop {
            match prediction.status.as_str() {
                "succeeded" => {
                    return prediction.output.ok_or_else(|| {
                        AppError::Inference("succeeded job carried no output".to_string())
                    });
                }
                "failed" | "canceled" => {
                    return Err(AppError::Inference(format!(
                        "classification job {} {}",
                        prediction.id, prediction.status
                    )));
                }
                _ => {}
            }

            if Instant::now() + delay > deadline {
                return Err(AppError::Timeout(format!(
                    "classification job {}",
                    prediction.id
                )));
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(10));

            let url = format!("{}/{}", self.config.classify_endpoint, prediction.id);
            prediction = self
                .client
                .get(&url)
                .bearer_auth(&self.config.api_key)
                .send()
                .await?
                .error_for_status()
                .map_err(|e| AppError::Inference(format!("classification poll failed: {}", e)))?
                .json()
                .await?;

            tracing::debug!(
                "Classification job {} status: {}",
                prediction.id,
                prediction.status
            );
        }
    }
}

#[async_trait]
impl VibeProvider for TwoStageVibeProvider {
    async fn describe_image(&self, image_url: &str) -> Result<Analysis> {
        let label = self.classify(image_url).await?;
        tracing::info!("Image classified as '{}'", label);

        let content = json!(format!("{}\n\nLabel: {}", LABEL_INSTRUCTION, label));
        chat_completion(&self.client, &self.config, content).await
    }
}
