//! Art-generation adapter: submits a normalized portrait to the external
//! generative-image service, polls the job to completion, and persists the
//! results.
//!
//! State machine per profile: NotStarted -> Submitted -> Polling ->
//! {Completed | Failed | TimedOut}. Before submitting, the adapter checks
//! the result store for images already generated for the profile id and
//! short-circuits with the stored URLs, so an interrupted run can be
//! replayed without re-billing the generation service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::sleep;

use crate::models::generation::{GenerationJob, PollState};
use crate::services::notify::{Notifier, NotifyEvent};
use crate::services::rate_limit::{RateLimitError, RateLimitedClient, RetryClass};
use crate::services::storage::{ObjectStore, StorageError};

/// Prompt template sent with every generation request.
const PIXEL_ART_PROMPT: &str = "Create a full-body pixel-art sprite of a friend whose image is attached, \
designed as a character inspired by classic 1980s 2D platformer games. The character should be depicted \
from head to toe in a classic running pose, with all limbs fully visible, including arms, legs, and feet. \
The design must include bright colors, a cartoonish, expressive face, overalls, a hat, and any unique \
traits from the provided photo (such as specific hair color or accessories). Position the character facing \
to the right, with arms and legs extended in a dynamic running motion, and wearing black sneakers. Ensure \
the entire body is fully visible in a retro 8-bit pixel art style, with no missing or cropped elements.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Failed to generate image: generation service reported failure: {0}")]
    Failed(String),

    #[error("Failed to generate image: rate limit exceeded after {attempts} retries")]
    RateLimitExceeded { attempts: u32 },

    /// HTTP 429; retried by the rate limiter before it can surface.
    #[error("generation service throttled the request")]
    Throttled,

    #[error("Failed to generate image: service returned status {0}")]
    Api(StatusCode),

    #[error("Failed to generate image: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to download generated image: {0}")]
    Download(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RetryClass for GenerationError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Throttled)
    }
}

/// Generation port; the pipeline only sees this trait.
#[async_trait]
pub trait ArtGenerate: Send + Sync {
    /// Produce pixel-art renditions for one profile and return their public
    /// URLs. An empty result is a valid outcome (generation timed out).
    async fn generate(
        &self,
        profile_id: &str,
        image_png: &[u8],
    ) -> Result<Vec<String>, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    data: JobRef,
}

#[derive(Debug, Deserialize)]
struct JobRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    data: JobStatusData,
}

#[derive(Debug, Deserialize)]
struct JobStatusData {
    status: String,
    #[serde(default)]
    upscaled_urls: Vec<String>,
}

/// Tunables for the generation adapter.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub base_url: String,
    pub api_token: String,
    /// Key prefix generated images are stored under.
    pub namespace: String,
    pub min_interval: Duration,
    pub max_retries: u32,
    pub poll_interval: Duration,
    pub poll_ceiling: Duration,
}

impl GenerationSettings {
    pub fn new(base_url: &str, api_token: &str, namespace: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
            namespace: namespace.trim_matches('/').to_string(),
            min_interval: Duration::from_millis(3000),
            max_retries: 3,
            poll_interval: Duration::from_secs(5),
            poll_ceiling: Duration::from_secs(600),
        }
    }
}

/// Client for the hosted generative-image API.
pub struct ImagineClient<S: ObjectStore> {
    http: reqwest::Client,
    settings: GenerationSettings,
    limiter: RateLimitedClient,
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
}

impl<S: ObjectStore> ImagineClient<S> {
    pub fn new(
        settings: GenerationSettings,
        store: Arc<S>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let limiter = RateLimitedClient::new(settings.min_interval, settings.max_retries);

        Ok(Self {
            http,
            settings,
            limiter,
            store,
            notifier,
        })
    }

    fn key_prefix(&self, profile_id: &str) -> String {
        format!("{}/{}/", self.settings.namespace, profile_id)
    }

    /// Stored result URLs for a profile, if any earlier run produced them.
    async fn stored_results(&self, profile_id: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = self.store.list(&self.key_prefix(profile_id)).await?;
        keys.sort();
        Ok(keys
            .into_iter()
            .map(|key| self.store.public_url(&key))
            .collect())
    }

    async fn submit(&self, image_png: &[u8]) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "prompt": PIXEL_ART_PROMPT,
            "image": base64::engine::general_purpose::STANDARD.encode(image_png),
        });

        let response = self
            .http
            .post(format!("{}/items/images", self.settings.base_url))
            .bearer_auth(&self.settings.api_token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::Throttled);
        }
        if !status.is_success() {
            return Err(GenerationError::Api(status));
        }

        let submit: SubmitResponse = response.json().await?;
        Ok(submit.data.id)
    }

    async fn poll_state(&self, job_id: &str) -> Result<PollState, GenerationError> {
        let response = self
            .http
            .get(format!("{}/items/images/{job_id}", self.settings.base_url))
            .bearer_auth(&self.settings.api_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GenerationError::Throttled);
        }
        if !status.is_success() {
            return Err(GenerationError::Api(status));
        }

        let parsed: StatusResponse = response.json().await?;
        Ok(match parsed.data.status.as_str() {
            "completed" => PollState::Completed(parsed.data.upscaled_urls),
            "failed" => PollState::Failed(parsed.data.status),
            _ => PollState::Pending,
        })
    }

    /// Download each generated image and persist it under
    /// `<namespace>/<profile_id>/<profile_id>_<index>` (1-based).
    async fn store_results(
        &self,
        profile_id: &str,
        urls: &[String],
    ) -> Result<Vec<String>, GenerationError> {
        let mut public_urls = Vec::with_capacity(urls.len());

        for (index, url) in urls.iter().enumerate() {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| GenerationError::Download(e.to_string()))?;
            if !response.status().is_success() {
                return Err(GenerationError::Download(format!(
                    "unexpected status {}",
                    response.status()
                )));
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| GenerationError::Download(e.to_string()))?;

            let key = format!(
                "{}/{}/{}_{}",
                self.settings.namespace,
                profile_id,
                profile_id,
                index + 1
            );
            public_urls.push(self.store.put(&key, &bytes, "image/png").await?);
        }

        Ok(public_urls)
    }

    fn unwrap_limited<T>(result: Result<T, RateLimitError<GenerationError>>) -> Result<T, GenerationError> {
        result.map_err(|e| match e {
            RateLimitError::Exhausted { attempts } => GenerationError::RateLimitExceeded { attempts },
            RateLimitError::Inner(inner) => inner,
        })
    }
}

#[async_trait]
impl<S: ObjectStore> ArtGenerate for ImagineClient<S> {
    async fn generate(
        &self,
        profile_id: &str,
        image_png: &[u8],
    ) -> Result<Vec<String>, GenerationError> {
        // Resumability: a previous run may already have produced this
        // profile's images.
        let stored = self.stored_results(profile_id).await?;
        if !stored.is_empty() {
            tracing::info!(
                profile_id,
                count = stored.len(),
                "found stored results, skipping generation"
            );
            return Ok(stored);
        }

        let job_id = Self::unwrap_limited(
            self.limiter.invoke(|| self.submit(image_png)).await,
        )?;
        tracing::info!(profile_id, %job_id, "generation job submitted");

        let mut job = GenerationJob::new(job_id);
        let result_urls = loop {
            sleep(self.settings.poll_interval).await;

            if job.expired(self.settings.poll_ceiling) {
                tracing::warn!(
                    profile_id,
                    job_id = %job.job_id,
                    "generation job exceeded polling ceiling"
                );
                self.notifier.notify(NotifyEvent::GenerationTimeout {
                    profile_id: profile_id.to_string(),
                });
                // A stuck job must not fail the record or block the batch.
                return Ok(Vec::new());
            }

            job.state = Self::unwrap_limited(
                self.limiter.invoke(|| self.poll_state(&job.job_id)).await,
            )?;

            match &job.state {
                PollState::Pending => continue,
                PollState::Completed(urls) => break urls.clone(),
                PollState::Failed(reason) => {
                    return Err(GenerationError::Failed(reason.clone()));
                }
            }
        };

        tracing::info!(
            profile_id,
            job_id = %job.job_id,
            count = result_urls.len(),
            "generation job completed"
        );
        self.store_results(profile_id, &result_urls).await
    }
}
