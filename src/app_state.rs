use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::services::{
    imagine::{GenerationSettings, ImagineClient},
    imaging::{ImageNormalizer, ImagingError},
    linkedin::LinkedinClient,
    notify::{Notifier, SlackNotifier},
    pipeline::{Discipline, PipelineOrchestrator, PipelineSettings},
    storage::{SpacesClient, StorageError},
};

/// Minimum spacing between calls to either external API.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(3000);

/// Throttle retries before a rate-limit failure is surfaced.
const MAX_RETRIES: u32 = 3;

/// The orchestrator wired with the production adapters.
pub type AppOrchestrator =
    PipelineOrchestrator<LinkedinClient, ImageNormalizer, ImagineClient<SpacesClient>>;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Imaging(#[from] ImagingError),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AppOrchestrator>,
    pub store: Arc<SpacesClient>,
    pub notifier: Arc<SlackNotifier>,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> Result<Self, InitError> {
        let notifier = Arc::new(SlackNotifier::new(config.slack_webhook_url.clone()));

        let store = Arc::new(SpacesClient::new(
            &config.spaces_bucket,
            &config.spaces_endpoint,
            &config.spaces_region,
            &config.spaces_access_key,
            &config.spaces_secret_key,
            &config.spaces_origin_endpoint,
        )?);

        let lookup = Arc::new(LinkedinClient::new(
            &config.linkedin_api_url,
            &config.linkedin_api_key,
            &config.linkedin_api_host,
            MIN_REQUEST_INTERVAL,
            MAX_RETRIES,
        )?);

        let normalizer = Arc::new(ImageNormalizer::new(&config.output_dir)?);

        let mut generation = GenerationSettings::new(
            &config.imagine_api_url,
            &config.imagine_api_token,
            &config.image_namespace,
        );
        generation.min_interval = MIN_REQUEST_INTERVAL;
        generation.max_retries = MAX_RETRIES;

        let generator = Arc::new(ImagineClient::new(
            generation,
            Arc::clone(&store),
            Arc::clone(&notifier) as Arc<dyn Notifier>,
        )?);

        let settings = PipelineSettings {
            discipline: if config.parallel_batches {
                Discipline::BatchedParallel
            } else {
                Discipline::Sequential
            },
            ..PipelineSettings::default()
        };

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            lookup,
            normalizer,
            generator,
            Arc::clone(&notifier) as Arc<dyn Notifier>,
            settings,
        ));

        Ok(Self {
            orchestrator,
            store,
            notifier,
        })
    }
}
