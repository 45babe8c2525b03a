//! Batch driver: runs every parsed profile through
//! validate -> lookup -> normalize -> generate -> store and aggregates one
//! outcome per record.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::profile::{BatchProgress, ErrorKind, ProcessingOutcome, ProfileRecord};
use crate::services::imagine::{ArtGenerate, GenerationError};
use crate::services::imaging::{read_png, ImageNormalize, ImagingError};
use crate::services::linkedin::{profile_slug, LookupError, ProfileLookup};
use crate::services::notify::{Notifier, NotifyEvent};

/// Records processed concurrently inside one batch.
pub const BATCH_SIZE: usize = 5;

/// Execution discipline for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// One record fully processed before the next starts; a progress event
    /// after every record.
    Sequential,
    /// Fixed-size groups processed concurrently; the whole batch is awaited
    /// before the next starts, one progress event per batch.
    BatchedParallel,
}

/// Receives progress snapshots as the run advances.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: BatchProgress);
}

/// Any failure raised by a stage for one record. Converted into a `Failed`
/// outcome at the record boundary; never unwinds past it.
#[derive(Debug, thiserror::Error)]
enum StageError {
    #[error("Invalid LinkedIn URL format")]
    InvalidUrl,

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Failed to process profile picture: {0}")]
    Imaging(#[from] ImagingError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl StageError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl => ErrorKind::InvalidUrl,
            Self::Lookup(LookupError::NoProfilePicture) => ErrorKind::NoProfilePicture,
            Self::Lookup(LookupError::RateLimitExceeded { .. }) => ErrorKind::RateLimitExceeded,
            Self::Lookup(_) => ErrorKind::Internal,
            Self::Imaging(ImagingError::Download(_)) => ErrorKind::Download,
            Self::Imaging(ImagingError::InvalidImage(_)) => ErrorKind::InvalidImage,
            Self::Imaging(ImagingError::Io(_)) => ErrorKind::Internal,
            Self::Generation(GenerationError::RateLimitExceeded { .. }) => {
                ErrorKind::RateLimitExceeded
            }
            Self::Generation(GenerationError::Storage(_)) => ErrorKind::Storage,
            Self::Generation(_) => ErrorKind::GenerationFailed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub discipline: Discipline,
    /// How often the notifier hears about run progress.
    pub notify_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            discipline: Discipline::BatchedParallel,
            notify_interval: Duration::from_secs(60),
        }
    }
}

/// Drives records through the stage adapters. Adapters are injected; the
/// orchestrator owns no external state of its own.
pub struct PipelineOrchestrator<L, N, G> {
    lookup: Arc<L>,
    normalizer: Arc<N>,
    generator: Arc<G>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl<L, N, G> PipelineOrchestrator<L, N, G>
where
    L: ProfileLookup + 'static,
    N: ImageNormalize + 'static,
    G: ArtGenerate + 'static,
{
    pub fn new(
        lookup: Arc<L>,
        normalizer: Arc<N>,
        generator: Arc<G>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            lookup,
            normalizer,
            generator,
            notifier,
            settings,
        }
    }

    /// Process every record and return one outcome per record, in input
    /// order. Individual stage failures never abort the run.
    pub async fn run(
        &self,
        records: &[ProfileRecord],
        sink: &dyn ProgressSink,
    ) -> Vec<ProcessingOutcome> {
        let total = records.len();
        let processed = Arc::new(AtomicUsize::new(0));

        let progress_task = {
            let notifier = Arc::clone(&self.notifier);
            let processed = Arc::clone(&processed);
            let interval = self.settings.notify_interval;
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await; // the first tick fires immediately
                loop {
                    ticker.tick().await;
                    notifier.notify(NotifyEvent::Progress {
                        processed: processed.load(Ordering::SeqCst),
                        total,
                    });
                }
            })
        };

        let mut outcomes = Vec::with_capacity(total);
        match self.settings.discipline {
            Discipline::Sequential => {
                for record in records {
                    let outcome = self.process_record(record).await;
                    outcomes.push(outcome);
                    processed.store(outcomes.len(), Ordering::SeqCst);
                    sink.on_progress(BatchProgress::new(outcomes.len(), total));
                }
            }
            Discipline::BatchedParallel => {
                for batch in records.chunks(BATCH_SIZE) {
                    let batch_outcomes = futures::future::join_all(
                        batch.iter().map(|record| self.process_record(record)),
                    )
                    .await;
                    outcomes.extend(batch_outcomes);
                    processed.store(outcomes.len(), Ordering::SeqCst);
                    sink.on_progress(BatchProgress::new(outcomes.len(), total));
                }
            }
        }

        progress_task.abort();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            total,
            failed,
            succeeded = total - failed,
            "pipeline run complete"
        );
        outcomes
    }

    /// Record boundary: every stage error becomes a `Failed` outcome here.
    async fn process_record(&self, record: &ProfileRecord) -> ProcessingOutcome {
        let started = std::time::Instant::now();
        let result = self.process_inner(record).await;
        metrics::histogram!("profile_processing_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(outcome) => {
                metrics::counter!("profiles_processed_total").increment(1);
                outcome
            }
            Err(e) => {
                metrics::counter!("profiles_failed_total").increment(1);
                tracing::warn!(
                    url = %record.linkedin_url,
                    kind = %e.kind(),
                    error = %e,
                    "record processing failed"
                );
                ProcessingOutcome::Failed {
                    url: record.linkedin_url.clone(),
                    error_kind: e.kind(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn process_inner(
        &self,
        record: &ProfileRecord,
    ) -> Result<ProcessingOutcome, StageError> {
        let url = &record.linkedin_url;

        if !self.lookup.validate(url) {
            return Err(StageError::InvalidUrl);
        }

        let profile = self.lookup.fetch(url).await?;

        let display_name = if profile.display_name.is_empty() {
            record
                .full_name
                .clone()
                .unwrap_or_else(|| profile_slug(url).to_string())
        } else {
            profile.display_name.clone()
        };

        let image_path = self
            .normalizer
            .normalize(&profile.picture_url, &display_name)
            .await?;
        let png = read_png(&image_path).await?;

        // Generated images are keyed by the CRM id; fall back to the URL
        // slug for rows that arrived without one.
        let profile_id = record
            .hubspot_id
            .clone()
            .unwrap_or_else(|| profile_slug(url).to_string());

        let pixel_art_urls = self.generator.generate(&profile_id, &png).await?;

        Ok(ProcessingOutcome::Success {
            url: url.clone(),
            original_image_path: image_path.display().to_string(),
            pixel_art_urls,
            profile_picture: profile.picture_url,
        })
    }
}
