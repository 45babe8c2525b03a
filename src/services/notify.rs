//! Slack status notifications.
//!
//! Delivery is fire-and-forget: a failed webhook post is logged and
//! swallowed, never surfaced to the pipeline — notification problems must
//! not change record outcomes.

/// Events the pipeline reports out-of-band.
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    Progress {
        processed: usize,
        total: usize,
    },
    RunComplete {
        succeeded: usize,
        failed: usize,
        export_url: Option<String>,
    },
    RunFailed {
        error: String,
    },
    GenerationTimeout {
        profile_id: String,
    },
}

/// Notification port. Implementations must not block the caller and must
/// swallow their own delivery errors.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotifyEvent);
}

/// Posts human-readable messages to a Slack incoming webhook.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            webhook_url,
        }
    }

    fn render(event: &NotifyEvent) -> String {
        match event {
            NotifyEvent::Progress { processed, total } => {
                format!("Pixel-art run in progress: {processed}/{total} profiles processed.")
            }
            NotifyEvent::RunComplete {
                succeeded,
                failed,
                export_url,
            } => match export_url {
                Some(url) => format!(
                    "Pixel-art run complete: {succeeded} succeeded, {failed} failed. Results CSV: {url}"
                ),
                None => format!(
                    "Pixel-art run complete: {succeeded} succeeded, {failed} failed. (CSV export unavailable)"
                ),
            },
            NotifyEvent::RunFailed { error } => {
                format!("Pixel-art run failed before processing any profiles: {error}")
            }
            NotifyEvent::GenerationTimeout { profile_id } => format!(
                "Generation job for profile {profile_id} timed out after the polling ceiling; continuing without images."
            ),
        }
    }
}

impl Notifier for SlackNotifier {
    fn notify(&self, event: NotifyEvent) {
        let Some(url) = self.webhook_url.clone() else {
            tracing::debug!(?event, "no Slack webhook configured, dropping notification");
            return;
        };

        let text = Self::render(&event);
        let http = self.http.clone();
        tokio::spawn(async move {
            let result = http
                .post(&url)
                .json(&serde_json::json!({ "text": text }))
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);

            if let Err(e) = result {
                tracing::error!(error = %e, "failed to deliver Slack notification");
            }
        });
    }
}
