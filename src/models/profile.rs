use serde::{Deserialize, Serialize};
use strum::Display;

/// One row parsed from the uploaded CSV.
///
/// `hubspot_id` is the opaque CRM identifier the row was keyed by upstream;
/// generated images are stored under it. `full_name` and `profile_picture`
/// are carried through from the sheet when present, but the authoritative
/// values come from the profile lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub hubspot_id: Option<String>,
    pub linkedin_url: String,
    pub full_name: Option<String>,
    pub profile_picture: Option<String>,
}

/// Profile metadata returned by the LinkedIn lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileData {
    pub picture_url: String,
    pub display_name: String,
}

/// Classification of a per-record failure, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    NoProfilePicture,
    Download,
    InvalidImage,
    RateLimitExceeded,
    GenerationFailed,
    Storage,
    Internal,
}

/// Final outcome for one input record. Exactly one of these exists per
/// parsed `ProfileRecord`, whatever stage failed.
///
/// The JSON shape (`status` tag, camelCase fields) is the wire format the
/// streaming response and CSV export consume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProcessingOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        url: String,
        original_image_path: String,
        pixel_art_urls: Vec<String>,
        profile_picture: String,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        url: String,
        error_kind: ErrorKind,
        error: String,
    },
}

impl ProcessingOutcome {
    pub fn url(&self) -> &str {
        match self {
            Self::Success { url, .. } | Self::Failed { url, .. } => url,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Snapshot of run progress, recomputed after every record or batch.
/// Transient; only the streaming channel and notifier ever see it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub fraction: f64,
}

impl BatchProgress {
    pub fn new(processed: usize, total: usize) -> Self {
        let fraction = if total == 0 {
            1.0
        } else {
            (processed as f64 / total as f64).min(1.0)
        };
        Self {
            processed,
            total,
            fraction,
        }
    }
}
