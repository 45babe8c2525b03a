//! Results CSV export: fixed four-slot generated-image columns, uploaded to
//! object storage under `downloads/`.

use crate::models::profile::ProcessingOutcome;
use crate::services::storage::{ObjectStore, StorageError};

/// Number of generated-image columns in the export, whatever the internal
/// result count is. Missing slots render as empty cells.
const EXPORT_IMAGE_SLOTS: usize = 4;

/// Collapse an accidentally doubled scheme prefix
/// (`https://https://x` -> `https://x`). Anything else passes through.
pub fn collapse_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .filter(|rest| rest.starts_with("https://"))
        .unwrap_or(url)
}

/// Render outcomes as the results CSV.
///
/// The padded four-column view exists only here; the internal outcome model
/// keeps the URL list sparse.
pub fn render_results_csv(outcomes: &[ProcessingOutcome]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "LinkedIn URL".to_string(),
        "Profile Picture URL".to_string(),
        "Status".to_string(),
    ];
    for slot in 1..=EXPORT_IMAGE_SLOTS {
        header.push(format!("Generated Image {slot}"));
    }
    writer.write_record(&header)?;

    for outcome in outcomes {
        let mut row = Vec::with_capacity(3 + EXPORT_IMAGE_SLOTS);
        match outcome {
            ProcessingOutcome::Success {
                url,
                pixel_art_urls,
                profile_picture,
                ..
            } => {
                row.push(url.clone());
                row.push(profile_picture.clone());
                row.push("success".to_string());
                for slot in 0..EXPORT_IMAGE_SLOTS {
                    row.push(
                        pixel_art_urls
                            .get(slot)
                            .map(|u| collapse_scheme(u).to_string())
                            .unwrap_or_default(),
                    );
                }
            }
            ProcessingOutcome::Failed { url, .. } => {
                row.push(url.clone());
                row.push(String::new());
                row.push("failed".to_string());
                for _ in 0..EXPORT_IMAGE_SLOTS {
                    row.push(String::new());
                }
            }
        }
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes).expect("csv writer produces UTF-8"))
}

/// Upload the rendered CSV and return its public URL.
pub async fn export_and_upload<S: ObjectStore>(
    store: &S,
    outcomes: &[ProcessingOutcome],
) -> Result<String, StorageError> {
    let csv = render_results_csv(outcomes)
        .map_err(|e| StorageError::Config(format!("failed to render results CSV: {e}")))?;

    let key = format!(
        "downloads/processed_profiles_{}.csv",
        chrono::Utc::now().timestamp_millis()
    );
    let url = store.put(&key, csv.as_bytes(), "text/csv").await?;
    tracing::info!(%key, "results CSV uploaded");
    Ok(url)
}
