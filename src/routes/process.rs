//! CSV upload endpoint: parses the sheet, runs the pipeline, and streams
//! newline-delimited JSON progress back to the caller.

use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::profile::BatchProgress;
use crate::services::csv_source;
use crate::services::export;
use crate::services::notify::{Notifier, NotifyEvent};
use crate::services::pipeline::ProgressSink;

/// Progress sink that turns each snapshot into one NDJSON line on the
/// response channel. A dropped receiver (client went away) is ignored; the
/// run continues so the CSV export and Slack summary still happen.
struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, progress: BatchProgress) {
        let line = format!(
            "{}\n",
            serde_json::json!({ "progress": progress.fraction })
        );
        let _ = self.tx.send(line);
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({ "status": "error", "error": message })),
    )
        .into_response()
}

/// POST /process-csv — upload a CSV of profile URLs for processing.
pub async fn process_csv(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut file_bytes: Option<Vec<u8>> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    match field.bytes().await {
                        Ok(data) => file_bytes = Some(data.to_vec()),
                        Err(e) => {
                            return error_response(
                                StatusCode::BAD_REQUEST,
                                format!("failed to read uploaded file: {e}"),
                            );
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("malformed multipart request: {e}"),
                );
            }
        }
    }

    let Some(bytes) = file_bytes else {
        return error_response(StatusCode::BAD_REQUEST, "No CSV file uploaded".to_string());
    };

    // Input acquisition is the only stage whose failure aborts the run.
    let records = match csv_source::parse(bytes.as_slice()) {
        Ok(records) => records,
        Err(e) => {
            state.notifier.notify(NotifyEvent::RunFailed {
                error: e.to_string(),
            });
            return error_response(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, records = records.len(), "starting pipeline run");

    let (tx, rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let sink = ChannelSink { tx: tx.clone() };
        let outcomes = state.orchestrator.run(&records, &sink).await;

        let terminal = format!("{}\n", serde_json::json!({ "results": outcomes }));
        let _ = tx.send(terminal);
        // Close the stream now; the export and summary below are not part
        // of the client response.
        drop(sink);
        drop(tx);

        let export_url = match export::export_and_upload(state.store.as_ref(), &outcomes).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::error!(%run_id, error = %e, "failed to upload results CSV");
                None
            }
        };

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        state.notifier.notify(NotifyEvent::RunComplete {
            succeeded,
            failed: outcomes.len() - succeeded,
            export_url,
        });
        tracing::info!(%run_id, "pipeline run finished");
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|line| (Ok::<_, std::convert::Infallible>(line), rx))
    }));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .expect("static response parts are valid")
}
