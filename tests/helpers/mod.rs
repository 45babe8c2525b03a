//! Stub adapters and recording sinks for pipeline tests.
#![allow(dead_code)] // each integration-test crate uses a different subset

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use orbit_pixelart::models::profile::{BatchProgress, ProfileData, ProfileRecord};
use orbit_pixelart::services::imagine::{ArtGenerate, GenerationError};
use orbit_pixelart::services::imaging::{sanitize_name, ImageNormalize, ImagingError};
use orbit_pixelart::services::linkedin::{is_valid_profile_url, LookupError, ProfileLookup};
use orbit_pixelart::services::notify::{Notifier, NotifyEvent};
use orbit_pixelart::services::pipeline::ProgressSink;
use orbit_pixelart::services::storage::{ObjectStore, StorageError};

pub fn record(url: &str, hubspot_id: &str) -> ProfileRecord {
    ProfileRecord {
        hubspot_id: Some(hubspot_id.to_string()),
        linkedin_url: url.to_string(),
        full_name: None,
        profile_picture: None,
    }
}

/// Lookup stub with the production strict-URL validation.
pub struct StubLookup {
    pub picture_url: Option<String>,
    pub display_name: String,
    pub fetch_calls: AtomicUsize,
}

impl StubLookup {
    pub fn returning(picture_url: &str, display_name: &str) -> Self {
        Self {
            picture_url: Some(picture_url.to_string()),
            display_name: display_name.to_string(),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_picture() -> Self {
        Self {
            picture_url: None,
            display_name: "Anyone".to_string(),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileLookup for StubLookup {
    fn validate(&self, url: &str) -> bool {
        is_valid_profile_url(url)
    }

    async fn fetch(&self, _url: &str) -> Result<ProfileData, LookupError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match &self.picture_url {
            Some(picture_url) => Ok(ProfileData {
                picture_url: picture_url.clone(),
                display_name: self.display_name.clone(),
            }),
            None => Err(LookupError::NoProfilePicture),
        }
    }
}

/// Normalizer stub that writes a real placeholder file so the pipeline can
/// read it back.
pub struct StubNormalizer {
    dir: tempfile::TempDir,
    pub calls: AtomicUsize,
}

impl StubNormalizer {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageNormalize for StubNormalizer {
    async fn normalize(&self, _source_url: &str, name: &str) -> Result<PathBuf, ImagingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let path = self.dir.path().join(format!("{}.png", sanitize_name(name)));
        tokio::fs::write(&path, b"png bytes").await?;
        Ok(path)
    }
}

/// Generator stub returning a fixed URL list.
pub struct StubGenerator {
    pub urls: Vec<String>,
    pub calls: AtomicUsize,
}

impl StubGenerator {
    pub fn returning(urls: &[&str]) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ArtGenerate for StubGenerator {
    async fn generate(
        &self,
        _profile_id: &str,
        _image_png: &[u8],
    ) -> Result<Vec<String>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.urls.clone())
    }
}

/// In-memory object store.
pub struct MemoryStore {
    origin: String,
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn seed(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, prefix: &str) -> Result<bool, StorageError> {
        Ok(!self.list(prefix).await?.is_empty())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        self.seed(key, data);
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.origin, key)
    }
}

/// Notifier that records every event.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotifyEvent>>,
}

impl RecordingNotifier {
    pub fn timeouts(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, NotifyEvent::GenerationTimeout { .. }))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: NotifyEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Progress sink that records every snapshot.
#[derive(Default)]
pub struct RecordingSink {
    pub snapshots: Mutex<Vec<BatchProgress>>,
}

impl RecordingSink {
    pub fn fractions(&self) -> Vec<f64> {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.fraction)
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, progress: BatchProgress) {
        self.snapshots.lock().unwrap().push(progress);
    }
}
