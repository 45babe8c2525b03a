//! Downloads a source image and produces the canonical 800x800 PNG the
//! generation service is fed.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use regex::Regex;
use tokio::sync::Semaphore;

/// Square canvas edge, matching the profile-picture size the upstream API
/// serves.
const CANVAS_EDGE: u32 = 800;

/// Codec work is memory-hungry; cap how many images decode at once.
const CODEC_PERMITS: usize = 2;

static WHITESPACE: OnceLock<Regex> = OnceLock::new();

/// Replace every whitespace run with a single underscore, for use as a file
/// name stem.
pub fn sanitize_name(name: &str) -> String {
    WHITESPACE
        .get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"))
        .replace_all(name, "_")
        .into_owned()
}

#[derive(Debug, thiserror::Error)]
pub enum ImagingError {
    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Invalid image data: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Image file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Normalization port; the pipeline only sees this trait.
#[async_trait]
pub trait ImageNormalize: Send + Sync {
    /// Download `source_url`, normalize it, and return the local PNG path.
    async fn normalize(&self, source_url: &str, name: &str) -> Result<PathBuf, ImagingError>;
}

pub struct ImageNormalizer {
    http: reqwest::Client,
    output_dir: PathBuf,
    codec_permits: Semaphore,
}

impl ImageNormalizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, ImagingError> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ImagingError::Download(e.to_string()))?;

        Ok(Self {
            http,
            output_dir,
            codec_permits: Semaphore::new(CODEC_PERMITS),
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ImagingError> {
        tracing::info!(url, "downloading source image");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ImagingError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ImagingError::Download(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImagingError::Download(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Fit `decoded` into the square canvas, preserving aspect ratio, centered
/// on uniform white padding.
fn compose_canvas(decoded: &DynamicImage) -> RgbaImage {
    let resized = decoded.resize(CANVAS_EDGE, CANVAS_EDGE, FilterType::Lanczos3);
    let mut canvas = RgbaImage::from_pixel(CANVAS_EDGE, CANVAS_EDGE, Rgba([255, 255, 255, 255]));
    let x = i64::from((CANVAS_EDGE - resized.width()) / 2);
    let y = i64::from((CANVAS_EDGE - resized.height()) / 2);
    image::imageops::overlay(&mut canvas, &resized.to_rgba8(), x, y);
    canvas
}

#[async_trait]
impl ImageNormalize for ImageNormalizer {
    async fn normalize(&self, source_url: &str, name: &str) -> Result<PathBuf, ImagingError> {
        let bytes = self.download(source_url).await?;

        let _permit = self
            .codec_permits
            .acquire()
            .await
            .expect("codec semaphore is never closed");

        let decoded = image::load_from_memory(&bytes)?;
        let canvas = compose_canvas(&decoded);

        let path = self
            .output_dir
            .join(format!("{}.png", sanitize_name(name)));
        canvas
            .save(&path)
            .map_err(|e| ImagingError::Io(std::io::Error::other(e)))?;

        tracing::info!(path = %path.display(), "image normalized");
        Ok(path)
    }
}

/// Read back a normalized PNG for submission to the generation service.
pub async fn read_png(path: &Path) -> Result<Vec<u8>, ImagingError> {
    Ok(tokio::fs::read(path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_runs_collapse_to_underscores() {
        assert_eq!(sanitize_name("Jane Doe"), "Jane_Doe");
        assert_eq!(sanitize_name("Jane \t Doe"), "Jane_Doe");
        assert_eq!(sanitize_name("Marnie Rabinovitch Consky"), "Marnie_Rabinovitch_Consky");
        assert_eq!(sanitize_name("NoSpaces"), "NoSpaces");
    }

    #[test]
    fn landscape_image_is_contained_with_white_padding() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            400,
            200,
            Rgba([0, 0, 0, 255]),
        ));
        let canvas = compose_canvas(&source);

        assert_eq!(canvas.dimensions(), (CANVAS_EDGE, CANVAS_EDGE));
        // 400x200 scales to 800x400, centered: rows 0..200 and 600..800 stay white.
        assert_eq!(canvas.get_pixel(400, 10), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(400, 790), &Rgba([255, 255, 255, 255]));
        assert_eq!(canvas.get_pixel(400, 400), &Rgba([0, 0, 0, 255]));
    }

    #[tokio::test]
    async fn normalize_writes_png_named_after_sanitized_name() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path()).unwrap();

        let mut png = Vec::new();
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            10,
            10,
            Rgba([10, 20, 30, 255]),
        ));
        source
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(png))
            .mount(&server)
            .await;

        let path = normalizer
            .normalize(&format!("{}/img", server.uri()), "Jane Doe")
            .await
            .unwrap();

        assert!(path.ends_with("Jane_Doe.png"));
        let reloaded = image::open(&path).unwrap();
        assert_eq!(reloaded.width(), CANVAS_EDGE);
    }

    #[tokio::test]
    async fn non_success_status_is_a_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path()).unwrap();

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = normalizer
            .normalize(&format!("{}/missing", server.uri()), "x")
            .await;
        assert!(matches!(result, Err(ImagingError::Download(_))));
    }

    #[tokio::test]
    async fn garbage_bytes_are_an_invalid_image_error() {
        let dir = tempfile::tempdir().unwrap();
        let normalizer = ImageNormalizer::new(dir.path()).unwrap();

        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200).set_body_bytes(b"not an image".to_vec()),
            )
            .mount(&server)
            .await;

        let result = normalizer
            .normalize(&format!("{}/bad", server.uri()), "x")
            .await;
        assert!(matches!(result, Err(ImagingError::InvalidImage(_))));
    }
}
