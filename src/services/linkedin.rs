//! Profile lookup against the third-party LinkedIn data API.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::models::profile::ProfileData;
use crate::services::rate_limit::{RateLimitError, RateLimitedClient, RetryClass};

/// Strict profile-URL shape: no locale suffix, no query string.
///
/// Deliberately narrower than the CSV source's substring acceptance — rows
/// that parse but fail here become invalid-URL outcomes.
static PROFILE_URL: OnceLock<Regex> = OnceLock::new();

fn profile_url_pattern() -> &'static Regex {
    PROFILE_URL.get_or_init(|| {
        Regex::new(r"^https://(www\.)?linkedin\.com/in/[A-Za-z0-9\-_%]+/?$")
            .expect("profile URL pattern is valid")
    })
}

/// Strict profile-URL check used before any lookup is attempted.
pub fn is_valid_profile_url(url: &str) -> bool {
    profile_url_pattern().is_match(url)
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("No profile picture URL available")]
    NoProfilePicture,

    #[error("Profile API rate limit exceeded after {attempts} retries")]
    RateLimitExceeded { attempts: u32 },

    /// HTTP 429 from the API; retried by the rate limiter before it can
    /// surface as `RateLimitExceeded`.
    #[error("Profile API throttled the request")]
    Throttled,

    #[error("Profile API returned status {0}")]
    Api(StatusCode),

    #[error("Profile API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl RetryClass for LookupError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Throttled)
    }
}

/// Lookup port; the pipeline only sees this trait.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    fn validate(&self, url: &str) -> bool;
    async fn fetch(&self, url: &str) -> Result<ProfileData, LookupError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    first_name: Option<String>,
    last_name: Option<String>,
    profile_picture: Option<String>,
}

/// Path segment after `/in/`, trailing slash stripped. Falls back to the
/// raw input when the marker is absent.
pub fn profile_slug(url: &str) -> &str {
    url.split("/in/")
        .nth(1)
        .map(|slug| slug.trim_end_matches('/'))
        .filter(|slug| !slug.is_empty())
        .unwrap_or(url)
}

/// Client for the RapidAPI LinkedIn profile endpoint.
pub struct LinkedinClient {
    http: reqwest::Client,
    base_url: String,
    limiter: RateLimitedClient,
}

impl LinkedinClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_host: &str,
        min_interval: Duration,
        max_retries: u32,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(api_key) {
            Ok(value) => {
                headers.insert("x-rapidapi-key", value);
            }
            Err(_) => tracing::warn!("profile API key is not a valid header value"),
        }
        match HeaderValue::from_str(api_host) {
            Ok(value) => {
                headers.insert("x-rapidapi-host", value);
            }
            Err(_) => tracing::warn!("profile API host is not a valid header value"),
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            limiter: RateLimitedClient::new(min_interval, max_retries),
        })
    }

    async fn request_profile(&self, username: &str) -> Result<ProfileData, LookupError> {
        let response = self
            .http
            .get(format!("{}/", self.base_url))
            .query(&[("username", username)])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LookupError::Throttled);
        }
        if !status.is_success() {
            return Err(LookupError::Api(status));
        }

        let profile: ProfileResponse = response.json().await?;

        let Some(picture_url) = profile.profile_picture.filter(|p| !p.is_empty()) else {
            tracing::warn!(username, "profile response has no picture field");
            return Err(LookupError::NoProfilePicture);
        };

        let display_name = format!(
            "{} {}",
            profile.first_name.unwrap_or_default(),
            profile.last_name.unwrap_or_default()
        )
        .trim()
        .to_string();

        Ok(ProfileData {
            picture_url,
            display_name,
        })
    }
}

#[async_trait]
impl ProfileLookup for LinkedinClient {
    fn validate(&self, url: &str) -> bool {
        is_valid_profile_url(url)
    }

    async fn fetch(&self, url: &str) -> Result<ProfileData, LookupError> {
        let username = profile_slug(url);
        tracing::info!(username, "requesting profile data");

        self.limiter
            .invoke(|| self.request_profile(username))
            .await
            .map_err(|e| match e {
                RateLimitError::Exhausted { attempts } => {
                    LookupError::RateLimitExceeded { attempts }
                }
                RateLimitError::Inner(inner) => inner,
            })
    }
}
