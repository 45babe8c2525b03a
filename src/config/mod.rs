use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the LinkedIn profile data API
    #[serde(default = "default_linkedin_api_url")]
    pub linkedin_api_url: String,

    /// RapidAPI key for the profile data API
    pub linkedin_api_key: String,

    /// RapidAPI host header value
    #[serde(default = "default_linkedin_api_host")]
    pub linkedin_api_host: String,

    /// Base URL of the generative-image API
    pub imagine_api_url: String,

    /// Bearer token for the generative-image API
    pub imagine_api_token: String,

    /// Spaces bucket name
    pub spaces_bucket: String,

    /// Spaces endpoint URL (S3-compatible)
    pub spaces_endpoint: String,

    /// Spaces region
    #[serde(default = "default_spaces_region")]
    pub spaces_region: String,

    /// Spaces access key ID
    pub spaces_access_key: String,

    /// Spaces secret access key
    pub spaces_secret_key: String,

    /// Public origin URL objects are served from (bucket or CDN edge)
    pub spaces_origin_endpoint: String,

    /// Slack incoming-webhook URL; notifications are skipped when unset
    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    /// Local directory normalized profile pictures are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Key prefix generated images are stored under
    #[serde(default = "default_image_namespace")]
    pub image_namespace: String,

    /// Process records in concurrent batches of five instead of one at a time
    #[serde(default = "default_parallel_batches")]
    pub parallel_batches: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_linkedin_api_url() -> String {
    "https://linkedin-api8.p.rapidapi.com".to_string()
}

fn default_linkedin_api_host() -> String {
    "linkedin-api8.p.rapidapi.com".to_string()
}

fn default_spaces_region() -> String {
    "sfo3".to_string()
}

fn default_output_dir() -> String {
    "processed_images".to_string()
}

fn default_image_namespace() -> String {
    "generated-images".to_string()
}

fn default_parallel_batches() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
