use std::time::Duration;

use url::Url;

use super::typed::{ConfigProperties, PropertyMeta};
use super::{ConfigError, VerdantConfig};

/// Default image host endpoint (imgbb-compatible upload API).
pub const DEFAULT_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

/// Bounded exponential backoff applied to failed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Extra attempts after the first failure. `0` disables retrying.
    pub max: u32,
    pub base_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub url: Url,
    pub api_key: Option<String>,
}

/// Typed `api.*`, `cache.*` and `upload.*` settings of the marketplace client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin every read and write targets (`API_URL`).
    pub api_url: Url,
    pub timeout: Duration,
    /// Optional static bearer token for protected reads.
    pub api_token: Option<String>,
    /// How long a cached value counts as fresh. Zero means every new
    /// subscription revalidates in the background.
    pub stale_time: Duration,
    /// How long an entry without subscribers survives. `None` keeps it for
    /// the lifetime of the cache.
    pub gc_time: Option<Duration>,
    pub retry: RetrySettings,
    pub upload: UploadSettings,
}

impl ClientConfig {
    /// Config pointing at `api_url` with every other setting at its default.
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            timeout: Duration::from_millis(10_000),
            api_token: None,
            stale_time: Duration::ZERO,
            gc_time: None,
            retry: RetrySettings {
                max: 0,
                base_delay: Duration::from_millis(200),
            },
            upload: UploadSettings {
                url: default_upload_url(),
                api_key: None,
            },
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_retry(mut self, max: u32, base_delay: Duration) -> Self {
        self.retry = RetrySettings { max, base_delay };
        self
    }
}

fn default_upload_url() -> Url {
    Url::parse(DEFAULT_UPLOAD_URL).expect("DEFAULT_UPLOAD_URL is a valid URL")
}

impl ConfigProperties for ClientConfig {
    fn prefix() -> &'static str {
        "api"
    }

    fn properties_metadata() -> Vec<PropertyMeta> {
        vec![
            PropertyMeta {
                key: "api.url",
                type_name: "Url",
                required: true,
                default_value: None,
                description: "Origin all reads and writes target",
            },
            PropertyMeta {
                key: "api.timeout_ms",
                type_name: "u64",
                required: false,
                default_value: Some("10000"),
                description: "Per-request timeout in milliseconds",
            },
            PropertyMeta {
                key: "api.token",
                type_name: "String",
                required: false,
                default_value: None,
                description: "Static bearer token for protected reads",
            },
            PropertyMeta {
                key: "cache.stale_time_ms",
                type_name: "u64",
                required: false,
                default_value: Some("0"),
                description: "Age after which a cached value is revalidated",
            },
            PropertyMeta {
                key: "cache.gc_time_ms",
                type_name: "u64",
                required: false,
                default_value: None,
                description: "Eviction delay once an entry has no subscribers",
            },
            PropertyMeta {
                key: "cache.retry.max",
                type_name: "u32",
                required: false,
                default_value: Some("0"),
                description: "Automatic retries for failed reads",
            },
            PropertyMeta {
                key: "cache.retry.base_delay_ms",
                type_name: "u64",
                required: false,
                default_value: Some("200"),
                description: "First backoff delay, doubled on every retry",
            },
            PropertyMeta {
                key: "upload.url",
                type_name: "Url",
                required: false,
                default_value: Some(DEFAULT_UPLOAD_URL),
                description: "Image host upload endpoint",
            },
            PropertyMeta {
                key: "upload.api_key",
                type_name: "String",
                required: false,
                default_value: None,
                description: "Image host API key",
            },
        ]
    }

    fn from_config(config: &VerdantConfig) -> Result<Self, ConfigError> {
        let defaults = ClientConfig::new(config.get("api.url")?);
        Ok(Self {
            timeout: config.get_or("api.timeout_ms", defaults.timeout)?,
            api_token: config.get_or("api.token", None)?,
            stale_time: config.get_or("cache.stale_time_ms", defaults.stale_time)?,
            gc_time: config.get_or("cache.gc_time_ms", None)?,
            retry: RetrySettings {
                max: config.get_or("cache.retry.max", defaults.retry.max)?,
                base_delay: config.get_or("cache.retry.base_delay_ms", defaults.retry.base_delay)?,
            },
            upload: UploadSettings {
                url: config
                    .get_or::<Option<Url>>("upload.url", None)?
                    .unwrap_or(defaults.upload.url),
                api_key: config.get_or("upload.api_key", None)?,
            },
            api_url: defaults.api_url,
        })
    }
}
