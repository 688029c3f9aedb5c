//! Run configuration.
//!
//! Everything the fetcher and renderer need is collected in one [`Config`]
//! value, built by the CLI and handed to [`crate::serpapi::SerpApiClient::new`].

use crate::error::{Result, ScholarMapError};
use std::path::PathBuf;
use std::time::Duration;

/// Default SerpApi endpoint
pub const DEFAULT_BASE_URL: &str = "https://serpapi.com";

/// Default reference table location
pub const DEFAULT_AFFILIATIONS: &str = "assets/affiliations.csv";

/// Configuration for one citation-mapping run
#[derive(Debug, Clone)]
pub struct Config {
    /// SerpApi key
    pub api_key: String,
    /// Google Scholar author id of the tracked researcher
    pub author_id: String,
    /// SerpApi base URL (overridable for mirrors and tests)
    pub base_url: String,
    /// Results requested per page (`num`)
    pub page_size: u32,
    /// Sort order passed to SerpApi
    pub sort: String,
    /// HTTP timeout
    pub timeout: Duration,
    /// CSV reference table of institutions
    pub affiliations_path: PathBuf,
    /// Root of the output folders
    pub output_dir: PathBuf,
    /// Response cache directory; `None` disables caching
    pub cache_dir: Option<PathBuf>,
    /// Ignore cached responses and refetch
    pub overwrite: bool,
    /// Fetch citing authors' profiles for affiliations and e-mail domains
    pub fetch_profiles: bool,
    /// Expand truncated author lists from the raw result HTML
    pub full_authors: bool,
    /// Keep citing works whose expanded result disagrees with the preview
    pub keep_warnings: bool,
    /// Map marker options
    pub map: MapOptions,
    /// Entries shown per ranking
    pub top_n: usize,
}

impl Config {
    /// Configuration with defaults for everything but the credentials.
    pub fn new(api_key: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            author_id: author_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 20,
            sort: "pubdate".to_string(),
            timeout: Duration::from_secs(60),
            affiliations_path: PathBuf::from(DEFAULT_AFFILIATIONS),
            output_dir: PathBuf::from("./results"),
            cache_dir: None,
            overwrite: false,
            fetch_profiles: true,
            full_authors: false,
            keep_warnings: false,
            map: MapOptions::default(),
            top_n: 10,
        }
    }

    /// Check values that would otherwise fail late in the run.
    ///
    /// An empty API key is left to the fetcher, which reports it as an
    /// authentication failure.
    pub fn validate(&self) -> Result<()> {
        if self.author_id.trim().is_empty() {
            return Err(ScholarMapError::Config("author id is empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(ScholarMapError::Config("page size must be positive".to_string()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| ScholarMapError::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        if self.map.radius_scale <= 0.0 || self.map.radius_log_base < 0.0 {
            return Err(ScholarMapError::Config(
                "radius scale must be positive and log base non-negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Circle marker sizing for the rendered map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapOptions {
    /// Pixels per radius unit
    pub radius_scale: f64,
    /// Logarithm base for the radius; 0 means linear in the count
    pub radius_log_base: f64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            radius_scale: 6.0,
            radius_log_base: 2.0,
        }
    }
}

/// Default cache location: `<cache_dir>/scholarmap`
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|p| p.join("scholarmap"))
        .ok_or_else(|| ScholarMapError::Config("Cannot determine cache directory".to_string()))
}
