//! On-disk cache of SerpApi responses.
//!
//! Each response is stored as one JSON file named after the request
//! parameters (the API key is never part of the name). Caching is opt-in;
//! without it every run fetches fresh data.

use crate::config::default_cache_dir;
use crate::error::Result;
use crate::serpapi::Params;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Longest readable prefix kept in a cache file name
const MAX_KEY_PREFIX: usize = 120;

/// Response cache rooted at one directory
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Create a ResponseCache at the default location
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: default_cache_dir()?,
        })
    }

    /// Create a ResponseCache at a custom location
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Get the cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a request
    pub fn key(params: &Params) -> String {
        let joined = params
            .iter()
            .filter(|(k, _)| k.as_str() != "api_key")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let readable: String = joined
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(MAX_KEY_PREFIX)
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        format!("{}_{:x}.json", readable, hasher.finalize())
    }

    /// Load a cached response
    ///
    /// Returns None if the entry doesn't exist or is invalid
    pub fn load(&self, params: &Params) -> Option<Value> {
        let path = self.dir.join(Self::key(params));
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(value) => {
                    debug!("Cache hit: {:?}", path);
                    Some(value)
                }
                Err(e) => {
                    warn!("Failed to parse cache entry {:?}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read cache entry {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save a response
    pub fn save(&self, params: &Params, value: &Value) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::key(params));
        std::fs::write(&path, serde_json::to_string(value)?)?;
        debug!("Cached response at {:?}", path);
        Ok(())
    }

    /// Number of cached responses
    pub fn len(&self) -> usize {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every cached response
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
            info!("Cleared response cache at {:?}", self.dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_load_missing() {
        let cache = ResponseCache::with_dir(PathBuf::from("/nonexistent/path"));
        assert!(cache.load(&params(&[("engine", "google_scholar")])).is_none());
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp = TempDir::new()?;
        let cache = ResponseCache::with_dir(temp.path().join("responses"));
        let request = params(&[("engine", "google_scholar"), ("cites", "42")]);

        cache.save(&request, &json!({"organic_results": []}))?;
        assert_eq!(cache.load(&request), Some(json!({"organic_results": []})));
        assert_eq!(cache.len(), 1);

        cache.clear()?;
        assert!(cache.load(&request).is_none());
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn test_key_ignores_api_key_and_is_distinct() {
        let a = params(&[("engine", "google_scholar"), ("start", "0"), ("api_key", "secret")]);
        let b = params(&[("engine", "google_scholar"), ("start", "0")]);
        let c = params(&[("engine", "google_scholar"), ("start", "20")]);

        assert_eq!(ResponseCache::key(&a), ResponseCache::key(&b));
        assert_ne!(ResponseCache::key(&b), ResponseCache::key(&c));
        assert!(!ResponseCache::key(&a).contains("secret"));
    }

    #[test]
    fn test_key_length_bounded() {
        let long = "word ".repeat(200);
        let key = ResponseCache::key(&params(&[("q", long.as_str())]));
        assert!(key.len() < 200);
    }

    #[test]
    fn test_key_ends_with_sha256_digest() {
        let key = ResponseCache::key(&params(&[("engine", "google_scholar")]));
        let digest = key
            .strip_prefix("engine_google_scholar_")
            .and_then(|rest| rest.strip_suffix(".json"))
            .unwrap_or_default();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        // sha256("engine=google_scholar")
        let mut hasher = Sha256::new();
        hasher.update(b"engine=google_scholar");
        assert_eq!(digest, format!("{:x}", hasher.finalize()));
    }
}
