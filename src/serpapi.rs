//! SerpApi client for the Google Scholar engines.
//!
//! Requests are issued one at a time. Paginated queries are exposed through
//! [`Pager`], which follows `serpapi_pagination.next` until the upstream
//! stops advertising a next page.

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::{OptionExt, Result, ScholarMapError};
use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Request parameters, ordered so cache keys are stable
pub type Params = BTreeMap<String, String>;

/// Upstream message for a query without results; treated as an empty page
const NO_RESULTS_MARKER: &str = "hasn't returned any results";

/// Client for `GET {base_url}/search.json`
pub struct SerpApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    sort: String,
    cache: Option<ResponseCache>,
    overwrite: bool,
    profiles: Mutex<HashMap<String, AuthorProfile>>,
}

impl SerpApiClient {
    /// Build a client from the run configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("scholarmap/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ScholarMapError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let cache = config.cache_dir.as_ref().map(|dir| ResponseCache::with_dir(dir.clone()));

        Ok(Self {
            client,
            base_url: config.trimmed_base_url().to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
            sort: config.sort.clone(),
            cache,
            overwrite: config.overwrite,
            profiles: Mutex::new(HashMap::new()),
        })
    }

    /// Articles of an author profile (`google_scholar_author`, key `articles`).
    pub fn articles(&self, author_id: &str) -> Pager<'_, AuthorArticle> {
        let mut params = self.base_params("google_scholar_author");
        params.insert("author_id".to_string(), author_id.to_string());
        params.insert("sort".to_string(), self.sort.clone());
        Pager::new(self, params, "articles")
    }

    /// Works citing one article (`google_scholar` with `cites`, key `organic_results`).
    pub fn citations(&self, cites_id: &str) -> Pager<'_, OrganicResult> {
        let mut params = self.base_params("google_scholar");
        params.insert("cites".to_string(), cites_id.to_string());
        params.insert("sort".to_string(), self.sort.clone());
        Pager::new(self, params, "organic_results")
    }

    /// Profile of a citing author. Looked up at most once per client.
    pub async fn author_profile(&self, author_id: &str) -> Result<AuthorProfile> {
        if let Some(profile) = self.profiles.lock().ok().and_then(|p| p.get(author_id).cloned()) {
            debug!(author_id, "Profile memo hit");
            return Ok(profile);
        }

        let mut params = Params::new();
        params.insert("engine".to_string(), "google_scholar_author".to_string());
        params.insert("author_id".to_string(), author_id.to_string());

        let body = self.search(&params).await?;
        let profile = parse_profile(author_id, &body)?;

        if let Ok(mut memo) = self.profiles.lock() {
            memo.insert(author_id.to_string(), profile.clone());
        }
        Ok(profile)
    }

    /// Raw Google Scholar HTML for a free-text query, via `search_metadata.raw_html_file`.
    pub async fn raw_html_for_query(&self, query: &str) -> Result<String> {
        let mut params = Params::new();
        params.insert("engine".to_string(), "google_scholar".to_string());
        params.insert("q".to_string(), query.to_string());
        params.insert("sort".to_string(), self.sort.clone());

        let body = self.search(&params).await?;
        let url = body
            .pointer("/search_metadata/raw_html_file")
            .and_then(Value::as_str)
            .ok_or_parse("search_metadata.raw_html_file missing")?;

        self.raw_html(url).await
    }

    /// Fetch a raw HTML file stored by SerpApi.
    pub async fn raw_html(&self, url: &str) -> Result<String> {
        let mut key = Params::new();
        key.insert("raw_html".to_string(), url.to_string());

        if let Some(Value::String(html)) = self.cached(&key) {
            return Ok(html);
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify(status.as_u16(), &format!("HTTP error fetching raw HTML: {}", status)));
        }
        let html = response.text().await?;

        self.store(&key, &Value::String(html.clone()));
        Ok(html)
    }

    /// Issue one search request and return the JSON body.
    pub async fn search(&self, params: &Params) -> Result<Value> {
        if self.api_key.trim().is_empty() {
            return Err(ScholarMapError::Authentication(
                "no API key configured (set SERP_API_KEY or --api-key)".to_string(),
            ));
        }

        if let Some(body) = self.cached(params) {
            return Ok(body);
        }

        let url = format!("{}/search.json", self.base_url);
        debug!(url = %url, params = ?params, "SerpApi request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let body: Option<Value> = serde_json::from_str(&text).ok();
        let upstream_error = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if !status.is_success() {
            let message = upstream_error.unwrap_or_else(|| format!("HTTP error: {}", status));
            warn!(status = status.as_u16(), error = %message, "SerpApi request failed");
            return Err(classify(status.as_u16(), &message));
        }

        let body = body.ok_or_parse("SerpApi response is not JSON")?;

        if let Some(message) = upstream_error {
            if !message.contains(NO_RESULTS_MARKER) {
                return Err(classify(status.as_u16(), &message));
            }
            debug!(params = ?params, "Upstream reported no results");
        }

        self.store(params, &body);
        Ok(body)
    }

    fn base_params(&self, engine: &str) -> Params {
        let mut params = Params::new();
        params.insert("engine".to_string(), engine.to_string());
        params.insert("num".to_string(), self.page_size.to_string());
        params.insert("start".to_string(), "0".to_string());
        params
    }

    fn cached(&self, params: &Params) -> Option<Value> {
        if self.overwrite {
            return None;
        }
        self.cache.as_ref().and_then(|c| c.load(params))
    }

    fn store(&self, params: &Params, body: &Value) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.save(params, body) {
                warn!(error = %e, "Failed to write response cache");
            }
        }
    }
}

/// Map an upstream failure onto the error taxonomy.
pub fn classify(status: u16, message: &str) -> ScholarMapError {
    let lower = message.to_lowercase();

    if status == 401 || status == 403 || lower.contains("invalid api key") || (lower.contains("api key") && lower.contains("missing")) {
        ScholarMapError::Authentication(message.to_string())
    } else if status == 429 || lower.contains("run out of searches") || lower.contains("rate limit") {
        ScholarMapError::RateLimited(message.to_string())
    } else {
        ScholarMapError::Api {
            code: status as i32,
            message: message.to_string(),
        }
    }
}

/// Restartable, lazily evaluated walk over one paginated query.
pub struct Pager<'a, T> {
    client: &'a SerpApiClient,
    key: &'static str,
    initial: Params,
    next: Option<Params>,
    pages: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: DeserializeOwned> Pager<'a, T> {
    fn new(client: &'a SerpApiClient, initial: Params, key: &'static str) -> Self {
        Self {
            client,
            key,
            next: Some(initial.clone()),
            initial,
            pages: 0,
            _marker: PhantomData,
        }
    }

    /// Fetch the next page; `Ok(None)` once the query is exhausted.
    ///
    /// A failed request leaves the cursor in place, so calling again
    /// re-requests the same page.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        let Some(params) = self.next.clone() else {
            return Ok(None);
        };

        let body = self.client.search(&params).await?;
        let items = extract_items::<T>(&body, self.key)?;

        self.next = next_params(&params, &body)?;
        if self.next.as_ref() == Some(&params) {
            warn!(key = self.key, "Pagination cursor did not advance, stopping");
            self.next = None;
        }
        self.pages += 1;

        debug!(key = self.key, page = self.pages, items = items.len(), more = self.next.is_some(), "Fetched page");
        Ok(Some(items))
    }

    /// Rewind to the first page.
    pub fn restart(&mut self) {
        self.next = Some(self.initial.clone());
        self.pages = 0;
    }

    /// Pages fetched since the last restart
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Drain the remaining pages into one vector.
    pub async fn collect_all(&mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        info!(key = self.key, pages = self.pages, total = all.len(), "Pagination complete");
        Ok(all)
    }

    /// Items of all remaining pages as a stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + 'a
    where
        T: 'a,
    {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok::<_, ScholarMapError>(
                page.map(|items| (stream::iter(items.into_iter().map(Ok::<T, ScholarMapError>)), pager)),
            )
        })
        .try_flatten()
    }
}

/// Items under `key`; a missing key is an empty page.
fn extract_items<T: DeserializeOwned>(body: &Value, key: &str) -> Result<Vec<T>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(items) => serde_json::from_value(items.clone())
            .map_err(|e| ScholarMapError::Parse(format!("Unexpected '{}' payload: {}", key, e))),
    }
}

/// Parameters for the next page: the query of `serpapi_pagination.next`
/// merged over the current parameters.
pub fn next_params(current: &Params, body: &Value) -> Result<Option<Params>> {
    let Some(next) = body.pointer("/serpapi_pagination/next").and_then(Value::as_str) else {
        return Ok(None);
    };

    let url = Url::parse(next).map_err(|e| ScholarMapError::Parse(format!("Invalid pagination URL '{}': {}", next, e)))?;

    let mut params = current.clone();
    for (k, v) in url.query_pairs() {
        if k != "api_key" {
            params.insert(k.into_owned(), v.into_owned());
        }
    }
    Ok(Some(params))
}

// === SerpApi Response Types ===

/// One article of the tracked author
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorArticle {
    pub title: String,
    #[serde(default)]
    pub citation_id: String,
    #[serde(default)]
    pub cited_by: Option<ArticleCitedBy>,
    #[serde(default)]
    pub year: Option<String>,
}

impl AuthorArticle {
    /// Identifier for the citing-works query
    pub fn cites_id(&self) -> Option<&str> {
        self.cited_by
            .as_ref()
            .and_then(|c| c.cites_id.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Citation count advertised on the profile
    pub fn citation_count(&self) -> Option<u64> {
        self.cited_by.as_ref().and_then(|c| c.value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCitedBy {
    #[serde(default)]
    pub value: Option<u64>,
    #[serde(default)]
    pub cites_id: Option<String>,
}

/// One citing work as listed by the `google_scholar` engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicResult {
    pub result_id: String,
    pub title: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub publication_info: PublicationInfo,
    #[serde(default)]
    pub inline_links: InlineLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PublicationInfo {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub authors: Vec<ResultAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultAuthor {
    pub name: String,
    #[serde(default)]
    pub author_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InlineLinks {
    #[serde(default)]
    pub cited_by: Option<InlineCitedBy>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineCitedBy {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub cites_id: Option<String>,
}

/// Fields of an author profile used for affiliation matching
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AuthorProfile {
    pub author_id: String,
    pub name: String,
    pub affiliations: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub cited_by: Option<u64>,
}

fn parse_profile(author_id: &str, body: &Value) -> Result<AuthorProfile> {
    let author = body.get("author").ok_or_parse("profile response has no 'author'")?;
    let text = |key: &str| {
        author
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(AuthorProfile {
        author_id: author_id.to_string(),
        name: text("name").unwrap_or_default(),
        affiliations: text("affiliations"),
        email: text("email"),
        website: text("website"),
        cited_by: body.pointer("/cited_by/table/0/citations/all").and_then(Value::as_u64),
    })
}
