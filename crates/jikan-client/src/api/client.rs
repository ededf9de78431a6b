//! Jikan API client with per-call search cancellation.

use super::types::*;
use crate::error::{ApiError, ApiResult};
use crate::filter::{Filter, SearchParams};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Read-only operations the browser performs against the catalog.
///
/// No retries happen behind this trait: every failure is returned to the
/// caller.
#[async_trait]
pub trait AnimeApi: Send + Sync + 'static {
    /// One page of search results.
    ///
    /// Resolves to [`ApiError::Cancelled`] once `cancel` fires, even if a
    /// response has already arrived.
    async fn search(
        &self,
        query: &str,
        page: u32,
        filter: &Filter,
        cancel: CancellationToken,
    ) -> ApiResult<SearchResults>;

    /// Full record for one entry
    async fn get_by_id(&self, mal_id: u32) -> ApiResult<Anime>;

    /// Most popular entries
    async fn get_top_ranked(&self, limit: u32) -> ApiResult<Vec<Anime>>;
}

/// Tracks the most recently started search so a newer one can end it.
///
/// Searches may reach [`LatestSearch::supersede`] in a different order than
/// their callers issued them. A search whose own token is already cancelled
/// never takes the slot, so it cannot end the search that replaced it.
#[derive(Debug, Default)]
pub struct LatestSearch {
    current: Mutex<Option<CancellationToken>>,
}

impl LatestSearch {
    /// Register a search and cancel the previous one.
    ///
    /// Returns a child of `cancel`, so either the caller or a newer search
    /// can end this one, or `None` when `cancel` has already fired.
    pub fn supersede(&self, cancel: &CancellationToken) -> Option<CancellationToken> {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if cancel.is_cancelled() {
            return None;
        }

        let token = cancel.child_token();
        if let Some(previous) = current.replace(token.clone()) {
            if !previous.is_cancelled() {
                debug!("Cancelling superseded search");
                previous.cancel();
            }
        }

        Some(token)
    }
}

/// Jikan API v4 client
pub struct JikanClient {
    /// HTTP client
    client: Client,
    /// Base URL for Jikan API
    base_url: Url,
    /// Results per search page
    page_size: u32,
    /// Token of the most recently issued search
    latest_search: LatestSearch,
}

impl JikanClient {
    /// Create a new Jikan client
    pub fn new(
        base_url: &str,
        page_size: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> ApiResult<Self> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidBaseUrl(base_url.to_string()))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url,
            page_size,
            latest_search: LatestSearch::default(),
        })
    }

    /// Base URL with `segments` appended to its path
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn search_url(&self, query: &str, page: u32, filter: &Filter) -> Url {
        let mut url = self.endpoint(&["anime"]);
        SearchParams::new(query, page, self.page_size, filter).apply_to(&mut url);
        url
    }

    pub fn detail_url(&self, mal_id: u32) -> Url {
        self.endpoint(&["anime", &mal_id.to_string(), "full"])
    }

    pub fn top_url(&self, limit: u32) -> Url {
        let mut url = self.endpoint(&["top", "anime"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("filter", "bypopularity");
        url
    }

    /// Make a GET request and decode the JSON body
    async fn get<T: DeserializeOwned>(&self, url: Url, detail: bool) -> ApiResult<T> {
        debug!(url = %url, "Making API request");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Request error");
            ApiError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Request failed");
            return Err(ApiError::from_status(status, detail));
        }

        match response.json::<T>().await {
            Ok(data) => {
                debug!(url = %url, "Request successful");
                Ok(data)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to parse response");
                Err(ApiError::Transport(e))
            }
        }
    }
}

#[async_trait]
impl AnimeApi for JikanClient {
    async fn search(
        &self,
        query: &str,
        page: u32,
        filter: &Filter,
        cancel: CancellationToken,
    ) -> ApiResult<SearchResults> {
        let Some(token) = self.latest_search.supersede(&cancel) else {
            debug!(query = %query, page = page, "Search cancelled before it started");
            return Err(ApiError::Cancelled);
        };
        let url = self.search_url(query, page, filter);

        info!(query = %query, page = page, "Searching anime");

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(ApiError::Cancelled),
            result = self.get::<SearchResults>(url, false) => result,
        };

        // A response that lands after cancellation is still stale.
        if token.is_cancelled() {
            debug!(query = %query, page = page, "Search cancelled");
            return Err(ApiError::Cancelled);
        }

        result
    }

    async fn get_by_id(&self, mal_id: u32) -> ApiResult<Anime> {
        info!(mal_id = mal_id, "Fetching anime details");
        let response: DetailResponse<Anime> = self.get(self.detail_url(mal_id), true).await?;
        Ok(response.data)
    }

    async fn get_top_ranked(&self, limit: u32) -> ApiResult<Vec<Anime>> {
        info!(limit = limit, "Fetching top anime by popularity");
        let response: DataResponse<Anime> = self.get(self.top_url(limit), false).await?;
        Ok(response.data)
    }
}
