//! Search slice: query text, filters, page cursor and the current result set.
//!
//! [`SearchState::apply`] is a pure transition function. It never performs
//! I/O itself; instead it returns [`SearchEffect`]s which the store executes
//! (timers, remote calls, cancellation).

use jikan_client::api::{Anime, Pagination, SearchResults};
use jikan_client::{ApiResult, Filter, FilterPatch};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Quiet period after the last keystroke before a search is issued
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Identity of one issued search request.
///
/// Fresh per request and compared by equality on completion, so a response
/// is applied only if its request is still the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// A search the store should send to the remote client
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub id: RequestId,
    pub query: String,
    pub page: u32,
    pub filter: Filter,
}

#[derive(Debug)]
pub enum SearchEvent {
    /// Initial mount of the browse view
    Start,
    QueryChanged(String),
    FiltersChanged(FilterPatch),
    FiltersCleared,
    PageRequested(u32),
    DebounceElapsed(u64),
    Completed {
        request: RequestId,
        outcome: ApiResult<SearchResults>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEffect {
    /// Replace any pending debounce timer
    ScheduleDebounce { generation: u64, delay: Duration },
    CancelDebounce,
    /// Start a search, cancelling whichever one is outstanding
    Issue(SearchRequest),
    /// Cancel the outstanding search without starting another
    CancelInFlight,
}

#[derive(Debug, Clone)]
pub struct SearchState {
    query: String,
    filter: Filter,
    page: u32,
    results: Vec<Anime>,
    pagination: Option<Pagination>,
    status: SearchStatus,
    error: Option<String>,
    debounce: Duration,
    debounce_generation: u64,
    debounce_pending: bool,
    in_flight: Option<RequestId>,
    last_request: u64,
    /// Set once the unfiltered browse fetch has been issued for the current
    /// "empty query, default filters" period.
    browse_fetched: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl SearchState {
    pub fn new(debounce: Duration) -> Self {
        Self {
            query: String::new(),
            filter: Filter::default(),
            page: 1,
            results: Vec::new(),
            pagination: None,
            status: SearchStatus::Idle,
            error: None,
            debounce,
            debounce_generation: 0,
            debounce_pending: false,
            in_flight: None,
            last_request: 0,
            browse_fetched: false,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn results(&self) -> &[Anime] {
        &self.results
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    /// Last page reported by the most recent result set
    pub fn last_page(&self) -> Option<u32> {
        self.pagination.as_ref().map(|p| p.last_visible_page)
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == SearchStatus::Loading
    }

    /// A query change is waiting out the debounce delay
    pub fn debounce_pending(&self) -> bool {
        self.debounce_pending
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight
    }

    /// Empty query and no refinements beyond the defaults
    pub fn is_browse_view(&self) -> bool {
        self.query.trim().is_empty() && !self.filter.has_active_refinements()
    }

    pub fn apply(&mut self, event: SearchEvent) -> Vec<SearchEffect> {
        let mut effects = Vec::new();

        match event {
            SearchEvent::Start => {}
            SearchEvent::QueryChanged(text) => self.on_query_changed(text, &mut effects),
            SearchEvent::FiltersChanged(patch) => {
                self.filter.merge(patch);
                self.on_filter_changed(&mut effects);
            }
            SearchEvent::FiltersCleared => {
                self.filter = Filter::default();
                self.on_filter_changed(&mut effects);
            }
            SearchEvent::PageRequested(page) => self.on_page_requested(page, &mut effects),
            SearchEvent::DebounceElapsed(generation) => {
                if generation != self.debounce_generation || !self.debounce_pending {
                    debug!(generation = generation, "Ignoring stale debounce timer");
                } else {
                    self.debounce_pending = false;
                    self.issue(1, &mut effects);
                }
            }
            SearchEvent::Completed { request, outcome } => self.on_completed(request, outcome),
        }

        self.maybe_browse(&mut effects);
        effects
    }

    fn on_query_changed(&mut self, text: String, effects: &mut Vec<SearchEffect>) {
        if text == self.query {
            return;
        }

        self.query = text;
        self.reset_results();

        if self.in_flight.take().is_some() {
            effects.push(SearchEffect::CancelInFlight);
        }

        self.debounce_generation += 1;
        if self.query.trim().is_empty() {
            if self.debounce_pending {
                effects.push(SearchEffect::CancelDebounce);
            }
            self.debounce_pending = false;
        } else {
            self.debounce_pending = true;
            effects.push(SearchEffect::ScheduleDebounce {
                generation: self.debounce_generation,
                delay: self.debounce,
            });
        }
    }

    fn on_filter_changed(&mut self, effects: &mut Vec<SearchEffect>) {
        self.reset_results();

        if self.debounce_pending {
            self.debounce_pending = false;
            self.debounce_generation += 1;
            effects.push(SearchEffect::CancelDebounce);
        }

        self.issue(1, effects);
    }

    fn on_page_requested(&mut self, page: u32, effects: &mut Vec<SearchEffect>) {
        if self.is_loading() {
            debug!(page = page, "Ignoring page change while loading");
            return;
        }

        match self.last_page() {
            Some(last) if (1..=last).contains(&page) => self.issue(page, effects),
            last => debug!(page = page, last_page = ?last, "Ignoring out-of-range page"),
        }
    }

    fn on_completed(&mut self, request: RequestId, outcome: ApiResult<SearchResults>) {
        if self.in_flight != Some(request) {
            debug!(request = %request, "Discarding superseded search result");
            return;
        }

        match outcome {
            Ok(results) => {
                info!(
                    request = %request,
                    count = results.data.len(),
                    last_page = results.pagination.last_visible_page,
                    "Search results applied"
                );
                self.in_flight = None;
                self.results = results.data;
                self.pagination = Some(results.pagination);
                self.error = None;
                self.status = SearchStatus::Loaded;
            }
            Err(e) if e.is_cancelled() => {
                debug!(request = %request, "Search cancelled");
            }
            Err(e) => {
                warn!(request = %request, error = %e, "Search failed");
                self.in_flight = None;
                self.results.clear();
                self.pagination = None;
                self.error = Some(e.to_string());
                self.status = SearchStatus::Failed;
            }
        }
    }

    /// Issue the one unfiltered browse fetch when the view is back to an
    /// empty query with default filters.
    fn maybe_browse(&mut self, effects: &mut Vec<SearchEffect>) {
        if !self.is_browse_view() {
            self.browse_fetched = false;
            return;
        }

        if !self.browse_fetched && self.in_flight.is_none() && !self.debounce_pending {
            info!("Loading unfiltered browse view");
            self.issue(1, effects);
        }
    }

    fn issue(&mut self, page: u32, effects: &mut Vec<SearchEffect>) {
        self.last_request += 1;
        let id = RequestId(self.last_request);

        self.page = page;
        self.in_flight = Some(id);
        self.status = SearchStatus::Loading;
        self.error = None;
        self.browse_fetched = self.is_browse_view();

        info!(request = %id, query = %self.query, page = page, "Issuing search");

        effects.push(SearchEffect::Issue(SearchRequest {
            id,
            query: self.query.clone(),
            page,
            filter: self.filter.clone(),
        }));
    }

    fn reset_results(&mut self) {
        self.page = 1;
        self.results.clear();
        self.pagination = None;
        self.error = None;
        self.status = SearchStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jikan_client::api::PaginatedResponse;
    use jikan_client::{AnimeType, ApiError, SortDirection};

    fn anime(mal_id: u32, title: &str) -> Anime {
        serde_json::from_value(serde_json::json!({ "mal_id": mal_id, "title": title })).unwrap()
    }

    fn page_of(titles: &[&str], current: u32, last: u32) -> SearchResults {
        PaginatedResponse {
            data: titles
                .iter()
                .enumerate()
                .map(|(i, t)| anime(i as u32 + 1, t))
                .collect(),
            pagination: Pagination {
                last_visible_page: last,
                has_next_page: current < last,
                current_page: current,
                items: None,
            },
        }
    }

    fn issued(effects: &[SearchEffect]) -> Vec<SearchRequest> {
        effects
            .iter()
            .filter_map(|e| match e {
                SearchEffect::Issue(req) => Some(req.clone()),
                _ => None,
            })
            .collect()
    }

    fn debounce_generation(effects: &[SearchEffect]) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                SearchEffect::ScheduleDebounce { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("debounce scheduled")
    }

    /// State after the bootstrap fetch resolved with `last` pages
    fn loaded(last: u32) -> SearchState {
        let mut state = SearchState::default();
        let effects = state.apply(SearchEvent::Start);
        let req = issued(&effects).remove(0);
        state.apply(SearchEvent::Completed {
            request: req.id,
            outcome: Ok(page_of(&["Fullmetal Alchemist"], 1, last)),
        });
        state
    }

    #[test]
    fn test_bootstrap_fires_once() {
        let mut state = SearchState::default();
        let effects = state.apply(SearchEvent::Start);
        let reqs = issued(&effects);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query, "");
        assert_eq!(reqs[0].page, 1);
        assert_eq!(reqs[0].filter, Filter::default());
        assert!(state.is_loading());

        assert!(state.apply(SearchEvent::Start).is_empty());

        state.apply(SearchEvent::Completed {
            request: reqs[0].id,
            outcome: Ok(page_of(&["A"], 1, 1)),
        });
        assert!(state.apply(SearchEvent::Start).is_empty());
        assert_eq!(state.status(), SearchStatus::Loaded);
    }

    #[test]
    fn test_bootstrap_does_not_refire_after_failure() {
        let mut state = SearchState::default();
        let req = issued(&state.apply(SearchEvent::Start)).remove(0);
        let effects = state.apply(SearchEvent::Completed {
            request: req.id,
            outcome: Err(ApiError::RateLimited),
        });
        assert!(effects.is_empty());
        assert_eq!(state.status(), SearchStatus::Failed);
        assert!(state.apply(SearchEvent::Start).is_empty());
    }

    #[test]
    fn test_query_change_debounces_and_clears_results() {
        let mut state = loaded(3);
        assert_eq!(state.results().len(), 1);

        let effects = state.apply(SearchEvent::QueryChanged("naruto".into()));
        assert!(issued(&effects).is_empty());
        assert!(effects.contains(&SearchEffect::ScheduleDebounce {
            generation: 1,
            delay: DEFAULT_DEBOUNCE,
        }));
        assert!(state.results().is_empty());
        assert!(state.pagination().is_none());
        assert_eq!(state.page(), 1);
        assert!(state.debounce_pending());

        let reqs = issued(&state.apply(SearchEvent::DebounceElapsed(1)));
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query, "naruto");
        assert_eq!(reqs[0].page, 1);
        assert!(!state.debounce_pending());
    }

    #[test]
    fn test_debounce_collapses_to_latest_text() {
        let mut state = loaded(1);

        let first = debounce_generation(&state.apply(SearchEvent::QueryChanged("nar".into())));
        let second = debounce_generation(&state.apply(SearchEvent::QueryChanged("naruto".into())));
        assert_ne!(first, second);

        assert!(issued(&state.apply(SearchEvent::DebounceElapsed(first))).is_empty());
        let reqs = issued(&state.apply(SearchEvent::DebounceElapsed(second)));
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query, "naruto");
    }

    #[test]
    fn test_query_change_cancels_outstanding_search() {
        let mut state = loaded(1);
        state.apply(SearchEvent::QueryChanged("bebop".into()));
        let req = issued(&state.apply(SearchEvent::DebounceElapsed(1))).remove(0);

        let effects = state.apply(SearchEvent::QueryChanged("bebop cowboy".into()));
        assert!(effects.contains(&SearchEffect::CancelInFlight));

        state.apply(SearchEvent::Completed {
            request: req.id,
            outcome: Ok(page_of(&["Cowboy Bebop"], 1, 1)),
        });
        assert!(state.results().is_empty());
        assert_eq!(state.status(), SearchStatus::Idle);
    }

    #[test]
    fn test_emptying_query_returns_to_browse_view() {
        let mut state = loaded(1);
        state.apply(SearchEvent::QueryChanged("x".into()));

        let effects = state.apply(SearchEvent::QueryChanged("".into()));
        assert!(effects.contains(&SearchEffect::CancelDebounce));
        assert!(!state.debounce_pending());

        let reqs = issued(&effects);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query, "");
    }

    #[test]
    fn test_emptying_query_with_refinements_stays_idle() {
        let mut state = loaded(1);
        let req = issued(&state.apply(SearchEvent::FiltersChanged(FilterPatch {
            anime_type: Some(Some(AnimeType::Movie)),
            ..Default::default()
        })))
        .remove(0);
        state.apply(SearchEvent::Completed {
            request: req.id,
            outcome: Ok(page_of(&["Akira"], 1, 1)),
        });

        state.apply(SearchEvent::QueryChanged("akira".into()));
        let effects = state.apply(SearchEvent::QueryChanged("   ".into()));
        assert!(issued(&effects).is_empty());
        assert_eq!(state.status(), SearchStatus::Idle);
        assert_eq!(state.filter().anime_type, Some(AnimeType::Movie));
    }

    #[test]
    fn test_filter_change_fetches_immediately() {
        let mut state = loaded(4);
        state.apply(SearchEvent::QueryChanged("gundam".into()));

        let effects = state.apply(SearchEvent::FiltersChanged(FilterPatch {
            year: Some(Some(2020)),
            ..Default::default()
        }));
        assert!(effects.contains(&SearchEffect::CancelDebounce));

        let reqs = issued(&effects);
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query, "gundam");
        assert_eq!(reqs[0].page, 1);
        assert_eq!(reqs[0].filter.year, Some(2020));
        assert!(!state.debounce_pending());
    }

    #[test]
    fn test_filter_change_with_empty_query_still_fetches() {
        let mut state = loaded(1);
        let reqs = issued(&state.apply(SearchEvent::FiltersChanged(FilterPatch {
            genres: Some(vec![1, 4]),
            ..Default::default()
        })));
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query, "");
        assert_eq!(reqs[0].filter.genres, vec![1, 4]);
    }

    #[test]
    fn test_clear_filters_restores_defaults_with_one_fetch() {
        let mut state = loaded(1);
        state.apply(SearchEvent::FiltersChanged(FilterPatch {
            sfw: Some(false),
            sort: Some(Some(SortDirection::Asc)),
            min_score: Some(Some(8.0)),
            ..Default::default()
        }));

        let reqs = issued(&state.apply(SearchEvent::FiltersCleared));
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].filter, Filter::default());
        assert!(reqs[0].filter.sfw);
        assert_eq!(state.filter(), &Filter::default());
    }

    #[test]
    fn test_page_validation() {
        let mut state = loaded(5);

        for page in [0, 6, 100] {
            let before = state.clone();
            assert!(state.apply(SearchEvent::PageRequested(page)).is_empty());
            assert_eq!(state.page(), before.page());
            assert_eq!(state.status(), before.status());
            assert_eq!(state.in_flight(), before.in_flight());
        }

        let reqs = issued(&state.apply(SearchEvent::PageRequested(3)));
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].page, 3);
        assert_eq!(state.page(), 3);
        // previous page stays visible until the new one arrives
        assert_eq!(state.results().len(), 1);

        assert!(state.apply(SearchEvent::PageRequested(4)).is_empty());
        assert_eq!(state.page(), 3);
    }

    #[test]
    fn test_page_change_without_results_is_noop() {
        let mut state = SearchState::default();
        state.apply(SearchEvent::QueryChanged("a".into()));
        assert!(state.apply(SearchEvent::PageRequested(1)).is_empty());
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let mut state = loaded(1);
        let a = issued(&state.apply(SearchEvent::FiltersChanged(FilterPatch {
            anime_type: Some(Some(AnimeType::Tv)),
            ..Default::default()
        })))
        .remove(0);
        let b = issued(&state.apply(SearchEvent::FiltersChanged(FilterPatch {
            anime_type: Some(Some(AnimeType::Movie)),
            ..Default::default()
        })))
        .remove(0);
        assert_ne!(a.id, b.id);

        state.apply(SearchEvent::Completed {
            request: b.id,
            outcome: Ok(page_of(&["Movie"], 1, 1)),
        });
        state.apply(SearchEvent::Completed {
            request: a.id,
            outcome: Ok(page_of(&["Tv"], 1, 1)),
        });
        assert_eq!(state.results()[0].title, "Movie");

        // a late failure is ignored too
        state.apply(SearchEvent::Completed {
            request: a.id,
            outcome: Err(ApiError::RateLimited),
        });
        assert_eq!(state.status(), SearchStatus::Loaded);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_cancelled_outcome_is_noop() {
        let mut state = loaded(1);
        let req = issued(&state.apply(SearchEvent::FiltersCleared)).remove(0);
        let effects = state.apply(SearchEvent::Completed {
            request: req.id,
            outcome: Err(ApiError::Cancelled),
        });
        assert!(effects.is_empty());
        assert_eq!(state.status(), SearchStatus::Loading);
        assert!(state.error().is_none());
        assert_eq!(state.in_flight(), Some(req.id));
    }

    #[test]
    fn test_failure_records_error_and_clears_results() {
        let mut state = loaded(2);
        let req = issued(&state.apply(SearchEvent::PageRequested(2))).remove(0);
        state.apply(SearchEvent::Completed {
            request: req.id,
            outcome: Err(ApiError::RateLimited),
        });

        assert_eq!(state.status(), SearchStatus::Failed);
        assert_eq!(
            state.error(),
            Some("Rate limit exceeded. Please try again later.")
        );
        assert!(state.results().is_empty());
        assert!(state.pagination().is_none());

        // no automatic retry: a new trigger is required
        assert!(state.apply(SearchEvent::Start).is_empty());
    }
}
