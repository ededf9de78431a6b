//! Detail slice: the single entry currently being viewed.

use jikan_client::api::Anime;
use jikan_client::ApiResult;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailStatus {
    Idle,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug)]
pub enum DetailEvent {
    Requested(u32),
    Cleared,
    Completed { mal_id: u32, outcome: ApiResult<Anime> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailEffect {
    Fetch(u32),
    /// Drop the outstanding fetch, if any
    Abandon,
}

#[derive(Debug, Clone)]
pub struct DetailState {
    requested: Option<u32>,
    anime: Option<Anime>,
    status: DetailStatus,
    error: Option<String>,
}

impl Default for DetailState {
    fn default() -> Self {
        Self {
            requested: None,
            anime: None,
            status: DetailStatus::Idle,
            error: None,
        }
    }
}

impl DetailState {
    pub fn requested(&self) -> Option<u32> {
        self.requested
    }

    pub fn anime(&self) -> Option<&Anime> {
        self.anime.as_ref()
    }

    pub fn status(&self) -> DetailStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.status == DetailStatus::Loading
    }

    pub fn apply(&mut self, event: DetailEvent) -> Vec<DetailEffect> {
        match event {
            DetailEvent::Requested(mal_id) => {
                // Keep what is on screen only if it is the same entry.
                if self.anime.as_ref().map(|a| a.mal_id) != Some(mal_id) {
                    self.anime = None;
                }
                self.requested = Some(mal_id);
                self.status = DetailStatus::Loading;
                self.error = None;
                vec![DetailEffect::Fetch(mal_id)]
            }
            DetailEvent::Cleared => {
                let was_loading = self.is_loading();
                *self = Self::default();
                if was_loading {
                    vec![DetailEffect::Abandon]
                } else {
                    Vec::new()
                }
            }
            DetailEvent::Completed { mal_id, outcome } => {
                if self.requested != Some(mal_id) || !self.is_loading() {
                    debug!(mal_id = mal_id, "Discarding stale detail result");
                    return Vec::new();
                }

                match outcome {
                    Ok(anime) => {
                        self.anime = Some(anime);
                        self.error = None;
                        self.status = DetailStatus::Loaded;
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => {
                        warn!(mal_id = mal_id, error = %e, "Failed to load anime details");
                        self.anime = None;
                        self.error = Some(e.to_string());
                        self.status = DetailStatus::Failed;
                    }
                }
                Vec::new()
            }
        }
    }
}
