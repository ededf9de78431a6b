//! Carousel slice: rotating highlight of the most popular entries.
//!
//! Every index change is two-phase: the carousel first enters
//! [`Phase::Transitioning`] and only commits the new index when the settle
//! timer fires. Navigation during a transition replaces the pending target;
//! transitions are never queued.

use jikan_client::api::Anime;
use jikan_client::ApiResult;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Settled { index: usize },
    Transitioning { from: usize, to: usize },
}

/// Manual navigation target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateTo {
    Next,
    Previous,
    Index(usize),
}

#[derive(Debug)]
pub enum CarouselEvent {
    Mount,
    Loaded(ApiResult<Vec<Anime>>),
    /// Auto-advance interval elapsed
    Tick,
    Navigate(NavigateTo),
    /// Settle timer for transition `seq` elapsed
    Settle(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarouselEffect {
    FetchTop,
    /// (Re)start the auto-advance interval from now
    StartAutoAdvance { every: Duration },
    /// Replace any pending settle timer
    ScheduleSettle { seq: u64, after: Duration },
}

#[derive(Debug, Clone)]
pub struct CarouselState {
    items: Vec<Anime>,
    phase: Phase,
    loading: bool,
    error: Option<String>,
    fetched: bool,
    seq: u64,
    interval: Duration,
    settle: Duration,
}

impl Default for CarouselState {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_SETTLE)
    }
}

impl CarouselState {
    pub fn new(interval: Duration, settle: Duration) -> Self {
        Self {
            items: Vec::new(),
            phase: Phase::Settled { index: 0 },
            loading: false,
            error: None,
            fetched: false,
            seq: 0,
            interval,
            settle,
        }
    }

    pub fn items(&self) -> &[Anime] {
        &self.items
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Index currently on screen
    pub fn current_index(&self) -> usize {
        match self.phase {
            Phase::Settled { index } => index,
            Phase::Transitioning { from, .. } => from,
        }
    }

    pub fn current(&self) -> Option<&Anime> {
        self.items.get(self.current_index())
    }

    /// Index being transitioned to, if any
    pub fn incoming_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Transitioning { to, .. } => Some(to),
            Phase::Settled { .. } => None,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, Phase::Transitioning { .. })
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn apply(&mut self, event: CarouselEvent) -> Vec<CarouselEffect> {
        match event {
            CarouselEvent::Mount => {
                if self.fetched {
                    return Vec::new();
                }
                self.fetched = true;
                self.loading = true;
                self.error = None;
                vec![CarouselEffect::FetchTop]
            }
            CarouselEvent::Loaded(Ok(items)) => {
                self.loading = false;
                self.items = items;
                self.seq += 1;
                self.phase = Phase::Settled { index: 0 };
                if self.items.is_empty() {
                    Vec::new()
                } else {
                    vec![CarouselEffect::StartAutoAdvance {
                        every: self.interval,
                    }]
                }
            }
            CarouselEvent::Loaded(Err(e)) => {
                if !e.is_cancelled() {
                    warn!(error = %e, "Failed to fetch top anime");
                    self.loading = false;
                    self.error = Some(e.to_string());
                }
                Vec::new()
            }
            CarouselEvent::Tick => match self.phase {
                Phase::Settled { index } if !self.items.is_empty() => {
                    let to = (index + 1) % self.items.len();
                    self.begin(index, to)
                }
                _ => Vec::new(),
            },
            CarouselEvent::Navigate(target) => self.navigate(target),
            CarouselEvent::Settle(seq) => match self.phase {
                Phase::Transitioning { to, .. } if seq == self.seq => {
                    self.phase = Phase::Settled { index: to };
                    vec![CarouselEffect::StartAutoAdvance {
                        every: self.interval,
                    }]
                }
                _ => {
                    debug!(seq = seq, "Ignoring stale settle timer");
                    Vec::new()
                }
            },
        }
    }

    fn navigate(&mut self, target: NavigateTo) -> Vec<CarouselEffect> {
        let len = self.items.len();
        if len == 0 {
            return Vec::new();
        }

        // Relative moves continue from wherever the carousel is heading.
        let base = self.incoming_index().unwrap_or_else(|| self.current_index());
        let to = match target {
            NavigateTo::Next => (base + 1) % len,
            NavigateTo::Previous => (base + len - 1) % len,
            NavigateTo::Index(i) if i < len && i != base => i,
            NavigateTo::Index(_) => return Vec::new(),
        };

        self.begin(self.current_index(), to)
    }

    fn begin(&mut self, from: usize, to: usize) -> Vec<CarouselEffect> {
        self.seq += 1;
        self.phase = Phase::Transitioning { from, to };
        vec![CarouselEffect::ScheduleSettle {
            seq: self.seq,
            after: self.settle,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jikan_client::ApiError;

    fn loaded(n: usize) -> CarouselState {
        let mut state = CarouselState::default();
        assert_eq!(state.apply(CarouselEvent::Mount), vec![CarouselEffect::FetchTop]);
        let items = (0..n)
            .map(|i| {
                serde_json::from_value(serde_json::json!({
                    "mal_id": i as u32 + 1,
                    "title": format!("Top {}", i + 1),
                }))
                .unwrap()
            })
            .collect();
        state.apply(CarouselEvent::Loaded(Ok(items)));
        state
    }

    fn settle_seq(effects: &[CarouselEffect]) -> u64 {
        match effects {
            [CarouselEffect::ScheduleSettle { seq, after }] => {
                assert_eq!(*after, DEFAULT_SETTLE);
                *seq
            }
            other => panic!("expected a settle timer, got {other:?}"),
        }
    }

    #[test]
    fn test_mount_fetches_once() {
        let mut state = loaded(3);
        assert!(state.apply(CarouselEvent::Mount).is_empty());
        assert_eq!(state.items().len(), 3);
        assert!(!state.is_loading());
    }

    #[test]
    fn test_load_starts_auto_advance() {
        let mut state = CarouselState::default();
        state.apply(CarouselEvent::Mount);
        let items = vec![serde_json::from_value(serde_json::json!({"mal_id": 1, "title": "A"})).unwrap()];
        assert_eq!(
            state.apply(CarouselEvent::Loaded(Ok(items))),
            vec![CarouselEffect::StartAutoAdvance {
                every: DEFAULT_INTERVAL
            }]
        );
    }

    #[test]
    fn test_auto_advance_wraps_after_settle() {
        let mut state = loaded(3);
        for _ in 0..2 {
            let seq = settle_seq(&state.apply(CarouselEvent::Tick));
            state.apply(CarouselEvent::Settle(seq));
        }
        assert_eq!(state.phase(), Phase::Settled { index: 2 });

        let seq = settle_seq(&state.apply(CarouselEvent::Tick));
        assert!(state.is_transitioning());
        assert_eq!(state.current_index(), 2);
        assert_eq!(state.incoming_index(), Some(0));

        let effects = state.apply(CarouselEvent::Settle(seq));
        assert_eq!(state.phase(), Phase::Settled { index: 0 });
        assert_eq!(
            effects,
            vec![CarouselEffect::StartAutoAdvance {
                every: DEFAULT_INTERVAL
            }]
        );
    }

    #[test]
    fn test_manual_navigation_overrides_pending_transition() {
        let mut state = loaded(5);
        let auto = settle_seq(&state.apply(CarouselEvent::Tick));
        assert_eq!(state.incoming_index(), Some(1));

        let manual = settle_seq(&state.apply(CarouselEvent::Navigate(NavigateTo::Index(4))));
        assert_eq!(state.phase(), Phase::Transitioning { from: 0, to: 4 });

        // the overridden timer no longer commits anything
        assert!(state.apply(CarouselEvent::Settle(auto)).is_empty());
        assert!(state.is_transitioning());

        state.apply(CarouselEvent::Settle(manual));
        assert_eq!(state.phase(), Phase::Settled { index: 4 });
    }

    #[test]
    fn test_relative_navigation_from_pending_target() {
        let mut state = loaded(4);
        state.apply(CarouselEvent::Navigate(NavigateTo::Next));
        let seq = settle_seq(&state.apply(CarouselEvent::Navigate(NavigateTo::Next)));
        assert_eq!(state.phase(), Phase::Transitioning { from: 0, to: 2 });
        state.apply(CarouselEvent::Settle(seq));

        let seq = settle_seq(&state.apply(CarouselEvent::Navigate(NavigateTo::Previous)));
        state.apply(CarouselEvent::Settle(seq));
        assert_eq!(state.current_index(), 1);

        state.apply(CarouselEvent::Navigate(NavigateTo::Previous));
        let seq = settle_seq(&state.apply(CarouselEvent::Navigate(NavigateTo::Previous)));
        state.apply(CarouselEvent::Settle(seq));
        assert_eq!(state.current_index(), 3);
    }

    #[test]
    fn test_tick_during_transition_is_skipped() {
        let mut state = loaded(3);
        state.apply(CarouselEvent::Navigate(NavigateTo::Index(2)));
        assert!(state.apply(CarouselEvent::Tick).is_empty());
        assert_eq!(state.incoming_index(), Some(2));
    }

    #[test]
    fn test_jump_to_current_or_out_of_range_is_noop() {
        let mut state = loaded(3);
        assert!(state.apply(CarouselEvent::Navigate(NavigateTo::Index(0))).is_empty());
        assert!(state.apply(CarouselEvent::Navigate(NavigateTo::Index(3))).is_empty());
        assert_eq!(state.phase(), Phase::Settled { index: 0 });
    }

    #[test]
    fn test_empty_carousel_ignores_navigation() {
        let mut state = loaded(0);
        assert!(state.apply(CarouselEvent::Tick).is_empty());
        assert!(state.apply(CarouselEvent::Navigate(NavigateTo::Next)).is_empty());
        assert!(state.current().is_none());
    }

    #[test]
    fn test_fetch_failure_recorded() {
        let mut state = CarouselState::default();
        state.apply(CarouselEvent::Mount);
        state.apply(CarouselEvent::Loaded(Err(ApiError::RateLimited)));
        assert!(!state.is_loading());
        assert_eq!(
            state.error(),
            Some("Rate limit exceeded. Please try again later.")
        );
        assert!(state.items().is_empty());
    }
}
