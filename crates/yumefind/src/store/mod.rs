//! Central state container.
//!
//! The [`Store`] owns the search, detail and carousel slices and runs as a
//! single task that handles one message at a time, so every transition is
//! serialised. Views talk to it through a cloneable [`StoreHandle`]: commands
//! go in over a channel and read-only [`AppState`] snapshots come out over a
//! `watch` channel.
//!
//! Timers and remote calls are spawned tasks that report back to the store
//! as messages. Each is held in a [`TaskSlot`] (or a cancellation guard for
//! searches), so replacing or dropping the owner cancels the work.

mod tasks;


pub use tasks::TaskSlot;

use crate::carousel::{CarouselEffect, CarouselEvent, CarouselState, NavigateTo};
use crate::detail::{DetailEffect, DetailEvent, DetailState};
use crate::search::{SearchEffect, SearchEvent, SearchRequest, SearchState};
use jikan_client::{AnimeApi, FilterPatch};
use shared::Config;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

const MIN_AUTO_ADVANCE: Duration = Duration::from_millis(1);

/// Timing and sizing knobs for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Number of entries fetched for the carousel
    pub top_limit: u32,
    pub debounce: Duration,
    pub carousel_interval: Duration,
    pub carousel_settle: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            top_limit: 10,
            debounce: crate::search::DEFAULT_DEBOUNCE,
            carousel_interval: crate::carousel::DEFAULT_INTERVAL,
            carousel_settle: crate::carousel::DEFAULT_SETTLE,
        }
    }
}

impl From<&Config> for StoreSettings {
    fn from(config: &Config) -> Self {
        Self {
            top_limit: config.api.top_limit,
            debounce: config.timing.debounce(),
            carousel_interval: config.timing.carousel_interval(),
            carousel_settle: config.timing.carousel_settle(),
        }
    }
}

/// Snapshot of every slice, as seen by the view layer
#[derive(Debug, Clone)]
pub struct AppState {
    pub search: SearchState,
    pub detail: DetailState,
    pub carousel: CarouselState,
}

impl AppState {
    fn new(settings: &StoreSettings) -> Self {
        Self {
            search: SearchState::new(settings.debounce),
            detail: DetailState::default(),
            carousel: CarouselState::new(settings.carousel_interval, settings.carousel_settle),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store is no longer running")]
    Closed,
}

#[derive(Debug)]
enum Message {
    Search(SearchEvent),
    Detail(DetailEvent),
    Carousel(CarouselEvent),
    Shutdown,
}

pub struct Store<A: AnimeApi> {
    api: Arc<A>,
    settings: StoreSettings,
    state: AppState,
    receiver: mpsc::UnboundedReceiver<Message>,
    /// Weak so that outstanding tasks do not keep the store alive
    sender: mpsc::WeakUnboundedSender<Message>,
    snapshot: watch::Sender<AppState>,
    debounce: TaskSlot,
    search: Option<DropGuard>,
    detail: TaskSlot,
    top: TaskSlot,
    auto_advance: TaskSlot,
    settle: TaskSlot,
}

impl<A: AnimeApi> Store<A> {
    pub fn new(api: Arc<A>, settings: StoreSettings) -> (Self, StoreHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = AppState::new(&settings);
        let (snapshot, watcher) = watch::channel(state.clone());

        let store = Self {
            api,
            settings,
            state,
            receiver,
            sender: sender.downgrade(),
            snapshot,
            debounce: TaskSlot::default(),
            search: None,
            detail: TaskSlot::default(),
            top: TaskSlot::default(),
            auto_advance: TaskSlot::default(),
            settle: TaskSlot::default(),
        };

        let handle = StoreHandle {
            sender,
            state: watcher,
        };

        (store, handle)
    }

    /// Create a store and run it on the current runtime
    pub fn spawn(api: Arc<A>, settings: StoreSettings) -> StoreHandle {
        let (store, handle) = Self::new(api, settings);
        tokio::spawn(store.run());
        handle
    }

    /// Mount the browse view and process messages until shutdown or until
    /// every handle is dropped. All pending timers and requests are cancelled
    /// on return.
    pub async fn run(mut self) {
        info!(top_limit = self.settings.top_limit, "Store started");

        self.dispatch(Message::Search(SearchEvent::Start));
        self.dispatch(Message::Carousel(CarouselEvent::Mount));

        while let Some(message) = self.receiver.recv().await {
            if matches!(message, Message::Shutdown) {
                break;
            }
            self.dispatch(message);
        }

        info!("Store stopped");
    }

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::Search(event) => {
                for effect in self.state.search.apply(event) {
                    self.run_search_effect(effect);
                }
            }
            Message::Detail(event) => {
                for effect in self.state.detail.apply(event) {
                    self.run_detail_effect(effect);
                }
            }
            Message::Carousel(event) => {
                for effect in self.state.carousel.apply(event) {
                    self.run_carousel_effect(effect);
                }
            }
            Message::Shutdown => {}
        }

        self.snapshot.send_replace(self.state.clone());
    }

    fn run_search_effect(&mut self, effect: SearchEffect) {
        match effect {
            SearchEffect::ScheduleDebounce { generation, delay } => {
                let task = self.spawn_message(async move {
                    time::sleep(delay).await;
                    Message::Search(SearchEvent::DebounceElapsed(generation))
                });
                self.debounce.replace(task);
            }
            SearchEffect::CancelDebounce => self.debounce.cancel(),
            SearchEffect::CancelInFlight => {
                debug!("Cancelling outstanding search");
                self.search = None;
            }
            SearchEffect::Issue(request) => self.issue_search(request),
        }
    }

    fn issue_search(&mut self, request: SearchRequest) {
        let token = CancellationToken::new();
        // Dropping the previous guard cancels the superseded search.
        self.search = Some(token.clone().drop_guard());

        let api = Arc::clone(&self.api);
        self.spawn_message(async move {
            let outcome = api
                .search(&request.query, request.page, &request.filter, token)
                .await;
            Message::Search(SearchEvent::Completed {
                request: request.id,
                outcome,
            })
        });
    }

    fn run_detail_effect(&mut self, effect: DetailEffect) {
        match effect {
            DetailEffect::Fetch(mal_id) => {
                let api = Arc::clone(&self.api);
                let task = self.spawn_message(async move {
                    let outcome = api.get_by_id(mal_id).await;
                    Message::Detail(DetailEvent::Completed { mal_id, outcome })
                });
                self.detail.replace(task);
            }
            DetailEffect::Abandon => self.detail.cancel(),
        }
    }

    fn run_carousel_effect(&mut self, effect: CarouselEffect) {
        match effect {
            CarouselEffect::FetchTop => {
                let api = Arc::clone(&self.api);
                let limit = self.settings.top_limit;
                let task = self.spawn_message(async move {
                    Message::Carousel(CarouselEvent::Loaded(api.get_top_ranked(limit).await))
                });
                self.top.replace(task);
            }
            CarouselEffect::StartAutoAdvance { every } => self.start_auto_advance(every),
            CarouselEffect::ScheduleSettle { seq, after } => {
                let task = self.spawn_message(async move {
                    time::sleep(after).await;
                    Message::Carousel(CarouselEvent::Settle(seq))
                });
                self.settle.replace(task);
            }
        }
    }

    fn start_auto_advance(&mut self, every: Duration) {
        // interval_at rejects a zero period
        let every = every.max(MIN_AUTO_ADVANCE);
        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(sender) = sender.upgrade() else {
                    break;
                };
                if sender.send(Message::Carousel(CarouselEvent::Tick)).is_err() {
                    break;
                }
            }
        });
        self.auto_advance.replace(task);
    }

    /// Spawn `work` and deliver its message back to the store
    fn spawn_message<F>(&self, work: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let message = work.await;
            if let Some(sender) = sender.upgrade() {
                let _ = sender.send(message);
            }
        })
    }
}

/// Command surface and state access for the view layer
#[derive(Debug, Clone)]
pub struct StoreHandle {
    sender: mpsc::UnboundedSender<Message>,
    state: watch::Receiver<AppState>,
}

impl StoreHandle {
    fn send(&self, message: Message) -> Result<(), StoreError> {
        self.sender.send(message).map_err(|_| StoreError::Closed)
    }

    pub fn set_query_text(&self, text: impl Into<String>) -> Result<(), StoreError> {
        self.send(Message::Search(SearchEvent::QueryChanged(text.into())))
    }

    pub fn set_filters(&self, patch: FilterPatch) -> Result<(), StoreError> {
        self.send(Message::Search(SearchEvent::FiltersChanged(patch)))
    }

    pub fn clear_filters(&self) -> Result<(), StoreError> {
        self.send(Message::Search(SearchEvent::FiltersCleared))
    }

    pub fn set_page(&self, page: u32) -> Result<(), StoreError> {
        self.send(Message::Search(SearchEvent::PageRequested(page)))
    }

    pub fn request_detail(&self, mal_id: u32) -> Result<(), StoreError> {
        self.send(Message::Detail(DetailEvent::Requested(mal_id)))
    }

    pub fn clear_detail(&self) -> Result<(), StoreError> {
        self.send(Message::Detail(DetailEvent::Cleared))
    }

    pub fn navigate_carousel(&self, target: NavigateTo) -> Result<(), StoreError> {
        self.send(Message::Carousel(CarouselEvent::Navigate(target)))
    }

    /// Stop the store; pending timers and requests are cancelled
    pub fn shutdown(&self) -> Result<(), StoreError> {
        self.send(Message::Shutdown)
    }

    /// Latest published state
    pub fn snapshot(&self) -> AppState {
        AppState::clone(&self.state.borrow())
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.clone()
    }

    /// Wait for the first published state satisfying `predicate`
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<AppState, StoreError>
    where
        F: FnMut(&AppState) -> bool,
    {
        let mut receiver = self.state.clone();
        let state = receiver
            .wait_for(|state| predicate(state))
            .await
            .map_err(|_| StoreError::Closed)?;
        Ok(AppState::clone(&state))
    }
}
