//! YumeFind: search-and-browse core over the Jikan anime catalog.
//!
//! The crate holds the state behind the browser: a debounced search with
//! supersession of stale requests, the detail view, and a rotating
//! top-ranked carousel. All of it lives in a single [`Store`] that views
//! drive through a [`StoreHandle`].

pub mod carousel;
pub mod detail;
pub mod search;
pub mod store;
pub mod view;

pub use carousel::{CarouselState, NavigateTo, Phase};
pub use detail::{DetailState, DetailStatus};
pub use search::{RequestId, SearchState, SearchStatus};
pub use store::{AppState, Store, StoreError, StoreHandle, StoreSettings};
