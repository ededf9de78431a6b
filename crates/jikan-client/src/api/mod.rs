//! Jikan API v4 client implementation.
//!
//! This module provides the [`AnimeApi`] abstraction and its reqwest-backed
//! implementation for the Jikan API (MyAnimeList unofficial API).

pub mod client;
pub mod types;

pub use client::{AnimeApi, JikanClient, LatestSearch};
pub use types::*;
