//! Jikan API v4 client and search filter model.
//!
//! Provides typed access to the three read-only endpoints the browser needs
//! (search, full detail, top list) and the mapping from user-facing search
//! refinements to Jikan query parameters.

pub mod api;
pub mod error;
pub mod filter;

pub use api::{AnimeApi, JikanClient, LatestSearch};
pub use error::{ApiError, ApiResult, ParseFilterError};
pub use filter::{
    AiringStatus, AnimeType, ContentRating, Filter, FilterPatch, OrderBy, SearchParams,
    SortDirection,
};
