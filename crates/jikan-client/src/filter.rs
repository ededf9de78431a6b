//! Search refinements and their mapping onto Jikan query parameters.
//!
//! A [`Filter`] only ever carries populated fields into the query: unset
//! options are omitted entirely rather than sent as empty or zero values.

use crate::error::ParseFilterError;
use chrono::NaiveDate;
use reqwest::Url;
use std::fmt;
use std::str::FromStr;

macro_rules! filter_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseFilterError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == lowered)
                    .ok_or_else(|| ParseFilterError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

filter_enum!(
    /// Media category
    AnimeType, "type" {
        Tv => "tv",
        Movie => "movie",
        Ova => "ova",
        Ona => "ona",
        Special => "special",
        Music => "music",
    }
);

filter_enum!(
    /// Airing status
    AiringStatus, "status" {
        Airing => "airing",
        Complete => "complete",
        Upcoming => "upcoming",
    }
);

filter_enum!(
    /// Audience rating
    ContentRating, "rating" {
        G => "g",
        Pg => "pg",
        Pg13 => "pg13",
        R17 => "r17",
        R => "r",
        Rx => "rx",
    }
);

filter_enum!(
    /// Sort key accepted by `order_by`
    OrderBy, "order_by" {
        MalId => "mal_id",
        Title => "title",
        Type => "type",
        Rating => "rating",
        StartDate => "start_date",
        EndDate => "end_date",
        Episodes => "episodes",
        Score => "score",
        ScoredBy => "scored_by",
        Rank => "rank",
        Popularity => "popularity",
        Members => "members",
        Favorites => "favorites",
    }
);

filter_enum!(
    SortDirection, "sort" {
        Asc => "asc",
        Desc => "desc",
    }
);

const MIN_SCORE: f64 = 0.0;
const MAX_SCORE: f64 = 10.0;

/// User-chosen search refinements.
///
/// `sfw` is a toggle rather than an optional value: the API treats the
/// parameter's absence as "disabled", so `false` is never sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub anime_type: Option<AnimeType>,
    pub status: Option<AiringStatus>,
    pub rating: Option<ContentRating>,
    pub sfw: bool,
    pub genres: Vec<u32>,
    pub genres_exclude: Vec<u32>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub year: Option<i32>,
    pub order_by: Option<OrderBy>,
    pub sort: Option<SortDirection>,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            anime_type: None,
            status: None,
            rating: None,
            sfw: true,
            genres: Vec::new(),
            genres_exclude: Vec::new(),
            min_score: None,
            max_score: None,
            year: None,
            order_by: Some(OrderBy::Score),
            sort: Some(SortDirection::Desc),
        }
    }
}

/// Partial update merged into a [`Filter`].
///
/// For optional fields the outer `Option` means "touch this field" and the
/// inner one is the new value, so `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPatch {
    pub anime_type: Option<Option<AnimeType>>,
    pub status: Option<Option<AiringStatus>>,
    pub rating: Option<Option<ContentRating>>,
    pub sfw: Option<bool>,
    pub genres: Option<Vec<u32>>,
    pub genres_exclude: Option<Vec<u32>>,
    pub min_score: Option<Option<f64>>,
    pub max_score: Option<Option<f64>>,
    pub year: Option<Option<i32>>,
    pub order_by: Option<Option<OrderBy>>,
    pub sort: Option<Option<SortDirection>>,
}

impl FilterPatch {
    pub fn is_empty(&self) -> bool {
        *self == FilterPatch::default()
    }
}

fn clamp_score(score: Option<f64>) -> Option<f64> {
    score
        .filter(|s| !s.is_nan())
        .map(|s| s.clamp(MIN_SCORE, MAX_SCORE))
}

impl Filter {
    /// Merge a partial update; untouched fields keep their value
    pub fn merge(&mut self, patch: FilterPatch) {
        if let Some(v) = patch.anime_type {
            self.anime_type = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.rating {
            self.rating = v;
        }
        if let Some(v) = patch.sfw {
            self.sfw = v;
        }
        if let Some(v) = patch.genres {
            self.genres = v;
        }
        if let Some(v) = patch.genres_exclude {
            self.genres_exclude = v;
        }
        if let Some(v) = patch.min_score {
            self.min_score = clamp_score(v);
        }
        if let Some(v) = patch.max_score {
            self.max_score = clamp_score(v);
        }
        if let Some(v) = patch.year {
            self.year = v;
        }
        if let Some(v) = patch.order_by {
            self.order_by = v;
        }
        if let Some(v) = patch.sort {
            self.sort = v;
        }
    }

    /// Copy with `patch` applied
    pub fn merged(&self, patch: FilterPatch) -> Self {
        let mut next = self.clone();
        next.merge(patch);
        next
    }

    /// Whether anything differs from the reset state.
    ///
    /// An unset sort key or direction is not a refinement; only a value other
    /// than the default counts.
    pub fn has_active_refinements(&self) -> bool {
        self.active_count() > 0
    }

    /// Number of refinements that differ from the reset state
    pub fn active_count(&self) -> usize {
        [
            self.anime_type.is_some(),
            self.status.is_some(),
            self.rating.is_some(),
            !self.genres.is_empty(),
            !self.genres_exclude.is_empty(),
            self.min_score.is_some(),
            self.max_score.is_some(),
            self.year.is_some(),
            !self.sfw,
            self.order_by.is_some_and(|o| o != OrderBy::Score),
            self.sort.is_some_and(|s| s != SortDirection::Desc),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    /// Query parameters for the populated fields, in API order
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(t) = self.anime_type {
            params.push(("type", t.to_string()));
        }
        if let Some(s) = self.status {
            params.push(("status", s.to_string()));
        }
        if let Some(r) = self.rating {
            params.push(("rating", r.to_string()));
        }
        if self.sfw {
            params.push(("sfw", "true".to_string()));
        }
        if !self.genres.is_empty() {
            params.push(("genres", join_ids(&self.genres)));
        }
        if !self.genres_exclude.is_empty() {
            params.push(("genres_exclude", join_ids(&self.genres_exclude)));
        }
        if let Some(min) = self.min_score {
            params.push(("min_score", min.to_string()));
        }
        if let Some(max) = self.max_score {
            params.push(("max_score", max.to_string()));
        }
        if let Some((start, end)) = self.year.and_then(year_range) {
            params.push(("start_date", start));
            params.push(("end_date", end));
        }
        if let Some(order) = self.order_by {
            params.push(("order_by", order.to_string()));
        }
        if let Some(sort) = self.sort {
            params.push(("sort", sort.to_string()));
        }

        params
    }
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// First and last day of `year` as `YYYY-MM-DD`
fn year_range(year: i32) -> Option<(String, String)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    Some((
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    ))
}

/// Full parameter set for one `/anime` search call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pairs: Vec<(&'static str, String)>,
}

impl SearchParams {
    /// `q` is omitted when the trimmed query is empty; `page` and `limit`
    /// are always present.
    pub fn new(query: &str, page: u32, limit: u32, filter: &Filter) -> Self {
        let mut pairs = Vec::new();
        let query = query.trim();
        if !query.is_empty() {
            pairs.push(("q", query.to_string()));
        }
        pairs.push(("page", page.to_string()));
        pairs.push(("limit", limit.to_string()));
        pairs.extend(filter.to_params());

        Self { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(k, _)| *k)
    }

    /// Append the parameters to `url`'s query string
    pub fn apply_to(&self, url: &mut Url) {
        url.query_pairs_mut()
            .extend_pairs(self.pairs.iter().map(|(k, v)| (*k, v.as_str())));
    }
}
