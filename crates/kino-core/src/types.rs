use serde::{Deserialize, Serialize};
use std::fmt;

/// One venue and the titles it screens, in document order.
///
/// Serialized with the field names the original listing API emitted
/// (`CinemaName`, `Movies`) so existing clients keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cinema {
    /// Display name taken from the cinema block heading.
    #[serde(rename = "CinemaName")]
    pub name: String,
    /// Screened titles in document order.
    #[serde(rename = "Movies")]
    pub movies: Vec<Movie>,
}

/// A screened title with its showtimes and audience rating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movie {
    /// Title followed by the release year, e.g. `"Vlny (2024)"`.
    #[serde(rename = "MovieName")]
    pub name: String,
    /// Showtimes as printed on the listing, e.g. `"18:30"`.
    #[serde(rename = "Times")]
    pub times: Vec<String>,
    /// Absolute URL of the title's detail page.
    #[serde(rename = "Url")]
    pub url: String,
    /// Aggregate audience rating, or [`Rating::UNKNOWN`].
    #[serde(rename = "Rating")]
    pub rating: Rating,
    /// Short screening tags such as subtitle or format markers.
    #[serde(rename = "Flags")]
    pub flags: Vec<String>,
}

/// Audience rating as a whole percentage.
///
/// Always either `0..=100` or exactly `-1` ([`Rating::UNKNOWN`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(i32);

impl Rating {
    /// Sentinel for a rating that is unavailable or could not be parsed.
    pub const UNKNOWN: Self = Self(-1);

    /// Highest valid rating.
    pub const MAX: i32 = 100;

    /// Build a rating from a percentage, rejecting anything outside `0..=100`.
    #[must_use]
    pub const fn new(percent: i32) -> Option<Self> {
        if percent >= 0 && percent <= Self::MAX {
            Some(Self(percent))
        } else {
            None
        }
    }

    /// Raw value, `-1` for unknown.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Whether this is the sentinel.
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            f.write_str("?")
        } else {
            write!(f, "{}%", self.0)
        }
    }
}

/// A fixed listing entry point for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Short code, e.g. `"cz"`.
    pub code: String,
    /// Absolute URL of the region's listing page.
    pub url: String,
}

impl Region {
    /// Convenience constructor.
    pub fn new(code: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            url: url.into(),
        }
    }
}

/// A cinema block as read from the listing, before ratings are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CinemaBlock {
    /// Heading text.
    pub name: String,
    /// Rows in document order.
    pub rows: Vec<MovieRow>,
}

/// A schedule row as read from the listing, before its rating is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieRow {
    /// Title and year.
    pub name: String,
    /// Non-empty showtimes.
    pub times: Vec<String>,
    /// Absolute detail-page URL.
    pub url: String,
    /// Non-empty flags.
    pub flags: Vec<String>,
}

impl MovieRow {
    /// Attach a resolved rating.
    #[must_use]
    pub fn with_rating(self, rating: Rating) -> Movie {
        Movie {
            name: self.name,
            times: self.times,
            url: self.url,
            rating,
            flags: self.flags,
        }
    }
}
