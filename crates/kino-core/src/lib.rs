//! # kino-core
//!
//! Core pipeline for kino: cinema showtimes and audience ratings scraped from the
//! csfd.cz cinema listings.
//!
//! ## Architecture
//!
//! - **Fetching**: [`Fetcher`] performs compressed HTTP GETs behind the
//!   [`PageSource`] trait; pages are parsed leniently with `scraper`
//! - **Extraction**: [`listing`] reads cinema blocks and schedule rows
//! - **Ratings**: [`RatingResolver`] reads a title's rating from its detail page,
//!   memoized per URL and coalesced per in-flight URL
//! - **Aggregation**: [`Orchestrator`] joins all regions and memoizes the result
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kino_core::{Config, Orchestrator};
//!
//! # async fn example() -> kino_core::Result<()> {
//! let config = Config::load()?;
//! let orchestrator = Orchestrator::from_config(&config)?;
//!
//! for cinema in orchestrator.get_all_cinemas().await?.iter() {
//!     println!("{}: {} titles", cinema.name, cinema.movies.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Transport and markup-structure failures are returned as [`Error`]. A rating
//! that cannot be read is not an error; it is [`Rating::UNKNOWN`] (`-1`).

/// Memo tables for listings and ratings
pub mod cache;
/// Configuration loading and defaults
pub mod config;
/// Error types and result aliases
pub mod error;
/// HTTP fetching and document parsing
pub mod fetcher;
pub mod listing;
pub mod orchestrator;
pub mod rating;
/// Core data types
pub mod types;

// Re-export commonly used types
pub use cache::{ALL_CINEMAS_KEY, Listing, ListingMemo, MemoStore, MemoryStore, RatingMemo};
pub use config::{CacheConfig, Config, FetchConfig, MalformedPolicy, PipelineConfig, SiteConfig};
pub use error::{Error, Result};
pub use fetcher::{Fetcher, PageSource, parse_document};
pub use listing::{ListingExtractor, extract_cinemas};
pub use orchestrator::Orchestrator;
pub use rating::{RatingParse, RatingResolver, parse_rating};
pub use types::*;
