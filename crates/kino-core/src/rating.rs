//! Per-title rating resolution.
//!
//! A rating is read from the title's detail page, from the first `h2.average`
//! node, by taking the leading run of decimal digits (`"85%"` is 85). Anything
//! that does not yield a percentage resolves to [`Rating::UNKNOWN`]; only
//! transport failures are reported as errors.
//!
//! Resolved values, the sentinel included, go into the [`RatingMemo`]. Concurrent
//! requests for the same URL share a single fetch.

use crate::cache::RatingMemo;
use crate::fetcher::{PageSource, parse_document};
use crate::{Rating, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use scraper::Selector;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::debug;

/// SAFETY: Pattern is a compile-time constant that is known to be valid.
#[allow(clippy::unwrap_used)]
static AVERAGE_RATING: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2.average").unwrap());

/// Outcome of reading a rating text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingParse {
    /// A percentage in `0..=100`.
    Parsed(Rating),
    /// No usable leading digits.
    Sentinel,
}

impl RatingParse {
    /// Collapse into a [`Rating`], mapping the sentinel to [`Rating::UNKNOWN`].
    #[must_use]
    pub const fn rating(self) -> Rating {
        match self {
            Self::Parsed(rating) => rating,
            Self::Sentinel => Rating::UNKNOWN,
        }
    }
}

/// Parse the leading digit run of `text` as a percentage.
///
/// Leading whitespace is skipped. A missing digit run, a run that overflows or a
/// value above 100 is [`RatingParse::Sentinel`].
pub fn parse_rating(text: &str) -> RatingParse {
    let text = text.trim_start();
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());

    text[..digits_end]
        .parse::<i32>()
        .ok()
        .and_then(Rating::new)
        .map_or(RatingParse::Sentinel, RatingParse::Parsed)
}

/// Read the aggregate rating from a detail page body.
pub fn rating_from_page(body: &str) -> Rating {
    let document = parse_document(body);
    document
        .select(&AVERAGE_RATING)
        .next()
        .map_or(RatingParse::Sentinel, |node| {
            parse_rating(&node.text().collect::<String>())
        })
        .rating()
}

/// Resolves ratings through the memo, fetching detail pages on a miss.
pub struct RatingResolver {
    source: Arc<dyn PageSource>,
    memo: RatingMemo,
    in_flight: InFlight,
    concurrency: usize,
}

impl RatingResolver {
    /// Build a resolver allowing `concurrency` detail fetches at once.
    pub fn new(source: Arc<dyn PageSource>, memo: RatingMemo, concurrency: usize) -> Self {
        Self {
            source,
            memo,
            in_flight: Mutex::new(HashMap::new()),
            concurrency: concurrency.max(1),
        }
    }

    /// Rating for the title at `url`.
    ///
    /// Callers racing on the same URL wait for one shared fetch and all observe
    /// its value. A failed fetch is not memoized.
    pub async fn resolve(&self, url: &str) -> Result<Rating> {
        if let Some(rating) = self.memo.get(url).await {
            debug!(url, %rating, "rating memo hit");
            return Ok(rating);
        }

        let flight = Flight::join(&self.in_flight, url);
        flight
            .cell
            .get_or_try_init(|| self.fetch_and_store(url))
            .await
            .copied()
    }

    /// Resolve every URL with bounded concurrency.
    ///
    /// The output is index-aligned with `urls`, independent of completion order.
    pub async fn resolve_all(&self, urls: Vec<String>) -> Result<Vec<Rating>> {
        stream::iter(urls)
            .map(|url| async move { self.resolve(&url).await })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn fetch_and_store(&self, url: &str) -> Result<Rating> {
        // A previous flight may have finished between our memo miss and joining the cell
        if let Some(rating) = self.memo.get(url).await {
            return Ok(rating);
        }

        debug!(url, "rating memo miss, fetching detail page");
        let body = self.source.fetch_text(url).await?;
        let rating = rating_from_page(&body);

        self.memo.set(url, rating).await;
        Ok(rating)
    }
}

type InFlight = Mutex<HashMap<String, Arc<OnceCell<Rating>>>>;

/// A caller's membership in the shared fetch for one URL.
///
/// Dropping it, on completion or cancellation, retires the map entry once the
/// last member of this flight leaves. Cells are only cloned under the map lock,
/// so the strong count read there is exact.
struct Flight<'a> {
    in_flight: &'a InFlight,
    url: &'a str,
    cell: Arc<OnceCell<Rating>>,
}

impl<'a> Flight<'a> {
    fn join(in_flight: &'a InFlight, url: &'a str) -> Self {
        let cell = {
            let mut map = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(url.to_string()).or_default())
        };
        Self {
            in_flight,
            url,
            cell,
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if map
            .get(self.url)
            .is_some_and(|current| Arc::ptr_eq(current, &self.cell))
            && Arc::strong_count(&self.cell) == 2
        {
            map.remove(self.url);
        }
    }
}
