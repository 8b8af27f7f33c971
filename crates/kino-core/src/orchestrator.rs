//! Aggregate listing across all configured regions.

use crate::cache::{Listing, ListingMemo, RatingMemo};
use crate::config::Config;
use crate::fetcher::{Fetcher, PageSource};
use crate::listing::ListingExtractor;
use crate::rating::RatingResolver;
use crate::{Cinema, Error, Region, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Builds the aggregate listing and memoizes it.
pub struct Orchestrator {
    extractor: ListingExtractor,
    regions: Vec<Region>,
    memo: ListingMemo,
    deadline: Duration,
    refresh: Mutex<()>,
}

impl Orchestrator {
    /// Production pipeline: HTTP fetcher and in-memory memo tables sized from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let fetcher = Fetcher::with_config(&config.fetch)?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Pipeline over an arbitrary page source with in-memory memo tables.
    pub fn new(config: &Config, source: Arc<dyn PageSource>) -> Result<Self> {
        Self::with_memos(
            config,
            source,
            ListingMemo::in_memory(config.cache.listing_ttl()),
            RatingMemo::in_memory(config.cache.rating_ttl()),
        )
    }

    /// Pipeline over caller-supplied memo tables.
    pub fn with_memos(
        config: &Config,
        source: Arc<dyn PageSource>,
        listings: ListingMemo,
        ratings: RatingMemo,
    ) -> Result<Self> {
        config.validate()?;

        let resolver = Arc::new(RatingResolver::new(
            Arc::clone(&source),
            ratings,
            config.pipeline.rating_concurrency,
        ));
        let extractor = ListingExtractor::new(
            source,
            resolver,
            &config.site.base_url,
            config.pipeline.on_malformed,
        )?;

        Ok(Self {
            extractor,
            regions: config.site.regions.clone(),
            memo: listings,
            deadline: config.pipeline.deadline(),
            refresh: Mutex::new(()),
        })
    }

    /// Every region's cinemas, regions in configured order.
    ///
    /// Served from the listing memo when present. On a miss the regions are
    /// extracted one after another and the concatenation is memoized. Any region
    /// failing fails the whole call; exceeding the deadline yields
    /// [`Error::Timeout`].
    #[instrument(skip(self))]
    pub async fn get_all_cinemas(&self) -> Result<Listing> {
        if let Some(listing) = self.memo.get().await {
            debug!("listing memo hit");
            return Ok(listing);
        }

        // Waiting for the refresh lock counts against the deadline too
        self.within_deadline(self.rebuild()).await
    }

    async fn rebuild(&self) -> Result<Listing> {
        // One rebuild at a time; waiters pick up the rebuilt listing
        let _guard = self.refresh.lock().await;
        if let Some(listing) = self.memo.get().await {
            debug!("listing rebuilt by another caller");
            return Ok(listing);
        }

        let listing: Listing = Arc::new(self.collect_regions().await?);
        self.memo.set(Arc::clone(&listing)).await;

        info!("Cached listing of {} cinemas", listing.len());
        Ok(listing)
    }

    /// Cinemas of one region, bypassing the listing memo. Ratings still use
    /// their memo.
    #[instrument(skip(self))]
    pub async fn get_region(&self, code: &str) -> Result<Vec<Cinema>> {
        let region = self
            .regions
            .iter()
            .find(|region| region.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::NotFound(format!("Unknown region '{code}'")))?;

        self.within_deadline(self.extractor.extract(&region.url))
            .await
    }

    async fn collect_regions(&self) -> Result<Vec<Cinema>> {
        let mut all = Vec::new();
        for region in &self.regions {
            let cinemas = self.extractor.extract(&region.url).await?;
            debug!(region = %region.code, cinemas = cinemas.len(), "region extracted");
            all.extend(cinemas);
        }
        Ok(all)
    }

    async fn within_deadline<T>(
        &self,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.deadline, work)
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "listing pipeline exceeded its {}s deadline",
                    self.deadline.as_secs()
                ))
            })?
    }
}
