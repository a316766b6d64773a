//! Historical event fetch over `eth_getLogs`.
//!
//! A fetch resolves its range, splits it into contiguous batches, runs up to
//! `max_concurrency` batches at once with per-batch retry, then merges,
//! sorts and de-duplicates. A batch that still fails after its retries fails
//! the whole call; results of batches that already finished are discarded.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use alloy::rpc::types::{Filter, Log};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::instrument;

use super::parser::{event_signature, parse_curve_log, parse_swap_log};
use super::retry::RetryPolicy;
use super::types::{BlockRange, DomainEvent, EventFilter, EventKind, sort_and_dedup};
use crate::config::IndexerConfig;
use crate::repository::{LaunchpadRepository, LogSource};
use crate::service::{ServiceError, ServiceResult};

/// Standard DEX fee tiers searched when discovering pools.
pub const DEX_FEE_TIERS: [u32; 3] = [500, 3000, 10000];

/// Which contracts an indexer reads and how their logs decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogFamily {
    Curve,
    Dex,
}

impl LogFamily {
    pub(crate) fn kinds(self) -> &'static [EventKind] {
        match self {
            LogFamily::Curve => &EventKind::CURVE,
            LogFamily::Dex => &[EventKind::Swap],
        }
    }

    /// Topic0 values worth asking the node for under `filter`.
    pub(crate) fn signatures(self, filter: &EventFilter) -> Vec<B256> {
        self.kinds()
            .iter()
            .copied()
            .filter(|kind| filter.allows_kind(*kind))
            .map(event_signature)
            .collect()
    }

    pub(crate) fn parse(self, log: &Log) -> Option<DomainEvent> {
        match self {
            LogFamily::Curve => parse_curve_log(log, None),
            LogFamily::Dex => parse_swap_log(log, None),
        }
    }
}

/// Shared batching, retry and merge logic behind both indexers.
struct LogIndexer {
    source: Arc<dyn LogSource>,
    family: LogFamily,
    addresses: Vec<Address>,
    retry: RetryPolicy,
    batch_size: u64,
    max_concurrency: usize,
}

impl LogIndexer {
    fn new(
        source: Arc<dyn LogSource>,
        family: LogFamily,
        addresses: Vec<Address>,
        config: &IndexerConfig,
    ) -> Self {
        Self {
            source,
            family,
            addresses,
            retry: RetryPolicy::for_indexer(config),
            batch_size: config.batch_size,
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    async fn head(&self) -> ServiceResult<u64> {
        Ok(self
            .retry
            .run("eth_blockNumber", || self.source.block_number())
            .await?)
    }

    async fn fetch_events(
        &self,
        from_block: u64,
        to_block: u64,
        filter: &EventFilter,
    ) -> ServiceResult<Vec<DomainEvent>> {
        let range = BlockRange::new(from_block, to_block)?;
        let mut events = self.fetch_range(range, filter).await?;
        sort_and_dedup(&mut events);
        Ok(events)
    }

    async fn fetch_all_events(
        &self,
        start_block: u64,
        batch_size: u64,
        filter: &EventFilter,
        max_concurrency: Option<usize>,
    ) -> ServiceResult<Vec<DomainEvent>> {
        if batch_size == 0 {
            return Err(ServiceError::InvalidArgument(
                "batch_size must be positive".to_string(),
            ));
        }
        let concurrency = max_concurrency.unwrap_or(self.max_concurrency).max(1);

        let head = self.head().await?;
        if start_block > head {
            tracing::debug!("Start block {start_block} is past head {head}, nothing to fetch");
            return Ok(Vec::new());
        }

        let batches: Vec<BlockRange> = BlockRange {
            from: start_block,
            to: head,
        }
        .batches(batch_size)
        .collect();
        tracing::info!(
            "Fetching {:?} events {start_block}..={head} in {} batches of {batch_size}, concurrency {concurrency}",
            self.family,
            batches.len()
        );

        let per_batch: Vec<Vec<DomainEvent>> = stream::iter(batches)
            .map(|range| self.fetch_range(range, filter))
            .buffer_unordered(concurrency)
            .try_collect()
            .await?;

        let mut events: Vec<DomainEvent> = per_batch.into_iter().flatten().collect();
        sort_and_dedup(&mut events);
        tracing::info!("Fetched {} events up to block {head}", events.len());
        Ok(events)
    }

    async fn fetch_range(
        &self,
        range: BlockRange,
        filter: &EventFilter,
    ) -> ServiceResult<Vec<DomainEvent>> {
        let signatures = self.family.signatures(filter);
        if signatures.is_empty() || self.addresses.is_empty() {
            return Ok(Vec::new());
        }

        let log_filter = Filter::new()
            .address(self.addresses.clone())
            .event_signature(signatures)
            .from_block(range.from)
            .to_block(range.to);

        let what = format!("eth_getLogs {range}");
        let logs = self
            .retry
            .run(&what, || self.source.get_logs(&log_filter))
            .await?;

        let total = logs.len();
        let events: Vec<DomainEvent> = logs
            .iter()
            .filter_map(|log| self.family.parse(log))
            .filter(|event| filter.matches(event))
            .collect();
        tracing::debug!("Batch {range}: {total} logs, {} events kept", events.len());
        Ok(events)
    }
}

/// Historical bonding-curve events.
pub struct CurveIndexer {
    inner: LogIndexer,
}

impl CurveIndexer {
    pub fn new(source: Arc<dyn LogSource>, curve: Address, config: &IndexerConfig) -> Self {
        Self {
            inner: LogIndexer::new(source, LogFamily::Curve, vec![curve], config),
        }
    }

    /// Current chain head, retried like a batch fetch.
    pub async fn head(&self) -> ServiceResult<u64> {
        self.inner.head().await
    }

    /// Events in `[from_block, to_block]` matching `filter`, sorted by
    /// `(block_number, log_index)`.
    ///
    /// Transient failures are retried with backoff; a range the node rejects
    /// as too large fails with `ServiceError::RangeTooLarge` right away so the
    /// caller can narrow it.
    #[instrument(skip(self), err)]
    pub async fn fetch_events(
        &self,
        from_block: u64,
        to_block: u64,
        filter: &EventFilter,
    ) -> ServiceResult<Vec<DomainEvent>> {
        self.inner.fetch_events(from_block, to_block, filter).await
    }

    /// Events from `start_block` to the head resolved at call time, fetched
    /// in batches of `batch_size` blocks with up to `max_concurrency` batches
    /// in flight (the configured default when `None`).
    #[instrument(skip(self), err)]
    pub async fn fetch_all_events(
        &self,
        start_block: u64,
        batch_size: u64,
        filter: &EventFilter,
        max_concurrency: Option<usize>,
    ) -> ServiceResult<Vec<DomainEvent>> {
        self.inner
            .fetch_all_events(start_block, batch_size, filter, max_concurrency)
            .await
    }

    /// [`CurveIndexer::fetch_all_events`] with the configured batch size and
    /// concurrency.
    pub async fn fetch_since(
        &self,
        start_block: u64,
        filter: &EventFilter,
    ) -> ServiceResult<Vec<DomainEvent>> {
        self.inner
            .fetch_all_events(start_block, self.inner.batch_size, filter, None)
            .await
    }
}

/// Historical swap events across a set of DEX pools.
pub struct DexIndexer {
    inner: LogIndexer,
}

impl DexIndexer {
    pub fn new(source: Arc<dyn LogSource>, pools: Vec<Address>, config: &IndexerConfig) -> Self {
        Self {
            inner: LogIndexer::new(source, LogFamily::Dex, pools, config),
        }
    }

    pub async fn head(&self) -> ServiceResult<u64> {
        self.inner.head().await
    }

    pub fn pools(&self) -> &[Address] {
        &self.inner.addresses
    }

    pub fn add_pools(&mut self, pools: impl IntoIterator<Item = Address>) {
        for pool in pools {
            if !self.inner.addresses.contains(&pool) {
                self.inner.addresses.push(pool);
            }
        }
    }

    /// Resolves the WMON pool of each token through the DEX factory, trying
    /// every standard fee tier. Tokens without a pool are skipped.
    #[instrument(skip(repository, tokens), fields(count = tokens.len()), err)]
    pub async fn discover_pools(
        repository: &dyn LaunchpadRepository,
        wmon: Address,
        tokens: &[Address],
    ) -> ServiceResult<Vec<Address>> {
        let lookups = tokens.iter().flat_map(|&token| {
            DEX_FEE_TIERS
                .iter()
                .map(move |&fee| async move { repository.get_pool(token, wmon, fee).await })
        });

        let found = futures::future::try_join_all(lookups).await?;
        let mut pools: Vec<Address> = Vec::new();
        for pool in found.into_iter().flatten() {
            if !pools.contains(&pool) {
                pools.push(pool);
            }
        }
        tracing::info!("Discovered {} pools for {} tokens", pools.len(), tokens.len());
        Ok(pools)
    }

    /// Swaps in `[from_block, to_block]` across all pools, sorted by
    /// `(block_number, log_index)`.
    #[instrument(skip(self), err)]
    pub async fn fetch_events(
        &self,
        from_block: u64,
        to_block: u64,
        filter: &EventFilter,
    ) -> ServiceResult<Vec<DomainEvent>> {
        self.inner.fetch_events(from_block, to_block, filter).await
    }

    #[instrument(skip(self), err)]
    pub async fn fetch_all_events(
        &self,
        start_block: u64,
        batch_size: u64,
        filter: &EventFilter,
        max_concurrency: Option<usize>,
    ) -> ServiceResult<Vec<DomainEvent>> {
        self.inner
            .fetch_all_events(start_block, batch_size, filter, max_concurrency)
            .await
    }

    pub async fn fetch_since(
        &self,
        start_block: u64,
        filter: &EventFilter,
    ) -> ServiceResult<Vec<DomainEvent>> {
        self.inner
            .fetch_all_events(start_block, self.inner.batch_size, filter, None)
            .await
    }
}
