// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The block service ties a local [`Blockstore`] to an [`Exchange`].
//!
//! Reads are answered by the store whenever possible and fall back to the
//! exchange on a miss, caching whatever the exchange returns. Writes go to
//! the store and are then announced to the exchange. The exchange never
//! writes by itself, so every block is written exactly once per add or
//! fetch.

mod config;
mod errors;
mod metrics;

pub use config::BlockServiceConfig;
pub use errors::BlockServiceError;

use std::sync::Arc;

use ahash::HashSet;
use cid::Cid;
use itertools::Itertools;
use parking_lot::RwLock;
use tracing::{debug, error, warn};

use crate::blocks::Block;
use crate::db::{Blockstore, BlockstoreError};
use crate::exchange::{Exchange, ExchangeError};
use crate::utils::{
    cid::validate_cid,
    context::Context,
    flume::FlumeSenderExt as _,
};

/// Blocks produced by [`BlockService::get_blocks`], in arrival order. An
/// `Err` item is always the last one and means the batch was aborted.
pub type BlockStream = flume::r#async::RecvStream<'static, Result<Block, BlockServiceError>>;

pub struct BlockService<DB, X> {
    store: Arc<DB>,
    /// Taken out by [`BlockService::close`].
    exchange: RwLock<Option<Arc<X>>>,
    config: BlockServiceConfig,
}

impl<DB, X> BlockService<DB, X>
where
    DB: Blockstore + 'static,
    X: Exchange,
{
    pub fn new(store: Arc<DB>, exchange: X) -> Self {
        Self::with_config(store, exchange, BlockServiceConfig::default())
    }

    pub fn with_config(store: Arc<DB>, exchange: X, config: BlockServiceConfig) -> Self {
        Self {
            store,
            exchange: RwLock::new(Some(Arc::new(exchange))),
            config,
        }
    }

    pub fn blockstore(&self) -> &Arc<DB> {
        &self.store
    }

    /// Returns `None` once the service is closed.
    pub fn exchange(&self) -> Option<Arc<X>> {
        self.exchange.read().clone()
    }

    pub fn config(&self) -> &BlockServiceConfig {
        &self.config
    }

    fn live_exchange(&self) -> Result<Arc<X>, BlockServiceError> {
        self.exchange().ok_or(BlockServiceError::Closed)
    }

    /// Writes `block` to the store and announces it to the exchange. A failed
    /// announcement is logged and does not fail the add.
    #[tracing::instrument(skip_all, fields(cid = %block.cid()))]
    pub async fn add_block(&self, block: &Block) -> Result<(), BlockServiceError> {
        validate_cid(block.cid())?;
        let exchange = self.live_exchange()?;
        if self.config.check_first && self.store.has(block.cid())? {
            debug!("block already stored");
            return Ok(());
        }
        self.store.put(block)?;
        metrics::BLOCKS_ADDED.inc();
        debug!("block added");
        announce(exchange.as_ref(), std::slice::from_ref(block)).await;
        Ok(())
    }

    /// Batched [`BlockService::add_block`]: duplicates within `blocks` are
    /// written once, with a single [`Blockstore::put_many`] and a single
    /// announcement.
    #[tracing::instrument(skip_all, fields(count = blocks.len()))]
    pub async fn add_blocks(&self, blocks: &[Block]) -> Result<(), BlockServiceError> {
        for block in blocks {
            validate_cid(block.cid())?;
        }
        let exchange = self.live_exchange()?;
        let mut to_put = Vec::with_capacity(blocks.len());
        for block in blocks.iter().unique_by(|block| *block.cid()) {
            if self.config.check_first && self.store.has(block.cid())? {
                continue;
            }
            to_put.push(block.clone());
        }
        if to_put.is_empty() {
            return Ok(());
        }
        self.store.put_many(&to_put)?;
        metrics::BLOCKS_ADDED.inc_by(to_put.len() as _);
        debug!("{} blocks added", to_put.len());
        announce(exchange.as_ref(), &to_put).await;
        Ok(())
    }

    /// Returns the block from the store, or fetches it through the exchange
    /// and caches it. Nothing is written when `ctx` ends first.
    ///
    /// Fails with [`BlockServiceError::Closed`] once the service is closed,
    /// even for blocks that are stored locally.
    #[tracing::instrument(skip_all, fields(%cid))]
    pub async fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block, BlockServiceError> {
        validate_cid(cid)?;
        let exchange = self.live_exchange()?;
        match self.store.get(cid) {
            Ok(block) => {
                metrics::BLOCK_GET.get_or_create(&metrics::values::LOCAL).inc();
                return Ok(block);
            }
            Err(BlockstoreError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        debug!("not found locally, asking the exchange");
        let block = ctx.run(exchange.get_block(ctx, cid)).await??;
        if block.cid() != cid {
            return Err(BlockServiceError::Exchange(ExchangeError::Other(
                anyhow::anyhow!("received {} instead", block.cid()),
            )));
        }
        if let Some(e) = ctx.err() {
            return Err(e.into());
        }
        self.store.put(&block)?;
        metrics::BLOCK_GET
            .get_or_create(&metrics::values::EXCHANGE)
            .inc();
        announce(exchange.as_ref(), std::slice::from_ref(&block)).await;
        Ok(block)
    }

    /// Streams the requested blocks as they become available: stored blocks
    /// first, then the ones fetched through the exchange. Every block is
    /// yielded at most once, duplicate and invalid identifiers are skipped.
    /// The stream ends early when `ctx` is done. Dropping it stops the work
    /// and releases the request made to the exchange, even while no block is
    /// arriving.
    ///
    /// Must be called within a tokio runtime.
    pub fn get_blocks(&self, ctx: &Context, cids: impl IntoIterator<Item = Cid>) -> BlockStream {
        let (tx, rx) = flume::bounded(self.config.output_buffer.max(1));
        match self.live_exchange() {
            Ok(exchange) => {
                tokio::spawn(produce_blocks(
                    self.store.clone(),
                    exchange,
                    self.config.fetch_batch_size,
                    ctx.clone(),
                    cids.into_iter().collect(),
                    tx,
                ));
            }
            Err(e) => tx.send_or_warn(Err(e)),
        }
        rx.into_stream()
    }

    /// Removes a block from the local store only.
    pub fn delete_block(&self, cid: &Cid) -> Result<(), BlockServiceError> {
        Ok(self.store.delete_block(cid)?)
    }

    /// Closes the exchange. Only the first call reaches the exchange, later
    /// calls succeed without doing anything.
    pub async fn close(&self) -> Result<(), BlockServiceError> {
        let exchange = self.exchange.write().take();
        if let Some(exchange) = exchange {
            debug!("closing the block service");
            exchange.close().await.map_err(BlockServiceError::Exchange)?;
        }
        Ok(())
    }
}

async fn announce<X: Exchange>(exchange: &X, blocks: &[Block]) {
    if let Err(e) = exchange.notify_new_blocks(blocks).await {
        metrics::NOTIFY_FAILURE.inc();
        error!("failed to announce {} new block(s): {e}", blocks.len());
    }
}

#[tracing::instrument(skip_all, fields(requested = cids.len()))]
async fn produce_blocks<DB, X>(
    store: Arc<DB>,
    exchange: Arc<X>,
    batch_size: usize,
    ctx: Context,
    cids: Vec<Cid>,
    output: flume::Sender<Result<Block, BlockServiceError>>,
) where
    DB: Blockstore,
    X: Exchange,
{
    let mut seen = HashSet::default();
    let mut missing = vec![];
    for cid in cids {
        if let Err(e) = validate_cid(&cid) {
            warn!("skipping {cid}: {e}");
            continue;
        }
        if !seen.insert(cid) {
            continue;
        }
        match store.get(&cid) {
            Ok(block) => {
                metrics::BLOCK_GET.get_or_create(&metrics::values::LOCAL).inc();
                if !output.send_or_cancel(&ctx, Ok(block)).await {
                    return;
                }
            }
            Err(BlockstoreError::NotFound(_)) => missing.push(cid),
            Err(e) => {
                debug!("local lookup of {cid} failed, asking the exchange: {e}");
                missing.push(cid);
            }
        }
    }
    if missing.is_empty() {
        return;
    }

    let mut pending: HashSet<Cid> = missing.iter().copied().collect();
    let arrivals = match ctx.run(exchange.get_blocks(&ctx, missing)).await {
        Ok(Ok(arrivals)) => arrivals,
        Err(_) | Ok(Err(ExchangeError::Context(_))) => return,
        Ok(Err(e)) => {
            output.send_or_cancel(&ctx, Err(e.into())).await;
            return;
        }
    };

    while !pending.is_empty() {
        // the exchange closes the channel once it has nothing more to give
        let first = tokio::select! {
            biased;
            _ = ctx.done() => break,
            _ = output.closed() => {
                debug!("stream dropped by its consumer");
                break;
            }
            first = arrivals.recv_async() => match first {
                Ok(first) => first,
                Err(_) => break,
            },
        };
        let batch = std::iter::once(first)
            .chain(arrivals.try_iter().take(batch_size.saturating_sub(1)))
            .filter(|block| pending.remove(block.cid()))
            .collect_vec();
        if batch.is_empty() {
            continue;
        }
        if ctx.err().is_some() {
            return;
        }
        if let Err(e) = store.put_many(&batch) {
            output.send_or_cancel(&ctx, Err(e.into())).await;
            return;
        }
        metrics::BLOCK_GET
            .get_or_create(&metrics::values::EXCHANGE)
            .inc_by(batch.len() as _);
        announce(exchange.as_ref(), &batch).await;
        for block in batch {
            if !output.send_or_cancel(&ctx, Ok(block)).await {
                return;
            }
        }
    }
    if !pending.is_empty() {
        debug!("{} block(s) could not be fetched", pending.len());
    }
}

#[cfg(test)]
mod tests;
