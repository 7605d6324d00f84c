// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Fetching blocks that are not available locally.
//!
//! An [`Exchange`] retrieves blocks from somewhere else, usually other peers,
//! and is told about blocks that became available locally so that it can
//! serve them and stop looking for them. An exchange never persists blocks:
//! writing is left to the caller.

pub mod bitswap;
mod offline;

pub use offline::OfflineExchange;

use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;

use crate::blocks::Block;
use crate::utils::context::{Context, ContextError};

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("block {0} not found")]
    NotFound(Cid),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("exchange is closed")]
    Closed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait Exchange: Send + Sync + 'static {
    /// Fetches a single block, waiting until it arrives or `ctx` is done.
    async fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block, ExchangeError>;

    /// Starts fetching `cids` and returns a channel that yields the blocks in
    /// arrival order. Blocks that cannot be found are omitted. The channel
    /// closes once every block was delivered, `ctx` is done or the exchange
    /// is closed.
    async fn get_blocks(
        &self,
        ctx: &Context,
        cids: Vec<Cid>,
    ) -> Result<flume::Receiver<Block>, ExchangeError>;

    /// Announces blocks that are now available locally.
    async fn notify_new_blocks(&self, blocks: &[Block]) -> Result<(), ExchangeError>;

    /// Releases the resources held by the exchange. Calling it more than once
    /// is allowed.
    async fn close(&self) -> Result<(), ExchangeError>;
}

#[async_trait]
impl<X: Exchange> Exchange for Arc<X> {
    async fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block, ExchangeError> {
        self.as_ref().get_block(ctx, cid).await
    }

    async fn get_blocks(
        &self,
        ctx: &Context,
        cids: Vec<Cid>,
    ) -> Result<flume::Receiver<Block>, ExchangeError> {
        self.as_ref().get_blocks(ctx, cids).await
    }

    async fn notify_new_blocks(&self, blocks: &[Block]) -> Result<(), ExchangeError> {
        self.as_ref().notify_new_blocks(blocks).await
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        self.as_ref().close().await
    }
}
