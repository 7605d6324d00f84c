// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A want-list based block exchange between peers of a [`VirtualNetwork`].
//!
//! ## Features
//!
//! - Every attached peer is a candidate provider, wants are broadcast
//! - Wants of remote peers that cannot be served yet are kept in a ledger and
//!   served once the block is announced through
//!   [`Exchange::notify_new_blocks`]
//! - Concurrent fetches of the same block share a single want
//! - Prometheus metrics
//!
//! Bitswap only reads from its store, see [`BitswapStoreRead`]. Persisting
//! fetched blocks is left to the caller.

mod internals;
use internals::*;

mod message;
pub use message::*;

mod metrics;

mod network;
pub use network::*;

pub mod request_manager;
use request_manager::{BitswapRequestManager, SessionId};

mod store;
pub use store::*;

use std::sync::Arc;

use ahash::HashSet;
use async_trait::async_trait;
use cid::Cid;
use itertools::Itertools;
use libp2p::{PeerId, identity::Keypair};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Exchange, ExchangeError};
use crate::blocks::Block;
use crate::utils::{context::Context, flume::FlumeSenderExt as _};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct BitswapConfig {
    /// Capacity of the channel returned by [`Exchange::get_blocks`].
    #[default(64)]
    pub outbound_buffer: usize,
    /// Asks peers to answer explicitly when they do not have a block.
    pub send_dont_have: bool,
}

/// A bitswap node. Cloning is cheap, clones share the same node.
///
/// Must be created within a tokio runtime.
pub struct Bitswap<S> {
    inner: Arc<BitswapInner<S>>,
}

impl<S> Clone for Bitswap<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct BitswapInner<S> {
    peer_id: PeerId,
    network: VirtualNetwork,
    store: Arc<S>,
    request_manager: BitswapRequestManager,
    ledger: ledger::Ledger,
    shutdown: CancellationToken,
    config: BitswapConfig,
}

impl<S> BitswapInner<S> {
    fn broadcast_wants(&self, cids: &[Cid]) {
        if cids.is_empty() {
            return;
        }
        metrics::message_counter_outbound_request_block().inc_by(cids.len() as _);
        let messages = cids
            .iter()
            .map(|cid| {
                BitswapMessage::Request(
                    BitswapRequest::new_block(*cid).send_dont_have(self.config.send_dont_have),
                )
            })
            .collect_vec();
        self.network.broadcast(self.peer_id, messages);
    }

    fn broadcast_cancels(&self, cids: &[Cid]) {
        if cids.is_empty() || self.shutdown.is_cancelled() {
            return;
        }
        metrics::message_counter_outbound_request_cancel().inc_by(cids.len() as _);
        let messages = cids
            .iter()
            .map(|cid| BitswapMessage::Request(BitswapRequest::new_cancel(*cid)))
            .collect_vec();
        self.network.broadcast(self.peer_id, messages);
    }
}

impl<S> Drop for BitswapInner<S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.network.detach(&self.peer_id);
    }
}

impl<S: BitswapStoreRead> Bitswap<S> {
    pub fn new(network: VirtualNetwork, store: Arc<S>) -> Self {
        Self::with_config(network, store, BitswapConfig::default())
    }

    pub fn with_config(network: VirtualNetwork, store: Arc<S>, config: BitswapConfig) -> Self {
        let peer_id = Keypair::generate_ed25519().public().to_peer_id();
        let inbox = network.attach(peer_id);
        let shutdown = CancellationToken::new();
        let inner = Arc::new(BitswapInner {
            peer_id,
            network,
            store,
            request_manager: BitswapRequestManager::default(),
            ledger: Default::default(),
            shutdown: shutdown.clone(),
            config,
        });
        tokio::spawn(event_handlers::run_event_loop(
            Arc::downgrade(&inner),
            shutdown,
            inbox,
        ));
        debug!(%peer_id, "bitswap started");
        Self { inner }
    }
}

impl<S> Bitswap<S> {
    pub fn peer_id(&self) -> PeerId {
        self.inner.peer_id
    }

    /// Blocks the local node is currently waiting for.
    pub fn wantlist(&self) -> Vec<Cid> {
        self.inner.request_manager.wantlist()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

/// Forwards the blocks of one fetch to its consumer, at most once each, and
/// withdraws the wants that are still pending when the fetch ends, including
/// when the consumer drops its receiver.
async fn run_session<S>(
    inner: Arc<BitswapInner<S>>,
    ctx: Context,
    session: SessionId,
    mut pending: HashSet<Cid>,
    arrivals: flume::Receiver<Block>,
    output: flume::Sender<Block>,
) {
    while !pending.is_empty() {
        let block = tokio::select! {
            biased;
            _ = inner.shutdown.cancelled() => break,
            _ = ctx.done() => break,
            _ = output.closed() => break,
            block = arrivals.recv_async() => match block {
                Ok(block) => block,
                Err(_) => break,
            },
        };
        if !pending.remove(block.cid()) {
            continue;
        }
        if !output.send_or_cancel(&ctx, block).await {
            break;
        }
    }
    if !pending.is_empty() {
        debug!(session, pending = pending.len(), "session ended early");
        let cancelled = inner.request_manager.cancel(session, pending.iter());
        inner.broadcast_cancels(&cancelled);
    }
}

#[async_trait]
impl<S: BitswapStoreRead> Exchange for Bitswap<S> {
    async fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block, ExchangeError> {
        let blocks = self.get_blocks(ctx, vec![*cid]).await?;
        match ctx.run(blocks.recv_async()).await? {
            Ok(block) => Ok(block),
            Err(_) => Err(if let Some(e) = ctx.err() {
                e.into()
            } else if self.is_closed() {
                ExchangeError::Closed
            } else {
                ExchangeError::NotFound(*cid)
            }),
        }
    }

    async fn get_blocks(
        &self,
        ctx: &Context,
        cids: Vec<Cid>,
    ) -> Result<flume::Receiver<Block>, ExchangeError> {
        if self.is_closed() {
            return Err(ExchangeError::Closed);
        }
        if let Some(e) = ctx.err() {
            return Err(e.into());
        }
        let (output, blocks) = flume::bounded(self.inner.config.outbound_buffer.max(1));
        let pending: HashSet<Cid> = cids.into_iter().collect();
        if pending.is_empty() {
            return Ok(blocks);
        }

        let session = self.inner.request_manager.new_session();
        let (arrivals_tx, arrivals) = flume::unbounded();
        let new_wants = self
            .inner
            .request_manager
            .want(session, pending.iter().copied(), &arrivals_tx);
        self.inner.broadcast_wants(&new_wants);
        tokio::spawn(run_session(
            self.inner.clone(),
            ctx.clone(),
            session,
            pending,
            arrivals,
            output,
        ));
        Ok(blocks)
    }

    async fn notify_new_blocks(&self, blocks: &[Block]) -> Result<(), ExchangeError> {
        if self.is_closed() {
            return Err(ExchangeError::Closed);
        }
        let inner = &self.inner;
        let mut satisfied = vec![];
        for block in blocks {
            if inner.request_manager.deliver(block) {
                satisfied.push(*block.cid());
            }
            for peer in inner.ledger.take_wanters(block.cid()) {
                metrics::message_counter_outbound_response_block().inc();
                inner.network.send(
                    inner.peer_id,
                    &peer,
                    vec![BitswapMessage::Response(
                        *block.cid(),
                        BitswapResponse::Block(block.data().clone()),
                    )],
                );
            }
        }
        inner.broadcast_cancels(&satisfied);
        Ok(())
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        if self.is_closed() {
            return Ok(());
        }
        self.inner.shutdown.cancel();
        self.inner.network.detach(&self.inner.peer_id);
        self.inner.request_manager.clear();
        debug!(peer_id = %self.inner.peer_id, "bitswap closed");
        Ok(())
    }
}
