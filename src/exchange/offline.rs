// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;

use super::{Exchange, ExchangeError};
use crate::blocks::Block;
use crate::db::{Blockstore, BlockstoreError};
use crate::utils::{context::Context, flume::FlumeSenderExt as _};

/// An [`Exchange`] without a network. It only answers with blocks found in
/// the store it was given, which is typically the store of the block service
/// it backs.
#[derive(Debug)]
pub struct OfflineExchange<DB> {
    store: Arc<DB>,
}

impl<DB> OfflineExchange<DB> {
    pub fn new(store: Arc<DB>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<DB: Blockstore + 'static> Exchange for OfflineExchange<DB> {
    async fn get_block(&self, ctx: &Context, cid: &Cid) -> Result<Block, ExchangeError> {
        if let Some(e) = ctx.err() {
            return Err(e.into());
        }
        self.store.get(cid).map_err(|e| match e {
            BlockstoreError::NotFound(cid) => ExchangeError::NotFound(cid),
            e => ExchangeError::Other(e.into()),
        })
    }

    async fn get_blocks(
        &self,
        ctx: &Context,
        cids: Vec<Cid>,
    ) -> Result<flume::Receiver<Block>, ExchangeError> {
        if let Some(e) = ctx.err() {
            return Err(e.into());
        }
        let (tx, rx) = flume::bounded(cids.len().max(1));
        let store = self.store.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            for cid in cids {
                let Ok(block) = store.get(&cid) else {
                    continue;
                };
                if !tx.send_or_cancel(&ctx, block).await {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn notify_new_blocks(&self, _blocks: &[Block]) -> Result<(), ExchangeError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ExchangeError> {
        Ok(())
    }
}
