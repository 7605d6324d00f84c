// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::atomic::{AtomicBool, Ordering};

use ahash::HashMap;
use anyhow::Context as _;
use bytes::Bytes;
use cid::Cid;
use itertools::Itertools;
use parking_lot::RwLock;

use super::{Blockstore, BlockstoreError};
use crate::blocks::{Block, BlockError};
use crate::utils::{context::Context, flume::FlumeSenderExt as _};

/// Capacity of the channel returned by [`Blockstore::all_keys`].
const ALL_KEYS_BUFFER: usize = 64;

/// A thread-safe in-memory block store.
#[derive(Debug, Default)]
pub struct MemoryDB {
    blocks: RwLock<HashMap<Cid, Bytes>>,
    hash_on_read: AtomicBool,
}

impl MemoryDB {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl Blockstore for MemoryDB {
    fn put(&self, block: &Block) -> Result<(), BlockstoreError> {
        self.blocks.write().insert(*block.cid(), block.data().clone());
        Ok(())
    }

    fn put_many(&self, blocks: &[Block]) -> Result<(), BlockstoreError> {
        let mut db = self.blocks.write();
        for block in blocks {
            db.insert(*block.cid(), block.data().clone());
        }
        Ok(())
    }

    fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError> {
        let data = self
            .blocks
            .read()
            .get(cid)
            .cloned()
            .ok_or(BlockstoreError::NotFound(*cid))?;
        if self.hash_on_read.load(Ordering::Relaxed) {
            Block::new_with_cid(*cid, data).map_err(|e| match e {
                BlockError::HashMismatch(_) => BlockstoreError::HashMismatch(*cid),
                BlockError::UnsupportedHash(code) => {
                    BlockstoreError::UnsupportedHash { cid: *cid, code }
                }
            })
        } else {
            Ok(Block::new_unchecked(*cid, data))
        }
    }

    fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError> {
        Ok(self.blocks.read().contains_key(cid))
    }

    fn get_size(&self, cid: &Cid) -> Result<usize, BlockstoreError> {
        self.blocks
            .read()
            .get(cid)
            .map(Bytes::len)
            .ok_or(BlockstoreError::NotFound(*cid))
    }

    fn delete_block(&self, cid: &Cid) -> Result<(), BlockstoreError> {
        self.blocks.write().remove(cid);
        Ok(())
    }

    fn all_keys(&self, ctx: &Context) -> Result<flume::Receiver<Cid>, BlockstoreError> {
        let handle = tokio::runtime::Handle::try_current()
            .context("enumerating keys requires a tokio runtime")?;
        let keys = self.blocks.read().keys().copied().collect_vec();
        let (tx, rx) = flume::bounded(ALL_KEYS_BUFFER);
        let ctx = ctx.clone();
        handle.spawn(async move {
            for key in keys {
                if !tx.send_or_cancel(&ctx, key).await {
                    break;
                }
            }
        });
        Ok(rx)
    }

    fn hash_on_read(&self, enabled: bool) {
        self.hash_on_read.store(enabled, Ordering::Relaxed);
    }
}
