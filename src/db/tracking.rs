// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::HashMap;
use cid::Cid;
use parking_lot::Mutex;

use super::{Blockstore, BlockstoreError};
use crate::blocks::Block;
use crate::utils::context::Context;

/// Forwards every call to the inner store and counts, per [`Cid`], how many
/// times a block was written through [`Blockstore::put`] or
/// [`Blockstore::put_many`].
#[derive(Debug, Default)]
pub struct PutTrackingStore<DB> {
    inner: DB,
    puts: Mutex<HashMap<Cid, usize>>,
}

impl<DB> PutTrackingStore<DB> {
    pub fn new(inner: DB) -> Self {
        Self {
            inner,
            puts: Default::default(),
        }
    }

    pub fn inner(&self) -> &DB {
        &self.inner
    }

    /// Number of successful writes of `cid`.
    pub fn put_count(&self, cid: &Cid) -> usize {
        self.puts.lock().get(cid).copied().unwrap_or_default()
    }

    /// Number of successful block writes across all identifiers.
    pub fn total_puts(&self) -> usize {
        self.puts.lock().values().sum()
    }

    fn track<'a>(&self, cids: impl IntoIterator<Item = &'a Cid>) {
        let mut puts = self.puts.lock();
        for cid in cids {
            *puts.entry(*cid).or_default() += 1;
        }
    }
}

impl<DB: Blockstore> Blockstore for PutTrackingStore<DB> {
    fn put(&self, block: &Block) -> Result<(), BlockstoreError> {
        self.inner.put(block)?;
        self.track([block.cid()]);
        Ok(())
    }

    fn put_many(&self, blocks: &[Block]) -> Result<(), BlockstoreError> {
        self.inner.put_many(blocks)?;
        self.track(blocks.iter().map(Block::cid));
        Ok(())
    }

    fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError> {
        self.inner.get(cid)
    }

    fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError> {
        self.inner.has(cid)
    }

    fn get_size(&self, cid: &Cid) -> Result<usize, BlockstoreError> {
        self.inner.get_size(cid)
    }

    fn delete_block(&self, cid: &Cid) -> Result<(), BlockstoreError> {
        self.inner.delete_block(cid)
    }

    fn all_keys(&self, ctx: &Context) -> Result<flume::Receiver<Cid>, BlockstoreError> {
        self.inner.all_keys(ctx)
    }

    fn hash_on_read(&self, enabled: bool) {
        self.inner.hash_on_read(enabled)
    }
}
