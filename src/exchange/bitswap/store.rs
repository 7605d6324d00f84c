// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::Bytes;
use cid::Cid;

use crate::db::{Blockstore, BlockstoreError};

/// The read-only view of a block store that bitswap needs to answer peers.
/// Bitswap never writes: persisting fetched blocks is up to its caller.
pub trait BitswapStoreRead: Send + Sync + 'static {
    /// A have query needs to know if the block store contains the block.
    fn contains(&self, cid: &Cid) -> anyhow::Result<bool>;

    /// A block query needs to retrieve the block from the store.
    fn get(&self, cid: &Cid) -> anyhow::Result<Option<Bytes>>;
}

impl<T: Blockstore + 'static> BitswapStoreRead for T {
    fn contains(&self, cid: &Cid) -> anyhow::Result<bool> {
        Ok(self.has(cid)?)
    }

    fn get(&self, cid: &Cid) -> anyhow::Result<Option<Bytes>> {
        match Blockstore::get(self, cid) {
            Ok(block) => Ok(Some(block.into_parts().1)),
            Err(BlockstoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
