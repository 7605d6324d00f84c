// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Local block persistence.
//!
//! [`Blockstore`] is the capability set the block service needs from a local
//! store. The store is the source of truth for "do we already have this
//! block"; it knows nothing about the network.

mod memory;
mod tracking;

pub use memory::MemoryDB;
pub use tracking::PutTrackingStore;

use cid::Cid;

use crate::blocks::Block;
use crate::utils::context::Context;

#[derive(Debug, thiserror::Error)]
pub enum BlockstoreError {
    #[error("block {0} not found")]
    NotFound(Cid),
    #[error("stored data does not match the digest of {0}")]
    HashMismatch(Cid),
    #[error("cannot verify {cid}: unsupported multihash code {code:#x}")]
    UnsupportedHash { cid: Cid, code: u64 },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistent, content-addressed storage of [`Block`]s.
///
/// Implementations must be safe for concurrent use. Writing a block that is
/// already present is allowed and must leave the stored data intact.
pub trait Blockstore: Send + Sync {
    fn put(&self, block: &Block) -> Result<(), BlockstoreError>;

    /// Puts a batch of blocks, using the batching capabilities of the
    /// underlying storage whenever possible.
    fn put_many(&self, blocks: &[Block]) -> Result<(), BlockstoreError> {
        blocks.iter().try_for_each(|block| self.put(block))
    }

    /// Fails with [`BlockstoreError::NotFound`] when the block is absent.
    fn get(&self, cid: &Cid) -> Result<Block, BlockstoreError>;

    fn has(&self, cid: &Cid) -> Result<bool, BlockstoreError>;

    /// Returns the payload size of a stored block. Fails with
    /// [`BlockstoreError::NotFound`] when the block is absent.
    fn get_size(&self, cid: &Cid) -> Result<usize, BlockstoreError>;

    /// Removes a block. Removing an absent block is not an error.
    fn delete_block(&self, cid: &Cid) -> Result<(), BlockstoreError>;

    /// Lazily enumerates every stored [`Cid`]. The channel closes once all
    /// keys are sent, when `ctx` is done, or when the receiver is dropped.
    fn all_keys(&self, ctx: &Context) -> Result<flume::Receiver<Cid>, BlockstoreError>;

    /// Toggles re-hashing of every block read against its identifier.
    fn hash_on_read(&self, enabled: bool);
}
