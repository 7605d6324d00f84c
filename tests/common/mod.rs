// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;

use forest_blockservice::{
    Block, BlockService,
    db::{MemoryDB, PutTrackingStore},
    exchange::bitswap::{Bitswap, VirtualNetwork},
};

pub type Store = PutTrackingStore<MemoryDB>;
pub type Service = BlockService<Store, Bitswap<Store>>;

/// Creates `n` block services with empty stores, all attached to `network`.
pub fn mocks(network: &VirtualNetwork, n: usize) -> Vec<Service> {
    (0..n).map(|_| mock(network)).collect()
}

pub fn mock(network: &VirtualNetwork) -> Service {
    let store = Arc::new(PutTrackingStore::new(MemoryDB::default()));
    BlockService::new(store.clone(), Bitswap::new(network.clone(), store))
}

pub fn make_objects(n: usize) -> Vec<Block> {
    (0..n)
        .map(|i| Block::new(format!("object {i}").into_bytes()))
        .collect()
}
