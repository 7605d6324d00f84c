// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::{HashMap, HashSet};
use cid::Cid;
use libp2p::PeerId;
use parking_lot::RwLock;

/// Blocks that remote peers asked for and the local node could not serve
/// yet. They are served as soon as the blocks become available locally.
#[derive(Debug, Default)]
pub struct Ledger {
    wants: RwLock<HashMap<PeerId, HashSet<Cid>>>,
}

impl Ledger {
    pub fn want(&self, peer: PeerId, cid: Cid) -> bool {
        self.wants.write().entry(peer).or_default().insert(cid)
    }

    pub fn cancel(&self, peer: &PeerId, cid: &Cid) -> bool {
        let mut wants = self.wants.write();
        let Some(peer_wants) = wants.get_mut(peer) else {
            return false;
        };
        let removed = peer_wants.remove(cid);
        if peer_wants.is_empty() {
            wants.remove(peer);
        }
        removed
    }

    pub fn remove_peer(&self, peer: &PeerId) {
        self.wants.write().remove(peer);
    }

    /// Removes `cid` from every want-list and returns the peers that wanted it.
    pub fn take_wanters(&self, cid: &Cid) -> Vec<PeerId> {
        let mut wants = self.wants.write();
        let mut wanters = vec![];
        wants.retain(|peer, peer_wants| {
            if peer_wants.remove(cid) {
                wanters.push(*peer);
            }
            !peer_wants.is_empty()
        });
        wanters
    }
}
