// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::HashMap;
use cid::Cid;
use itertools::Itertools;
use parking_lot::RwLock;
use tracing::debug;

use super::metrics;
use crate::blocks::Block;

/// Identifies one fetch, so that concurrent fetches of the same block can be
/// tracked and withdrawn independently.
pub type SessionId = u64;

/// Keeps track of the blocks the local node is waiting for and of who is
/// waiting for them.
#[derive(Debug, Default)]
pub struct BitswapRequestManager {
    next_session: AtomicU64,
    subscribers: RwLock<HashMap<Cid, Vec<(SessionId, flume::Sender<Block>)>>>,
}

impl BitswapRequestManager {
    pub fn new_session(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }

    /// Subscribes `session` to `cids`, arrivals are sent to `tx`. Returns the
    /// identifiers no other session was already waiting for, those still need
    /// to be requested from peers.
    pub fn want(
        &self,
        session: SessionId,
        cids: impl IntoIterator<Item = Cid>,
        tx: &flume::Sender<Block>,
    ) -> Vec<Cid> {
        let mut subscribers = self.subscribers.write();
        let mut new_wants = vec![];
        for cid in cids {
            let waiting = subscribers.entry(cid).or_default();
            if waiting.is_empty() {
                new_wants.push(cid);
            }
            if !waiting.iter().any(|(s, _)| *s == session) {
                waiting.push((session, tx.clone()));
            }
        }
        metrics::wantlist_size().set(subscribers.len() as _);
        new_wants
    }

    /// Hands `block` to every session waiting for it. Returns `false` when
    /// nobody was waiting.
    pub fn deliver(&self, block: &Block) -> bool {
        let waiting = {
            let mut subscribers = self.subscribers.write();
            let waiting = subscribers.remove(block.cid());
            metrics::wantlist_size().set(subscribers.len() as _);
            waiting
        };
        let Some(waiting) = waiting else {
            return false;
        };
        for (session, tx) in waiting {
            if tx.send(block.clone()).is_err() {
                debug!("session {session} ended before {} arrived", block.cid());
            }
        }
        true
    }

    /// Unsubscribes `session` from `cids`. Returns the identifiers nobody is
    /// waiting for anymore, those should be cancelled at peers.
    pub fn cancel<'a>(&self, session: SessionId, cids: impl IntoIterator<Item = &'a Cid>) -> Vec<Cid> {
        let mut subscribers = self.subscribers.write();
        let mut cancelled = vec![];
        for cid in cids {
            let Some(waiting) = subscribers.get_mut(cid) else {
                continue;
            };
            waiting.retain(|(s, _)| *s != session);
            if waiting.is_empty() {
                subscribers.remove(cid);
                cancelled.push(*cid);
            }
        }
        metrics::wantlist_size().set(subscribers.len() as _);
        cancelled
    }

    pub fn is_wanted(&self, cid: &Cid) -> bool {
        self.subscribers.read().contains_key(cid)
    }

    pub fn wantlist(&self) -> Vec<Cid> {
        self.subscribers.read().keys().copied().collect_vec()
    }

    /// Drops every pending want, which closes the channels of all sessions.
    pub fn clear(&self) {
        self.subscribers.write().clear();
        metrics::wantlist_size().set(0);
    }
}
