// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::{sync::Arc, time::Duration};

use ahash::HashMap;
use itertools::Itertools;
use libp2p::PeerId;
use parking_lot::RwLock;

use super::BitswapMessage;
use crate::utils::flume::FlumeSenderExt as _;

#[derive(Clone, Debug)]
pub enum NetworkEvent {
    Message {
        from: PeerId,
        messages: Vec<BitswapMessage>,
    },
    PeerConnected(PeerId),
    PeerDisconnected(PeerId),
}

/// An in-process network fabric. Every attached peer is connected to every
/// other attached peer and messages are delivered in order per sender.
#[derive(Clone, Debug, Default)]
pub struct VirtualNetwork {
    peers: Arc<RwLock<HashMap<PeerId, flume::Sender<NetworkEvent>>>>,
    latency: Option<Duration>,
}

impl VirtualNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a network that delays every message by `latency`.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.peers.read().keys().copied().collect_vec()
    }

    /// Connects `peer` to every attached peer and returns its inbox. The inbox
    /// first yields a [`NetworkEvent::PeerConnected`] for every peer that was
    /// already attached.
    pub fn attach(&self, peer: PeerId) -> flume::Receiver<NetworkEvent> {
        let (tx, rx) = flume::unbounded();
        let mut peers = self.peers.write();
        for (other, inbox) in peers.iter() {
            inbox.send_or_warn(NetworkEvent::PeerConnected(peer));
            tx.send_or_warn(NetworkEvent::PeerConnected(*other));
        }
        peers.insert(peer, tx);
        rx
    }

    /// Disconnects `peer`, returning `false` if it was not attached.
    pub fn detach(&self, peer: &PeerId) -> bool {
        let mut peers = self.peers.write();
        if peers.remove(peer).is_none() {
            return false;
        }
        for inbox in peers.values() {
            inbox.send_or_warn(NetworkEvent::PeerDisconnected(*peer));
        }
        true
    }

    /// Sends `messages` to `to`, returning `false` if it is not attached.
    pub fn send(&self, from: PeerId, to: &PeerId, messages: Vec<BitswapMessage>) -> bool {
        let Some(inbox) = self.peers.read().get(to).cloned() else {
            return false;
        };
        let event = NetworkEvent::Message { from, messages };
        match self.latency {
            Some(latency) => {
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    // the receiver may have been detached in the meantime
                    _ = inbox.send(event);
                });
            }
            None => inbox.send_or_warn(event),
        }
        true
    }

    /// Sends `messages` to every attached peer but `from`.
    pub fn broadcast(&self, from: PeerId, messages: Vec<BitswapMessage>) {
        for peer in self.peers().into_iter().filter(|p| *p != from) {
            self.send(from, &peer, messages.clone());
        }
    }
}
