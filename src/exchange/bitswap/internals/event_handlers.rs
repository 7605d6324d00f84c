// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Weak;

use cid::Cid;
use itertools::Itertools;
use libp2p::PeerId;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::blocks::Block;
use crate::exchange::bitswap::{
    BitswapInner, BitswapMessage, BitswapRequest, BitswapResponse, BitswapStoreRead,
    NetworkEvent, RequestType, metrics,
};

/// Handles network events until the node shuts down or is dropped.
pub(in crate::exchange::bitswap) async fn run_event_loop<S: BitswapStoreRead>(
    inner: Weak<BitswapInner<S>>,
    shutdown: CancellationToken,
    inbox: flume::Receiver<NetworkEvent>,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            event = inbox.recv_async() => match event {
                Ok(event) => event,
                Err(_) => break,
            },
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        handle_event_impl(&inner, event);
    }
    debug!("bitswap event loop stopped");
}

// Note: This method performs db IO synchronously to reduce complexity
fn handle_event_impl<S: BitswapStoreRead>(inner: &BitswapInner<S>, event: NetworkEvent) {
    match event {
        NetworkEvent::Message { from, messages } => {
            let mut responses = vec![];
            for message in messages {
                match message {
                    BitswapMessage::Request(request) => {
                        if let Some(response) = handle_inbound_request(inner, from, &request) {
                            responses.push(BitswapMessage::Response(request.cid, response));
                        }
                    }
                    BitswapMessage::Response(cid, response) => {
                        handle_inbound_response(inner, from, cid, response)
                    }
                }
            }
            if !responses.is_empty() {
                inner.network.send(inner.peer_id, &from, responses);
            }
        }
        NetworkEvent::PeerConnected(peer) => {
            let wants = inner.request_manager.wantlist();
            if !wants.is_empty() {
                metrics::message_counter_outbound_request_block().inc_by(wants.len() as _);
                let messages = wants
                    .into_iter()
                    .map(|cid| {
                        BitswapMessage::Request(
                            BitswapRequest::new_block(cid)
                                .send_dont_have(inner.config.send_dont_have),
                        )
                    })
                    .collect_vec();
                inner.network.send(inner.peer_id, &peer, messages);
            }
        }
        NetworkEvent::PeerDisconnected(peer) => inner.ledger.remove_peer(&peer),
    }
}

fn handle_inbound_request<S: BitswapStoreRead>(
    inner: &BitswapInner<S>,
    from: PeerId,
    request: &BitswapRequest,
) -> Option<BitswapResponse> {
    if request.cancel {
        metrics::message_counter_inbound_request_cancel().inc();
        inner.ledger.cancel(&from, &request.cid);
        return None;
    }
    match request.ty {
        RequestType::Have => {
            metrics::message_counter_inbound_request_have().inc();
            let have = inner.store.contains(&request.cid).unwrap_or_else(|e| {
                warn!("failed to look up {}: {e}", request.cid);
                false
            });
            if have || request.send_dont_have {
                metrics::message_counter_outbound_response_have().inc();
                Some(BitswapResponse::Have(have))
            } else {
                None
            }
        }
        RequestType::Block => {
            metrics::message_counter_inbound_request_block().inc();
            let block = inner.store.get(&request.cid).unwrap_or_else(|e| {
                warn!("failed to read {}: {e}", request.cid);
                None
            });
            if let Some(data) = block {
                metrics::message_counter_outbound_response_block().inc();
                Some(BitswapResponse::Block(data))
            } else {
                inner.ledger.want(from, request.cid);
                if request.send_dont_have {
                    metrics::message_counter_outbound_response_have().inc();
                    Some(BitswapResponse::Have(false))
                } else {
                    None
                }
            }
        }
    }
}

fn handle_inbound_response<S>(
    inner: &BitswapInner<S>,
    from: PeerId,
    cid: Cid,
    response: BitswapResponse,
) {
    match response {
        BitswapResponse::Have(true) => {
            metrics::message_counter_inbound_response_have_yes().inc();
        }
        BitswapResponse::Have(false) => {
            metrics::message_counter_inbound_response_have_no().inc();
        }
        BitswapResponse::Block(data) => {
            metrics::message_counter_inbound_response_block().inc();
            match Block::new_with_cid(cid, data) {
                Ok(block) => {
                    if inner.request_manager.deliver(&block) {
                        inner.broadcast_cancels(&[cid]);
                    } else {
                        debug!("dropping unwanted block {cid} from {from}");
                    }
                }
                Err(e) => {
                    metrics::message_counter_inbound_response_block_invalid().inc();
                    warn!("dropping invalid block from {from}: {e}");
                }
            }
        }
    }
}
