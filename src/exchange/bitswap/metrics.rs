// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::LazyLock;

use prometheus_client::metrics::{counter::Counter, family::Family, gauge::Gauge};

use crate::metrics::KindLabel;

static MESSAGE_COUNTER: LazyLock<Family<KindLabel, Counter>> = LazyLock::new(|| {
    let metric = Family::default();
    crate::metrics::default_registry().register(
        "bitswap_message",
        "Number of bitswap messages",
        metric.clone(),
    );
    metric
});

static WANTLIST_SIZE: LazyLock<Gauge> = LazyLock::new(|| {
    let metric = Gauge::default();
    crate::metrics::default_registry().register(
        "bitswap_wantlist_size",
        "Number of blocks the local node is waiting for",
        metric.clone(),
    );
    metric
});

fn message_counter(kind: &'static str) -> Counter {
    MESSAGE_COUNTER.get_or_create(&KindLabel::new(kind)).clone()
}

pub(super) fn message_counter_inbound_request_have() -> Counter {
    message_counter("inbound_request_have")
}

pub(super) fn message_counter_inbound_request_block() -> Counter {
    message_counter("inbound_request_block")
}

pub(super) fn message_counter_inbound_request_cancel() -> Counter {
    message_counter("inbound_request_cancel")
}

pub(super) fn message_counter_outbound_request_block() -> Counter {
    message_counter("outbound_request_block")
}

pub(super) fn message_counter_outbound_request_cancel() -> Counter {
    message_counter("outbound_request_cancel")
}

pub(super) fn message_counter_inbound_response_have_yes() -> Counter {
    message_counter("inbound_response_have_yes")
}

pub(super) fn message_counter_inbound_response_have_no() -> Counter {
    message_counter("inbound_response_have_no")
}

pub(super) fn message_counter_inbound_response_block() -> Counter {
    message_counter("inbound_response_block")
}

pub(super) fn message_counter_inbound_response_block_invalid() -> Counter {
    message_counter("inbound_response_block_invalid")
}

pub(super) fn message_counter_outbound_response_have() -> Counter {
    message_counter("outbound_response_have")
}

pub(super) fn message_counter_outbound_response_block() -> Counter {
    message_counter("outbound_response_block")
}

pub(super) fn wantlist_size() -> &'static Gauge {
    &WANTLIST_SIZE
}
