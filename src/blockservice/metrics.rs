// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::LazyLock;

use prometheus_client::metrics::{counter::Counter, family::Family};

use crate::metrics::KindLabel;

pub static BLOCK_GET: LazyLock<Family<KindLabel, Counter>> = LazyLock::new(|| {
    let metric = Family::default();
    crate::metrics::default_registry().register(
        "blockservice_get",
        "Number of blocks returned by the block service, by source",
        metric.clone(),
    );
    metric
});

pub static BLOCKS_ADDED: LazyLock<Counter> = LazyLock::new(|| {
    let metric = Counter::default();
    crate::metrics::default_registry().register(
        "blockservice_blocks_added",
        "Number of blocks written to the local store on add",
        metric.clone(),
    );
    metric
});

pub static NOTIFY_FAILURE: LazyLock<Counter> = LazyLock::new(|| {
    let metric = Counter::default();
    crate::metrics::default_registry().register(
        "blockservice_notify_failure",
        "Number of failed new block announcements",
        metric.clone(),
    );
    metric
});

pub mod values {
    use crate::metrics::KindLabel;

    /// Served by the local store.
    pub const LOCAL: KindLabel = KindLabel::new("local");
    /// Fetched through the exchange.
    pub const EXCHANGE: KindLabel = KindLabel::new("exchange");
}
