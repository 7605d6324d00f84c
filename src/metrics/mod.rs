// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::LazyLock;

use parking_lot::{RwLock, RwLockWriteGuard};
use prometheus_client::{encoding::EncodeLabelSet, registry::Registry};

static DEFAULT_REGISTRY: LazyLock<RwLock<Registry>> = LazyLock::new(Default::default);

pub fn default_registry<'a>() -> RwLockWriteGuard<'a, Registry> {
    DEFAULT_REGISTRY.write()
}

/// Encodes every metric registered so far in the OpenMetrics text format.
pub fn encode_metrics() -> anyhow::Result<String> {
    let mut metrics = String::new();
    prometheus_client::encoding::text::encode(&mut metrics, &DEFAULT_REGISTRY.read())?;
    Ok(metrics)
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabel {
    kind: &'static str,
}

impl KindLabel {
    pub const fn new(kind: &'static str) -> Self {
        Self { kind }
    }
}
