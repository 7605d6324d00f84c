// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct BlockServiceConfig {
    /// Skips writing (and announcing) blocks the store already has. Off by
    /// default, every add is written through.
    pub check_first: bool,
    /// Maximum number of fetched blocks cached with a single
    /// [`Blockstore::put_many`](crate::db::Blockstore::put_many).
    #[default(32)]
    pub fetch_batch_size: usize,
    /// Capacity of the stream returned by
    /// [`BlockService::get_blocks`](super::BlockService::get_blocks).
    #[default(64)]
    pub output_buffer: usize,
}
