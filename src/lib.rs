// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! A content-addressed block service. Blocks are read from a local
//! [`Blockstore`](db::Blockstore) when present and fetched through an
//! [`Exchange`](exchange::Exchange) otherwise, fetched blocks being cached
//! locally.

pub mod blocks;
pub mod blockservice;
pub mod db;
pub mod exchange;
pub mod logger;
pub mod metrics;
pub mod utils;

pub use blocks::Block;
pub use blockservice::{BlockService, BlockServiceConfig, BlockServiceError, BlockStream};
pub use utils::context::{Context, ContextError};
