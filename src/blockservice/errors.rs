// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;

use crate::db::BlockstoreError;
use crate::exchange::ExchangeError;
use crate::utils::cid::InvalidCid;
use crate::utils::context::ContextError;

#[derive(Debug, thiserror::Error)]
pub enum BlockServiceError {
    #[error("block {0} not found")]
    NotFound(Cid),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidCid),
    /// The local store failed.
    #[error("blockstore: {0}")]
    Store(#[from] BlockstoreError),
    /// The exchange failed.
    #[error("exchange: {0}")]
    Exchange(ExchangeError),
    #[error("block service is closed")]
    Closed,
}

impl From<ExchangeError> for BlockServiceError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::NotFound(cid) => Self::NotFound(cid),
            ExchangeError::Context(e) => Self::Context(e),
            ExchangeError::Closed => Self::Closed,
            e => Self::Exchange(e),
        }
    }
}
