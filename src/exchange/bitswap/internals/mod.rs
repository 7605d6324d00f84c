// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

pub(in crate::exchange::bitswap) mod event_handlers;
pub(in crate::exchange::bitswap) mod ledger;
