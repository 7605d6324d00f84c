// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use tracing_subscriber::{EnvFilter, prelude::*};

/// Installs a console logger filtered by `RUST_LOG`, or by
/// [`default_env_filter`] when the variable is unset. Fails when a global
/// subscriber is already installed.
pub fn setup_logger() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::Layer::new()
                .with_filter(get_env_filter(default_env_filter())),
        )
        .try_init()?;
    Ok(())
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable,
/// or `def` when it is unset.
pub fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

pub fn default_env_filter() -> EnvFilter {
    let default_directives = ["info", "forest_blockservice::exchange::bitswap=warn"];
    EnvFilter::new(default_directives.join(","))
}
