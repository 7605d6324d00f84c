// Copyright 2019-2026 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::Path;

use anyhow::Context as _;

/// Converts a TOML file represented as a string to `S`
///
/// # Example
/// ```
/// use serde::Deserialize;
/// use forest_blockservice::utils::io::read_toml;
///
/// #[derive(Deserialize)]
/// struct Config {
///     check_first: bool
/// };
///
/// let toml_string = "check_first = true\n";
/// let config: Config = read_toml(toml_string).unwrap();
/// assert!(config.check_first);
/// ```
pub fn read_toml<S>(toml_string: &str) -> anyhow::Result<S>
where
    for<'de> S: serde::de::Deserialize<'de>,
{
    let new_struct: S = toml::from_str(toml_string)?;
    Ok(new_struct)
}

/// Reads a configuration of type `S` from the TOML file at `path`. Keys
/// missing from the file keep their defaults when `S` uses
/// `#[serde(default)]`.
pub fn read_config_file<S>(path: &Path) -> anyhow::Result<S>
where
    for<'de> S: serde::de::Deserialize<'de>,
{
    let toml_string = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    read_toml(&toml_string).with_context(|| format!("invalid config file {}", path.display()))
}
