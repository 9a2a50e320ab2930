// Copyright 2020. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use super::{
    bootstrap::{create_dir, ConfigBootstrap},
    error::ConfigError,
};
use config::{Config, Environment, File, FileFormat};
use log::*;
use std::path::Path;

const LOG_TARGET: &str = "zchat::common::configuration";

/// Prefix of environment variables that override file settings, e.g. `ZCHAT_NODE__RPC_URL`
pub const ENV_PREFIX: &str = "ZCHAT";

/// Layers the configuration file named by `bootstrap` and then `ZCHAT_*` environment variables over the defaults.
/// A missing configuration file is not an error.
pub fn load_configuration(bootstrap: &ConfigBootstrap) -> Result<Config, ConfigError> {
    let mut cfg = default_config()?;
    if bootstrap.config.exists() {
        info!(target: LOG_TARGET, "Loading configuration from {}", bootstrap.config.display());
    } else {
        warn!(
            target: LOG_TARGET,
            "Configuration file {} not found, using defaults. Run with --init to create one.",
            bootstrap.config.display()
        );
    }
    cfg.merge(
        File::from(bootstrap.config.as_path())
            .format(FileFormat::Toml)
            .required(false),
    )?;
    cfg.merge(Environment::with_prefix(ENV_PREFIX).separator("__"))?;
    Ok(cfg)
}

/// The built in defaults. These mirror `config/zchat_config_sample.toml`.
pub fn default_config() -> Result<Config, ConfigError> {
    let mut cfg = Config::new();
    cfg.set_default("messaging.data_dir", "data")?;
    cfg.set_default("messaging.db_file", "zchat.db")?;
    cfg.set_default("messaging.scan_interval", 60)?;
    cfg.set_default("messaging.history_page_size", 5)?;
    cfg.set_default("messaging.default_message_fee", "0.0002")?;
    cfg.set_default("node.rpc_url", "http://127.0.0.1:8232")?;
    Ok(cfg)
}

/// Writes the sample configuration file to `path`, creating parent directories as needed
pub fn install_default_config_file(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let source = include_str!("../../config/zchat_config_sample.toml");
    std::fs::write(path, source).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
