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

//! The typed view of the configuration used by applications

use super::error::ConfigError;
use config::Config;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Clone, Debug, PartialEq)]
pub struct GlobalConfig {
    pub data_dir: PathBuf,
    /// Full path of the SQLite message store
    pub db_path: PathBuf,
    pub scan_interval: Duration,
    pub history_page_size: usize,
    /// Decimal coin amount, parsed by the messaging layer
    pub default_message_fee: String,
    pub node_rpc_url: String,
    pub node_rpc_user: Option<String>,
    pub node_rpc_password: Option<String>,
}

impl GlobalConfig {
    /// Relative paths in `cfg` are resolved against `base_path`
    pub fn convert_from(cfg: Config, base_path: &Path) -> Result<Self, ConfigError> {
        let data_dir = PathBuf::from(cfg.get_str("messaging.data_dir")?);
        let data_dir = if data_dir.is_absolute() {
            data_dir
        } else {
            base_path.join(data_dir)
        };
        let db_path = data_dir.join(cfg.get_str("messaging.db_file")?);

        let key = "messaging.scan_interval";
        let scan_interval = cfg.get_int(key)?;
        if scan_interval <= 0 {
            return Err(ConfigError::invalid(key, "must be a positive number of seconds"));
        }

        let key = "messaging.history_page_size";
        let history_page_size = cfg.get_int(key)?;
        if history_page_size <= 0 {
            return Err(ConfigError::invalid(key, "must be at least 1"));
        }

        let key = "node.rpc_url";
        let node_rpc_url = cfg.get_str(key)?;
        if node_rpc_url.trim().is_empty() {
            return Err(ConfigError::invalid(key, "must not be empty"));
        }

        Ok(Self {
            data_dir,
            db_path,
            scan_interval: Duration::from_secs(scan_interval as u64),
            history_page_size: history_page_size as usize,
            default_message_fee: cfg.get_str("messaging.default_message_fee")?,
            node_rpc_url,
            node_rpc_user: optional_str(&cfg, "node.rpc_user"),
            node_rpc_password: optional_str(&cfg, "node.rpc_password"),
        })
    }
}

fn optional_str(cfg: &Config, key: &str) -> Option<String> {
    cfg.get_str(key).ok().filter(|s| !s.is_empty())
}
