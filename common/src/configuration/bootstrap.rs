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

use super::{error::ConfigError, utils::install_default_config_file};
use crate::{logging::install_default_logfile_config, DEFAULT_BASE_DIR, DEFAULT_CONFIG, DEFAULT_LOG_CONFIG};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

/// Command line flags common to every ZChat application
#[derive(StructOpt, Debug, Clone)]
pub struct ConfigBootstrap {
    /// A path to a directory to store the configuration, the message store and the logs
    #[structopt(short, long, alias("base_path"), alias("base_dir"), alias("base-dir"), parse(from_os_str), default_value = "")]
    pub base_path: PathBuf,
    /// A path to the configuration file to use (config.toml)
    #[structopt(short, long, parse(from_os_str), default_value = "")]
    pub config: PathBuf,
    /// The path to the log configuration file. It is set using the following precedence set:
    ///   1. from the command line parameter,
    ///   2. from the `ZCHAT_LOG_CONFIGURATION` environment variable,
    ///   3. from a default value, usually `~/.zchat/log4rs.yml` (or OS equivalent).
    #[structopt(short, long, alias("log_config"), env = "ZCHAT_LOG_CONFIGURATION", parse(from_os_str), default_value = "")]
    pub log_config: PathBuf,
    /// Create default configuration and log files if they do not exist, then exit
    #[structopt(long)]
    pub init: bool,
}

impl Default for ConfigBootstrap {
    fn default() -> Self {
        ConfigBootstrap {
            base_path: PathBuf::new(),
            config: PathBuf::new(),
            log_config: PathBuf::new(),
            init: false,
        }
    }
}

impl ConfigBootstrap {
    /// Fill in empty paths with their defaults and create the base directory. With `--init` the sample configuration
    /// and log files are written if missing.
    pub fn init_dirs(&mut self) -> Result<(), ConfigError> {
        if self.base_path.as_os_str().is_empty() {
            self.base_path = default_base_path()?;
        }
        if self.config.as_os_str().is_empty() {
            self.config = self.base_path.join(DEFAULT_CONFIG);
        }
        if self.log_config.as_os_str().is_empty() {
            self.log_config = self.base_path.join(DEFAULT_LOG_CONFIG);
        }

        create_dir(&self.base_path)?;

        if self.init {
            if !self.config.exists() {
                install_default_config_file(&self.config)?;
                println!("Installed a default configuration file at {}", self.config.display());
            }
            if !self.log_config.exists() {
                install_default_logfile_config(&self.log_config)?;
                println!("Installed a default log configuration file at {}", self.log_config.display());
            }
        }
        Ok(())
    }
}

fn default_base_path() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_BASE_DIR))
        .ok_or(ConfigError::NoHomeDirectory)
}

pub(crate) fn create_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
