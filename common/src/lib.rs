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

//! # ZChat common
//!
//! Bootstrapping shared by ZChat applications: command line flags, the layered configuration file and log4rs
//! initialisation.
//!
//! ```ignore
//! let mut bootstrap = ConfigBootstrap::from_args();
//! bootstrap.init_dirs()?;
//! initialize_logging(&bootstrap.log_config);
//! let config = GlobalConfig::convert_from(load_configuration(&bootstrap)?, &bootstrap.base_path)?;
//! ```

pub mod configuration;
mod logging;

pub use configuration::{
    bootstrap::ConfigBootstrap,
    error::ConfigError,
    global::GlobalConfig,
    utils::{default_config, install_default_config_file, load_configuration},
};
pub use logging::{initialize_logging, install_default_logfile_config};
pub use structopt;

pub const DEFAULT_CONFIG: &str = "config.toml";
pub const DEFAULT_LOG_CONFIG: &str = "log4rs.yml";
/// Name of the directory under the user's home directory used when no base path is given
pub const DEFAULT_BASE_DIR: &str = ".zchat";
