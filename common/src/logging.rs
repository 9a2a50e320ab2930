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

use crate::configuration::{bootstrap::create_dir, error::ConfigError};
use std::path::Path;

/// Initialise log4rs from the YAML file at `log_config`. Returns false, after printing the reason, if logging could not
/// be set up. The application keeps running without logs in that case.
pub fn initialize_logging(log_config: &Path) -> bool {
    println!("Initializing logging according to {}", log_config.display());

    if let Err(e) = log4rs::init_file(log_config, Default::default()) {
        println!("We couldn't load a logging configuration file. {}", e.to_string());
        return false;
    }

    true
}

/// Writes the sample log4rs configuration to `path`
pub fn install_default_logfile_config(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let source = include_str!("../logging/log4rs_sample.yml");
    std::fs::write(path, source).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
