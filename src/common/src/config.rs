/*
   PAM password authentication backend
   Copyright (C) The pamauth contributors 2026

   This program is free software; you can redistribute it and/or modify
   it under the terms of the GNU General Public License as published by
   the Free Software Foundation; either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
   GNU General Public License for more details.

   You should have received a copy of the GNU General Public License
   along with this program.  If not, see <http://www.gnu.org/licenses/>.
*/
use configparser::ini::Ini;
use std::path::PathBuf;
use tracing::error;

use crate::constants::{
    DEFAULT_CONFIG_PATH, DEFAULT_DEBUG, DEFAULT_PAM_SERVICE, DEFAULT_WORKER_TIMEOUT,
};
use crate::encoding::system_encoding;

#[derive(Clone)]
pub struct PamAuthConfig {
    config: Ini,
    filename: String,
}

fn match_bool(val: Option<String>, default: bool) -> bool {
    match val {
        Some(val) => match val.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            "1" => true,
            "0" => false,
            _ => {
                error!("Unrecognized boolean value '{}'", val);
                default
            }
        },
        None => default,
    }
}

impl PamAuthConfig {
    /// Load the configuration. A missing file is not an error, every
    /// option then takes its default.
    pub fn new(config_path: Option<&str>) -> Result<PamAuthConfig, String> {
        let mut sconfig = Ini::new();
        let filename = config_path.unwrap_or(DEFAULT_CONFIG_PATH).to_string();
        let cfg_path: PathBuf = PathBuf::from(filename.clone());
        if cfg_path.exists() {
            if let Err(e) = sconfig.load(filename.clone()) {
                return Err(format!(
                    "failed to read config from {} - cannot start up: {} Quitting.",
                    filename, e
                ));
            }
        }
        Ok(PamAuthConfig {
            config: sconfig,
            filename,
        })
    }

    pub fn get(&self, section: &str, option: &str) -> Option<String> {
        self.config.get(section, option)
    }

    pub fn get_config_file(&self) -> String {
        self.filename.clone()
    }

    pub fn get_pam_service(&self) -> String {
        match self.config.get("pam", "service") {
            Some(val) if !val.is_empty() => val,
            _ => DEFAULT_PAM_SERVICE.to_string(),
        }
    }

    /// Explicit override for the worker executable, if configured.
    pub fn get_worker_path(&self) -> Option<String> {
        self.config
            .get("pam", "worker_path")
            .filter(|val| !val.is_empty())
    }

    pub fn get_worker_timeout(&self) -> u64 {
        match self.config.get("pam", "worker_timeout") {
            Some(val) => match val.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    error!("Failed parsing worker_timeout from config: {}", val);
                    DEFAULT_WORKER_TIMEOUT
                }
            },
            None => DEFAULT_WORKER_TIMEOUT,
        }
    }

    pub fn get_encoding(&self) -> String {
        match self.config.get("pam", "encoding") {
            Some(val) if !val.is_empty() => val,
            _ => system_encoding(),
        }
    }

    pub fn get_debug(&self) -> bool {
        match_bool(self.config.get("pam", "debug"), DEFAULT_DEBUG)
    }
}
