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
//! Authenticate a username and password against the system PAM stack.
//!
//! The PAM calls themselves happen in a separate `pamauth_worker` process
//! (see the `pamauth_native` crate). This crate is the side that runs in
//! the calling application: it resolves the configuration, starts the
//! worker with the credentials in its environment, and maps the worker's
//! exit status to a boolean.
//!
//! ```no_run
//! use pamauth::PamBackend;
//! use pamauth_unix_common::config::PamAuthConfig;
//!
//! let cfg = PamAuthConfig::new(None).unwrap();
//! // Refuses to construct when the worker cannot load libpam.
//! let backend = PamBackend::new(cfg).unwrap();
//! if backend.auth("alice", "correct-horse") {
//!     println!("groups: {:?}", backend.groups("alice"));
//! }
//! ```
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

pub mod authenticator;
pub mod spawner;

use std::io;
use std::path::PathBuf;

use pamauth_unix_common::config::PamAuthConfig;
use pamauth_unix_common::groups::get_group_list;

pub use crate::authenticator::PamAuthenticator;
use crate::spawner::{ProcessSpawner, WorkerSpawner};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("PAM worker {} does not exist", .0.display())]
    WorkerMissing(PathBuf),
    #[error("failed to start PAM worker {}: {}", .0.display(), .1)]
    Spawn(PathBuf, #[source] io::Error),
    #[error("native PAM libraries are unavailable: {0}")]
    Unavailable(String),
}

/// The PAM auth backend as registered with a host framework.
///
/// Construction probes the worker once; a backend only exists when the
/// native PAM libraries are usable, so callers never fail per call for
/// that reason.
pub struct PamBackend<S: WorkerSpawner = ProcessSpawner> {
    authenticator: PamAuthenticator<S>,
}

impl PamBackend<ProcessSpawner> {
    pub fn new(cfg: PamAuthConfig) -> Result<Self, BackendError> {
        Self::with_spawner(cfg, ProcessSpawner)
    }
}

impl<S: WorkerSpawner> PamBackend<S> {
    pub fn with_spawner(cfg: PamAuthConfig, spawner: S) -> Result<Self, BackendError> {
        let authenticator = PamAuthenticator::with_spawner(cfg, spawner);
        if let Err(e) = authenticator.probe() {
            warn!("PAM backend disabled: {}", e);
            return Err(e);
        }
        Ok(PamBackend { authenticator })
    }

    pub fn auth(&self, username: &str, password: &str) -> bool {
        self.authenticator.authenticate(username, password)
    }

    /// System groups of `username`.
    pub fn groups(&self, username: &str) -> Vec<String> {
        get_group_list(username)
    }

    pub fn authenticator(&self) -> &PamAuthenticator<S> {
        &self.authenticator
    }
}

/// Authenticate with the default configuration file.
pub fn auth(username: &str, password: &str) -> bool {
    match PamAuthConfig::new(None) {
        Ok(cfg) => PamAuthenticator::new(cfg).authenticate(username, password),
        Err(e) => {
            error!("{}", BackendError::Config(e));
            false
        }
    }
}

pub fn groups(username: &str) -> Vec<String> {
    get_group_list(username)
}
