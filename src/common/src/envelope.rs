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
//! The credential envelope carried from the submitter to the worker process.
//!
//! The envelope crosses the process boundary exclusively through the worker's
//! environment. It must never be placed in argv (where any local user can read
//! it from `/proc`), and the password must never be logged, so the `Debug`
//! implementation redacts it.
use std::env;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::constants::{ENV_PAM_ENCODING, ENV_PAM_PASSWORD, ENV_PAM_SERVICE, ENV_PAM_USERNAME};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
}

#[derive(Clone)]
pub struct CredentialEnvelope {
    pub username: String,
    pub password: Zeroizing<String>,
    pub service: String,
    pub encoding: String,
}

impl fmt::Debug for CredentialEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEnvelope")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("service", &self.service)
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl CredentialEnvelope {
    pub fn new(username: &str, password: &str, service: &str, encoding: &str) -> Self {
        CredentialEnvelope {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            service: service.to_string(),
            encoding: encoding.to_string(),
        }
    }

    /// The environment variables the worker expects, in a fixed order.
    pub fn to_env(&self) -> Vec<(&'static str, Zeroizing<String>)> {
        vec![
            (ENV_PAM_USERNAME, Zeroizing::new(self.username.clone())),
            (ENV_PAM_PASSWORD, self.password.clone()),
            (ENV_PAM_SERVICE, Zeroizing::new(self.service.clone())),
            (ENV_PAM_ENCODING, Zeroizing::new(self.encoding.clone())),
        ]
    }

    /// Rebuild an envelope from an arbitrary variable lookup.
    pub fn from_lookup<F>(mut lookup: F) -> Result<Self, EnvelopeError>
    where
        F: FnMut(&'static str) -> Option<String>,
    {
        let mut fetch = |var: &'static str| lookup(var).ok_or(EnvelopeError::Missing(var));
        Ok(CredentialEnvelope {
            username: fetch(ENV_PAM_USERNAME)?,
            password: Zeroizing::new(fetch(ENV_PAM_PASSWORD)?),
            service: fetch(ENV_PAM_SERVICE)?,
            encoding: fetch(ENV_PAM_ENCODING)?,
        })
    }

    /// Read the envelope from this process's environment and remove the
    /// variables so they are consumed exactly once and not inherited by
    /// anything PAM modules may spawn.
    pub fn take_from_env() -> Result<Self, EnvelopeError> {
        let envelope = Self::from_lookup(|var| env::var(var).ok());
        for var in [
            ENV_PAM_USERNAME,
            ENV_PAM_PASSWORD,
            ENV_PAM_SERVICE,
            ENV_PAM_ENCODING,
        ] {
            env::remove_var(var);
        }
        envelope
    }
}
