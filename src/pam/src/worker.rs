/*
   MIT License

   Copyright (c) 2015 TOZNY
   Copyright (c) 2020 William Brown <william@blackhats.net.au>
   Copyright (c) 2024 David Mulder <dmulder@samba.org>
   Copyright (c) 2026 The pamauth contributors

   Permission is hereby granted, free of charge, to any person obtaining a copy
   of this software and associated documentation files (the "Software"), to deal
   in the Software without restriction, including without limitation the rights
   to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
   copies of the Software, and to permit persons to whom the Software is
   furnished to do so, subject to the following conditions:

   The above copyright notice and this permission notice shall be included in all
   copies or substantial portions of the Software.

   THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
   IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
   FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
   AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
   LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
   OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
   SOFTWARE.
*/
//! The isolated worker.
//!
//! Reads a credential envelope from its environment, runs one PAM
//! transaction and reports the result solely through its exit code:
//! 0 when authenticated, 1 otherwise. With `PAMAUTH_PROBE=1` it only checks
//! that libpam can be loaded.
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::process::ExitCode;

use pamauth_native::pam::authenticate_envelope;
use pamauth_native::pam::library::PamLibrary;
use pamauth_unix_common::constants::{
    ENV_DEBUG, ENV_PROBE, WORKER_EXIT_FAILURE, WORKER_EXIT_SUCCESS,
};
use pamauth_unix_common::envelope::CredentialEnvelope;

use tracing::{debug, error};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

fn install_subscriber(debug: bool) {
    // stdout and stderr are captured by the submitter for diagnostics.
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    let filter_layer = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::ERROR
    };

    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init();
}

fn flag(var: &str) -> bool {
    matches!(env::var(var).as_deref(), Ok("1") | Ok("true"))
}

fn main() -> ExitCode {
    install_subscriber(flag(ENV_DEBUG));

    if flag(ENV_PROBE) {
        return match PamLibrary::load() {
            Ok(lib) => {
                debug!(soname = lib.soname(), "libpam is available");
                ExitCode::from(WORKER_EXIT_SUCCESS)
            }
            Err(e) => {
                error!("{}", e);
                ExitCode::from(WORKER_EXIT_FAILURE)
            }
        };
    }

    let envelope = match CredentialEnvelope::take_from_env() {
        Ok(envelope) => envelope,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(WORKER_EXIT_FAILURE);
        }
    };

    let library = match PamLibrary::load() {
        Ok(lib) => lib,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(WORKER_EXIT_FAILURE);
        }
    };

    if authenticate_envelope(&library, &envelope) {
        ExitCode::from(WORKER_EXIT_SUCCESS)
    } else {
        ExitCode::from(WORKER_EXIT_FAILURE)
    }
}
