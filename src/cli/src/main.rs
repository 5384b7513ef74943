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

use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use pamauth::authenticator::{resolve_worker, PamAuthenticator};
use pamauth_unix_common::config::PamAuthConfig;
use pamauth_unix_common::constants::DEFAULT_CONFIG_PATH;
use pamauth_unix_common::groups::get_group_list;
use rpassword::prompt_password;

include!("./opt/tool.rs");

fn load_config(path: Option<&str>) -> anyhow::Result<PamAuthConfig> {
    PamAuthConfig::new(Some(path.unwrap_or(DEFAULT_CONFIG_PATH))).map_err(|e| anyhow!(e))
}

fn auth_test(config: Option<&str>, account_id: &str) -> anyhow::Result<bool> {
    let cfg = load_config(config)?;
    let password = prompt_password(format!("Enter password for {}: ", account_id))?;
    let authenticator = PamAuthenticator::new(cfg);
    Ok(authenticator.authenticate(account_id, &password))
}

fn probe(config: Option<&str>) -> anyhow::Result<()> {
    let cfg = load_config(config)?;
    PamAuthenticator::new(cfg).probe()?;
    Ok(())
}

fn status(config: Option<&str>) -> anyhow::Result<()> {
    let cfg = load_config(config)?;
    println!("config: {}", cfg.get_config_file());
    println!("service: {}", cfg.get_pam_service());
    match resolve_worker(&cfg) {
        Ok(worker) => println!("worker: {}", worker.display()),
        Err(e) => println!("worker: {}", e),
    }
    println!("worker_timeout: {}s", cfg.get_worker_timeout());
    println!("encoding: {}", cfg.get_encoding());
    Ok(())
}

fn main() -> ExitCode {
    let opt = PamAuthUnixParser::parse();

    let debug = match opt.commands {
        PamAuthUnixOpt::AuthTest { debug, .. } => debug,
        PamAuthUnixOpt::Groups { debug, .. } => debug,
        PamAuthUnixOpt::Probe { debug, .. } => debug,
        PamAuthUnixOpt::Status { debug, .. } => debug,
        PamAuthUnixOpt::Version { debug } => debug,
    };

    if debug {
        std::env::set_var("RUST_LOG", "debug");
    }
    tracing_subscriber::fmt::init();

    match opt.commands {
        PamAuthUnixOpt::AuthTest {
            debug: _,
            account_id,
            config,
        } => match auth_test(config.as_deref(), &account_id) {
            Ok(true) => {
                println!("auth success!");
                ExitCode::SUCCESS
            }
            Ok(false) => {
                println!("auth failed!");
                ExitCode::FAILURE
            }
            Err(e) => {
                error!("{:?}", e);
                ExitCode::FAILURE
            }
        },
        PamAuthUnixOpt::Groups {
            debug: _,
            account_id,
        } => {
            for group in get_group_list(&account_id) {
                println!("{}", group);
            }
            ExitCode::SUCCESS
        }
        PamAuthUnixOpt::Probe { debug: _, config } => match probe(config.as_deref()) {
            Ok(()) => {
                println!("native PAM libraries are available");
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("native PAM libraries are unavailable: {}", e);
                ExitCode::FAILURE
            }
        },
        PamAuthUnixOpt::Status { debug: _, config } => match status(config.as_deref()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:?}", e);
                ExitCode::FAILURE
            }
        },
        PamAuthUnixOpt::Version { debug: _ } => {
            println!("pamauth-tool {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}
