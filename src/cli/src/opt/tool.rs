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
use clap::Subcommand;

#[derive(Debug, Subcommand)]
#[clap(about = "pamauth Management Utility")]
pub enum PamAuthUnixOpt {
    /// Test authentication of a user through the isolated PAM worker. This
    /// prompts for the password and runs exactly the same path a host
    /// application would, including the worker process.
    AuthTest {
        #[clap(short, long)]
        debug: bool,
        #[clap(short = 'D', long = "name")]
        account_id: String,
        #[clap(short, long)]
        config: Option<String>,
    },
    /// List the system groups of a user.
    Groups {
        #[clap(short, long)]
        debug: bool,
        #[clap(short = 'D', long = "name")]
        account_id: String,
    },
    /// Check that the worker can load the native PAM libraries.
    Probe {
        #[clap(short, long)]
        debug: bool,
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Show the resolved configuration.
    Status {
        #[clap(short, long)]
        debug: bool,
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Show the version of this tool.
    Version {
        #[clap(short, long)]
        debug: bool,
    },
}

#[derive(Debug, clap::Parser)]
#[clap(about = "pamauth Management Utility")]
pub struct PamAuthUnixParser {
    #[clap(subcommand)]
    pub commands: PamAuthUnixOpt,
}
