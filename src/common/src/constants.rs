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
pub const DEFAULT_CONFIG_PATH: &str = "/etc/pamauth/pamauth.conf";
pub const DEFAULT_PAM_SERVICE: &str = "login";
pub const SYSTEM_WORKER_PATH: &str = "/usr/libexec/pamauth/pamauth_worker";
pub const WORKER_BINARY_NAME: &str = "pamauth_worker";
pub const DEFAULT_WORKER_TIMEOUT: u64 = 30;
pub const DEFAULT_ENCODING: &str = "utf-8";
pub const DEFAULT_DEBUG: bool = false;

// Worker environment contract. These never appear in argv.
pub const ENV_PAM_USERNAME: &str = "PAMAUTH_PAM_USERNAME";
pub const ENV_PAM_PASSWORD: &str = "PAMAUTH_PAM_PASSWORD";
pub const ENV_PAM_SERVICE: &str = "PAMAUTH_PAM_SERVICE";
pub const ENV_PAM_ENCODING: &str = "PAMAUTH_PAM_ENCODING";
pub const ENV_PROBE: &str = "PAMAUTH_PROBE";
pub const ENV_DEBUG: &str = "PAMAUTH_DEBUG";

pub const WORKER_EXIT_SUCCESS: u8 = 0;
pub const WORKER_EXIT_FAILURE: u8 = 1;

// The binding cannot authenticate the superuser.
pub const SUPERUSER_NAME: &str = "root";
