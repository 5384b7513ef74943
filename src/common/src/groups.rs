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
//! Group membership lookup, delegated to the system user database.
use uzers::{get_user_by_name, get_user_groups};

/// Names of every group `username` belongs to, primary group included.
/// Unknown users have no groups.
pub fn get_group_list(username: &str) -> Vec<String> {
    let user = match get_user_by_name(username) {
        Some(user) => user,
        None => {
            debug!("No such user {} while listing groups", username);
            return vec![];
        }
    };

    let mut groups: Vec<String> = match get_user_groups(username, user.primary_group_id()) {
        Some(groups) => groups
            .iter()
            .map(|group| group.name().to_string_lossy().into_owned())
            .collect(),
        None => {
            error!("Failed to list groups for {}", username);
            vec![]
        }
    };
    groups.sort();
    groups.dedup();
    groups
}
