//-
// Copyright (c) 2024, Jason Lingle
//
// This file is part of Addrbook.
//
// Addrbook is free software: you can  redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Addrbook is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Addrbook. If not, see <http://www.gnu.org/licenses/>.

//! Contact groups and group membership.

use log::{info, warn};
use rusqlite::types::Value;

use super::db::{self, escape_like, ilike};
use super::model::*;
use super::store::ContactStore;
use super::types::*;
use crate::support::error::Error;

/// How many times group creation or renaming retries after losing a race on
/// the name.
const NAME_RETRIES: u32 = 5;

fn is_constraint_violation(e: &Error) -> bool {
    matches!(
        *e,
        Error::Sqlite(rusqlite::Error::SqliteFailure(ref e, _))
            if rusqlite::ErrorCode::ConstraintViolation == e.code
    )
}

impl ContactStore<'_> {
    /// Lists this user's live groups, optionally only those whose name
    /// matches `search`.
    pub fn list_groups(
        &self,
        search: Option<&str>,
        mode: SearchMode,
    ) -> Result<Vec<Group>, Error> {
        let mut sql = "SELECT `contactgroup_id`, `name`, `changed` \
                       FROM `contactgroups` AS c \
                       WHERE c.`del` = 0 AND c.`user_id` = ?"
            .to_owned();
        let mut params = vec![Value::Integer(self.user.0)];

        if let Some(search) = search.filter(|s| !s.is_empty()) {
            let escaped = escape_like(search);
            let pattern = match MatchKind::from(mode) {
                MatchKind::Strict => escaped,
                MatchKind::Prefix => format!("{}%", escaped),
                MatchKind::Substring => format!("%{}%", escaped),
            };
            let pred = ilike("c.`name`", pattern);
            sql.push_str(" AND ");
            sql.push_str(pred.sql());
            params.extend(pred.params().iter().cloned());
        }

        sql.push_str(" ORDER BY c.`name` COLLATE NOCASE, c.`contactgroup_id`");
        self.db.query_rows(
            &sql,
            rusqlite::params_from_iter(params),
            from_row::<Group>,
        )
    }

    /// Fetches one of this user's live groups.
    pub fn get_group(&self, id: GroupId) -> Result<Option<Group>, Error> {
        self.db.query_row(
            "SELECT `contactgroup_id`, `name`, `changed` FROM `contactgroups` \
             WHERE `contactgroup_id` = ? AND `user_id` = ? AND `del` = 0",
            (id, self.user),
            from_row::<Group>,
        )
    }

    /// Finds a name based on `name` that no other live group of this user
    /// has, by appending " 2", " 3", ... as needed.
    fn unique_group_name(
        &self,
        name: &str,
        exclude: Option<GroupId>,
    ) -> Result<String, Error> {
        let mut candidate = name.to_owned();
        let mut num = 2;

        loop {
            let taken = self
                .db
                .query_row(
                    "SELECT 1 FROM `contactgroups` \
                     WHERE `del` = 0 AND `user_id` = ? AND `name` = ? \
                     AND `contactgroup_id` <> ?",
                    (self.user, &candidate, exclude.map_or(0, |g| g.0)),
                    from_single::<i64>,
                )?
                .is_some();

            if !taken {
                return Ok(candidate);
            }

            candidate = format!("{} {}", name, num);
            num += 1;
        }
    }

    /// Creates a group, adjusting the name to be unique if necessary.
    pub fn create_group(&mut self, name: &str) -> Result<Group, Error> {
        for _ in 0..NAME_RETRIES {
            let unique = self.unique_group_name(name, None)?;
            let now = UnixTimestamp::now();

            match self.db.insert(
                "INSERT INTO `contactgroups` (`user_id`, `changed`, `del`, `name`) \
                 VALUES (?, ?, 0, ?)",
                (self.user, now, &unique),
            ) {
                Ok(id) => {
                    info!("{} Created group {} ({})", self.log_prefix, id, unique);
                    return Ok(Group {
                        id: GroupId(id),
                        name: unique,
                        changed: now,
                    });
                },
                Err(e) if is_constraint_violation(&e) => {
                    warn!(
                        "{} Group name {} was taken concurrently, retrying",
                        self.log_prefix, unique
                    );
                },
                Err(e) => return Err(e),
            }
        }

        Err(Error::GroupNameConflict(name.to_owned()))
    }

    /// Renames a group, adjusting the name to be unique if necessary.
    ///
    /// Returns the name actually given, or `None` if this user has no such
    /// live group.
    pub fn rename_group(
        &mut self,
        id: GroupId,
        name: &str,
    ) -> Result<Option<String>, Error> {
        for _ in 0..NAME_RETRIES {
            let unique = self.unique_group_name(name, Some(id))?;

            match self.db.execute(
                "UPDATE `contactgroups` SET `name` = ?, `changed` = ? \
                 WHERE `contactgroup_id` = ? AND `user_id` = ? AND `del` = 0",
                (&unique, UnixTimestamp::now(), id, self.user),
            ) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    info!("{} Renamed group {} to {}", self.log_prefix, id, unique);
                    return Ok(Some(unique));
                },
                Err(e) if is_constraint_violation(&e) => {
                    warn!(
                        "{} Group name {} was taken concurrently, retrying",
                        self.log_prefix, unique
                    );
                },
                Err(e) => return Err(e),
            }
        }

        Err(Error::GroupNameConflict(name.to_owned()))
    }

    /// Flags a group as deleted. Memberships are kept so the group can be
    /// restored intact.
    pub fn delete_group(&mut self, id: GroupId) -> Result<bool, Error> {
        let affected = self.db.execute(
            &format!(
                "UPDATE `contactgroups` SET `del` = 1, `changed` = {} \
                 WHERE `contactgroup_id` = ? AND `user_id` = ? AND `del` = 0",
                db::now(),
            ),
            (id, self.user),
        )?;

        if self.group == Some(id) {
            self.group = None;
        }
        self.invalidate();

        if affected > 0 {
            info!("{} Deleted group {}", self.log_prefix, id);
        }
        Ok(affected > 0)
    }

    /// Adds contacts to a group. Contacts already in the group, and
    /// contacts not belonging to this user, are skipped.
    ///
    /// Returns the number of memberships created.
    pub fn add_to_group(
        &mut self,
        group: GroupId,
        ids: &[ContactId],
    ) -> Result<usize, Error> {
        if ids.is_empty() || self.get_group(group)?.is_none() {
            return Ok(0);
        }

        let candidates = self.db.query_rows(
            &format!(
                "SELECT c.`contact_id` FROM `contacts` AS c \
                 WHERE c.`user_id` = ? AND c.`contact_id` IN ({}) \
                 AND NOT EXISTS (\
                   SELECT 1 FROM `contactgroupmembers` AS m \
                   WHERE m.`contactgroup_id` = ? \
                   AND m.`contact_id` = c.`contact_id`)",
                db::in_list(ids.iter().map(|id| id.0)),
            ),
            (self.user, group),
            from_single::<ContactId>,
        )?;

        let mut added = 0;
        for contact in candidates {
            added += self.db.execute(
                "INSERT OR IGNORE INTO `contactgroupmembers` \
                 (`contactgroup_id`, `contact_id`, `created`) VALUES (?, ?, ?)",
                (group, contact, UnixTimestamp::now()),
            )?;
        }

        self.invalidate();
        info!(
            "{} Added {} contact(s) to group {}",
            self.log_prefix, added, group
        );
        Ok(added)
    }

    /// Removes contacts from a group. Returns the number of memberships
    /// removed.
    pub fn remove_from_group(
        &mut self,
        group: GroupId,
        ids: &[ContactId],
    ) -> Result<usize, Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let removed = self.db.execute(
            &format!(
                "DELETE FROM `contactgroupmembers` \
                 WHERE `contactgroup_id` = ? AND `contact_id` IN ({}) \
                 AND `contactgroup_id` IN (\
                   SELECT `contactgroup_id` FROM `contactgroups` \
                   WHERE `user_id` = ?)",
                db::in_list(ids.iter().map(|id| id.0)),
            ),
            (group, self.user),
        )?;

        self.invalidate();
        info!(
            "{} Removed {} contact(s) from group {}",
            self.log_prefix, removed, group
        );
        Ok(removed)
    }

    /// The live groups `contact` belongs to.
    pub fn get_record_groups(
        &self,
        contact: ContactId,
    ) -> Result<Vec<Group>, Error> {
        self.db.query_rows(
            "SELECT g.`contactgroup_id`, g.`name`, g.`changed` \
             FROM `contactgroupmembers` AS m \
             INNER JOIN `contactgroups` AS g \
             ON g.`contactgroup_id` = m.`contactgroup_id` \
             WHERE m.`contact_id` = ? AND g.`user_id` = ? AND g.`del` = 0 \
             ORDER BY g.`name` COLLATE NOCASE",
            (contact, self.user),
            from_row::<Group>,
        )
    }
}
