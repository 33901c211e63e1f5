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

//! The per-user contact store.
//!
//! A `ContactStore` is a view of one user's address book. Besides the
//! database handle it carries browsing state: the current search filter,
//! the selected group, paging and sorting, the last result, and a cached
//! total count. Every mutation and every scope change drops the cached
//! count.

use log::{debug, info};
use rusqlite::types::Value;

use super::codec;
use super::cursor::{self, CountSource, ResultSet};
use super::db::{self, Database, Predicate};
use super::model::*;
use super::query::{self, SearchQuery};
use super::types::*;
use crate::support::{error::Error, log_prefix::LogPrefix};

/// Options accompanying a search request.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub mode: SearchMode,
    /// If false, only the count is computed.
    pub select: bool,
    /// If true, the total is not computed when listing.
    pub nocount: bool,
    /// Fields every result must have a non-empty value for.
    pub required: Vec<String>,
}

impl SearchOptions {
    pub fn select() -> Self {
        Self {
            select: true,
            ..Self::default()
        }
    }
}

pub struct ContactStore<'a> {
    pub(super) db: &'a Database,
    pub(super) user: UserId,
    pub(super) log_prefix: LogPrefix,
    filter: Option<Predicate>,
    pub(super) group: Option<GroupId>,
    page: usize,
    page_size: usize,
    sort: SortColumn,
    order: SortOrder,
    result: Option<ResultSet>,
    cached_count: Option<usize>,
}

impl<'a> ContactStore<'a> {
    pub fn new(db: &'a Database, user: UserId, log_prefix: LogPrefix) -> Self {
        Self {
            db,
            user,
            log_prefix,
            filter: None,
            group: None,
            page: 1,
            page_size: 10,
            sort: SortColumn::default(),
            order: SortOrder::default(),
            result: None,
            cached_count: None,
        }
    }

    pub fn user(&self) -> UserId {
        self.user
    }

    /// Drops the cached count and the last result.
    pub(super) fn invalidate(&mut self) {
        self.cached_count = None;
        self.result = None;
    }

    /// Replaces the search filter restricting all listings.
    pub fn set_search_set(&mut self, filter: Option<Predicate>) {
        self.filter = filter;
        self.invalidate();
    }

    pub fn get_search_set(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    /// Restricts listings to members of `group`, or lifts the restriction.
    pub fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
        self.invalidate();
    }

    /// Clears the filter, the last result, and the cached count.
    pub fn reset(&mut self) {
        self.filter = None;
        self.invalidate();
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
    }

    pub fn set_sort(&mut self, sort: SortColumn, order: SortOrder) {
        self.sort = sort;
        self.order = order;
    }

    /// The result of the last listing or search, if still valid.
    pub fn result(&self) -> Option<&ResultSet> {
        self.result.as_ref()
    }

    fn page_start(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Builds the `FROM ... WHERE ...` part shared by listing and counting.
    fn scope_sql(&self, filter: Option<&Predicate>) -> (String, Vec<Value>) {
        let mut sql = "FROM `contacts` AS c".to_owned();
        let mut params = Vec::new();

        if let Some(group) = self.group {
            sql.push_str(
                " INNER JOIN `contactgroupmembers` AS m \
                 ON m.`contact_id` = c.`contact_id` \
                 AND m.`contactgroup_id` = ?",
            );
            params.push(Value::Integer(group.0));
        }

        sql.push_str(" WHERE c.`del` = 0 AND c.`user_id` = ?");
        params.push(Value::Integer(self.user.0));

        if let Some(filter) = filter {
            sql.push_str(" AND (");
            sql.push_str(filter.sql());
            sql.push(')');
            params.extend(filter.params().iter().cloned());
        }

        (sql, params)
    }

    fn fetch(
        &self,
        filter: Option<&Predicate>,
        offset: usize,
        length: usize,
        read_card: bool,
    ) -> Result<Vec<Contact>, Error> {
        let (scope, mut params) = self.scope_sql(filter);
        let sql = format!(
            "SELECT {} {} ORDER BY {} LIMIT ? OFFSET ?",
            if read_card {
                CONTACT_ROW_COLS
            } else {
                CONTACT_ROW_COLS_NO_CARD
            },
            scope,
            query::order_by(self.sort, self.order),
        );
        params.push(Value::Integer(i64::try_from(length).unwrap_or(i64::MAX)));
        params.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));

        self.db
            .query_rows(&sql, rusqlite::params_from_iter(params), from_row::<ContactRow>)?
            .into_iter()
            .map(|row| codec::decode(row, read_card))
            .collect()
    }

    fn count_matching(&self, filter: Option<&Predicate>) -> Result<usize, Error> {
        let (scope, params) = self.scope_sql(filter);
        let count = self
            .db
            .query_row(
                &format!("SELECT COUNT(*) {}", scope),
                rusqlite::params_from_iter(params),
                from_single::<i64>,
            )?
            .unwrap_or(0);
        Ok(count.max(0) as usize)
    }

    /// The total number of records in scope, from the cache if possible.
    fn total(&mut self) -> Result<usize, Error> {
        if let Some(count) = self.cached_count {
            return Ok(count);
        }

        let count = self.count_matching(self.filter.as_ref())?;
        self.cached_count = Some(count);
        Ok(count)
    }

    /// Lists the current page of records in scope.
    ///
    /// `cols` names the fields the caller needs; if they are all indexed
    /// columns, cards are not decoded. An empty list means every field. `subset` selects part of the page,
    /// see `cursor::page_window`. With `nocount`, the result's count is just
    /// the number of records returned.
    pub fn list_records(
        &mut self,
        cols: Option<&[&str]>,
        subset: i64,
        nocount: bool,
    ) -> Result<ResultSet, Error> {
        let read_card = cols
            .filter(|cols| !cols.is_empty())
            .map_or(true, |cols| cols.iter().any(|c| !is_table_col(c)));
        let (offset, length) = cursor::page_window(self.page, self.page_size, subset);

        let records = self.fetch(self.filter.as_ref(), offset, length, read_card)?;
        let fetched = records.len();

        let count = match cursor::count_source(
            nocount,
            self.page,
            self.page_size,
            subset,
            fetched,
            self.cached_count,
        ) {
            CountSource::Fetched => {
                if !nocount {
                    self.cached_count = Some(fetched);
                }
                fetched
            },
            CountSource::Cached(count) => count,
            CountSource::Query => self.total()?,
        };

        let result = ResultSet {
            records,
            first: self.page_start(),
            count,
        };
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Counts the records in scope without listing them.
    pub fn count(&mut self) -> Result<ResultSet, Error> {
        let count = self.total()?;
        Ok(ResultSet::new(count, self.page_start()))
    }

    /// Runs a search, which replaces the current filter.
    ///
    /// Searches on fields the database does not index are resolved by
    /// decoding every candidate the coarse predicate admits; the survivors
    /// become an ID filter. A request which yields no predicate at all
    /// produces an empty result and leaves the filter untouched.
    pub fn search(
        &mut self,
        request: &SearchQuery,
        options: &SearchOptions,
    ) -> Result<ResultSet, Error> {
        let plan = query::plan(request, options.mode, &options.required);
        let mut predicate = plan.predicate;

        if !plan.post_filter.is_empty() {
            let ids = self.post_search(predicate.as_ref(), &plan.post_filter)?;
            debug!(
                "{} Post-search kept {} candidate(s)",
                self.log_prefix,
                ids.len()
            );

            if ids.is_empty() {
                self.set_search_set(Some(Predicate::never()));
                let result = ResultSet::new(0, self.page_start());
                self.cached_count = Some(0);
                self.result = Some(result.clone());
                return Ok(result);
            }

            predicate = Some(query::ids_predicate(&ids));
        }

        let Some(predicate) = predicate else {
            let result = ResultSet::default();
            self.result = Some(result.clone());
            return Ok(result);
        };

        self.set_search_set(Some(predicate));
        if options.select {
            self.list_records(None, 0, options.nocount)
        } else {
            self.count()
        }
    }

    /// Decodes every record `coarse` admits, page by page, and returns the
    /// IDs of those `post_filter` accepts.
    fn post_search(
        &self,
        coarse: Option<&Predicate>,
        post_filter: &query::PostFilter,
    ) -> Result<Vec<ContactId>, Error> {
        let total = self.count_matching(coarse)?;
        let mut ids = Vec::new();
        let mut offset = 0;

        while offset < total {
            let page = self.fetch(coarse, offset, self.page_size, true)?;
            if page.is_empty() {
                break;
            }

            ids.extend(
                page.iter()
                    .filter(|contact| post_filter.matches(contact))
                    .map(|contact| contact.id),
            );
            offset += self.page_size;
        }

        Ok(ids)
    }

    /// Fetches a single live record of this user, with its card decoded.
    pub fn get_record(&self, id: ContactId) -> Result<Option<Contact>, Error> {
        let row = self.db.query_row(
            &format!(
                "SELECT {} FROM `contacts` AS c \
                 WHERE c.`contact_id` = ? AND c.`user_id` = ? AND c.`del` = 0",
                CONTACT_ROW_COLS,
            ),
            (id, self.user),
            from_row::<ContactRow>,
        )?;

        row.map(|row| codec::decode(row, true)).transpose()
    }

    pub fn validate(&self, data: &FieldMap) -> Result<(), Error> {
        codec::validate(data)
    }

    fn email_exists(&self, address: &str) -> Result<bool, Error> {
        let entry = query::email_entry(address);
        let mut params = vec![Value::Integer(self.user.0)];
        params.extend(entry.params().iter().cloned());

        Ok(self
            .db
            .query_row(
                &format!(
                    "SELECT 1 FROM `contacts` AS c \
                     WHERE c.`user_id` = ? AND c.`del` = 0 AND {} LIMIT 1",
                    entry.sql(),
                ),
                rusqlite::params_from_iter(params),
                from_single::<i64>,
            )?
            .is_some())
    }

    /// Stores a new contact.
    ///
    /// With `check`, insertion is refused if any of the contact's email
    /// addresses already belongs to a live contact of this user. The current
    /// filter plays no part in that check.
    pub fn insert(&mut self, data: &FieldMap, check: bool) -> Result<ContactId, Error> {
        codec::validate(data)?;

        if check {
            for address in data
                .values_of("email")
                .filter_map(FieldValue::as_text)
                .map(str::trim)
            {
                if self.email_exists(address)? {
                    info!(
                        "{} Refusing to add duplicate of {}",
                        self.log_prefix, address
                    );
                    return Err(Error::DuplicateEmail(address.to_owned()));
                }
            }
        }

        let encoded = codec::encode(data)?;
        let id = self.db.insert(
            "INSERT INTO `contacts` (\
             `user_id`, `changed`, `del`, `name`, `email`, \
             `firstname`, `surname`, `middlename`, `card`, `words`\
             ) VALUES (?, ?, 0, ?, ?, ?, ?, ?, ?, ?)",
            (
                self.user,
                UnixTimestamp::now(),
                &encoded.name,
                &encoded.email,
                &encoded.firstname,
                &encoded.surname,
                &encoded.middlename,
                &encoded.card,
                &encoded.words,
            ),
        )?;

        self.invalidate();
        info!("{} Added contact {}", self.log_prefix, id);
        Ok(ContactId(id))
    }

    /// Updates a contact with `data`, merged over its current fields.
    ///
    /// Returns whether a live record of this user was updated.
    pub fn update(&mut self, id: ContactId, data: &FieldMap) -> Result<bool, Error> {
        let Some(existing) = self.get_record(id)? else {
            return Ok(false);
        };

        let merged = codec::merge(&existing.fields, data);
        codec::validate(&merged)?;
        let encoded = codec::encode(&merged)?;

        let affected = self.db.execute(
            "UPDATE `contacts` SET \
             `changed` = ?, `name` = ?, `email` = ?, `firstname` = ?, \
             `surname` = ?, `middlename` = ?, `card` = ?, `words` = ? \
             WHERE `contact_id` = ? AND `user_id` = ? AND `del` = 0",
            (
                UnixTimestamp::now(),
                &encoded.name,
                &encoded.email,
                &encoded.firstname,
                &encoded.surname,
                &encoded.middlename,
                &encoded.card,
                &encoded.words,
                id,
                self.user,
            ),
        )?;

        self.invalidate();
        Ok(affected > 0)
    }

    fn set_deleted(&mut self, ids: &[ContactId], deleted: bool) -> Result<usize, Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let affected = self.db.execute(
            &format!(
                "UPDATE `contacts` SET `del` = ?, `changed` = {} \
                 WHERE `user_id` = ? AND `del` = ? AND `contact_id` IN ({})",
                db::now(),
                db::in_list(ids.iter().map(|id| id.0)),
            ),
            (deleted, self.user, !deleted),
        )?;

        self.invalidate();
        Ok(affected)
    }

    /// Flags the given contacts as deleted. Returns how many were.
    pub fn delete(&mut self, ids: &[ContactId]) -> Result<usize, Error> {
        let count = self.set_deleted(ids, true)?;
        info!("{} Deleted {} contact(s)", self.log_prefix, count);
        Ok(count)
    }

    /// Restores deleted contacts. Returns how many were.
    pub fn undelete(&mut self, ids: &[ContactId]) -> Result<usize, Error> {
        let count = self.set_deleted(ids, false)?;
        info!("{} Restored {} contact(s)", self.log_prefix, count);
        Ok(count)
    }

    /// Flags every contact of this user, and optionally every group, as
    /// deleted.
    pub fn delete_all(&mut self, with_groups: bool) -> Result<usize, Error> {
        let mut count = self.db.execute(
            &format!(
                "UPDATE `contacts` SET `del` = 1, `changed` = {} \
                 WHERE `user_id` = ? AND `del` = 0",
                db::now(),
            ),
            (self.user,),
        )?;

        if with_groups {
            count += self.db.execute(
                &format!(
                    "UPDATE `contactgroups` SET `del` = 1, `changed` = {} \
                     WHERE `user_id` = ? AND `del` = 0",
                    db::now(),
                ),
                (self.user,),
            )?;
        }

        self.invalidate();
        info!("{} Deleted everything ({} record(s))", self.log_prefix, count);
        Ok(count)
    }
}
