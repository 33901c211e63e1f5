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

//! Bindings for the model types to `rusqlite`, plus the raw row types the
//! store reads before decoding.

use chrono::prelude::*;
use rusqlite::types::{
    FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef,
};

use super::model::*;

macro_rules! transparent_to_sql {
    ($t:ident) => {
        impl ToSql for $t {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                self.0.to_sql()
            }
        }
    };
}

macro_rules! transparent_from_sql {
    ($t:ident) => {
        impl FromSql for $t {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                FromSql::column_result(value).map(Self)
            }
        }
    };
}

transparent_to_sql!(UserId);
transparent_from_sql!(UserId);
transparent_to_sql!(ContactId);
transparent_from_sql!(ContactId);
transparent_to_sql!(GroupId);
transparent_from_sql!(GroupId);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixTimestamp(pub DateTime<Utc>);

impl UnixTimestamp {
    pub fn now() -> Self {
        // Truncate to whole seconds so values survive the trip through the
        // database unchanged.
        Self::from_seconds(Utc::now().timestamp()).unwrap_or_else(Self::zero)
    }

    pub fn zero() -> Self {
        Self(DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default())
    }

    pub fn from_seconds(secs: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(secs, 0).map(Self)
    }

    pub fn seconds(self) -> i64 {
        self.0.timestamp()
    }
}

impl ToSql for UnixTimestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let ToSqlOutput::Owned(v) = self.0.timestamp().to_sql()? else {
            unreachable!()
        };
        Ok(ToSqlOutput::Owned(v))
    }
}

impl FromSql for UnixTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let inner = i64::column_result(value)?;
        UnixTimestamp::from_seconds(inner)
            .ok_or(FromSqlError::OutOfRange(inner))
    }
}

/// A row of the `contacts` table, before the card is decoded.
#[derive(Clone, Debug)]
pub struct ContactRow {
    pub id: ContactId,
    pub changed: UnixTimestamp,
    pub name: String,
    pub email: String,
    pub firstname: String,
    pub surname: String,
    pub middlename: String,
    pub card: Option<Vec<u8>>,
}

/// The column list `ContactRow` is read from, qualified with the `c` alias.
pub const CONTACT_ROW_COLS: &str = "c.`contact_id`, c.`changed`, c.`name`, \
     c.`email`, c.`firstname`, c.`surname`, c.`middlename`, c.`card`";

/// Like `CONTACT_ROW_COLS`, but with a NULL in place of the card, for
/// listings which only need the indexed columns.
pub const CONTACT_ROW_COLS_NO_CARD: &str =
    "c.`contact_id`, c.`changed`, c.`name`, c.`email`, c.`firstname`, \
     c.`surname`, c.`middlename`, NULL";

impl FromRow for ContactRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("contact_id")?,
            changed: row.get("changed")?,
            name: row.get("name")?,
            email: row.get("email")?,
            firstname: row.get("firstname")?,
            surname: row.get("surname")?,
            middlename: row.get("middlename")?,
            card: row.get(7)?,
        })
    }
}

impl FromRow for Group {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("contactgroup_id")?,
            name: row.get("name")?,
            changed: row.get("changed")?,
        })
    }
}

pub fn from_row<T: FromRow>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    T::from_row(row)
}

pub fn from_single<T: FromSql>(row: &rusqlite::Row<'_>) -> rusqlite::Result<T> {
    row.get(0)
}

pub trait FromRow: Sized {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self>;
}

macro_rules! from_row_tuple {
    ($($ix:tt: $t:ident),*) => {
        impl<$($t: FromSql,)*> FromRow
        for ($($t,)*) {
            fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
                Ok(($(row.get($ix)?,)*))
            }
        }
    }
}

from_row_tuple!(0: A);
from_row_tuple!(0: A, 1: B);
from_row_tuple!(0: A, 1: B, 2: C);
