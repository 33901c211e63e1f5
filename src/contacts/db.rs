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

//! The relational capability the store is built on.
//!
//! `Database` wraps a SQLite connection, applies the schema migrations, and
//! counts every statement it runs so that callers (mostly tests) can observe
//! how many round-trips an operation made. The free functions build SQL
//! fragments for the few dialect-sensitive constructs the query builder
//! needs.

use std::cell::Cell;
use std::path::Path;
use std::time::Duration;

use log::info;
use rusqlite::types::Value;
use rusqlite::OptionalExtension as _;

use super::types::*;
use crate::support::{error::Error, log_prefix::LogPrefix};

static MIGRATIONS: &[&str] =
    &[include_str!("schema.v1.sql"), include_str!("schema.v2.sql")];

pub struct Database {
    cxn: rusqlite::Connection,
    statements: Cell<u64>,
}

impl Database {
    pub fn open(log_prefix: &LogPrefix, path: &Path) -> Result<Self, Error> {
        let cxn = rusqlite::Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::init(log_prefix, cxn, &path.display().to_string())
    }

    pub fn open_in_memory(log_prefix: &LogPrefix) -> Result<Self, Error> {
        Self::init(log_prefix, rusqlite::Connection::open_in_memory()?, ":memory:")
    }

    fn init(
        log_prefix: &LogPrefix,
        mut cxn: rusqlite::Connection,
        db_name: &str,
    ) -> Result<Self, Error> {
        cxn.pragma_update(None, "foreign_keys", true)?;
        cxn.busy_timeout(Duration::from_secs(10))?;
        apply_migrations(log_prefix, &mut cxn, db_name, MIGRATIONS)?;

        Ok(Self {
            cxn,
            statements: Cell::new(0),
        })
    }

    /// The number of statements run through this handle so far.
    pub fn query_count(&self) -> u64 {
        self.statements.get()
    }

    fn count(&self) {
        self.statements.set(self.statements.get() + 1);
    }

    pub fn query_rows<T, P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
        f: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, Error> {
        self.count();
        let mut stmt = self.cxn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, f)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn query_row<T, P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
        f: impl FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, Error> {
        self.count();
        self.cxn
            .prepare_cached(sql)?
            .query_row(params, f)
            .optional()
            .map_err(Into::into)
    }

    /// Runs a statement, returning the number of rows it affected.
    pub fn execute<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<usize, Error> {
        self.count();
        Ok(self.cxn.prepare_cached(sql)?.execute(params)?)
    }

    /// Runs an `INSERT`, returning the row ID it generated.
    pub fn insert<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<i64, Error> {
        self.count();
        self.cxn.prepare_cached(sql)?.execute(params)?;
        Ok(self.cxn.last_insert_rowid())
    }

    /// Starts a transaction which takes the write lock immediately.
    pub fn write_tx(&mut self) -> Result<rusqlite::Transaction<'_>, Error> {
        self.count();
        Ok(self
            .cxn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?)
    }
}

fn apply_migrations(
    log_prefix: &LogPrefix,
    cxn: &mut rusqlite::Connection,
    db_name: &str,
    migrations: &[&str],
) -> Result<(), Error> {
    let latest_version = migrations.len();

    if Ok(latest_version)
        == cxn.query_row(
            "SELECT MAX(`version`) FROM `migration`",
            (),
            from_single::<usize>,
        )
    {
        return Ok(());
    }

    let txn = cxn
        .transaction_with_behavior(rusqlite::TransactionBehavior::Exclusive)?;
    txn.execute(
        "CREATE TABLE IF NOT EXISTS `migration` (\
         `version` INTEGER NOT NULL PRIMARY KEY, \
         `applied_at` INTEGER NOT NULL\
         ) STRICT",
        (),
    )?;

    let current_version = txn
        .query_row(
            "SELECT MAX(`version`) FROM `migration`",
            (),
            from_single::<Option<usize>>,
        )?
        .unwrap_or(0);

    for (version, migration) in migrations
        .iter()
        .copied()
        .enumerate()
        .map(|(ix, migration)| (ix + 1, migration))
        .skip(current_version)
    {
        info!("{log_prefix} Applying #{version} migration to {db_name} DB");
        txn.execute_batch(migration)?;
        txn.execute(
            "INSERT INTO `migration` (`version`, `applied_at`) \
             VALUES (?, ?)",
            (version, UnixTimestamp::now()),
        )?;
    }

    txn.commit()?;

    Ok(())
}

/// A fragment of a `WHERE` clause along with the values bound to its
/// placeholders, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    sql: String,
    params: Vec<Value>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// A predicate no row satisfies.
    pub fn never() -> Self {
        Self::new("0", Vec::new())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Joins `parts` with `AND`. Returns `None` if `parts` is empty.
    pub fn all(parts: Vec<Predicate>) -> Option<Predicate> {
        Self::join(parts, " AND ")
    }

    /// Joins `parts` with `OR`. Returns `None` if `parts` is empty.
    pub fn any(parts: Vec<Predicate>) -> Option<Predicate> {
        Self::join(parts, " OR ")
    }

    fn join(parts: Vec<Predicate>, op: &str) -> Option<Predicate> {
        if parts.len() <= 1 {
            return parts.into_iter().next();
        }

        let mut sql = String::new();
        let mut params = Vec::new();
        for (ix, part) in parts.into_iter().enumerate() {
            if ix > 0 {
                sql.push_str(op);
            }
            sql.push('(');
            sql.push_str(&part.sql);
            sql.push(')');
            params.extend(part.params);
        }

        Some(Predicate { sql, params })
    }
}

/// Escapes the `LIKE` metacharacters in `s` so it matches literally under
/// `ESCAPE '\'`.
pub fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// A case-insensitive pattern match of `column` against `pattern`.
///
/// `pattern` is used as-is; literal text in it must already have gone
/// through `escape_like`. SQLite only folds ASCII case in `LIKE`.
pub fn ilike(column: &str, pattern: String) -> Predicate {
    Predicate::new(
        format!("{} LIKE ? ESCAPE '\\'", column),
        vec![Value::Text(pattern)],
    )
}

/// Renders `ids` as the body of an `IN (...)` list. An empty list renders as
/// `NULL`, which matches nothing.
pub fn in_list(ids: impl IntoIterator<Item = i64>) -> String {
    let list = ids
        .into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    if list.is_empty() {
        "NULL".to_owned()
    } else {
        list
    }
}

/// String concatenation of SQL expressions.
pub fn concat(parts: &[&str]) -> String {
    format!("({})", parts.join(" || "))
}

/// The current time as a UNIX timestamp, evaluated by the database.
pub fn now() -> &'static str {
    "CAST(strftime('%s', 'now') AS INTEGER)"
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn migrations_apply_once() {
        let tmpdir = TempDir::new().unwrap();
        let path = tmpdir.path().join("addrbook.sqlite");
        let log_prefix = LogPrefix::new("test".to_owned());

        {
            let db = Database::open(&log_prefix, &path).unwrap();
            assert_eq!(
                Some(2),
                db.query_row(
                    "SELECT MAX(`version`) FROM `migration`",
                    (),
                    from_single::<i64>,
                )
                .unwrap()
            );
        }

        // Reopening must not try to recreate the tables
        let db = Database::open(&log_prefix, &path).unwrap();
        assert_eq!(
            Some(2),
            db.query_row(
                "SELECT COUNT(*) FROM `migration`",
                (),
                from_single::<i64>,
            )
            .unwrap()
        );
    }

    #[test]
    fn statements_are_counted() {
        let db =
            Database::open_in_memory(&LogPrefix::new("test".to_owned()))
                .unwrap();
        let before = db.query_count();
        db.query_rows("SELECT 1", (), from_single::<i64>).unwrap();
        db.execute("DELETE FROM `contacts`", ()).unwrap();
        assert_eq!(before + 2, db.query_count());
    }

    #[test]
    fn like_escaping() {
        let db =
            Database::open_in_memory(&LogPrefix::new("test".to_owned()))
                .unwrap();
        let matches = |subject: &str, pattern: String| -> bool {
            let pred = ilike("?", pattern);
            let mut params = vec![Value::Text(subject.to_owned())];
            params.extend(pred.params().iter().cloned());
            db.query_row(
                &format!("SELECT {}", pred.sql()),
                rusqlite::params_from_iter(params),
                from_single::<bool>,
            )
            .unwrap()
            .unwrap()
        };

        assert!(matches("100% Real", format!("{}%", escape_like("100%"))));
        assert!(!matches("1000 Real", format!("{}%", escape_like("100%"))));
        assert!(matches("a_b", escape_like("A_B")));
        assert!(!matches("axb", escape_like("a_b")));
        assert!(matches("back\\slash", escape_like("back\\slash")));
    }

    #[test]
    fn predicate_joining() {
        assert_eq!(None, Predicate::all(vec![]));

        let single = Predicate::new("a = ?", vec![Value::Integer(1)]);
        assert_eq!(Some(single.clone()), Predicate::any(vec![single.clone()]));

        let joined = Predicate::all(vec![
            single.clone(),
            Predicate::new("b = ?", vec![Value::Integer(2)]),
        ])
        .unwrap();
        assert_eq!("(a = ?) AND (b = ?)", joined.sql());
        assert_eq!(&[Value::Integer(1), Value::Integer(2)], joined.params());
    }

    #[test]
    fn sql_helpers() {
        assert_eq!("1,2,3", in_list(vec![1, 2, 3]));
        assert_eq!("NULL", in_list(Vec::new()));
        assert_eq!("(',' || c.`email` || ',')", concat(&["','", "c.`email`", "','"]));
    }
}
