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

//! The per-user address book.
//!
//! Contacts live in a single table keyed by user. Each row carries a few
//! indexed columns, a token blob for full-text search, and a card holding
//! the complete field set. `ContactStore` is the entry point; it is split
//! across `store` (records, listing, search) and `groups` (groups and
//! membership) but is best thought of as one type.

pub mod card;
pub mod codec;
pub mod cursor;
pub mod db;
mod groups;
pub mod model;
pub mod query;
pub mod store;
mod text;
pub mod types;

pub use self::cursor::ResultSet;
pub use self::db::Database;
pub use self::query::SearchQuery;
pub use self::store::{ContactStore, SearchOptions};

pub(crate) use self::text::is_valid_email;
