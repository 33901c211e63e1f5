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

//! Paged result sets and the total-count policy behind them.

use super::model::Contact;

/// One page of contacts plus the total the page was taken from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub records: Vec<Contact>,
    /// The offset of the first record within the full result.
    pub first: usize,
    /// The total number of matching records, not just those on this page.
    pub count: usize,
}

impl ResultSet {
    pub fn new(count: usize, first: usize) -> Self {
        Self {
            records: Vec::new(),
            first,
            count,
        }
    }

    pub fn add(&mut self, contact: Contact) {
        self.records.push(contact);
    }

    pub fn first_record(&self) -> Option<&Contact> {
        self.records.first()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Contact> {
        self.records.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Contact;
    type IntoIter = std::vec::IntoIter<Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Contact;
    type IntoIter = std::slice::Iter<'a, Contact>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Where the total of a listing comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountSource {
    /// The number of rows fetched is the total.
    Fetched,
    /// A previously computed total is still valid.
    Cached(usize),
    /// A count query must be run.
    Query,
}

/// Decides how to obtain the total count of a listing.
///
/// If the caller asked not to count, or the first page came back short and
/// no subset was requested, the fetched rows are everything there is.
pub fn count_source(
    nocount: bool,
    page: usize,
    page_size: usize,
    subset: i64,
    fetched: usize,
    cached: Option<usize>,
) -> CountSource {
    if nocount || (page <= 1 && fetched < page_size && 0 == subset) {
        CountSource::Fetched
    } else if let Some(count) = cached {
        CountSource::Cached(count)
    } else {
        CountSource::Query
    }
}

/// The offset and length to fetch for `page` when only a part of it is
/// wanted.
///
/// A positive `subset` takes the first `subset` records of the page, a
/// negative one the last `-subset`; zero takes the whole page.
pub fn page_window(page: usize, page_size: usize, subset: i64) -> (usize, usize) {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let magnitude = subset.unsigned_abs() as usize;

    if 0 == subset || magnitude >= page_size {
        (start, page_size)
    } else if subset > 0 {
        (start, magnitude)
    } else {
        (start.saturating_add(page_size - magnitude), magnitude)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_first_page_needs_no_count() {
        assert_eq!(CountSource::Fetched, count_source(false, 1, 10, 0, 3, None));
        assert_eq!(CountSource::Fetched, count_source(true, 4, 10, 0, 10, None));
        assert_eq!(CountSource::Query, count_source(false, 1, 10, 0, 10, None));
        assert_eq!(CountSource::Query, count_source(false, 2, 10, 0, 3, None));
        assert_eq!(CountSource::Query, count_source(false, 1, 10, 5, 3, None));
        assert_eq!(
            CountSource::Cached(42),
            count_source(false, 3, 10, 0, 10, Some(42))
        );
    }

    #[test]
    fn subset_windows() {
        assert_eq!((usize::MAX, 10), page_window(usize::MAX, 10, 0));
        assert_eq!((usize::MAX, 3), page_window(usize::MAX, 10, -3));
        assert_eq!((20, 10), page_window(3, 10, 0));
        assert_eq!((0, 10), page_window(0, 10, 0));
        assert_eq!((20, 4), page_window(3, 10, 4));
        assert_eq!((26, 4), page_window(3, 10, -4));
        assert_eq!((20, 10), page_window(3, 10, -15));
    }
}
