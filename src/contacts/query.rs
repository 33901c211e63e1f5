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

//! Translation of search requests into relational predicates plus an
//! in-memory post-filter.
//!
//! Only the indexed columns and the token blob exist in the database, so a
//! search on any other field is planned in two stages: a coarse predicate on
//! the token blob narrows the candidates, then `PostFilter` checks the
//! decoded documents exactly.

use chrono::prelude::*;
use rusqlite::types::Value;

use super::db::{escape_like, ilike, in_list, Predicate};
use super::model::*;
use super::text;

/// A search request, in one of its addressing modes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SearchQuery {
    /// Exactly these contacts.
    Ids(Vec<ContactId>),
    /// Every `(field, value)` pair must match.
    Pairs(Vec<(String, String)>),
    /// Match against every full-text field.
    All(String),
    /// Every word of the value must match at least one of the fields.
    Fields { fields: Vec<String>, value: String },
}

fn is_id_field(field: &str) -> bool {
    "ID" == field || "contact_id" == field
}

fn parse_ids<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<ContactId> {
    values
        .into_iter()
        .flat_map(|v| v.split(SEPARATOR))
        .filter_map(|v| v.trim().parse::<i64>().ok())
        .map(ContactId)
        .collect()
}

impl SearchQuery {
    /// Interprets a request with a single value.
    ///
    /// A field list consisting of the ID field selects by ID; the wildcard
    /// field `*` searches all full-text fields; anything else searches the
    /// named fields.
    pub fn parse(fields: &[&str], value: &str) -> Self {
        match *fields {
            [field] if is_id_field(field) => SearchQuery::Ids(parse_ids([value])),
            [] | ["*"] => SearchQuery::All(value.to_owned()),
            _ => SearchQuery::Fields {
                fields: fields.iter().map(|&f| f.to_owned()).collect(),
                value: value.to_owned(),
            },
        }
    }

    /// Interprets a request with one value per field.
    pub fn parse_pairs(fields: &[&str], values: &[&str]) -> Self {
        if let [field] = *fields {
            if is_id_field(field) {
                return SearchQuery::Ids(parse_ids(values.iter().copied()));
            }
        }

        SearchQuery::Pairs(
            fields
                .iter()
                .zip(values)
                .map(|(&f, &v)| (f.to_owned(), v.to_owned()))
                .collect(),
        )
    }
}

/// What `fulltext_where` matches against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Target<'a> {
    /// The token blob; entries are separated by spaces.
    Words,
    /// An indexed column; entries are separated by `SEPARATOR`.
    Column(&'a str),
}

/// Builds the predicate matching `value` against `target`.
///
/// In strict mode a term must equal a whole entry, so it is tried as the
/// only entry, the first, a middle one, and the last. Prefix mode matches
/// the start of any entry. Otherwise any substring matches. When matching
/// the token blob, each word of `value` must match on its own.
fn fulltext_where(value: &str, kind: MatchKind, target: Target<'_>) -> Option<Predicate> {
    let (column, sep, words) = match target {
        Target::Words => ("c.`words`".to_owned(), ' ', text::normalize(value, 1)),
        Target::Column(col) => (
            format!("c.`{}`", col),
            SEPARATOR,
            Some(value.trim().to_owned())
                .filter(|v| !v.is_empty())
                .into_iter()
                .collect(),
        ),
    };

    let per_word = words
        .iter()
        .filter_map(|word| {
            let w = escape_like(word);
            let patterns = match kind {
                MatchKind::Strict => vec![
                    w.clone(),
                    format!("{}{}%", w, sep),
                    format!("%{}{}{}%", sep, w, sep),
                    format!("%{}{}", sep, w),
                ],
                MatchKind::Prefix => vec![format!("{}%", w), format!("%{}{}%", sep, w)],
                MatchKind::Substring => vec![format!("%{}%", w)],
            };
            Predicate::any(patterns.into_iter().map(|p| ilike(&column, p)).collect())
        })
        .collect::<Vec<_>>();

    Predicate::all(per_word)
}

/// The exact, in-memory half of a search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PostFilter {
    kind: Option<MatchKind>,
    /// `(field, lower-cased term)`. Later pairs for the same field replace
    /// earlier ones.
    terms: Vec<(String, String)>,
    /// Fields which must hold a non-empty value.
    required: Vec<String>,
}

impl PostFilter {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.required.is_empty()
    }

    fn add_term(&mut self, field: &str, term: &str) {
        let term = term.to_lowercase();
        match self.terms.iter_mut().find(|&&mut (ref f, _)| f == field) {
            Some(&mut (_, ref mut existing)) => *existing = term,
            None => self.terms.push((field.to_owned(), term)),
        }
    }

    /// Whether `contact`, which must have been decoded with its card,
    /// satisfies every term and requirement.
    pub fn matches(&self, contact: &Contact) -> bool {
        let kind = self.kind.unwrap_or(MatchKind::Substring);

        let terms_ok = self.terms.iter().all(|&(ref field, ref term)| {
            contact
                .fields
                .values_of(field)
                .any(|value| compare_value(field, value, term, kind))
        });

        terms_ok && self.required.iter().all(|f| contact.fields.has_value(f))
    }
}

/// Formats anything that looks like a date as `YYYY-MM-DD`.
fn normalise_date(s: &str) -> Option<String> {
    let s = s.trim();
    ["%Y-%m-%d", "%Y%m%d", "%d.%m.%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Compares one field value against a lower-cased search term.
///
/// Dates are always compared exactly, whatever `kind` says. Composite values
/// match if any component does.
pub fn compare_value(field: &str, value: &FieldValue, term: &str, kind: MatchKind) -> bool {
    if is_date_col(field) {
        let value = match *value {
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            FieldValue::Text(ref s) => normalise_date(s),
            _ => None,
        };
        return match (value, normalise_date(term)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }

    value.search_strings().iter().any(|s| match kind {
        MatchKind::Strict => s == term,
        MatchKind::Prefix => s.starts_with(term),
        MatchKind::Substring => s.contains(term),
    })
}

/// A planned search.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchPlan {
    /// The relational predicate, if the request produced one.
    pub predicate: Option<Predicate>,
    pub post_filter: PostFilter,
}

/// Plans `query`.
///
/// `required` names fields every result must have a value for.
pub fn plan(query: &SearchQuery, mode: SearchMode, required: &[String]) -> SearchPlan {
    let kind = MatchKind::from(mode);
    let mut parts = Vec::<Predicate>::new();
    let mut post_filter = PostFilter {
        kind: Some(kind),
        ..PostFilter::default()
    };

    match *query {
        SearchQuery::Ids(ref ids) => {
            parts.push(Predicate::new(
                format!("c.`contact_id` IN ({})", in_list(ids.iter().map(|id| id.0))),
                Vec::new(),
            ));
        },

        SearchQuery::Pairs(ref pairs) => {
            for &(ref field, ref value) in pairs {
                if value.trim().is_empty() {
                    continue;
                }

                if is_table_col(field) {
                    parts.extend(fulltext_where(value, kind, Target::Column(field)));
                } else {
                    if is_fulltext_col(field) {
                        parts.extend(fulltext_where(value, kind, Target::Words));
                    }
                    post_filter.add_term(field, value);
                }
            }
        },

        SearchQuery::All(ref value) => {
            parts.extend(fulltext_where(value, kind, Target::Words));
        },

        SearchQuery::Fields { ref fields, ref value } => {
            let words = if MatchKind::Strict == kind {
                vec![value.clone()]
            } else {
                text::tokenize(value, 1)
            };

            for word in &words {
                let alternatives = fields
                    .iter()
                    .filter_map(|field| {
                        if is_table_col(field) {
                            fulltext_where(word, kind, Target::Column(field))
                        } else if is_fulltext_col(field) {
                            fulltext_where(word, kind, Target::Words)
                        } else {
                            None
                        }
                    })
                    .collect::<Vec<_>>();
                parts.extend(Predicate::any(alternatives));
            }
        },
    }

    for field in required {
        if is_table_col(field) {
            parts.push(Predicate::new(format!("c.`{}` <> ''", field), Vec::new()));
        } else {
            post_filter.required.push(field.clone());
        }
    }

    SearchPlan {
        predicate: Predicate::all(parts),
        post_filter,
    }
}

/// The `ORDER BY` clause for listing with the given primary sort.
///
/// Sorting on one name part breaks ties on the other. The display name
/// comes next unless it is the primary sort, then the email column, then
/// the ID so paging is stable.
pub fn order_by(sort: SortColumn, order: SortOrder) -> String {
    let mut cols = vec![sort.column()];
    match sort {
        SortColumn::Firstname => cols.push("surname"),
        SortColumn::Surname => cols.push("firstname"),
        _ => (),
    }
    if SortColumn::Name != sort {
        cols.push("name");
    }
    if SortColumn::Email != sort {
        cols.push("email");
    }

    let mut clause = cols
        .iter()
        .map(|c| format!("c.`{}` COLLATE NOCASE {}", c, order.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    clause.push_str(", c.`contact_id` ");
    clause.push_str(order.sql());
    clause
}

/// The predicate selecting exactly `ids`.
pub fn ids_predicate(ids: &[ContactId]) -> Predicate {
    if ids.is_empty() {
        return Predicate::never();
    }

    Predicate::new(
        format!("c.`contact_id` IN ({})", in_list(ids.iter().map(|id| id.0))),
        Vec::new(),
    )
}

/// Whole-entry match of `address` against the email column, for duplicate
/// detection.
pub fn email_entry(address: &str) -> Predicate {
    Predicate::new(
        format!(
            "{} LIKE ? ESCAPE '\\'",
            super::db::concat(&["','", "REPLACE(c.`email`, ' ', '')", "','"]),
        ),
        vec![Value::Text(format!("%,{},%", escape_like(address.trim())))],
    )
}
