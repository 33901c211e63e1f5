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

//! The data model of the address book: identifiers, the field addressing
//! scheme, contact documents, and groups.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use chrono::prelude::*;
use serde::{Deserialize, Serialize};

use super::types::UnixTimestamp;

/// The delimiter used when several values share one indexed column, most
/// notably the email column.
pub const SEPARATOR: char = ',';

/// Fields which are stored as real columns, in the order they appear in the
/// table.
pub const TABLE_COLS: &[&str] =
    &["name", "firstname", "surname", "middlename", "email"];

/// Fields whose values are folded into the token blob.
///
/// Stored blobs were built from this list, so changing it requires every
/// contact to be rewritten.
pub const FULLTEXT_COLS: &[&str] = &[
    "name",
    "firstname",
    "surname",
    "middlename",
    "nickname",
    "jobtitle",
    "organization",
    "department",
    "maidenname",
    "email",
    "phone",
    "address",
    "street",
    "locality",
    "zipcode",
    "region",
    "country",
    "website",
    "im",
    "notes",
];

/// Fields holding dates. These are always compared exactly.
pub const DATE_COLS: &[&str] = &["birthday", "anniversary"];

/// Every field a contact may carry.
pub const COLTYPES: &[&str] = &[
    "name",
    "firstname",
    "surname",
    "middlename",
    "prefix",
    "suffix",
    "nickname",
    "jobtitle",
    "organization",
    "department",
    "assistant",
    "manager",
    "gender",
    "maidenname",
    "spouse",
    "email",
    "phone",
    "address",
    "birthday",
    "anniversary",
    "website",
    "im",
    "notes",
    "photo",
];

/// The pseudo-field callers use to pass group assignments. It is never
/// persisted in the card.
pub const GROUPS_FIELD: &str = "groups";

pub fn is_table_col(field: &str) -> bool {
    TABLE_COLS.contains(&field)
}

pub fn is_fulltext_col(field: &str) -> bool {
    FULLTEXT_COLS.contains(&field)
}

pub fn is_date_col(field: &str) -> bool {
    DATE_COLS.contains(&field)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addresses a field of a contact, optionally qualified with a subtype.
///
/// The textual form is `field` or `field:subtype`, e.g. `email:work` or
/// `phone:mobile`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldKey {
    field: String,
    subtype: Option<String>,
}

impl FieldKey {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            subtype: None,
        }
    }

    pub fn typed(field: impl Into<String>, subtype: impl Into<String>) -> Self {
        let subtype = subtype.into();
        Self {
            field: field.into(),
            subtype: Some(subtype).filter(|s| !s.is_empty()),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn subtype(&self) -> Option<&str> {
        self.subtype.as_deref()
    }

    /// Whether this key addresses `field`, with or without a subtype.
    pub fn is_field(&self, field: &str) -> bool {
        self.field == field
    }
}

impl From<&str> for FieldKey {
    fn from(s: &str) -> Self {
        match s.split_once(':') {
            Some((field, subtype)) => FieldKey::typed(field, subtype),
            None => FieldKey::new(s),
        }
    }
}

impl From<String> for FieldKey {
    fn from(s: String) -> Self {
        FieldKey::from(s.as_str())
    }
}

impl From<FieldKey> for String {
    fn from(key: FieldKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.subtype {
            Some(ref subtype) => write!(f, "{}:{}", self.field, subtype),
            None => write!(f, "{}", self.field),
        }
    }
}

/// A postal address. Every component is optional; an absent component is
/// the empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub locality: String,
    pub zipcode: String,
    pub region: String,
    pub country: String,
}

impl PostalAddress {
    pub fn parts(&self) -> [&str; 5] {
        [
            &self.street,
            &self.locality,
            &self.zipcode,
            &self.region,
            &self.country,
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.parts().iter().all(|p| p.trim().is_empty())
    }

    /// The non-empty components joined with spaces.
    pub fn joined(&self) -> String {
        self.parts()
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single value of a contact field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Address(PostalAddress),
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match *self {
            FieldValue::Text(ref s) => s.trim().is_empty(),
            FieldValue::Date(_) => false,
            FieldValue::Address(ref a) => a.is_empty(),
            FieldValue::Binary(ref b) => b.is_empty(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match *self {
            FieldValue::Text(ref s) => Some(s),
            _ => None,
        }
    }

    /// The representation of this value in an indexed column, if it has one.
    pub fn to_column_string(&self) -> Option<String> {
        match *self {
            FieldValue::Text(ref s) => Some(s.clone()),
            FieldValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            FieldValue::Address(ref a) => Some(a.joined()),
            FieldValue::Binary(_) => None,
        }
    }

    /// The text this value contributes to the token blob.
    pub fn fulltext(&self) -> Option<String> {
        match *self {
            FieldValue::Text(ref s) => Some(s.clone()),
            FieldValue::Address(ref a) => Some(a.joined()),
            FieldValue::Date(_) | FieldValue::Binary(_) => None,
        }
    }

    /// The strings post-search compares against, lower-cased. Composite
    /// values yield one string per component.
    pub fn search_strings(&self) -> Vec<String> {
        match *self {
            FieldValue::Text(ref s) => vec![s.to_lowercase()],
            FieldValue::Date(d) => vec![d.format("%Y-%m-%d").to_string()],
            FieldValue::Address(ref a) => a
                .parts()
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            FieldValue::Binary(_) => Vec::new(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

impl From<PostalAddress> for FieldValue {
    fn from(a: PostalAddress) -> Self {
        FieldValue::Address(a)
    }
}

/// An insertion-ordered map from field keys to their values.
///
/// Order matters: the email column lists addresses in the order they appear
/// here, across all subtypes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(Vec<(FieldKey, Vec<FieldValue>)>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `push`.
    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.push(FieldKey::from(key), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &FieldKey) -> Option<&[FieldValue]> {
        self.0
            .iter()
            .find(|&&(ref k, _)| k == key)
            .map(|&(_, ref v)| &v[..])
    }

    pub fn contains_key(&self, key: &FieldKey) -> bool {
        self.get(key).is_some()
    }

    /// Appends `value` to the values under `key`.
    pub fn push(&mut self, key: FieldKey, value: FieldValue) {
        match self.0.iter_mut().find(|&&mut (ref k, _)| *k == key) {
            Some(&mut (_, ref mut values)) => values.push(value),
            None => self.0.push((key, vec![value])),
        }
    }

    /// Replaces all values under `key`, keeping its position if it already
    /// exists.
    pub fn set(&mut self, key: FieldKey, values: Vec<FieldValue>) {
        match self.0.iter_mut().find(|&&mut (ref k, _)| *k == key) {
            Some(&mut (_, ref mut existing)) => *existing = values,
            None => self.0.push((key, values)),
        }
    }

    /// Removes every variant of `field`. Returns whether anything was
    /// removed.
    pub fn remove_field(&mut self, field: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|&(ref k, _)| !k.is_field(field));
        before != self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldKey, &[FieldValue])> {
        self.0.iter().map(|&(ref k, ref v)| (k, &v[..]))
    }

    pub fn keys(&self) -> impl Iterator<Item = &FieldKey> {
        self.0.iter().map(|&(ref k, _)| k)
    }

    /// All values of every variant of `field`, in order.
    pub fn values_of<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.0
            .iter()
            .filter(move |&&(ref k, _)| k.is_field(field))
            .flat_map(|&(_, ref v)| v.iter())
    }

    /// Whether any variant of `field` holds a non-empty value.
    pub fn has_value(&self, field: &str) -> bool {
        self.values_of(field).any(|v| !v.is_empty())
    }

    /// The first text value of any variant of `field`.
    pub fn first_text<'a>(&'a self, field: &'a str) -> Option<&'a str> {
        self.values_of(field).find_map(FieldValue::as_text)
    }
}

impl IntoIterator for FieldMap {
    type Item = (FieldKey, Vec<FieldValue>);
    type IntoIter = std::vec::IntoIter<(FieldKey, Vec<FieldValue>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The indexed scalar columns of a contact, as presented to callers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexedColumns {
    pub name: String,
    pub firstname: String,
    pub surname: String,
    pub middlename: String,
    /// Always equal to the email values of the card, in order.
    pub email: Vec<String>,
}

/// A decoded contact.
#[derive(Clone, Debug, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    pub columns: IndexedColumns,
    /// The full field set. When the card was not decoded (or the row has no
    /// card) this only holds the indexed fields.
    pub fields: FieldMap,
    pub changed: UnixTimestamp,
}

impl Contact {
    pub fn emails(&self) -> &[String] {
        &self.columns.email
    }

    /// A human-readable name: the display name if set, else the first and
    /// last name, else the first email address.
    pub fn display_name(&self) -> String {
        let c = &self.columns;
        if !c.name.trim().is_empty() {
            return c.name.trim().to_owned();
        }

        let composed = [&c.firstname, &c.middlename, &c.surname]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !composed.is_empty() {
            return composed;
        }

        c.email.first().cloned().unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub changed: UnixTimestamp,
}

bitflags! {
    /// How search values are matched.
    ///
    /// With neither flag set, values match as substrings.
    pub struct SearchMode: u32 {
        /// Whole-value (or whole-list-entry) equality.
        const STRICT = 1;
        /// The value starts with the search term.
        const PREFIX = 2;
    }
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    Strict,
    Prefix,
    Substring,
}

impl From<SearchMode> for MatchKind {
    fn from(mode: SearchMode) -> Self {
        if mode.contains(SearchMode::STRICT) {
            MatchKind::Strict
        } else if mode.contains(SearchMode::PREFIX) {
            MatchKind::Prefix
        } else {
            MatchKind::Substring
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Firstname,
    Surname,
    Middlename,
    Email,
}

impl SortColumn {
    pub fn column(self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::Firstname => "firstname",
            SortColumn::Surname => "surname",
            SortColumn::Middlename => "middlename",
            SortColumn::Email => "email",
        }
    }
}

impl Default for SortColumn {
    fn default() -> Self {
        SortColumn::Name
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "name" => Ok(SortColumn::Name),
            "firstname" => Ok(SortColumn::Firstname),
            "surname" => Ok(SortColumn::Surname),
            "middlename" => Ok(SortColumn::Middlename),
            "email" => Ok(SortColumn::Email),
            _ => Err(format!("not a sortable column: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn field_key_parsing() {
        let key = FieldKey::from("email:work");
        assert_eq!("email", key.field());
        assert_eq!(Some("work"), key.subtype());
        assert_eq!("email:work", key.to_string());

        let key = FieldKey::from("name");
        assert_eq!("name", key.field());
        assert_eq!(None, key.subtype());

        // A trailing colon is the same as no subtype
        assert_eq!(FieldKey::new("phone"), FieldKey::from("phone:"));
        // Only the first colon splits
        assert_eq!(Some("x:y"), FieldKey::from("im:x:y").subtype());
    }

    #[test]
    fn field_map_preserves_order() {
        let map = FieldMap::new()
            .with("email:work", "w@example.com")
            .with("email", "a@example.com")
            .with("email:work", "w2@example.com")
            .with("name", "Someone");

        let emails = map
            .values_of("email")
            .filter_map(FieldValue::as_text)
            .collect::<Vec<_>>();
        assert_eq!(
            vec!["w@example.com", "w2@example.com", "a@example.com"],
            emails
        );
        assert_eq!(3, map.len());
        assert_eq!(Some("Someone"), map.first_text("name"));
    }

    #[test]
    fn field_map_set_and_remove() {
        let mut map = FieldMap::new()
            .with("phone:home", "1")
            .with("phone:work", "2")
            .with("notes", "n");

        map.set(FieldKey::from("phone:home"), vec!["3".into()]);
        assert_eq!(
            Some(&[FieldValue::from("3")][..]),
            map.get(&FieldKey::from("phone:home"))
        );
        assert_eq!("phone:home", map.keys().next().unwrap().to_string());

        assert!(map.remove_field("phone"));
        assert!(!map.remove_field("phone"));
        assert_eq!(1, map.len());
        assert!(map.has_value("notes"));
    }

    #[test]
    fn address_search_strings() {
        let addr = FieldValue::Address(PostalAddress {
            street: "1 Main St".to_owned(),
            locality: "Springfield".to_owned(),
            country: "USA".to_owned(),
            ..PostalAddress::default()
        });
        assert_eq!(
            vec!["1 main st", "springfield", "usa"],
            addr.search_strings()
        );
        assert_eq!(Some("1 Main St Springfield USA".to_owned()), addr.fulltext());
    }

    #[test]
    fn display_name_fallbacks() {
        let mut contact = Contact {
            id: ContactId(1),
            columns: IndexedColumns {
                email: vec!["x@example.com".to_owned()],
                ..IndexedColumns::default()
            },
            fields: FieldMap::new(),
            changed: UnixTimestamp::zero(),
        };
        assert_eq!("x@example.com", contact.display_name());

        contact.columns.firstname = "Ada".to_owned();
        contact.columns.surname = "Lovelace".to_owned();
        assert_eq!("Ada Lovelace", contact.display_name());

        contact.columns.name = "The Countess".to_owned();
        assert_eq!("The Countess", contact.display_name());
    }

    #[test]
    fn match_kind_precedence() {
        assert_eq!(MatchKind::Substring, MatchKind::from(SearchMode::empty()));
        assert_eq!(MatchKind::Prefix, MatchKind::from(SearchMode::PREFIX));
        assert_eq!(
            MatchKind::Strict,
            MatchKind::from(SearchMode::STRICT | SearchMode::PREFIX)
        );
    }
}
