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

//! Conversion between contact documents and table rows.
//!
//! A row keeps a handful of fields in indexed columns for sorting and
//! matching, a token blob for full-text search, and the whole document as a
//! card. `encode` derives all three from one field map so they can never
//! disagree; `decode` goes the other way.

use super::card::Card;
use super::model::*;
use super::text;
use super::types::ContactRow;
use crate::support::error::Error;

/// The column values of a contact ready for storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedContact {
    pub name: String,
    pub firstname: String,
    pub surname: String,
    pub middlename: String,
    pub email: String,
    pub card: Vec<u8>,
    pub words: String,
}

/// Splits an email column into its trimmed, non-empty entries.
pub fn split_emails(column: &str) -> Vec<String> {
    column
        .split(SEPARATOR)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// The value of the indexed column for `field`.
///
/// An untagged value takes precedence; otherwise the `home` variant is used.
fn column_value(data: &FieldMap, field: &str) -> String {
    let values = data
        .get(&FieldKey::new(field))
        .or_else(|| data.get(&FieldKey::typed(field, "home")))
        .unwrap_or(&[]);

    values
        .iter()
        .filter_map(FieldValue::to_column_string)
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Computes the deduplicated, lower-cased token blob of `data`.
pub fn words(data: &FieldMap) -> String {
    let mut tokens = Vec::new();
    for (key, values) in data.iter() {
        if !is_fulltext_col(key.field()) {
            continue;
        }

        for value in values {
            let Some(text) = value.fulltext() else {
                continue;
            };
            if text.chars().count() < text::STORED_TOKEN_MIN {
                continue;
            }
            text::extend_unique(
                &mut tokens,
                text::normalize(&text, text::STORED_TOKEN_MIN),
            );
        }
    }

    tokens.join(" ")
}

/// Derives the row representation of `data`.
pub fn encode(data: &FieldMap) -> Result<EncodedContact, Error> {
    let card = Card::from_fields(data);

    let mut email = card.emails();
    if email.is_empty() {
        email = data
            .values_of("email")
            .filter_map(FieldValue::to_column_string)
            .filter(|s| !s.trim().is_empty())
            .collect();
    }

    Ok(EncodedContact {
        name: column_value(card.fields(), "name"),
        firstname: column_value(card.fields(), "firstname"),
        surname: column_value(card.fields(), "surname"),
        middlename: column_value(card.fields(), "middlename"),
        email: email.join(&SEPARATOR.to_string()),
        words: words(card.fields()),
        card: card.export()?,
    })
}

/// Builds a `Contact` from a raw row.
///
/// If `read_card` is false, or the row has no card, the field set is derived
/// from the indexed columns alone.
pub fn decode(row: ContactRow, read_card: bool) -> Result<Contact, Error> {
    let columns = IndexedColumns {
        email: split_emails(&row.email),
        name: row.name,
        firstname: row.firstname,
        surname: row.surname,
        middlename: row.middlename,
    };

    let fields = match row.card {
        Some(ref card) if read_card => Card::parse(card)?.into_fields(),
        _ => fields_from_columns(&columns),
    };

    Ok(Contact {
        id: row.id,
        columns,
        fields,
        changed: row.changed,
    })
}

fn fields_from_columns(columns: &IndexedColumns) -> FieldMap {
    let mut fields = FieldMap::new();
    for &(field, value) in &[
        ("name", &columns.name),
        ("firstname", &columns.firstname),
        ("surname", &columns.surname),
        ("middlename", &columns.middlename),
    ] {
        if !value.is_empty() {
            fields.push(FieldKey::new(field), value.clone().into());
        }
    }
    for email in &columns.email {
        fields.push(FieldKey::new("email"), email.clone().into());
    }
    fields
}

/// Merges an update into an existing field set.
///
/// Every field named in `update` replaces all variants of that field in
/// `existing`; fields `update` does not mention are kept.
pub fn merge(existing: &FieldMap, update: &FieldMap) -> FieldMap {
    let mut merged = existing.clone();
    for key in update.keys() {
        merged.remove_field(key.field());
    }
    for (key, values) in update.clone() {
        merged.set(key, values);
    }
    merged
}

/// Checks that `data` may be stored.
///
/// A contact needs a name (display, first, or last) or at least one email
/// address, and every email address must be syntactically valid.
pub fn validate(data: &FieldMap) -> Result<(), Error> {
    if let Some(key) = data.keys().find(|k| k.field().is_empty()) {
        return Err(Error::BadFieldKey(key.to_string()));
    }

    let has_name = ["name", "firstname", "surname"]
        .iter()
        .any(|f| data.has_value(f));
    if !has_name && !data.has_value("email") {
        return Err(Error::NoNameOrEmail);
    }

    for value in data.values_of("email").filter(|v| !v.is_empty()) {
        match value.as_text() {
            Some(address) if text::is_valid_email(address.trim()) => (),
            _ => {
                return Err(Error::InvalidEmail(
                    value.to_column_string().unwrap_or_default(),
                ))
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::contacts::types::UnixTimestamp;

    fn row_of(encoded: EncodedContact) -> ContactRow {
        ContactRow {
            id: ContactId(1),
            changed: UnixTimestamp::zero(),
            name: encoded.name,
            email: encoded.email,
            firstname: encoded.firstname,
            surname: encoded.surname,
            middlename: encoded.middlename,
            card: Some(encoded.card),
        }
    }

    #[test]
    fn indexed_columns_are_derived() {
        let data = FieldMap::new()
            .with("firstname", "Jane")
            .with("surname:home", "Doe")
            .with("surname:work", "Smith")
            .with("email:work", "jane@work.example")
            .with("email", "jane@home.example")
            .with("groups", "3");
        let encoded = encode(&data).unwrap();

        assert_eq!("", encoded.name);
        assert_eq!("Jane", encoded.firstname);
        assert_eq!("Doe", encoded.surname);
        assert_eq!("jane@work.example,jane@home.example", encoded.email);
    }

    #[test]
    fn token_blob() {
        let data = FieldMap::new()
            .with("name", "Jo Ann Smith")
            .with("nickname", "smith")
            .with("notes", "Met at the Smith-Jones wedding")
            .with("gender", "female")
            .with("email", "jo@example.com");

        // Short tokens are dropped, tokens are deduplicated, non-full-text
        // fields contribute nothing.
        assert_eq!(
            "ann smith met the jones wedding jo@example.com",
            words(&data)
        );
    }

    #[test]
    fn decode_matches_encode() {
        let data = FieldMap::new()
            .with("name", "Jane Doe")
            .with("phone:mobile", "+1 555 0100")
            .with("email", "jane@example.com")
            .with("email:work", "jd@corp.example");
        let contact = decode(row_of(encode(&data).unwrap()), true).unwrap();

        assert_eq!("Jane Doe", contact.columns.name);
        assert_eq!(
            vec!["jane@example.com", "jd@corp.example"],
            contact.columns.email
        );
        assert_eq!(data, contact.fields);
    }

    #[test]
    fn decode_without_card() {
        let mut row = row_of(
            encode(
                &FieldMap::new()
                    .with("surname", "Doe")
                    .with("notes", "secret")
                    .with("email", "a@example.com"),
            )
            .unwrap(),
        );

        let contact = decode(row.clone(), false).unwrap();
        assert!(!contact.fields.has_value("notes"));
        assert_eq!(Some("Doe"), contact.fields.first_text("surname"));

        row.card = None;
        row.email = " a@example.com , b@example.com,".to_owned();
        let contact = decode(row, true).unwrap();
        assert_eq!(vec!["a@example.com", "b@example.com"], contact.columns.email);
        assert_eq!(2, contact.fields.values_of("email").count());
    }

    #[test]
    fn merging_replaces_whole_fields() {
        let existing = FieldMap::new()
            .with("name", "Old")
            .with("email:home", "h@example.com")
            .with("email:work", "w@example.com")
            .with("notes", "keep me");
        let update = FieldMap::new().with("email:other", "o@example.com");

        let merged = merge(&existing, &update);
        assert_eq!(Some("Old"), merged.first_text("name"));
        assert_eq!(Some("keep me"), merged.first_text("notes"));
        assert_eq!(
            vec![&FieldValue::from("o@example.com")],
            merged.values_of("email").collect::<Vec<_>>()
        );
    }

    #[test]
    fn validation() {
        assert!(validate(&FieldMap::new().with("surname", "Doe")).is_ok());
        assert!(validate(&FieldMap::new().with("email", "a@example.com")).is_ok());
        assert!(validate(&FieldMap::new().with("name:home", "Home Name")).is_ok());
        assert_matches!(
            Err(Error::NoNameOrEmail),
            validate(&FieldMap::new().with("notes", "only notes"))
        );
        assert_matches!(
            Err(Error::NoNameOrEmail),
            validate(&FieldMap::new().with("name", "   "))
        );
        match validate(
            &FieldMap::new().with("name", "X").with("email", "not an address"),
        ) {
            Err(Error::InvalidEmail(e)) => assert_eq!("not an address", e),
            r => panic!("unexpected result: {:?}", r),
        }
        assert_matches!(
            Err(Error::BadFieldKey(_)),
            validate(&FieldMap::new().with(":home", "x"))
        );
    }

    proptest! {
        #[test]
        fn email_column_round_trip(
            emails in prop::collection::vec("[a-z0-9.]{1,8}@[a-z]{1,8}\\.[a-z]{2,3}", 0..5),
        ) {
            let mut data = FieldMap::new().with("name", "Someone");
            for (ix, email) in emails.iter().enumerate() {
                let key = if 0 == ix % 2 { "email:home" } else { "email:work" };
                data.push(FieldKey::from(key), email.clone().into());
            }

            let contact = decode(row_of(encode(&data).unwrap()), true).unwrap();
            let from_card = contact
                .fields
                .values_of("email")
                .filter_map(FieldValue::as_text)
                .map(str::to_owned)
                .collect::<Vec<_>>();
            prop_assert_eq!(&from_card, &contact.columns.email);

            let mut expected = emails.iter()
                .enumerate()
                .filter(|&(ix, _)| 0 == ix % 2)
                .map(|(_, e)| e.clone())
                .collect::<Vec<_>>();
            expected.extend(emails.iter()
                .enumerate()
                .filter(|&(ix, _)| 0 != ix % 2)
                .map(|(_, e)| e.clone()));
            prop_assert_eq!(expected, contact.columns.email);
        }
    }
}
