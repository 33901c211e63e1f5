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

//! The serialised full field set of a contact.

use serde::{Deserialize, Serialize};

use super::model::*;
use crate::support::error::Error;

/// The document stored in the `card` column.
///
/// Cards never carry the `groups` pseudo-field, nor empty values.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "v")]
    version: u32,
    #[serde(rename = "f")]
    fields: FieldMap,
}

const CARD_VERSION: u32 = 1;

impl Card {
    pub fn from_fields(source: &FieldMap) -> Self {
        let mut fields = FieldMap::new();
        for (key, values) in source.iter() {
            if key.is_field(GROUPS_FIELD) {
                continue;
            }

            let values = values
                .iter()
                .filter(|v| !v.is_empty())
                .map(|v| match *v {
                    FieldValue::Text(ref s) => FieldValue::Text(s.trim().to_owned()),
                    ref other => other.clone(),
                })
                .collect::<Vec<_>>();
            if !values.is_empty() {
                fields.set(key.clone(), values);
            }
        }

        Self {
            version: CARD_VERSION,
            fields,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        Ok(serde_cbor::from_slice(data)?)
    }

    pub fn export(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn into_fields(self) -> FieldMap {
        self.fields
    }

    /// Every email address on the card, across all subtypes, in order.
    pub fn emails(&self) -> Vec<String> {
        self.fields
            .values_of("email")
            .filter_map(FieldValue::as_text)
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use chrono::prelude::*;

    use super::*;

    #[test]
    fn card_drops_groups_and_empties() {
        let card = Card::from_fields(
            &FieldMap::new()
                .with("name", " Jane ")
                .with("groups", "1,2")
                .with("phone", "")
                .with("email:work", "jane@work.example")
                .with("email:home", "jane@home.example"),
        );

        assert_eq!(Some("Jane"), card.fields().first_text("name"));
        assert!(!card.fields().contains_key(&FieldKey::new("groups")));
        assert!(!card.fields().contains_key(&FieldKey::new("phone")));
        assert_eq!(
            vec!["jane@work.example", "jane@home.example"],
            card.emails()
        );
    }

    #[test]
    fn card_survives_export() {
        let card = Card::from_fields(
            &FieldMap::new()
                .with("surname", "Doe")
                .with("birthday", NaiveDate::from_ymd_opt(1980, 2, 29).unwrap())
                .with(
                    "address:home",
                    PostalAddress {
                        street: "1 Main St".to_owned(),
                        ..PostalAddress::default()
                    },
                )
                .with("photo", FieldValue::Binary(vec![0xff, 0xd8, 0x00])),
        );

        let exported = card.export().unwrap();
        assert_eq!(card, Card::parse(&exported).unwrap());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Card::parse(b"\xff\xff not cbor").is_err());
    }
}
