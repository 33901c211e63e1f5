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

use chrono::NaiveDate;

use super::main::*;
use crate::contacts::model::*;
use crate::contacts::{ContactStore, Database, ResultSet, SearchQuery};
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

pub(super) fn contacts(cmd: ContactsCommand, config: &SystemConfig, db: &Database) {
    let mut store = open_store(db, cmd.user);
    store.set_page_size(config.storage.page_size);

    match cmd.action {
        ContactsSubcommand::List(options) => {
            apply_page(&mut store, &options.page);
            store.set_sort(options.sort, options.order());
            match store.list_records(None, 0, options.nocount) {
                Ok(result) => print_result(&result),
                Err(e) => fail("Listing contacts", e),
            }
        },

        ContactsSubcommand::Search(options) => {
            apply_page(&mut store, &options.page);
            let fields = options.field.iter().map(String::as_str).collect::<Vec<_>>();
            let query = SearchQuery::parse(&fields, &options.value);

            let mut mode = SearchMode::empty();
            if options.strict {
                mode |= SearchMode::STRICT;
            }
            if options.prefix {
                mode |= SearchMode::PREFIX;
            }

            let search_options = crate::contacts::SearchOptions {
                mode,
                select: !options.count,
                nocount: false,
                required: options.require,
            };
            match store.search(&query, &search_options) {
                Ok(result) if options.count => println!("{}", result.count),
                Ok(result) => print_result(&result),
                Err(e) => fail("Searching", e),
            }
        },

        ContactsSubcommand::Show { id } => {
            let contact = match store.get_record(ContactId(id)) {
                Ok(Some(contact)) => contact,
                Ok(None) => die!(EX_NOINPUT, "No such contact: {}", id),
                Err(e) => fail("Reading contact", e),
            };

            println!("id\t{}", contact.id);
            for (key, values) in contact.fields.iter() {
                for value in values {
                    println!("{}\t{}", key, format_value(value));
                }
            }

            match store.get_record_groups(contact.id) {
                Ok(groups) => {
                    for group in groups {
                        println!("group\t{}\t{}", group.id, group.name);
                    }
                },
                Err(e) => fail("Reading groups", e),
            }
        },

        ContactsSubcommand::Add {
            allow_duplicate,
            fields,
        } => {
            let data = parse_fields_or_die(&fields);
            match store.insert(&data, !allow_duplicate) {
                Ok(id) => println!("{}", id),
                Err(e) => fail("Adding contact", e),
            }
        },

        ContactsSubcommand::Edit { id, fields } => {
            let data = parse_fields_or_die(&fields);
            match store.update(ContactId(id), &data) {
                Ok(true) => (),
                Ok(false) => die!(EX_NOINPUT, "No such contact: {}", id),
                Err(e) => fail("Updating contact", e),
            }
        },

        ContactsSubcommand::Delete { ids } => {
            match store.delete(&contact_ids(&ids)) {
                Ok(n) => println!("Deleted {} contact(s)", n),
                Err(e) => fail("Deleting contacts", e),
            }
        },

        ContactsSubcommand::Undelete { ids } => {
            match store.undelete(&contact_ids(&ids)) {
                Ok(n) => println!("Restored {} contact(s)", n),
                Err(e) => fail("Restoring contacts", e),
            }
        },

        ContactsSubcommand::Purge { with_groups } => {
            match store.delete_all(with_groups) {
                Ok(n) => println!("Deleted {} contact(s)", n),
                Err(e) => fail("Deleting contacts", e),
            }
        },
    }
}

pub(super) fn groups(cmd: GroupsCommand, db: &Database) {
    let mut store = open_store(db, cmd.user);

    match cmd.action {
        GroupsSubcommand::List {
            search,
            strict,
            prefix,
        } => {
            let mode = if strict {
                SearchMode::STRICT
            } else if prefix {
                SearchMode::PREFIX
            } else {
                SearchMode::empty()
            };

            match store.list_groups(search.as_deref(), mode) {
                Ok(groups) => print_groups(&groups),
                Err(e) => fail("Listing groups", e),
            }
        },

        GroupsSubcommand::Create { name } => match store.create_group(&name) {
            Ok(group) => println!("{}\t{}", group.id, group.name),
            Err(e) => fail("Creating group", e),
        },

        GroupsSubcommand::Rename { id, name } => {
            match store.rename_group(GroupId(id), &name) {
                Ok(Some(name)) => println!("{}\t{}", id, name),
                Ok(None) => die!(EX_NOINPUT, "No such group: {}", id),
                Err(e) => fail("Renaming group", e),
            }
        },

        GroupsSubcommand::Delete { id } => match store.delete_group(GroupId(id)) {
            Ok(true) => (),
            Ok(false) => die!(EX_NOINPUT, "No such group: {}", id),
            Err(e) => fail("Deleting group", e),
        },

        GroupsSubcommand::Add { group, contacts } => {
            match store.add_to_group(GroupId(group), &contact_ids(&contacts)) {
                Ok(n) => println!("Added {} contact(s)", n),
                Err(e) => fail("Adding to group", e),
            }
        },

        GroupsSubcommand::Remove { group, contacts } => {
            match store.remove_from_group(GroupId(group), &contact_ids(&contacts)) {
                Ok(n) => println!("Removed {} contact(s)", n),
                Err(e) => fail("Removing from group", e),
            }
        },

        GroupsSubcommand::Of { contact } => {
            match store.get_record_groups(ContactId(contact)) {
                Ok(groups) => print_groups(&groups),
                Err(e) => fail("Reading groups", e),
            }
        },
    }
}

fn open_store(db: &Database, user: i64) -> ContactStore<'_> {
    let log_prefix = LogPrefix::new("contacts".to_owned());
    let user = UserId(user);
    log_prefix.set_user(user.to_string());
    ContactStore::new(db, user, log_prefix)
}

fn apply_page(store: &mut ContactStore<'_>, options: &PageOptions) {
    if let Some(page_size) = options.page_size {
        store.set_page_size(page_size);
    }
    store.set_page(options.page.max(1));
    store.set_group(options.group.map(GroupId));
}

fn contact_ids(ids: &[i64]) -> Vec<ContactId> {
    ids.iter().copied().map(ContactId).collect()
}

fn print_result(result: &ResultSet) {
    if result.is_empty() {
        println!("No contacts ({} total)", result.count);
        return;
    }

    println!(
        "Contacts {}-{} of {}",
        result.first + 1,
        result.first + result.len(),
        result.count
    );
    for contact in result {
        println!(
            "{}\t{}\t{}",
            contact.id,
            contact.display_name(),
            contact.emails().join(", ")
        );
    }
}

fn print_groups(groups: &[Group]) {
    for group in groups {
        println!("{}\t{}", group.id, group.name);
    }
}

fn format_value(value: &FieldValue) -> String {
    match *value {
        FieldValue::Text(ref s) => s.clone(),
        FieldValue::Date(date) => date.format("%Y-%m-%d").to_string(),
        FieldValue::Address(ref address) => address.parts().join(";"),
        FieldValue::Binary(ref data) => format!("<{} bytes>", data.len()),
    }
}

fn parse_fields_or_die(args: &[String]) -> FieldMap {
    match parse_fields(args) {
        Ok(data) => data,
        Err(e) => die!(EX_USAGE, "{}", e),
    }
}

/// Parses `key=value` arguments into a field map.
fn parse_fields(args: &[String]) -> Result<FieldMap, String> {
    let mut data = FieldMap::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got '{}'", arg))?;
        let key = FieldKey::from(key.trim());
        let value = if is_date_col(key.field()) {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|e| format!("Bad date for {}: {}", key, e))?
        } else if key.is_field("address") {
            let mut parts = value.split(';').map(|p| p.trim().to_owned());
            FieldValue::Address(PostalAddress {
                street: parts.next().unwrap_or_default(),
                locality: parts.next().unwrap_or_default(),
                zipcode: parts.next().unwrap_or_default(),
                region: parts.next().unwrap_or_default(),
                country: parts.next().unwrap_or_default(),
            })
        } else {
            FieldValue::Text(value.to_owned())
        };

        data.push(key, value);
    }

    Ok(data)
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn field_arguments() {
        let data = parse_fields(&args(&[
            "name=Jane Doe",
            "email:work=jane@work.example",
            "email:home=jane@home.example",
            "birthday=1980-02-29",
            "address:home=1 Main St;Springfield;12345;;US",
        ]))
        .unwrap();

        assert_eq!(
            vec!["jane@work.example", "jane@home.example"],
            data.values_of("email")
                .filter_map(FieldValue::as_text)
                .collect::<Vec<_>>()
        );
        assert_eq!(
            Some(&[FieldValue::Date(NaiveDate::from_ymd_opt(1980, 2, 29).unwrap())][..]),
            data.get(&FieldKey::new("birthday"))
        );
        assert_eq!(
            Some(
                &[FieldValue::Address(PostalAddress {
                    street: "1 Main St".to_owned(),
                    locality: "Springfield".to_owned(),
                    zipcode: "12345".to_owned(),
                    region: String::new(),
                    country: "US".to_owned(),
                })][..]
            ),
            data.get(&FieldKey::typed("address", "home"))
        );
    }

    #[test]
    fn bad_field_arguments() {
        assert!(parse_fields(&args(&["name"])).is_err());
        assert!(parse_fields(&args(&["birthday=29/02/1980"])).is_err());
        // Only the first '=' separates
        assert_eq!(
            Some("a=b"),
            parse_fields(&args(&["notes=a=b"]))
                .unwrap()
                .first_text("notes")
        );
    }

    #[test]
    fn value_formatting() {
        assert_eq!(
            "2001-09-11",
            format_value(&FieldValue::Date(
                NaiveDate::from_ymd_opt(2001, 9, 11).unwrap()
            ))
        );
        assert_eq!(
            "a;b;;;e",
            format_value(&FieldValue::Address(PostalAddress {
                street: "a".to_owned(),
                locality: "b".to_owned(),
                country: "e".to_owned(),
                ..PostalAddress::default()
            }))
        );
    }
}
