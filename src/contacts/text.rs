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

//! Text normalisation shared by the record codec and the query builder.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DELIMITERS: Regex = Regex::new(r#"[\s;,"'/+-]+"#).unwrap();
    static ref EMAIL: Regex = Regex::new(
        r#"^[^\s@,;<>"()\[\]\\]+@[^\s@,;<>"()\[\]\\.]+(\.[^\s@,;<>"()\[\]\\.]+)*$"#
    )
    .unwrap();
}

/// Minimum token length kept in the stored token blob.
pub const STORED_TOKEN_MIN: usize = 3;

/// Splits `s` on whitespace and punctuation, dropping tokens shorter than
/// `minlen` characters.
pub fn tokenize(s: &str, minlen: usize) -> Vec<String> {
    DELIMITERS
        .split(s)
        .filter(|t| !t.is_empty() && t.chars().count() >= minlen)
        .map(str::to_owned)
        .collect()
}

/// Like `tokenize`, but lower-cases every token.
pub fn normalize(s: &str, minlen: usize) -> Vec<String> {
    tokenize(s, minlen)
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Appends the tokens of `tokens` not already in `into`, preserving first
/// occurrence order.
pub fn extend_unique(into: &mut Vec<String>, tokens: Vec<String>) {
    for token in tokens {
        if !into.contains(&token) {
            into.push(token);
        }
    }
}

/// Whether `s` looks like a deliverable email address.
///
/// This is a syntactic check only: one `@`, no whitespace or list
/// punctuation, and a domain made of non-empty labels.
pub fn is_valid_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokenizing() {
        assert_eq!(
            vec!["John", "O", "Brien", "a@b.com"],
            tokenize("John O'Brien; a@b.com", 1)
        );
        assert_eq!(vec!["John", "Brien"], tokenize("John O'Brien", 3));
        assert_eq!(vec!["smith", "jones"], normalize("Smith-Jones", 3));
        assert!(tokenize("  ,, ", 1).is_empty());
    }

    #[test]
    fn unique_extension() {
        let mut tokens = vec!["alpha".to_owned()];
        extend_unique(
            &mut tokens,
            vec!["beta".to_owned(), "alpha".to_owned(), "beta".to_owned()],
        );
        assert_eq!(vec!["alpha", "beta"], tokens);
    }

    #[test]
    fn email_syntax() {
        assert!(is_valid_email("jdoe@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.co.uk"));
        assert!(is_valid_email("root@localhost"));
        assert!(!is_valid_email("jdoe"));
        assert!(!is_valid_email("jdoe@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b.com,c@d.com"));
        assert!(!is_valid_email("j doe@example.com"));
        assert!(!is_valid_email("jdoe@example..com"));
        assert!(!is_valid_email("jdoe@@example.com"));
    }
}
