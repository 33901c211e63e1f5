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

use std::io;

use thiserror::Error;

use crate::account::registration::RegistrationProblem;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Contact has neither a name nor an email address")]
    NoNameOrEmail,
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
    #[error("Invalid field key: {0}")]
    BadFieldKey(String),
    #[error("A contact with email address {0} already exists")]
    DuplicateEmail(String),
    #[error("Could not find a free name for group {0}")]
    GroupNameConflict(String),
    #[error("Registration rejected: {}", format_problems(.0))]
    RegistrationRejected(Vec<RegistrationProblem>),
    #[error("Account {0} already exists")]
    AccountExists(String),
    #[error("Too many registrations from this address")]
    TooManyRegistrations,
    #[error("Registration is disabled")]
    RegistrationDisabled,
    #[error("Mailbox {action} failed: {output}")]
    ProvisioningFailed { action: &'static str, output: String },
    #[error("Notification command failed: {0}")]
    NotificationFailed(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Cbor(#[from] serde_cbor::error::Error),
}

impl Error {
    /// Whether this error means the input was rejected before anything was
    /// written.
    pub fn is_validation(&self) -> bool {
        matches!(
            *self,
            Error::NoNameOrEmail
                | Error::InvalidEmail(..)
                | Error::BadFieldKey(..)
                | Error::RegistrationRejected(..)
        )
    }

    /// Whether this error is the result of a conflict with existing data.
    pub fn is_conflict(&self) -> bool {
        matches!(
            *self,
            Error::DuplicateEmail(..)
                | Error::GroupNameConflict(..)
                | Error::AccountExists(..)
                | Error::TooManyRegistrations
        )
    }
}

fn format_problems(problems: &[RegistrationProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
