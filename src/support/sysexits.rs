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

//! Constants from `sysexits.h`, plus the mapping from our errors onto them.
//!
//! Scripts driving the CLI (e.g. a webmail frontend shelling out to
//! `addrbook accounts register`) can tell rejected input apart from
//! infrastructure failures by exit status alone.

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_OK: Sysexit = Sysexit(0);
pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_NOUSER: Sysexit = Sysexit(67);
pub const EX_UNAVAILABLE: Sysexit = Sysexit(69);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_OSERR: Sysexit = Sysexit(71);
pub const EX_CANTCREAT: Sysexit = Sysexit(73);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_NOPERM: Sysexit = Sysexit(77);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }
}

impl From<&Error> for Sysexit {
    fn from(e: &Error) -> Self {
        match *e {
            Error::NoNameOrEmail
            | Error::InvalidEmail(..)
            | Error::BadFieldKey(..)
            | Error::RegistrationRejected(..) => EX_DATAERR,
            Error::DuplicateEmail(..)
            | Error::GroupNameConflict(..)
            | Error::AccountExists(..) => EX_CANTCREAT,
            Error::TooManyRegistrations => EX_TEMPFAIL,
            Error::RegistrationDisabled => EX_NOPERM,
            Error::ProvisioningFailed { .. } | Error::NotificationFailed(..) => {
                EX_UNAVAILABLE
            }
            Error::Io(..) => EX_IOERR,
            Error::Sqlite(..) | Error::Cbor(..) => EX_SOFTWARE,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_mapping() {
        assert_eq!(EX_DATAERR, Sysexit::from(&Error::NoNameOrEmail));
        assert_eq!(
            EX_CANTCREAT,
            Sysexit::from(&Error::DuplicateEmail("a@b.c".to_owned()))
        );
        assert_eq!(
            EX_UNAVAILABLE,
            Sysexit::from(&Error::ProvisioningFailed {
                action: "create",
                output: String::new(),
            })
        );
    }
}
