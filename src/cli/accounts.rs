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

use super::main::*;
use crate::account::notify::CommandNotifier;
use crate::account::provision::ScriptProvisioner;
use crate::account::registration::{AdminAddRequest, Registrar, RegistrationRequest};
use crate::contacts::Database;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::SystemConfig;

pub(super) fn accounts(cmd: AccountsCommand, config: &SystemConfig, db: &mut Database) {
    let mut registrar = Registrar::new(
        db,
        &config.registration,
        ScriptProvisioner::new(config.provisioning.clone()),
        CommandNotifier::new(config.notification.clone()),
        LogPrefix::new("accounts".to_owned()),
    );

    match cmd.action {
        AccountsSubcommand::Register {
            username,
            domain,
            name,
            recovery_email,
            ip,
        } => {
            let (password, password_confirm) = read_password();
            let request = RegistrationRequest {
                username,
                domain,
                name,
                recovery_email,
                password,
                password_confirm,
                ip_address: ip,
            };

            match registrar.register(&request) {
                Ok(record) => println!("{}\t{}", record.email, record.status),
                Err(e) => fail("Registration failed", e),
            }
        },

        AccountsSubcommand::AdminAdd {
            username,
            name,
            recovery_email,
            status,
        } => {
            let (password, _) = read_password();
            let request = AdminAddRequest {
                username,
                name,
                recovery_email,
                password,
                status,
            };

            match registrar.admin_add(&request) {
                Ok(record) => println!("{}\t{}", record.email, record.status),
                Err(e) => fail("Creating account failed", e),
            }
        },

        AccountsSubcommand::Verify { email, token } => {
            match registrar.verify(&email, &token) {
                Ok(true) => println!("{} is now active", email),
                Ok(false) => die!(
                    EX_DATAERR,
                    "Invalid or expired verification token for {}",
                    email
                ),
                Err(e) => fail("Verification failed", e),
            }
        },

        AccountsSubcommand::Delete { email } => match registrar.delete(&email) {
            Ok(true) => println!("Deleted {}", email),
            Ok(false) => println!("Deleted mailbox {} (it was not registered)", email),
            Err(e) => fail("Deletion failed", e),
        },

        AccountsSubcommand::List => match registrar.list() {
            Ok(records) => {
                for record in records {
                    println!(
                        "{}\t{}\t{}\t{}\t{}",
                        record.email,
                        record.status,
                        record.name,
                        record.recovery_email,
                        record.created.0.format("%Y-%m-%d %H:%M:%S"),
                    );
                }
            },
            Err(e) => fail("Listing accounts", e),
        },
    }
}

/// Reads a password and its confirmation from the terminal.
fn read_password() -> (String, String) {
    let password = match rpassword::read_password_from_tty(Some("Password: ")) {
        Ok(p) => p,
        Err(e) => die!(EX_NOINPUT, "Failed to read password: {}", e),
    };

    match rpassword::read_password_from_tty(Some("Confirm: ")) {
        Ok(c) if c != password => die!(EX_DATAERR, "Passwords don't match"),
        Ok(c) => (password, c),
        Err(e) => die!(EX_NOINPUT, "Failed to read password: {}", e),
    }
}
