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

use std::fs;
use std::io::Read;
use std::mem;
use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::contacts::model::{SortColumn, SortOrder};
use crate::contacts::Database;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Manage a user's contacts.
    Contacts(ContactsCommand),
    /// Manage a user's contact groups.
    Groups(GroupsCommand),
    /// Manage mail accounts.
    Accounts(AccountsCommand),
}

impl Command {
    fn common_options(&mut self) -> CommonOptions {
        match *self {
            Command::Contacts(ref mut c) => mem::take(&mut c.common),
            Command::Groups(ref mut c) => mem::take(&mut c.common),
            Command::Accounts(ref mut c) => mem::take(&mut c.common),
        }
    }
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The configuration file
    /// [default: /etc/addrbook/addrbook.toml or
    /// /usr/local/etc/addrbook/addrbook.toml]
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct ContactsCommand {
    #[structopt(flatten)]
    common: CommonOptions,

    /// The ID of the user whose address book to use.
    #[structopt(short, long)]
    pub(super) user: i64,

    #[structopt(subcommand)]
    pub(super) action: ContactsSubcommand,
}

#[derive(StructOpt)]
pub(super) enum ContactsSubcommand {
    /// List contacts a page at a time.
    List(ListOptions),
    /// Search for contacts.
    ///
    /// Without --field, every full-text field is searched. With one or more
    /// --field options, every word of the value must match at least one of
    /// the named fields. The field `ID` selects contacts by ID.
    Search(SearchOptions),
    /// Show every field of a contact.
    Show {
        id: i64,
    },
    /// Add a contact.
    ///
    /// Fields are given as `key=value`, where the key is a field name,
    /// optionally qualified with a subtype (e.g. `email:work=a@b.example`).
    /// Keys may be repeated. Date fields take `YYYY-MM-DD`; `address` takes
    /// `street;locality;zipcode;region;country`.
    Add {
        /// Add the contact even if one with the same email address exists.
        #[structopt(long)]
        allow_duplicate: bool,

        #[structopt(required = true)]
        fields: Vec<String>,
    },
    /// Change fields of a contact.
    ///
    /// Every field named replaces all existing values of that field,
    /// including those of other subtypes.
    Edit {
        id: i64,

        #[structopt(required = true)]
        fields: Vec<String>,
    },
    /// Move contacts to the trash.
    Delete {
        #[structopt(required = true)]
        ids: Vec<i64>,
    },
    /// Restore contacts from the trash.
    Undelete {
        #[structopt(required = true)]
        ids: Vec<i64>,
    },
    /// Move every contact of the user to the trash.
    Purge {
        /// Delete the user's groups as well.
        #[structopt(long)]
        with_groups: bool,
    },
}

#[derive(StructOpt)]
pub(super) struct PageOptions {
    /// The page to show, starting from 1.
    #[structopt(long, default_value = "1")]
    pub(super) page: usize,

    /// Records per page [default: from the configuration]
    #[structopt(long)]
    pub(super) page_size: Option<usize>,

    /// Only consider members of this group.
    #[structopt(long)]
    pub(super) group: Option<i64>,
}

#[derive(StructOpt)]
pub(super) struct ListOptions {
    #[structopt(flatten)]
    pub(super) page: PageOptions,

    /// Sort by this column (name, firstname, surname, middlename, email).
    #[structopt(long, default_value = "name")]
    pub(super) sort: SortColumn,

    /// Sort in descending order.
    #[structopt(long)]
    pub(super) desc: bool,

    /// Don't compute the total number of contacts.
    #[structopt(long)]
    pub(super) nocount: bool,
}

impl ListOptions {
    pub(super) fn order(&self) -> SortOrder {
        if self.desc {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }
}

#[derive(StructOpt)]
pub(super) struct SearchOptions {
    #[structopt(flatten)]
    pub(super) page: PageOptions,

    /// A field to search. Can be passed multiple times.
    #[structopt(short, long, number_of_values(1))]
    pub(super) field: Vec<String>,

    /// Only match whole values.
    #[structopt(long)]
    pub(super) strict: bool,

    /// Only match values starting with the search term.
    #[structopt(long, conflicts_with = "strict")]
    pub(super) prefix: bool,

    /// Only return contacts with a value for this field. Can be passed
    /// multiple times.
    #[structopt(long, number_of_values(1))]
    pub(super) require: Vec<String>,

    /// Only count the matches.
    #[structopt(long)]
    pub(super) count: bool,

    pub(super) value: String,
}

#[derive(StructOpt)]
pub(super) struct GroupsCommand {
    #[structopt(flatten)]
    common: CommonOptions,

    /// The ID of the user whose groups to use.
    #[structopt(short, long)]
    pub(super) user: i64,

    #[structopt(subcommand)]
    pub(super) action: GroupsSubcommand,
}

#[derive(StructOpt)]
pub(super) enum GroupsSubcommand {
    /// List groups, optionally only those whose name matches.
    List {
        search: Option<String>,

        /// Only match whole names.
        #[structopt(long)]
        strict: bool,

        /// Only match names starting with the search term.
        #[structopt(long, conflicts_with = "strict")]
        prefix: bool,
    },
    /// Create a group. If the name is taken, a number is appended.
    Create { name: String },
    /// Rename a group. If the name is taken, a number is appended.
    Rename { id: i64, name: String },
    /// Delete a group. Its contacts are not affected.
    Delete { id: i64 },
    /// Add contacts to a group.
    Add {
        group: i64,
        #[structopt(required = true)]
        contacts: Vec<i64>,
    },
    /// Remove contacts from a group.
    Remove {
        group: i64,
        #[structopt(required = true)]
        contacts: Vec<i64>,
    },
    /// List the groups a contact belongs to.
    Of { contact: i64 },
}

#[derive(StructOpt)]
pub(super) struct AccountsCommand {
    #[structopt(flatten)]
    common: CommonOptions,

    #[structopt(subcommand)]
    pub(super) action: AccountsSubcommand,
}

#[derive(StructOpt)]
pub(super) enum AccountsSubcommand {
    /// Register a new account as a member of the public would.
    ///
    /// The password is read from the terminal. If verification is required,
    /// the account starts out pending and a verification link is mailed to
    /// the recovery address.
    Register {
        /// The local part of the new address.
        username: String,
        /// The domain of the new address.
        domain: String,
        /// The account holder's name.
        #[structopt(long)]
        name: String,
        /// Where to send the verification link.
        #[structopt(long)]
        recovery_email: String,
        /// The client address the request came from.
        #[structopt(long, default_value = "")]
        ip: String,
    },
    /// Create an account in the configured domain, bypassing self-service
    /// restrictions.
    ///
    /// The password is read from the terminal.
    AdminAdd {
        username: String,
        #[structopt(long)]
        name: String,
        #[structopt(long)]
        recovery_email: String,
        /// The initial status (pending, active, inactive).
        #[structopt(long, default_value = "active")]
        status: crate::account::registration::AccountStatus,
    },
    /// Activate a pending account with its verification token.
    Verify { email: String, token: String },
    /// Delete an account and its mailbox.
    Delete { email: String },
    /// List every registered account, newest first.
    List,
}

/// Prints `e` and exits with the matching status.
pub(super) fn fail(context: &str, e: Error) -> ! {
    eprintln!("{}: {}", context, e);
    Sysexit::from(&e).exit()
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let mut cmd = Command::from_clap(&match Command::clap().get_matches_safe()
    {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    let common = cmd.common_options();
    let config_path = common.config.unwrap_or_else(|| {
        if Path::new("/etc/addrbook/addrbook.toml").is_file() {
            "/etc/addrbook/addrbook.toml".to_owned().into()
        } else if Path::new("/usr/local/etc/addrbook/addrbook.toml").is_file()
        {
            "/usr/local/etc/addrbook/addrbook.toml".to_owned().into()
        } else {
            die!(
                EX_CONFIG,
                "Neither /etc/addrbook nor /usr/local/etc/addrbook contains\n\
                 addrbook.toml; use --config=/path/to/addrbook.toml if your\n\
                 installation is elsewhere."
            )
        }
    });
    let root = config_path
        .parent()
        .map(Path::to_owned)
        .unwrap_or_else(|| PathBuf::from("."));

    let system_config = load_config(&config_path);
    init_logging(&root);

    let db_path = root.join(&system_config.storage.database);
    let log_prefix = LogPrefix::new("addrbook".to_owned());
    let mut db = match Database::open(&log_prefix, &db_path) {
        Ok(db) => db,
        Err(e) => fail(&format!("Opening '{}'", db_path.display()), e),
    };

    match cmd {
        Command::Contacts(cmd) => {
            super::contacts::contacts(cmd, &system_config, &db)
        }
        Command::Groups(cmd) => super::contacts::groups(cmd, &db),
        Command::Accounts(cmd) => {
            super::accounts::accounts(cmd, &system_config, &mut db)
        }
    }
}

fn load_config(path: &Path) -> SystemConfig {
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        die!(EX_CONFIG, "Error reading '{}': {}", path.display(), e);
    }

    match toml::from_slice(&system_config_toml) {
        Ok(config) => config,
        Err(e) => die!(
            EX_CONFIG,
            "Error in config file at '{}': {}",
            path.display(),
            e
        ),
    }
}

fn init_logging(root: &Path) {
    if Ok(true) == nix::unistd::isatty(2) {
        // Running interactively; ignore logging configuration and just write
        // to stderr.
        crate::init_simple_log();
        return;
    }

    // Either log4rs or syslog, but not both, since there's no maintained
    // bridge between them.
    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) =
            log4rs::init_file(log_config_file, log4rs::file::Deserializers::new())
        {
            die!(EX_CONFIG, "Failed to initialise logging: {}", e);
        }
    } else {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_MAIL,
            hostname: None,
            process: env!("CARGO_PKG_NAME").to_owned(),
            pid: nix::unistd::getpid().as_raw(),
        };

        let logger = match syslog::unix(formatter) {
            Ok(logger) => logger,
            Err(e) => die!(EX_OSERR, "Failed to connect to syslog: {}", e),
        };
        if let Err(e) =
            log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
                .map(|_| log::set_max_level(log::LevelFilter::Info))
        {
            die!(EX_SOFTWARE, "Failed to initialise logging: {}", e);
        }
    }
}
