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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Addrbook.
///
/// This is stored in a file named `addrbook.toml`, which is typically found in
/// `/etc/addrbook` or `/usr/local/etc/addrbook`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Where contacts and registrations are kept.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Policy for self-service account registration.
    #[serde(default)]
    pub registration: RegistrationConfig,

    /// How mailboxes are created and destroyed on the mail server.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// How notification mail is handed off for delivery.
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// The path to the SQLite database.
    ///
    /// Relative paths are resolved against the directory containing the
    /// configuration file.
    pub database: PathBuf,

    /// The number of records per page when listing or searching contacts.
    pub page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: "addrbook.sqlite".into(),
            page_size: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// If false, only administrators can create accounts.
    pub enabled: bool,

    /// The domain in which administrators create accounts.
    pub domain: String,

    /// The address notifications are sent from, and to which new
    /// registrations are forwarded.
    pub admin_email: String,

    /// If true, self-registered accounts start out `pending` and must be
    /// activated through the token mailed to the recovery address.
    pub require_verification: bool,

    pub min_password_length: usize,

    /// How many registrations a single client address may make in any 24
    /// hour period.
    pub max_accounts_per_ip: u32,

    /// User names nobody may register. Compared case-insensitively.
    pub forbidden_usernames: Vec<String>,

    /// Domains open to self-registration.
    pub allowed_domains: Vec<String>,

    /// If true, the admin is mailed about every new registration.
    pub forward_to_admin: bool,

    /// The link mailed out for verification. `{email}` and `{token}` are
    /// replaced with the new address and the verification token.
    pub verify_url: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            domain: "example.com".to_owned(),
            admin_email: "admin@example.com".to_owned(),
            require_verification: true,
            min_password_length: 8,
            max_accounts_per_ip: 3,
            forbidden_usernames: [
                "admin",
                "postmaster",
                "hostmaster",
                "webmaster",
                "abuse",
                "root",
                "noreply",
                "no-reply",
                "mail",
                "spam",
                "virus",
                "info",
                "support",
                "sales",
                "contact",
                "billing",
            ]
            .iter()
            .map(|&s| s.to_owned())
            .collect(),
            allowed_domains: vec!["example.com".to_owned()],
            forward_to_admin: true,
            verify_url: "https://mail.example.com/?_task=login\
                         &_action=plugin.account_registration.verify\
                         &_email={email}&_token={token}"
                .to_owned(),
        }
    }
}

/// Which command set the provisioning script speaks.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptFlavour {
    /// `manage-users.sh add|delete|exists`
    Native,
    /// `docker-mail-management.sh add-user|delete-user|check-user`
    Docker,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// The mailbox management script.
    pub script: PathBuf,

    /// The directory to run the script in. If unset, the directory containing
    /// the script is used.
    pub working_dir: Option<PathBuf>,

    pub flavour: ScriptFlavour,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            script: "/usr/local/lib/mail-server/manage-users.sh".into(),
            working_dir: None,
            flavour: ScriptFlavour::Native,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// A sendmail-compatible program which reads a complete message,
    /// headers included, from standard input.
    pub command: PathBuf,
    pub args: Vec<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            command: "/usr/sbin/sendmail".into(),
            args: vec!["-t".to_owned(), "-i".to_owned()],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: SystemConfig = toml::from_str("").unwrap();
        assert_eq!(10, config.storage.page_size);
        assert_eq!(8, config.registration.min_password_length);
        assert_eq!(ScriptFlavour::Native, config.provisioning.flavour);
        assert!(config
            .registration
            .forbidden_usernames
            .contains(&"postmaster".to_owned()));
    }

    #[test]
    fn parse_full_config() {
        let config: SystemConfig = toml::from_str(
            r#"
[storage]
database = "/var/lib/addrbook/contacts.sqlite"
page_size = 25

[registration]
domain = "mail.test"
allowed_domains = ["mail.test", "alt.test"]
max_accounts_per_ip = 1
require_verification = false

[provisioning]
script = "/srv/mail/docker-mail-management.sh"
flavour = "docker"

[notification]
command = "/bin/cat"
args = []
"#,
        )
        .unwrap();

        assert_eq!(25, config.storage.page_size);
        assert_eq!(
            PathBuf::from("/var/lib/addrbook/contacts.sqlite"),
            config.storage.database
        );
        assert_eq!("mail.test", config.registration.domain);
        assert_eq!(2, config.registration.allowed_domains.len());
        assert_eq!(1, config.registration.max_accounts_per_ip);
        assert!(!config.registration.require_verification);
        // Unspecified fields within a section keep their defaults
        assert_eq!(8, config.registration.min_password_length);
        assert_eq!(ScriptFlavour::Docker, config.provisioning.flavour);
        assert!(config.notification.args.is_empty());
    }
}
