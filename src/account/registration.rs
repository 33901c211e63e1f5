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

//! Self-service and administrative account registration.
//!
//! Registering an account records it in the `account_registration` table
//! and creates the mailbox through a `Provisioner`, all inside one
//! transaction: if the mailbox cannot be created, the record is rolled back
//! too. Notifications go out only after the transaction commits.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use log::{info, warn};
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use super::notify::{Notification, Notifier};
use super::provision::Provisioner;
use crate::contacts::types::{from_row, from_single, FromRow, UnixTimestamp};
use crate::contacts::{is_valid_email, Database};
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::system_config::RegistrationConfig;

lazy_static! {
    static ref USERNAME: Regex = Regex::new("^[a-zA-Z0-9._%+-]+$").unwrap();
}

/// The window over which registrations per client address are limited.
const RATE_WINDOW_SECS: i64 = 24 * 60 * 60;

/// A reason a registration request was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationProblem {
    #[error("user name is required")]
    UsernameRequired,
    #[error("user name may only contain letters, digits, and ._%+-")]
    UsernameInvalid,
    #[error("user name is reserved")]
    UsernameForbidden,
    #[error("domain is not open for registration")]
    DomainNotAllowed,
    #[error("name is required")]
    NameRequired,
    #[error("recovery email address is required")]
    RecoveryEmailRequired,
    #[error("recovery email address is invalid")]
    RecoveryEmailInvalid,
    #[error("password is required")]
    PasswordRequired,
    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
    #[error("passwords do not match")]
    PasswordMismatch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountStatus {
    /// Awaiting verification of the recovery address.
    Pending,
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(AccountStatus::Pending),
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            _ => Err(format!("unknown account status: {}", s)),
        }
    }
}

impl ToSql for AccountStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Text(self.as_str().as_bytes())))
    }
}

impl FromSql for AccountStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// A stored registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    pub email: String,
    pub name: String,
    pub recovery_email: String,
    /// Empty once verified, or if no verification was required.
    pub verification_token: String,
    pub status: AccountStatus,
    pub created: UnixTimestamp,
    pub verified: Option<UnixTimestamp>,
    pub ip_address: String,
}

impl FromRow for AccountRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            email: row.get("email")?,
            name: row.get("name")?,
            recovery_email: row.get("recovery_email")?,
            verification_token: row.get("verification_token")?,
            status: row.get("status")?,
            created: row.get("created")?,
            verified: row.get("verified")?,
            ip_address: row.get("ip_address")?,
        })
    }
}

/// A request by a member of the public for a new account.
#[derive(Clone, Debug, Default)]
pub struct RegistrationRequest {
    pub username: String,
    pub domain: String,
    pub name: String,
    pub recovery_email: String,
    pub password: String,
    pub password_confirm: String,
    /// The address the request came from, for rate limiting.
    pub ip_address: String,
}

/// A request by an administrator for a new account in the configured
/// domain.
#[derive(Clone, Debug)]
pub struct AdminAddRequest {
    pub username: String,
    pub name: String,
    pub recovery_email: String,
    pub password: String,
    pub status: AccountStatus,
}

fn check_username(
    problems: &mut Vec<RegistrationProblem>,
    username: &str,
    forbidden: Option<&[String]>,
) {
    if username.is_empty() {
        problems.push(RegistrationProblem::UsernameRequired);
    } else if !USERNAME.is_match(username) {
        problems.push(RegistrationProblem::UsernameInvalid);
    } else if forbidden.map_or(false, |forbidden| {
        forbidden.iter().any(|f| f.eq_ignore_ascii_case(username))
    }) {
        problems.push(RegistrationProblem::UsernameForbidden);
    }
}

fn check_contact(problems: &mut Vec<RegistrationProblem>, name: &str, recovery_email: &str) {
    if name.trim().is_empty() {
        problems.push(RegistrationProblem::NameRequired);
    }

    if recovery_email.is_empty() {
        problems.push(RegistrationProblem::RecoveryEmailRequired);
    } else if !is_valid_email(recovery_email) {
        problems.push(RegistrationProblem::RecoveryEmailInvalid);
    }
}

fn check_password(
    problems: &mut Vec<RegistrationProblem>,
    password: &str,
    confirm: Option<&str>,
    min_length: usize,
) {
    if password.is_empty() {
        problems.push(RegistrationProblem::PasswordRequired);
    } else if password.chars().count() < min_length {
        problems.push(RegistrationProblem::PasswordTooShort(min_length));
    } else if confirm.map_or(false, |c| c != password) {
        problems.push(RegistrationProblem::PasswordMismatch);
    }
}

/// Collects everything wrong with `req`.
pub fn validate_registration(
    config: &RegistrationConfig,
    req: &RegistrationRequest,
) -> Vec<RegistrationProblem> {
    let mut problems = Vec::new();
    check_username(&mut problems, &req.username, Some(&config.forbidden_usernames));
    if !config.allowed_domains.iter().any(|d| d.eq_ignore_ascii_case(&req.domain)) {
        problems.push(RegistrationProblem::DomainNotAllowed);
    }
    check_contact(&mut problems, &req.name, &req.recovery_email);
    check_password(
        &mut problems,
        &req.password,
        Some(&req.password_confirm),
        config.min_password_length,
    );
    problems
}

/// Collects everything wrong with `req`. Administrators may use reserved
/// names.
pub fn validate_admin_add(
    config: &RegistrationConfig,
    req: &AdminAddRequest,
) -> Vec<RegistrationProblem> {
    let mut problems = Vec::new();
    check_username(&mut problems, &req.username, None);
    check_contact(&mut problems, &req.name, &req.recovery_email);
    check_password(&mut problems, &req.password, None, config.min_password_length);
    problems
}

/// Generates a fresh verification token of 32 hex digits.
pub fn new_token() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        *e,
        rusqlite::Error::SqliteFailure(ref e, _)
            if rusqlite::ErrorCode::ConstraintViolation == e.code
    )
}

pub struct Registrar<'a, P, N> {
    db: &'a mut Database,
    config: &'a RegistrationConfig,
    provisioner: P,
    notifier: N,
    log_prefix: LogPrefix,
}

impl<'a, P: Provisioner, N: Notifier> Registrar<'a, P, N> {
    pub fn new(
        db: &'a mut Database,
        config: &'a RegistrationConfig,
        provisioner: P,
        notifier: N,
        log_prefix: LogPrefix,
    ) -> Self {
        Self {
            db,
            config,
            provisioner,
            notifier,
            log_prefix,
        }
    }

    /// Registers a new account on behalf of a member of the public.
    pub fn register(&mut self, req: &RegistrationRequest) -> Result<AccountRecord, Error> {
        if !self.config.enabled {
            return Err(Error::RegistrationDisabled);
        }

        let problems = validate_registration(self.config, req);
        if !problems.is_empty() {
            return Err(Error::RegistrationRejected(problems));
        }

        let email = format!("{}@{}", req.username, req.domain).to_lowercase();
        if self.account_exists(&email)? {
            return Err(Error::AccountExists(email));
        }

        if self.registrations_from(&req.ip_address)? >= u64::from(self.config.max_accounts_per_ip)
        {
            warn!(
                "{} Registration of {} refused: too many from {}",
                self.log_prefix, email, req.ip_address
            );
            return Err(Error::TooManyRegistrations);
        }

        let (token, status) = if self.config.require_verification {
            (new_token(), AccountStatus::Pending)
        } else {
            (String::new(), AccountStatus::Active)
        };

        let record = self.create_account(
            AccountRecord {
                email,
                name: req.name.clone(),
                recovery_email: req.recovery_email.clone(),
                verification_token: token,
                status,
                created: UnixTimestamp::now(),
                verified: None,
                ip_address: req.ip_address.clone(),
            },
            &req.password,
        )?;

        if !record.verification_token.is_empty() {
            self.send_verification(&record);
        }
        if self.config.forward_to_admin {
            self.forward_to_admin(&record);
        }

        Ok(record)
    }

    /// Creates an account in the configured domain on an administrator's
    /// behalf. No verification is involved.
    pub fn admin_add(&mut self, req: &AdminAddRequest) -> Result<AccountRecord, Error> {
        let problems = validate_admin_add(self.config, req);
        if !problems.is_empty() {
            return Err(Error::RegistrationRejected(problems));
        }

        let email = format!("{}@{}", req.username, self.config.domain).to_lowercase();
        if self.account_exists(&email)? {
            return Err(Error::AccountExists(email));
        }

        let now = UnixTimestamp::now();
        self.create_account(
            AccountRecord {
                email,
                name: req.name.clone(),
                recovery_email: req.recovery_email.clone(),
                verification_token: String::new(),
                status: req.status,
                created: now,
                verified: Some(now).filter(|_| AccountStatus::Active == req.status),
                ip_address: String::new(),
            },
            &req.password,
        )
    }

    /// Whether the mailbox `email` exists, or is at least registered.
    ///
    /// The registration table is authoritative when the provisioning
    /// script cannot answer.
    pub fn account_exists(&mut self, email: &str) -> Result<bool, Error> {
        let registered = self
            .db
            .query_row(
                "SELECT 1 FROM `account_registration` WHERE `email` = ?",
                (email,),
                from_single::<i64>,
            )?
            .is_some();

        Ok(registered || Some(true) == self.provisioner.exists(email)?)
    }

    fn registrations_from(&self, ip_address: &str) -> Result<u64, Error> {
        let since = UnixTimestamp::now().seconds() - RATE_WINDOW_SECS;
        Ok(self
            .db
            .query_row(
                "SELECT COUNT(*) FROM `account_registration` \
                 WHERE `ip_address` = ? AND `created` > ?",
                (ip_address, since),
                from_single::<i64>,
            )?
            .unwrap_or(0)
            .max(0) as u64)
    }

    fn create_account(
        &mut self,
        record: AccountRecord,
        password: &str,
    ) -> Result<AccountRecord, Error> {
        let txn = self.db.write_tx()?;

        if let Err(e) = txn.execute(
            "INSERT INTO `account_registration` (\
             `email`, `name`, `recovery_email`, `verification_token`, \
             `status`, `created`, `verified`, `ip_address`\
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &record.email,
                &record.name,
                &record.recovery_email,
                &record.verification_token,
                record.status,
                record.created,
                record.verified,
                &record.ip_address,
            ),
        ) {
            if is_constraint_violation(&e) {
                return Err(Error::AccountExists(record.email));
            }
            return Err(e.into());
        }

        let outcome = self.provisioner.create(&record.email, password)?;
        if !outcome.success {
            txn.rollback()?;
            warn!(
                "{} Mailbox creation for {} failed: {}",
                self.log_prefix,
                record.email,
                outcome.output.trim()
            );
            return Err(Error::ProvisioningFailed {
                action: "create",
                output: outcome.output,
            });
        }

        txn.commit()?;
        info!(
            "{} Created account {} ({})",
            self.log_prefix, record.email, record.status
        );
        Ok(record)
    }

    /// Activates a pending account if `token` is its verification token.
    ///
    /// Tokens are single-use.
    pub fn verify(&mut self, email: &str, token: &str) -> Result<bool, Error> {
        if email.is_empty() || token.is_empty() {
            return Ok(false);
        }

        let affected = self.db.execute(
            "UPDATE `account_registration` \
             SET `status` = ?, `verification_token` = '', `verified` = ? \
             WHERE `email` = ? AND `verification_token` = ? \
             AND `verification_token` <> ''",
            (AccountStatus::Active, UnixTimestamp::now(), email, token),
        )?;

        if affected > 0 {
            info!("{} Verified account {}", self.log_prefix, email);
        } else {
            warn!("{} Bad verification attempt for {}", self.log_prefix, email);
        }
        Ok(affected > 0)
    }

    /// Removes the registration for `email` and destroys the mailbox.
    ///
    /// Returns whether a registration record existed. If the mailbox cannot
    /// be destroyed, the record is kept.
    pub fn delete(&mut self, email: &str) -> Result<bool, Error> {
        let txn = self.db.write_tx()?;
        let removed = txn.execute(
            "DELETE FROM `account_registration` WHERE `email` = ?",
            (email,),
        )?;

        let outcome = self.provisioner.delete(email)?;
        if !outcome.success {
            txn.rollback()?;
            warn!(
                "{} Mailbox deletion for {} failed: {}",
                self.log_prefix,
                email,
                outcome.output.trim()
            );
            return Err(Error::ProvisioningFailed {
                action: "delete",
                output: outcome.output,
            });
        }

        txn.commit()?;
        info!("{} Deleted account {}", self.log_prefix, email);
        Ok(removed > 0)
    }

    /// All registrations, newest first.
    pub fn list(&self) -> Result<Vec<AccountRecord>, Error> {
        self.db.query_rows(
            "SELECT * FROM `account_registration` \
             ORDER BY `created` DESC, `registration_id` DESC",
            (),
            from_row::<AccountRecord>,
        )
    }

    fn notify(&mut self, notification: Notification) {
        if let Err(e) = self.notifier.send(&notification) {
            warn!(
                "{} Failed to send \"{}\" to {}: {}",
                self.log_prefix, notification.subject, notification.to, e
            );
        }
    }

    fn send_verification(&mut self, record: &AccountRecord) {
        let url = self
            .config
            .verify_url
            .replace("{email}", &urlencoding::encode(&record.email))
            .replace("{token}", &urlencoding::encode(&record.verification_token));

        self.notify(Notification {
            from: self.config.admin_email.clone(),
            to: record.recovery_email.clone(),
            subject: "Verify your new account".to_owned(),
            body: format!(
                "Hello {},\n\n\
                 Your new mailbox {} has been created. Open the link below \
                 to activate it:\n\n{}\n\n\
                 If you did not request this account, ignore this message.",
                record.name, record.email, url,
            ),
        });
    }

    fn forward_to_admin(&mut self, record: &AccountRecord) {
        self.notify(Notification {
            from: self.config.admin_email.clone(),
            to: self.config.admin_email.clone(),
            subject: format!("New account registration: {}", record.email),
            body: format!(
                "Account: {}\nName: {}\nRecovery email: {}\nFrom: {}\nStatus: {}",
                record.email,
                record.name,
                record.recovery_email,
                record.ip_address,
                record.status,
            ),
        });
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::super::provision::ProvisionOutcome;
    use super::*;

    #[derive(Default)]
    struct MockProvisioner {
        mailboxes: HashSet<String>,
        fail: bool,
        unknown_existence: bool,
    }

    impl Provisioner for MockProvisioner {
        fn create(&mut self, email: &str, _password: &str) -> Result<ProvisionOutcome, Error> {
            if self.fail {
                return Ok(ProvisionOutcome {
                    success: false,
                    output: "Error: quota service unavailable\n".to_owned(),
                });
            }

            self.mailboxes.insert(email.to_owned());
            Ok(ProvisionOutcome {
                success: true,
                output: format!("User {} added successfully\n", email),
            })
        }

        fn delete(&mut self, email: &str) -> Result<ProvisionOutcome, Error> {
            if self.fail {
                return Ok(ProvisionOutcome {
                    success: false,
                    output: "Error: busy\n".to_owned(),
                });
            }

            self.mailboxes.remove(email);
            Ok(ProvisionOutcome {
                success: true,
                output: format!("User {} deleted successfully\n", email),
            })
        }

        fn exists(&mut self, email: &str) -> Result<Option<bool>, Error> {
            if self.unknown_existence {
                Ok(None)
            } else {
                Ok(Some(self.mailboxes.contains(email)))
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Vec<Notification>,
    }

    impl Notifier for RecordingNotifier {
        fn send(&mut self, notification: &Notification) -> Result<(), Error> {
            self.sent.push(notification.clone());
            Ok(())
        }
    }

    struct Fixture {
        db: Database,
        config: RegistrationConfig,
        provisioner: MockProvisioner,
        notifier: RecordingNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            crate::init_test_log();
            Self {
                db: Database::open_in_memory(&LogPrefix::new("test".to_owned())).unwrap(),
                config: RegistrationConfig::default(),
                provisioner: MockProvisioner::default(),
                notifier: RecordingNotifier::default(),
            }
        }

        fn registrar(
            &mut self,
        ) -> Registrar<'_, &mut MockProvisioner, &mut RecordingNotifier> {
            Registrar::new(
                &mut self.db,
                &self.config,
                &mut self.provisioner,
                &mut self.notifier,
                LogPrefix::new("accounts".to_owned()),
            )
        }
    }

    fn request(username: &str) -> RegistrationRequest {
        RegistrationRequest {
            username: username.to_owned(),
            domain: "example.com".to_owned(),
            name: "Jane Doe".to_owned(),
            recovery_email: "jane@elsewhere.example".to_owned(),
            password: "correct horse".to_owned(),
            password_confirm: "correct horse".to_owned(),
            ip_address: "192.0.2.1".to_owned(),
        }
    }

    #[test]
    fn validation_collects_every_problem() {
        let config = RegistrationConfig::default();
        let problems = validate_registration(
            &config,
            &RegistrationRequest {
                username: "bad name".to_owned(),
                domain: "evil.example".to_owned(),
                name: " ".to_owned(),
                recovery_email: "nope".to_owned(),
                password: "short".to_owned(),
                password_confirm: "short".to_owned(),
                ip_address: String::new(),
            },
        );
        assert_eq!(
            vec![
                RegistrationProblem::UsernameInvalid,
                RegistrationProblem::DomainNotAllowed,
                RegistrationProblem::NameRequired,
                RegistrationProblem::RecoveryEmailInvalid,
                RegistrationProblem::PasswordTooShort(8),
            ],
            problems
        );

        let mut req = request("Postmaster");
        req.password_confirm = "something else".to_owned();
        assert_eq!(
            vec![
                RegistrationProblem::UsernameForbidden,
                RegistrationProblem::PasswordMismatch,
            ],
            validate_registration(&config, &req)
        );

        assert!(validate_registration(&config, &request("jane")).is_empty());
    }

    #[test]
    fn successful_registration() {
        let mut fixture = Fixture::new();
        let record = fixture.registrar().register(&request("Jane")).unwrap();

        assert_eq!("jane@example.com", record.email);
        assert_eq!(AccountStatus::Pending, record.status);
        assert_eq!(32, record.verification_token.len());
        assert!(fixture.provisioner.mailboxes.contains("jane@example.com"));

        // Verification mail plus the copy to the admin
        assert_eq!(2, fixture.notifier.sent.len());
        let verification = &fixture.notifier.sent[0];
        assert_eq!("jane@elsewhere.example", verification.to);
        assert!(verification.body.contains(&format!(
            "_email=jane%40example.com&_token={}",
            record.verification_token
        )));
        assert_eq!("admin@example.com", fixture.notifier.sent[1].to);

        let listed = fixture.registrar().list().unwrap();
        assert_eq!(vec![record], listed);
    }

    #[test]
    fn provisioning_failure_rolls_back() {
        let mut fixture = Fixture::new();
        fixture.provisioner.fail = true;

        match fixture.registrar().register(&request("jane")) {
            Err(Error::ProvisioningFailed { action, output }) => {
                assert_eq!("create", action);
                assert!(output.contains("quota service unavailable"));
            },
            r => panic!("unexpected result: {:?}", r),
        }

        assert!(fixture.registrar().list().unwrap().is_empty());
        assert!(fixture.notifier.sent.is_empty());

        // The failed attempt does not block a later one
        fixture.provisioner.fail = false;
        fixture.registrar().register(&request("jane")).unwrap();
    }

    #[test]
    fn existing_accounts_are_refused() {
        let mut fixture = Fixture::new();
        fixture.registrar().register(&request("jane")).unwrap();
        assert_matches!(
            Err(Error::AccountExists(_)),
            fixture.registrar().register(&request("jane"))
        );

        // Mailboxes created outside the registrar count too
        fixture
            .provisioner
            .mailboxes
            .insert("manual@example.com".to_owned());
        assert_matches!(
            Err(Error::AccountExists(_)),
            fixture.registrar().register(&request("manual"))
        );

        // Without an answer from the script, the table still counts
        fixture.provisioner.unknown_existence = true;
        assert_matches!(
            Err(Error::AccountExists(_)),
            fixture.registrar().register(&request("jane"))
        );
    }

    #[test]
    fn registrations_are_rate_limited() {
        let mut fixture = Fixture::new();
        fixture.config.max_accounts_per_ip = 2;

        fixture.registrar().register(&request("one")).unwrap();
        fixture.registrar().register(&request("two")).unwrap();
        assert_matches!(
            Err(Error::TooManyRegistrations),
            fixture.registrar().register(&request("three"))
        );

        let mut elsewhere = request("three");
        elsewhere.ip_address = "198.51.100.7".to_owned();
        fixture.registrar().register(&elsewhere).unwrap();
    }

    #[test]
    fn disabled_registration() {
        let mut fixture = Fixture::new();
        fixture.config.enabled = false;
        assert_matches!(
            Err(Error::RegistrationDisabled),
            fixture.registrar().register(&request("jane"))
        );

        // Administrators are unaffected
        let record = fixture
            .registrar()
            .admin_add(&AdminAddRequest {
                username: "postmaster".to_owned(),
                name: "Post Master".to_owned(),
                recovery_email: "pm@elsewhere.example".to_owned(),
                password: "long enough".to_owned(),
                status: AccountStatus::Active,
            })
            .unwrap();
        assert_eq!("postmaster@example.com", record.email);
        assert!(record.verified.is_some());
        assert!(fixture.notifier.sent.is_empty());
    }

    #[test]
    fn verification() {
        let mut fixture = Fixture::new();
        let record = fixture.registrar().register(&request("jane")).unwrap();
        let token = record.verification_token.clone();

        let mut registrar = fixture.registrar();
        assert!(!registrar.verify("jane@example.com", "wrong").unwrap());
        assert!(!registrar.verify("jane@example.com", "").unwrap());
        assert!(registrar.verify("jane@example.com", &token).unwrap());
        // Single use
        assert!(!registrar.verify("jane@example.com", &token).unwrap());

        let listed = registrar.list().unwrap();
        assert_eq!(AccountStatus::Active, listed[0].status);
        assert_eq!("", listed[0].verification_token);
        assert!(listed[0].verified.is_some());
    }

    #[test]
    fn no_verification_required() {
        let mut fixture = Fixture::new();
        fixture.config.require_verification = false;
        fixture.config.forward_to_admin = false;

        let record = fixture.registrar().register(&request("jane")).unwrap();
        assert_eq!(AccountStatus::Active, record.status);
        assert_eq!("", record.verification_token);
        assert!(fixture.notifier.sent.is_empty());
    }

    #[test]
    fn deletion() {
        let mut fixture = Fixture::new();
        fixture.registrar().register(&request("jane")).unwrap();

        fixture.provisioner.fail = true;
        assert_matches!(
            Err(Error::ProvisioningFailed { action: "delete", .. }),
            fixture.registrar().delete("jane@example.com")
        );
        assert_eq!(1, fixture.registrar().list().unwrap().len());

        fixture.provisioner.fail = false;
        assert!(fixture.registrar().delete("jane@example.com").unwrap());
        assert!(fixture.registrar().list().unwrap().is_empty());
        assert!(!fixture.provisioner.mailboxes.contains("jane@example.com"));
        assert!(!fixture.registrar().delete("jane@example.com").unwrap());
    }

    #[test]
    fn tokens() {
        let a = new_token();
        assert_eq!(32, a.len());
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, new_token());
    }

    #[test]
    fn verification_link_is_percent_encoded() {
        let mut fixture = Fixture::new();
        fixture.config.verify_url =
            "https://mail.example/verify?e={email}&t={token}".to_owned();
        let record = fixture.registrar().register(&request("jane+tag")).unwrap();

        let body = &fixture.notifier.sent[0].body;
        assert!(
            body.contains(&format!(
                "?e=jane%2Btag%40example.com&t={}",
                record.verification_token
            )),
            "{}",
            body
        );
    }
}
