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

//! Creation and removal of mailboxes on the mail server.
//!
//! The mail server is managed by an external script. Its exit status is not
//! meaningful; success is judged from what it prints.

use std::path::Path;
use std::process::Command;

use log::{debug, warn};

use crate::support::error::Error;
use crate::support::system_config::{ProvisioningConfig, ScriptFlavour};

/// What a provisioning action reported.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub success: bool,
    /// Everything the script printed, for diagnostics.
    pub output: String,
}

pub trait Provisioner {
    /// Creates the mailbox `email` with the given password.
    fn create(&mut self, email: &str, password: &str) -> Result<ProvisionOutcome, Error>;

    /// Destroys the mailbox `email`.
    fn delete(&mut self, email: &str) -> Result<ProvisionOutcome, Error>;

    /// Whether the mailbox `email` exists, or `None` if that cannot be
    /// determined.
    fn exists(&mut self, email: &str) -> Result<Option<bool>, Error>;
}

impl<T: Provisioner + ?Sized> Provisioner for &mut T {
    fn create(&mut self, email: &str, password: &str) -> Result<ProvisionOutcome, Error> {
        (**self).create(email, password)
    }

    fn delete(&mut self, email: &str) -> Result<ProvisionOutcome, Error> {
        (**self).delete(email)
    }

    fn exists(&mut self, email: &str) -> Result<Option<bool>, Error> {
        (**self).exists(email)
    }
}

/// Drives the mailbox management script.
pub struct ScriptProvisioner {
    config: ProvisioningConfig,
}

impl ScriptProvisioner {
    pub fn new(config: ProvisioningConfig) -> Self {
        Self { config }
    }

    fn verb(&self, action: Action) -> &'static str {
        match (self.config.flavour, action) {
            (ScriptFlavour::Native, Action::Create) => "add",
            (ScriptFlavour::Native, Action::Delete) => "delete",
            (ScriptFlavour::Native, Action::Exists) => "exists",
            (ScriptFlavour::Docker, Action::Create) => "add-user",
            (ScriptFlavour::Docker, Action::Delete) => "delete-user",
            (ScriptFlavour::Docker, Action::Exists) => "check-user",
        }
    }

    fn run(&self, action: Action, args: &[&str]) -> Result<String, Error> {
        let script = &self.config.script;
        let working_dir = self
            .config
            .working_dir
            .as_deref()
            .or_else(|| script.parent())
            .unwrap_or_else(|| Path::new("/"));

        debug!(
            "Running {} {} for {}",
            script.display(),
            self.verb(action),
            args.first().copied().unwrap_or("")
        );

        let output = Command::new(script)
            .arg(self.verb(action))
            .args(args)
            .current_dir(working_dir)
            .output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            warn!(
                "{} {} exited with {}",
                script.display(),
                self.verb(action),
                output.status
            );
        }

        Ok(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Create,
    Delete,
    Exists,
}

/// Interprets the output of a create or delete action.
pub fn succeeded(output: &str) -> bool {
    output.contains("successfully")
}

/// Interprets the output of an existence check.
pub fn reports_existing(output: &str) -> bool {
    let output = output.to_lowercase();
    output.contains("exists") && !output.contains("not exist")
}

impl Provisioner for ScriptProvisioner {
    fn create(&mut self, email: &str, password: &str) -> Result<ProvisionOutcome, Error> {
        let output = self.run(Action::Create, &[email, password])?;
        Ok(ProvisionOutcome {
            success: succeeded(&output),
            output,
        })
    }

    fn delete(&mut self, email: &str) -> Result<ProvisionOutcome, Error> {
        let output = self.run(Action::Delete, &[email])?;
        Ok(ProvisionOutcome {
            success: succeeded(&output),
            output,
        })
    }

    fn exists(&mut self, email: &str) -> Result<Option<bool>, Error> {
        if !self.config.script.is_file() {
            return Ok(None);
        }

        Ok(Some(reports_existing(&self.run(Action::Exists, &[email])?)))
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    use tempfile::TempDir;

    use super::*;

    fn script(dir: &TempDir, body: &str) -> ScriptProvisioner {
        let path = dir.path().join("manage-users.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        ScriptProvisioner::new(ProvisioningConfig {
            script: path,
            working_dir: None,
            flavour: ScriptFlavour::Native,
        })
    }

    #[test]
    fn output_interpretation() {
        assert!(succeeded("User a@b.c added successfully\n"));
        assert!(!succeeded("Error: password too weak\n"));
        assert!(reports_existing("User a@b.c exists"));
        assert!(!reports_existing("User a@b.c does not exist"));
        assert!(!reports_existing(""));
    }

    #[test]
    fn script_is_invoked_with_verb_and_arguments() {
        let dir = TempDir::new().unwrap();
        let mut provisioner = script(
            &dir,
            r#"case "$1" in
  add) echo "User $2 with password $3 created successfully" ;;
  delete) echo "failed to delete $2" >&2; exit 1 ;;
  exists) echo "User $2 exists" ;;
esac"#,
        );

        let created = provisioner.create("a@example.com", "hunter22").unwrap();
        assert!(created.success);
        assert!(created.output.contains("a@example.com with password hunter22"));

        let deleted = provisioner.delete("a@example.com").unwrap();
        assert!(!deleted.success);
        assert!(deleted.output.contains("failed to delete a@example.com"));

        assert_eq!(Some(true), provisioner.exists("a@example.com").unwrap());
    }

    #[test]
    fn missing_script_cannot_answer_existence() {
        let mut provisioner = ScriptProvisioner::new(ProvisioningConfig {
            script: "/nonexistent/manage-users.sh".into(),
            working_dir: None,
            flavour: ScriptFlavour::Docker,
        });
        assert_eq!(None, provisioner.exists("a@example.com").unwrap());
        assert_matches!(Err(Error::Io(_)), provisioner.delete("a@example.com"));
    }
}
