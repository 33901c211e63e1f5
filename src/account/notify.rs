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

//! Outgoing notification mail.

use std::io::Write as _;
use std::process::{Command, Stdio};

use chrono::prelude::*;
use log::info;
use mail_builder::MessageBuilder;

use crate::support::error::Error;
use crate::support::system_config::NotificationConfig;

/// A plain-text message to hand off for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    /// Renders the message as RFC 5322 text.
    ///
    /// Non-ASCII header text is encoded as RFC 2047 words and the body gets
    /// a transfer encoding suited to its content.
    pub fn render(&self) -> Result<String, Error> {
        let message = MessageBuilder::new()
            .from(self.from.as_str())
            .to(self.to.as_str())
            .subject(self.subject.as_str())
            .date(Utc::now().timestamp())
            .text_body(self.body.as_str())
            .write_to_string()?;
        Ok(message)
    }
}

pub trait Notifier {
    fn send(&mut self, notification: &Notification) -> Result<(), Error>;
}

impl<T: Notifier + ?Sized> Notifier for &mut T {
    fn send(&mut self, notification: &Notification) -> Result<(), Error> {
        (**self).send(notification)
    }
}

/// Pipes messages into a sendmail-compatible command.
pub struct CommandNotifier {
    config: NotificationConfig,
}

impl CommandNotifier {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }
}

impl Notifier for CommandNotifier {
    fn send(&mut self, notification: &Notification) -> Result<(), Error> {
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(notification.render()?.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(Error::NotificationFailed(format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(
            "Sent \"{}\" to {}",
            notification.subject, notification.to
        );
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    fn notification() -> Notification {
        Notification {
            from: "admin@example.com".to_owned(),
            to: "user@elsewhere.example".to_owned(),
            subject: "Hello".to_owned(),
            body: "Line one\nLine two".to_owned(),
        }
    }

    fn headers(rendered: &str) -> &str {
        rendered.split("\r\n\r\n").next().unwrap()
    }

    #[test]
    fn rendering() {
        let rendered = notification().render().unwrap();
        let headers = headers(&rendered);
        assert!(headers.contains("admin@example.com"));
        assert!(headers.contains("user@elsewhere.example"));
        assert!(headers.contains("Subject: Hello\r\n"));
        assert!(headers.contains("Date: "));
        assert!(rendered.contains("Line one"));
        assert!(rendered.contains("Line two"));
    }

    #[test]
    fn non_ascii_headers_are_encoded() {
        let rendered = Notification {
            subject: "Bestätigung für Zoë".to_owned(),
            body: "Grüße".to_owned(),
            ..notification()
        }
        .render()
        .unwrap();

        let headers = headers(&rendered);
        assert!(headers.is_ascii(), "raw 8-bit header: {}", headers);
        assert!(headers.to_ascii_lowercase().contains("=?utf-8?"));
        assert!(!headers.contains("Bestätigung"));
    }

    #[test]
    fn command_receives_message() {
        let dir = TempDir::new().unwrap();
        let sink = dir.path().join("sink");

        let mut notifier = CommandNotifier::new(NotificationConfig {
            command: "/bin/sh".into(),
            args: vec![
                "-c".to_owned(),
                format!("cat > '{}'", sink.display()),
            ],
        });
        notifier.send(&notification()).unwrap();

        let written = std::fs::read_to_string(&sink).unwrap();
        assert!(written.contains("Subject: Hello"));
        assert!(written.contains("Line two"));
    }

    #[test]
    fn command_failure_is_reported() {
        let mut notifier = CommandNotifier::new(NotificationConfig {
            command: "/bin/sh".into(),
            args: vec![
                "-c".to_owned(),
                "cat > /dev/null; echo refused >&2; exit 3".to_owned(),
            ],
        });
        assert_matches!(
            Err(Error::NotificationFailed(_)),
            notifier.send(&notification())
        );
    }
}
