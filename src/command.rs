// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Shell command builder for remote execution.
//!
//! A [`Command`] is an ordered sequence of pipeline stages. Each stage has a
//! program, arguments, and the environment bindings that stage consumes.
//! Rendering produces a single string suitable for `sh -c` inside a pod.
//! Sensitive tokens are tracked so logs can show a redacted form without
//! altering the real command.

use std::fmt;

const REDACTED: &str = "***";

/// One program invocation within a piped command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stage {
    env: Vec<EnvVar>,
    program: Program,
    args: Vec<Arg>,
}

/// Program token of a stage. `Raw` is emitted verbatim, without quoting, so a
/// stage can defer binary resolution to the remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    Name(String),
    Raw(String),
}

impl Default for Program {
    fn default() -> Self {
        Program::Name(String::new())
    }
}

/// Environment binding attached to the stage that consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    name: String,
    value: String,
    sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Arg {
    value: String,
    sensitive: bool,
}

/// An ordered sequence of stages joined by pipes.
///
/// Builders are pure value objects: no validation of program availability is
/// performed (that is a remote-side concern), and structural equality lets
/// tests compare generated commands directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    stages: Vec<Stage>,
}

impl Command {
    /// Start a command with a single stage running `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            stages: vec![Stage {
                program: Program::Name(program.into()),
                ..Stage::default()
            }],
        }
    }

    /// Start a command whose first stage is a raw shell fragment, e.g.
    /// `"$(which mariadb-dump || which mysqldump)"`.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self {
            stages: vec![Stage {
                program: Program::Raw(fragment.into()),
                ..Stage::default()
            }],
        }
    }

    /// Append an argument to the current (last) stage.
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.last_stage().args.push(Arg {
            value: arg.into(),
            sensitive: false,
        });
        self
    }

    /// Append an argument that must be redacted in logs.
    pub fn arg_sensitive(&mut self, arg: impl Into<String>) -> &mut Self {
        self.last_stage().args.push(Arg {
            value: arg.into(),
            sensitive: true,
        });
        self
    }

    /// Bind an environment variable on the current stage.
    pub fn env(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.last_stage().env.push(EnvVar {
            name: name.into(),
            value: value.into(),
            sensitive: false,
        });
        self
    }

    /// Bind a sensitive environment variable (e.g. a password) on the current
    /// stage. The real value is rendered; logs get [`REDACTED`].
    pub fn env_sensitive(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.last_stage().env.push(EnvVar {
            name: name.into(),
            value: value.into(),
            sensitive: true,
        });
        self
    }

    /// Insert a pipe boundary and start a new stage running `program`.
    pub fn pipe(&mut self, program: impl Into<String>) -> &mut Self {
        self.stages.push(Stage {
            program: Program::Name(program.into()),
            ..Stage::default()
        });
        self
    }

    /// Insert a pipe boundary and start a new raw-fragment stage.
    pub fn pipe_raw(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.stages.push(Stage {
            program: Program::Raw(fragment.into()),
            ..Stage::default()
        });
        self
    }

    /// Render the real command string for remote execution.
    pub fn render(&self) -> String {
        self.render_with(false)
    }

    /// Render with sensitive tokens and bindings replaced, for logging.
    pub fn redacted(&self) -> String {
        self.render_with(true)
    }

    fn render_with(&self, redact: bool) -> String {
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                out.push_str(" | ");
            }
            for env in &stage.env {
                out.push_str(&env.name);
                out.push('=');
                let value = if redact && env.sensitive {
                    REDACTED
                } else {
                    &env.value
                };
                out.push('\'');
                out.push_str(&escape_single_quotes(value));
                out.push('\'');
                out.push(' ');
            }
            match &stage.program {
                Program::Name(name) => out.push_str(&quote(name)),
                Program::Raw(fragment) => out.push_str(fragment),
            }
            for arg in &stage.args {
                out.push(' ');
                if redact && arg.sensitive {
                    out.push_str(REDACTED);
                } else {
                    out.push_str(&quote(&arg.value));
                }
            }
        }
        out
    }

    fn last_stage(&mut self) -> &mut Stage {
        // Invariant: a Command always has at least one stage.
        self.stages.last_mut().expect("command has at least one stage")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Quote a token for POSIX sh if it contains characters outside the safe set.
fn quote(token: &str) -> String {
    if !token.is_empty() && token.chars().all(is_safe_char) {
        return token.to_string();
    }
    format!("'{}'", escape_single_quotes(token))
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | ',' | '@' | '%' | '+')
}

fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', r"'\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_stage_renders_program_and_args() {
        let mut cmd = Command::new("pg_dump");
        cmd.arg("--host=1.1.1.1").arg("--dbname=d");
        assert_eq!(cmd.render(), "pg_dump --host=1.1.1.1 --dbname=d");
    }

    #[test]
    fn env_binding_precedes_its_stage() {
        let mut cmd = Command::new("pg_dump");
        cmd.env_sensitive("PGPASSWORD", "hunter2").arg("--dbname=d");
        assert_eq!(cmd.render(), "PGPASSWORD='hunter2' pg_dump --dbname=d");
    }

    #[test]
    fn pipe_joins_stages() {
        let mut cmd = Command::new("pg_dump");
        cmd.arg("--dbname=d");
        cmd.pipe("gzip").arg("--force");
        assert_eq!(cmd.render(), "pg_dump --dbname=d | gzip --force");
    }

    #[test]
    fn env_attaches_to_current_stage_not_globally() {
        let mut cmd = Command::new("gunzip");
        cmd.arg("--force");
        cmd.pipe("psql").env("PGPASSWORD", "x").arg("--dbname=d");
        assert_eq!(cmd.render(), "gunzip --force | PGPASSWORD='x' psql --dbname=d");
    }

    #[test]
    fn raw_program_is_not_quoted() {
        let mut cmd = Command::raw(r#""$(which mariadb-dump || which mysqldump)""#);
        cmd.arg("--host=1.1.1.1");
        assert_eq!(
            cmd.render(),
            r#""$(which mariadb-dump || which mysqldump)" --host=1.1.1.1"#
        );
    }

    #[test]
    fn unsafe_args_are_quoted() {
        let mut cmd = Command::new("psql");
        cmd.arg("--command=SELECT datname FROM pg_database");
        assert_eq!(
            cmd.render(),
            "psql '--command=SELECT datname FROM pg_database'"
        );
    }

    #[test]
    fn single_quotes_are_escaped() {
        let mut cmd = Command::new("echo");
        cmd.arg("it's");
        assert_eq!(cmd.render(), r"echo 'it'\''s'");
    }

    #[test]
    fn redacted_masks_sensitive_tokens_only() {
        let mut cmd = Command::new("mongodump");
        cmd.env_sensitive("DUMMY", "secret")
            .arg("--username=u")
            .arg("--password")
            .arg_sensitive("secret");
        assert_eq!(
            cmd.redacted(),
            "DUMMY='***' mongodump --username=u --password ***"
        );
        // The real render is unchanged.
        assert_eq!(
            cmd.render(),
            "DUMMY='secret' mongodump --username=u --password secret"
        );
    }

    #[test]
    fn structural_equality() {
        let mut a = Command::new("pg_dump");
        a.env_sensitive("PGPASSWORD", "pw").arg("--dbname=d");
        let mut b = Command::new("pg_dump");
        b.env_sensitive("PGPASSWORD", "pw").arg("--dbname=d");
        assert_eq!(a, b);

        b.arg("--verbose");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_env_value_renders_empty_quotes() {
        let mut cmd = Command::new("pg_dump");
        cmd.env_sensitive("PGPASSWORD", "");
        assert_eq!(cmd.render(), "PGPASSWORD='' pg_dump");
    }
}
