//! Parsing of the plaintext command grammar.
//!
//! ```text
//! <Verb>_<kind>/<sessionId>/<field1>,<field2>,...
//! ```
//!
//! `kind` is `custom` or `matchmaking`, `sessionId` is `0` when the verb does
//! not address an existing session, and the field list may be empty.

use crate::error::GameError;
use crate::session::SessionKind;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    Join,
    Place,
    Skip,
    Resign,
    Timeout,
    Disconnect,
    States,
}

impl Verb {
    pub fn name(self) -> &'static str {
        match self {
            Verb::Create => "Create",
            Verb::Join => "Join",
            Verb::Place => "Place",
            Verb::Skip => "Skip",
            Verb::Resign => "Resign",
            Verb::Timeout => "Timeout",
            Verb::Disconnect => "Disconnect",
            Verb::States => "States",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Verb {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(Verb::Create),
            "Join" => Ok(Verb::Join),
            "Place" => Ok(Verb::Place),
            "Skip" => Ok(Verb::Skip),
            "Resign" => Ok(Verb::Resign),
            "Timeout" => Ok(Verb::Timeout),
            "Disconnect" => Ok(Verb::Disconnect),
            "States" => Ok(Verb::States),
            other => Err(GameError::InvalidCommand(format!("unknown verb '{other}'"))),
        }
    }
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: Verb,
    pub kind: SessionKind,
    pub session: u32,
    pub fields: Vec<String>,
}

impl Command {
    pub fn parse(text: &str) -> Result<Self, GameError> {
        let text = text.trim();
        let mut parts = text.splitn(3, '/');
        let head = parts.next().unwrap_or_default();
        let session = parts
            .next()
            .ok_or_else(|| GameError::InvalidCommand(format!("missing session id in '{text}'")))?;
        let fields = parts.next().unwrap_or_default();

        let (verb, kind) = head
            .split_once('_')
            .ok_or_else(|| GameError::InvalidCommand(format!("missing session kind in '{text}'")))?;

        let session = session
            .trim()
            .parse::<u32>()
            .map_err(|_| GameError::InvalidCommand(format!("bad session id '{session}'")))?;

        let fields = if fields.is_empty() {
            Vec::new()
        } else {
            fields.split(',').map(|f| f.trim().to_string()).collect()
        };

        Ok(Self {
            verb: verb.parse()?,
            kind: kind.parse()?,
            session,
            fields,
        })
    }

    /// The field at `index`, or an error naming what was expected there.
    pub fn field(&self, index: usize, name: &str) -> Result<&str, GameError> {
        self.fields
            .get(index)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                GameError::InvalidCommand(format!("{} expects field '{name}'", self.verb))
            })
    }

    pub fn parse_field<T: FromStr>(&self, index: usize, name: &str) -> Result<T, GameError> {
        let raw = self.field(index, name)?;
        raw.parse()
            .map_err(|_| GameError::InvalidCommand(format!("field '{name}' has bad value '{raw}'")))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}/{}/{}",
            self.verb,
            self.kind,
            self.session,
            self.fields.join(",")
        )
    }
}
