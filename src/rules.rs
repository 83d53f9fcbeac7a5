//! The binding rules file (`~/.lackeys` by default).
//!
//! The file is line oriented.  Blank lines and lines starting with `#` are
//! skipped; every other line is one command:
//!
//! ```text
//! # Vim-style arrows everywhere
//! bind Command H to send LeftArrow
//! bind Command L to send RightArrow
//!
//! leader L1 Option Slash
//! bind L1 T to open iTerm
//!
//! in Slack, Google Chrome
//! bind Command G to send Command K
//! ```
//!
//! * `in <App>[, <App>...]` switches the scopes that later `bind`s apply to.
//!   Bindings start out global.
//! * `leader L<1-9> <chord>` names a leader chord for later `bind`s.
//! * `bind [L<n>] <chord> to <action>` adds a binding to every current scope.
//!
//! Errors do not stop processing; each one is collected with its line
//! number and the rest of the file is still applied.

use crate::action::Action;
use crate::chord::Chord;
use crate::engine::Engine;
use log::{info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A problem on one line of the rules file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct LineError {
    /// 1-based.
    pub line: usize,
    pub message: String,
}

/// The rules file itself could not be used.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("can't create {}: {source}", path.display())]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("can't read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Applies rules text to an [`Engine`].
///
/// Leader names and the current scope list carry over between calls to
/// [`apply`](Self::apply).
#[derive(Debug)]
pub struct Rules<'e> {
    engine: &'e mut Engine,
    leaders: HashMap<String, Chord>,
    /// `None` stands for the global scope.
    scopes: Vec<Option<String>>,
    errors: Vec<LineError>,
    /// Line being applied, 1-based.
    line: usize,
}

impl<'e> Rules<'e> {
    pub fn new(engine: &'e mut Engine) -> Self {
        Self {
            engine,
            leaders: HashMap::new(),
            scopes: vec![None],
            errors: Vec::new(),
            line: 0,
        }
    }

    /// Scopes the next `bind` would apply to.
    pub fn scopes(&self) -> &[Option<String>] {
        &self.scopes
    }

    /// Errors collected so far.
    pub fn errors(&self) -> &[LineError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<LineError> {
        self.errors
    }

    /// Read the rules file at `path` and apply it.  A missing file is
    /// created empty.
    pub fn load(&mut self, path: &Path) -> Result<(), RuleError> {
        if !path.exists() {
            info!("creating empty rules file {}", path.display());
            return std::fs::write(path, "").map_err(|source| RuleError::Create {
                path: path.to_path_buf(),
                source,
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        info!("applying rules from {}", path.display());
        self.apply(&text);
        Ok(())
    }

    /// Apply rules text.  Problems are appended to [`errors`](Self::errors).
    pub fn apply(&mut self, text: &str) {
        for (index, line) in text.lines().enumerate() {
            self.line = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (command, args) = cleave(line);
            let outcome = match command {
                "in" => self.scope(args),
                "leader" => self.leader(args),
                "bind" => self.bind(args),
                _ => Err(format!("unrecognized configuration command: {}", command)),
            };
            if let Err(message) = outcome {
                self.oops(message);
            }
        }
    }

    fn oops(&mut self, message: String) {
        let error = LineError {
            line: self.line,
            message,
        };
        warn!("rules: {}", error);
        self.errors.push(error);
    }

    fn scope(&mut self, args: &str) -> Result<(), String> {
        let apps: Vec<Option<String>> = args
            .split(',')
            .map(str::trim)
            .filter(|app| !app.is_empty())
            .map(|app| Some(app.to_string()))
            .collect();
        if apps.is_empty() {
            return Err("missing list of application names".into());
        }
        self.scopes = apps;
        Ok(())
    }

    fn leader(&mut self, args: &str) -> Result<(), String> {
        let (name, desc) = cleave(args);
        if name.is_empty() || desc.is_empty() {
            return Err("leader command needs more information".into());
        }
        if !is_leader_name(name) {
            return Err("valid leader names are L1, L2 ... L9".into());
        }
        let chord = Chord::parse(self.engine.registry(), desc).map_err(|e| e.to_string())?;
        self.leaders.insert(name.to_string(), chord);
        Ok(())
    }

    /// Parsed step by step rather than with one pattern so each mistake gets
    /// its own message.
    fn bind(&mut self, args: &str) -> Result<(), String> {
        let Some((event, action_text)) = split_on_to(args) else {
            return Err("bind syntax is: bind [leader] <chord> to <action>".into());
        };
        if action_text.is_empty() {
            return Err("bind command is missing action".into());
        }

        let mut chord_text = event;
        let mut leader = None;
        let (first, rest) = cleave(event);
        if is_leader_name(first) {
            match self.leaders.get(first) {
                Some(chord) => leader = Some(*chord),
                None => return Err(format!("leader {} is unset", first)),
            }
            chord_text = rest;
        }

        if chord_text.is_empty() {
            return Err("bind command is missing a key chord".into());
        }
        let registry = self.engine.registry();
        let chord = Chord::parse(registry, chord_text)
            .map_err(|_| format!("{} is not a valid key combination", chord_text))?;
        let action = Action::parse(registry, action_text).map_err(|e| e.to_string())?;

        // A duplicate in one scope doesn't stop the binding in the others.
        let mut duplicates = Vec::new();
        for scope in &self.scopes {
            let bindings = self.engine.bindings(scope.as_deref());
            if bindings.has(leader, chord) {
                duplicates.push(match scope {
                    Some(app) => format!("{} is already bound in {}", event, app),
                    None => format!("{} is already bound", event),
                });
            } else {
                bindings.bind(leader, chord, action.clone());
            }
        }
        for message in duplicates {
            self.oops(message);
        }
        Ok(())
    }
}

/// Build a fresh engine from the rules file at `path`.
///
/// Line errors are returned alongside the engine, which holds every rule
/// that did parse.
pub fn load_engine(path: &Path) -> Result<(Engine, Vec<LineError>), RuleError> {
    let mut engine = Engine::default();
    let mut rules = Rules::new(&mut engine);
    rules.load(path)?;
    let errors = rules.into_errors();
    Ok((engine, errors))
}

/// Split at the first run of whitespace.  The remainder is trimmed.
fn cleave(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (text, ""),
    }
}

/// `L1` through `L9`.
fn is_leader_name(word: &str) -> bool {
    let bytes = word.as_bytes();
    bytes.len() == 2 && bytes[0] == b'L' && (b'1'..=b'9').contains(&bytes[1])
}

/// Split `"<event> to <action>"` at the first standalone word `to`.
fn split_on_to(args: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for word in args.split_whitespace() {
        let start = offset + args[offset..].find(word)?;
        let end = start + word.len();
        if word == "to" {
            return Some((args[..start].trim(), args[end..].trim()));
        }
        offset = end;
    }
    None
}
