//! Decisions the engine can return for a key event.
//!
//! Key-class actions ([`Action::PassThrough`], [`Action::Discard`],
//! [`Action::Substitute`]) are applied to the keyboard event itself.  Every
//! other action is a side effect that the caller hands off to an
//! [`EffectRunner`](crate::effects::EffectRunner).
//!
//! # Grammar
//!
//! ```text
//! next                   move the frontmost window to the next screen
//! prompt                 ask for a line of text and run it as a command
//! send <chord>           substitute another chord
//! resize <x> <y> <w> <h> resize the frontmost window (see geometry)
//! open <app>             launch or focus an application
//! order <command>        hand a command to the external runner
//! ```

use crate::chord::{Chord, ChordError};
use crate::geometry::Tweaks;
use crate::keys::KeyRegistry;
use std::fmt;
use std::sync::Arc;

/// Why an action description could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("the {0} action takes no additional information")]
    UnexpectedArguments(String),
    #[error("the '{0}' action needs more information")]
    MissingArguments(String),
    #[error("invalid syntax for resize: {0}")]
    InvalidResize(String),
    #[error("unknown action: '{0}'")]
    UnknownVerb(String),
    #[error(transparent)]
    Chord(#[from] ChordError),
}

/// One decision per key event.
///
/// Payload strings are reference counted so that returning an action from
/// a binding table never allocates.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Let the event through unchanged.
    PassThrough,
    /// Swallow the event.
    Discard,
    /// Replace the event with another chord.
    Substitute(Chord),
    /// Open an application by name.
    LaunchApp(Arc<str>),
    /// Hand a command to the external runner.
    RunExternal(Arc<str>),
    /// Ask for a line of text, then run it externally.
    PromptForText,
    /// Move and resize the frontmost window.
    ResizeWindow(Tweaks),
    /// Move the frontmost window to the next display.
    MoveToNextScreen,
}

impl Action {
    /// Whether the action only affects the key event itself.  Only these may
    /// fire for auto-repeats and releases.
    pub fn is_key_class(&self) -> bool {
        match self {
            Action::PassThrough | Action::Discard | Action::Substitute(_) => true,
            Action::LaunchApp(_)
            | Action::RunExternal(_)
            | Action::PromptForText
            | Action::ResizeWindow(_)
            | Action::MoveToNextScreen => false,
        }
    }

    /// Parse an action such as `"send Command L"` or `"resize 0 0 50% 100%"`.
    pub fn parse(registry: &KeyRegistry, text: &str) -> Result<Self, ActionError> {
        let text = text.trim();
        let (verb, args) = match text.split_once(char::is_whitespace) {
            Some((verb, args)) => (verb, args.trim()),
            None => (text, ""),
        };

        match verb {
            "next" | "prompt" => {
                if !args.is_empty() {
                    return Err(ActionError::UnexpectedArguments(verb.to_string()));
                }
                Ok(if verb == "next" {
                    Action::MoveToNextScreen
                } else {
                    Action::PromptForText
                })
            }
            "send" | "resize" | "open" | "order" => {
                if args.is_empty() {
                    return Err(ActionError::MissingArguments(verb.to_string()));
                }
                match verb {
                    "send" => Ok(Action::Substitute(Chord::parse(registry, args)?)),
                    "resize" => Tweaks::parse(args)
                        .map(Action::ResizeWindow)
                        .ok_or_else(|| ActionError::InvalidResize(args.to_string())),
                    "open" => Ok(Action::LaunchApp(args.into())),
                    _ => Ok(Action::RunExternal(args.into())),
                }
            }
            _ => Err(ActionError::UnknownVerb(verb.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::PassThrough => write!(f, "pass"),
            Action::Discard => write!(f, "discard"),
            Action::Substitute(chord) => write!(f, "send {}", chord),
            Action::LaunchApp(name) => write!(f, "open {}", name),
            Action::RunExternal(command) => write!(f, "run {}", command),
            Action::PromptForText => write!(f, "prompt"),
            Action::ResizeWindow(tweaks) => write!(f, "resize {}", tweaks),
            Action::MoveToNextScreen => write!(f, "next"),
        }
    }
}
