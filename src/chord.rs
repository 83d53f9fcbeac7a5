//! Key chords and gestures.
//!
//! A [`Chord`] is one non-modifier key plus a set of modifier flags, e.g.
//! `Command Shift K`.  A [`Gesture`] is a chord observed as a single key
//! transition (press or release, possibly auto-repeated).
//!
//! # Grammar
//!
//! ```text
//! chord    := modifier* key
//! modifier := "Shift" | "Control" | "Option" | "Command" | <right-hand variants>
//! key      := any registered non-modifier key name
//! ```
//!
//! Tokens are whitespace separated and case-insensitive.  Modifier order
//! does not matter and repeated modifiers are harmless.

use crate::keys::{Key, KeyRegistry, Modifiers};
use std::fmt;

/// Why a chord description could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChordError {
    #[error("empty chord")]
    Empty,
    #[error("unknown key: {0}")]
    UnknownKey(String),
    #[error("unknown modifier key: {0}")]
    UnknownModifier(String),
    #[error("a key chord must not end with a modifier key")]
    EndsWithModifier,
    #[error("all keys in a chord except the last must be modifier keys")]
    NotAModifier,
}

/// A non-modifier key pressed together with zero or more modifiers.
///
/// Equality and hashing use the key code and the flag set only.  Callers
/// building a chord from a raw event must strip unrecognized flags first
/// (see [`Modifiers::recognized`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Chord {
    key: Key,
    flags: Modifiers,
}

impl Chord {
    pub fn new(key: Key, flags: Modifiers) -> Self {
        Self { key, flags }
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn flags(&self) -> Modifiers {
        self.flags
    }

    /// Parse a human-readable chord such as `"Command Shift K"`.
    pub fn parse(registry: &KeyRegistry, desc: &str) -> Result<Self, ChordError> {
        let mut tokens: Vec<&str> = desc.split_whitespace().collect();
        let key_name = tokens.pop().ok_or(ChordError::Empty)?;
        let key = registry
            .find_by_name(key_name)
            .ok_or_else(|| ChordError::UnknownKey(key_name.to_string()))?;
        if key.is_modifier() {
            return Err(ChordError::EndsWithModifier);
        }

        let mut flags = Modifiers::NONE;
        for name in tokens {
            let modifier = registry
                .find_by_name(name)
                .ok_or_else(|| ChordError::UnknownModifier(name.to_string()))?;
            if !modifier.is_modifier() {
                return Err(ChordError::NotAModifier);
            }
            flags = flags | modifier.flags();
        }
        Ok(Self { key, flags })
    }

    /// Debug rendering including the key code, e.g. `"[Shift Command] K (40)"`.
    pub fn revealed(&self) -> String {
        if self.flags.is_empty() {
            format!("{} ({})", self.key, self.key.code())
        } else {
            format!("[{}] {} ({})", self.flags, self.key, self.key.code())
        }
    }
}

/// Renders the form accepted by [`Chord::parse`], e.g. `"Shift Command K"`,
/// as long as only recognized modifiers are present.
impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{} {}", self.flags, self.key)
        }
    }
}

/// A single observed key transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gesture {
    pub chord: Chord,
    pub is_press: bool,
    pub is_repeat: bool,
}

impl Gesture {
    pub fn new(chord: Chord, is_press: bool, is_repeat: bool) -> Self {
        Self {
            chord,
            is_press,
            is_repeat,
        }
    }

    /// Code of the physical key behind this gesture.
    pub fn code(&self) -> u16 {
        self.chord.key().code()
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {}",
            if self.is_press { "down" } else { "up" },
            if self.is_repeat { " repeat" } else { "" },
            self.chord
        )
    }
}

#[cfg(test)]
pub(crate) fn chord(desc: &str) -> Chord {
    Chord::parse(KeyRegistry::standard(), desc).expect("test chord must parse")
}
