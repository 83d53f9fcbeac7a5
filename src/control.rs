//! Messages delivered to the dispatcher.
//!
//! Everything that changes engine state is serialized through one queue of
//! [`Control`] messages, whether it comes from the event tap, the
//! app-focus notifier or a script talking to the control socket.
//!
//! # Wire format
//!
//! One JSON value per line:
//!
//! ```json
//! {"Focus":"Slack"}
//! {"Focus":null}
//! "Reload"
//! {"Key":{"kind":"KeyDown","keycode":4,"repeat":false,"flags":1048576}}
//! {"Key":{"kind":11,"keycode":4}}
//! ```
//!
//! `kind` is an [`EventKind`] name or a raw event type number; `repeat`
//! and `flags` may be omitted.
//!
//! Every `Key` message is answered with one [`Verdict`] line on the same
//! connection:
//!
//! ```json
//! "Forward"
//! "Suppress"
//! {"Replace":{"keycode":123,"flags":256}}
//! ```

use crate::engine::EventKind;
use crate::keys::Modifiers;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::mpsc;

/// One keyboard event as seen by the event tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub kind: EventKind,
    pub keycode: i64,
    #[serde(default)]
    pub repeat: bool,
    /// Raw event flags, device bits included.
    #[serde(default)]
    pub flags: Modifiers,
}

/// Every message the dispatcher understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Control {
    /// The frontmost application changed.  `None` when nothing has focus.
    Focus(Option<String>),
    /// Re-read the rules file.
    Reload,
    /// A keyboard event to classify.
    Key(KeyEvent),
}

/// What the event tap should do with the event it reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Deliver the event unchanged.
    Forward,
    /// Drop the event.
    Suppress,
    /// Deliver the event with a different key code and flags.
    Replace { keycode: u16, flags: Modifiers },
}

/// A [`Control`] message on its way to the dispatcher, with the channel its
/// [`Verdict`] goes back on.
#[derive(Debug)]
pub struct Request {
    pub msg: Control,
    pub reply: Option<mpsc::Sender<Verdict>>,
}

impl Request {
    /// A message nobody waits on.
    pub fn new(msg: Control) -> Self {
        Self { msg, reply: None }
    }

    pub fn with_reply(msg: Control, reply: mpsc::Sender<Verdict>) -> Self {
        Self {
            msg,
            reply: Some(reply),
        }
    }
}

impl From<Control> for Request {
    fn from(msg: Control) -> Self {
        Self::new(msg)
    }
}

/// Accepts `"KeyDown"` style names in any case, or the raw number.
fn parse_event_kind(s: &str) -> Option<EventKind> {
    let normalized: String = s
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(|c| c.to_lowercase())
        .collect();
    match normalized.as_str() {
        "keydown" | "down" => Some(EventKind::KeyDown),
        "keyup" | "up" => Some(EventKind::KeyUp),
        "flagschanged" => Some(EventKind::FlagsChanged),
        "other" => Some(EventKind::Other),
        _ => normalized.parse().ok().map(EventKind::from_raw),
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Visitor;
        struct V;
        impl<'de> Visitor<'de> for V {
            type Value = EventKind;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "event kind name or event type number")
            }
            fn visit_u64<E>(self, n: u64) -> Result<EventKind, E> {
                Ok(u32::try_from(n).map_or(EventKind::Other, EventKind::from_raw))
            }
            fn visit_i64<E>(self, n: i64) -> Result<EventKind, E> {
                Ok(u32::try_from(n).map_or(EventKind::Other, EventKind::from_raw))
            }
            fn visit_str<E>(self, s: &str) -> Result<EventKind, E>
            where
                E: DeError,
            {
                parse_event_kind(s)
                    .ok_or_else(|| DeError::custom(format!("invalid event kind: {:?}", s)))
            }
        }
        deserializer.deserialize_any(V)
    }
}
