//! Physical keys and modifier flags.
//!
//! A [`Key`] pairs a macOS virtual key code with a symbolic name.  Modifier
//! keys additionally carry the [`Modifiers`] bit they contribute to the
//! flags of a keyboard event; ordinary keys carry an empty flag set.
//!
//! The full set of keys lives in a [`KeyRegistry`] that is built once at
//! startup and never mutated afterwards.  Keys that are not in the registry
//! are deliberately unbindable: the engine passes them through untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Modifier flags as carried by a keyboard event.
///
/// The bit layout follows `CGEventFlags` so raw event flags can be wrapped
/// without translation.  Only [`Modifiers::RECOGNIZED`] bits take part in
/// chord matching; the rest are kept for diagnostics and for re-posting
/// substituted events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(u64);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const ALPHA_SHIFT: Modifiers = Modifiers(0x0001_0000);
    pub const SHIFT: Modifiers = Modifiers(0x0002_0000);
    pub const CONTROL: Modifiers = Modifiers(0x0004_0000);
    pub const OPTION: Modifiers = Modifiers(0x0008_0000);
    pub const COMMAND: Modifiers = Modifiers(0x0010_0000);
    pub const NUMERIC_PAD: Modifiers = Modifiers(0x0020_0000);
    pub const HELP: Modifiers = Modifiers(0x0040_0000);
    pub const SECONDARY_FN: Modifiers = Modifiers(0x0080_0000);
    pub const NON_COALESCED: Modifiers = Modifiers(0x0000_0100);

    /// The four modifier families that can appear in a chord.
    pub const RECOGNIZED: Modifiers =
        Modifiers(Self::SHIFT.0 | Self::CONTROL.0 | Self::OPTION.0 | Self::COMMAND.0);

    /// Wrap raw event flags.
    pub const fn from_bits(bits: u64) -> Self {
        Modifiers(bits)
    }

    /// The raw flag bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn union(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 | other.0)
    }

    #[inline]
    pub const fn intersection(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 & other.0)
    }

    /// Bits in `self` that are not in `other`.
    #[inline]
    pub const fn difference(self, other: Modifiers) -> Modifiers {
        Modifiers(self.0 & !other.0)
    }

    #[inline]
    pub const fn contains(self, other: Modifiers) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Drop every bit that chord matching does not care about
    /// (non-coalesced, numeric pad, caps lock, …).
    #[inline]
    pub const fn recognized(self) -> Modifiers {
        self.intersection(Self::RECOGNIZED)
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Display names in rendering order.  Only the four recognized families can
/// be parsed back; the rest show up when revealing raw event flags.
const MODIFIER_NAMES: [(Modifiers, &str); 9] = [
    (Modifiers::ALPHA_SHIFT, "AlphaShift"),
    (Modifiers::SHIFT, "Shift"),
    (Modifiers::CONTROL, "Control"),
    (Modifiers::OPTION, "Option"),
    (Modifiers::COMMAND, "Command"),
    (Modifiers::HELP, "Help"),
    (Modifiers::SECONDARY_FN, "Secondary"),
    (Modifiers::NUMERIC_PAD, "Numeric"),
    (Modifiers::NON_COALESCED, "NonCoalesced"),
];

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in MODIFIER_NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A physical key position.
///
/// Identity is the key code alone; the name and flags are attributes.
#[derive(Clone, Copy, Debug)]
pub struct Key {
    name: &'static str,
    code: u16,
    flags: Modifiers,
}

impl Key {
    const fn plain(name: &'static str, code: u16) -> Self {
        Self {
            name,
            code,
            flags: Modifiers::NONE,
        }
    }

    const fn modifier(name: &'static str, code: u16, flags: Modifiers) -> Self {
        Self { name, code, flags }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// The modifier bit this key contributes, empty for ordinary keys.
    pub fn flags(&self) -> Modifiers {
        self.flags
    }

    pub fn is_modifier(&self) -> bool {
        !self.flags.is_empty()
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

//  Virtual key codes

/// macOS virtual key codes (`kVK_*` from `Carbon.HIToolbox`).
pub mod code {
    pub const A: u16 = 0x00;
    pub const S: u16 = 0x01;
    pub const D: u16 = 0x02;
    pub const F: u16 = 0x03;
    pub const H: u16 = 0x04;
    pub const G: u16 = 0x05;
    pub const Z: u16 = 0x06;
    pub const X: u16 = 0x07;
    pub const C: u16 = 0x08;
    pub const V: u16 = 0x09;
    pub const B: u16 = 0x0B;
    pub const Q: u16 = 0x0C;
    pub const W: u16 = 0x0D;
    pub const E: u16 = 0x0E;
    pub const R: u16 = 0x0F;
    pub const Y: u16 = 0x10;
    pub const T: u16 = 0x11;
    pub const DIGIT_1: u16 = 0x12;
    pub const DIGIT_2: u16 = 0x13;
    pub const DIGIT_3: u16 = 0x14;
    pub const DIGIT_4: u16 = 0x15;
    pub const DIGIT_6: u16 = 0x16;
    pub const DIGIT_5: u16 = 0x17;
    pub const EQUAL: u16 = 0x18;
    pub const DIGIT_9: u16 = 0x19;
    pub const DIGIT_7: u16 = 0x1A;
    pub const MINUS: u16 = 0x1B;
    pub const DIGIT_8: u16 = 0x1C;
    pub const DIGIT_0: u16 = 0x1D;
    pub const RIGHT_BRACKET: u16 = 0x1E;
    pub const O: u16 = 0x1F;
    pub const U: u16 = 0x20;
    pub const LEFT_BRACKET: u16 = 0x21;
    pub const I: u16 = 0x22;
    pub const P: u16 = 0x23;
    pub const RETURN: u16 = 0x24;
    pub const L: u16 = 0x25;
    pub const J: u16 = 0x26;
    pub const QUOTE: u16 = 0x27;
    pub const K: u16 = 0x28;
    pub const SEMICOLON: u16 = 0x29;
    pub const BACKSLASH: u16 = 0x2A;
    pub const COMMA: u16 = 0x2B;
    pub const SLASH: u16 = 0x2C;
    pub const N: u16 = 0x2D;
    pub const M: u16 = 0x2E;
    pub const PERIOD: u16 = 0x2F;
    pub const TAB: u16 = 0x30;
    pub const SPACE: u16 = 0x31;
    pub const GRAVE: u16 = 0x32;
    pub const DELETE: u16 = 0x33;
    pub const ESCAPE: u16 = 0x35;
    pub const RIGHT_COMMAND: u16 = 0x36;
    pub const COMMAND: u16 = 0x37;
    pub const SHIFT: u16 = 0x38;
    pub const CAPS_LOCK: u16 = 0x39;
    pub const OPTION: u16 = 0x3A;
    pub const CONTROL: u16 = 0x3B;
    pub const RIGHT_SHIFT: u16 = 0x3C;
    pub const RIGHT_OPTION: u16 = 0x3D;
    pub const RIGHT_CONTROL: u16 = 0x3E;
    pub const FUNCTION: u16 = 0x3F;
    pub const F5: u16 = 0x60;
    pub const F6: u16 = 0x61;
    pub const F7: u16 = 0x62;
    pub const F3: u16 = 0x63;
    pub const F8: u16 = 0x64;
    pub const F9: u16 = 0x65;
    pub const F11: u16 = 0x67;
    pub const F10: u16 = 0x6D;
    pub const F12: u16 = 0x6F;
    pub const HOME: u16 = 0x73;
    pub const PAGE_UP: u16 = 0x74;
    pub const FORWARD_DELETE: u16 = 0x75;
    pub const F4: u16 = 0x76;
    pub const END: u16 = 0x77;
    pub const F2: u16 = 0x78;
    pub const PAGE_DOWN: u16 = 0x79;
    pub const F1: u16 = 0x7A;
    pub const LEFT_ARROW: u16 = 0x7B;
    pub const RIGHT_ARROW: u16 = 0x7C;
    pub const DOWN_ARROW: u16 = 0x7D;
    pub const UP_ARROW: u16 = 0x7E;
}

/// Every key the daemon knows about.  Caps Lock and Fn are left out on
/// purpose so they always pass through.
const STANDARD_KEYS: &[Key] = &[
    Key::plain("A", code::A),
    Key::plain("B", code::B),
    Key::plain("C", code::C),
    Key::plain("D", code::D),
    Key::plain("E", code::E),
    Key::plain("F", code::F),
    Key::plain("G", code::G),
    Key::plain("H", code::H),
    Key::plain("I", code::I),
    Key::plain("J", code::J),
    Key::plain("K", code::K),
    Key::plain("L", code::L),
    Key::plain("M", code::M),
    Key::plain("N", code::N),
    Key::plain("O", code::O),
    Key::plain("P", code::P),
    Key::plain("Q", code::Q),
    Key::plain("R", code::R),
    Key::plain("S", code::S),
    Key::plain("T", code::T),
    Key::plain("U", code::U),
    Key::plain("V", code::V),
    Key::plain("W", code::W),
    Key::plain("X", code::X),
    Key::plain("Y", code::Y),
    Key::plain("Z", code::Z),
    Key::plain("0", code::DIGIT_0),
    Key::plain("1", code::DIGIT_1),
    Key::plain("2", code::DIGIT_2),
    Key::plain("3", code::DIGIT_3),
    Key::plain("4", code::DIGIT_4),
    Key::plain("5", code::DIGIT_5),
    Key::plain("6", code::DIGIT_6),
    Key::plain("7", code::DIGIT_7),
    Key::plain("8", code::DIGIT_8),
    Key::plain("9", code::DIGIT_9),
    Key::plain("Grave", code::GRAVE),
    Key::plain("Minus", code::MINUS),
    Key::plain("Equal", code::EQUAL),
    Key::plain("LeftBracket", code::LEFT_BRACKET),
    Key::plain("RightBracket", code::RIGHT_BRACKET),
    Key::plain("Backslash", code::BACKSLASH),
    Key::plain("Semicolon", code::SEMICOLON),
    Key::plain("Quote", code::QUOTE),
    Key::plain("Comma", code::COMMA),
    Key::plain("Period", code::PERIOD),
    Key::plain("Slash", code::SLASH),
    Key::plain("Escape", code::ESCAPE),
    Key::plain("Delete", code::DELETE),
    Key::plain("ForwardDelete", code::FORWARD_DELETE),
    Key::plain("Tab", code::TAB),
    Key::plain("Return", code::RETURN),
    Key::plain("Space", code::SPACE),
    Key::plain("UpArrow", code::UP_ARROW),
    Key::plain("DownArrow", code::DOWN_ARROW),
    Key::plain("LeftArrow", code::LEFT_ARROW),
    Key::plain("RightArrow", code::RIGHT_ARROW),
    Key::plain("Home", code::HOME),
    Key::plain("End", code::END),
    Key::plain("PageUp", code::PAGE_UP),
    Key::plain("PageDown", code::PAGE_DOWN),
    Key::plain("F1", code::F1),
    Key::plain("F2", code::F2),
    Key::plain("F3", code::F3),
    Key::plain("F4", code::F4),
    Key::plain("F5", code::F5),
    Key::plain("F6", code::F6),
    Key::plain("F7", code::F7),
    Key::plain("F8", code::F8),
    Key::plain("F9", code::F9),
    Key::plain("F10", code::F10),
    Key::plain("F11", code::F11),
    Key::plain("F12", code::F12),
    Key::modifier("Shift", code::SHIFT, Modifiers::SHIFT),
    Key::modifier("Control", code::CONTROL, Modifiers::CONTROL),
    Key::modifier("Option", code::OPTION, Modifiers::OPTION),
    Key::modifier("Command", code::COMMAND, Modifiers::COMMAND),
    // Right-hand variants share the left-hand flag.  They are never
    // dispatched on their own, but naming them keeps logs readable.
    Key::modifier("Shift_R", code::RIGHT_SHIFT, Modifiers::SHIFT),
    Key::modifier("Control_R", code::RIGHT_CONTROL, Modifiers::CONTROL),
    Key::modifier("Option_R", code::RIGHT_OPTION, Modifiers::OPTION),
    Key::modifier("Command_R", code::RIGHT_COMMAND, Modifiers::COMMAND),
];

//  Registry

/// Immutable name ↔ code lookup tables.
///
/// Names are matched case-insensitively.  Build one with
/// [`KeyRegistry::standard`]; the result is shared for the whole process.
#[derive(Debug)]
pub struct KeyRegistry {
    by_name: HashMap<String, Key>,
    by_code: HashMap<u16, Key>,
}

static STANDARD: OnceLock<KeyRegistry> = OnceLock::new();

impl KeyRegistry {
    fn from_keys(keys: &[Key]) -> Self {
        let mut registry = Self {
            by_name: HashMap::with_capacity(keys.len()),
            by_code: HashMap::with_capacity(keys.len()),
        };
        for key in keys {
            registry.by_name.insert(key.name.to_ascii_lowercase(), *key);
            registry.by_code.insert(key.code, *key);
        }
        registry
    }

    /// The process-wide registry of standard keys.
    ///
    /// The tables are built on first call; later calls return the same
    /// instance.
    pub fn standard() -> &'static KeyRegistry {
        STANDARD.get_or_init(|| Self::from_keys(STANDARD_KEYS))
    }

    /// Look a key up by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<Key> {
        self.by_name.get(&name.to_ascii_lowercase()).copied()
    }

    /// Look a key up by virtual key code.
    pub fn find_by_code(&self, code: u16) -> Option<Key> {
        self.by_code.get(&code).copied()
    }

    /// The left-hand modifier keys, in chord rendering order.
    pub fn modifiers(&self) -> impl Iterator<Item = Key> + '_ {
        ["Shift", "Control", "Option", "Command"]
            .into_iter()
            .filter_map(|name| self.find_by_name(name))
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
