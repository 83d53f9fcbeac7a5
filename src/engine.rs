//! The key event classification engine.
//!
//! [`Engine::handle`] is called once per keyboard event from the event tap
//! and returns exactly one [`Action`] for it.  It never blocks and never
//! fails: anything it does not understand is passed through.
//!
//! # Key ownership
//!
//! Rather than a state machine over arbitrary interleavings of presses and
//! releases, the engine remembers, per physical key, how that key's events
//! are to be handled until it is released:
//!
//! * **active keys** map a held key to the scope that took its press.
//!   Repeats and the release go straight back to that scope, even if the
//!   frontmost application changed in the meantime.
//! * **ignored keys** map a key resolved through a leader to a fixed action
//!   that is replayed, without any lookup, until its release arrives.
//!
//! A key is never in both tables at once.

use crate::action::Action;
use crate::bindings::Bindings;
use crate::chord::{Chord, Gesture};
use crate::keys::{KeyRegistry, Modifiers};
use log::{debug, info, trace};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Identifies one [`Bindings`] table inside an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }
}

/// Kind of event delivered by the event tap.
///
/// On the control socket this is the variant name or the raw event type
/// number (see [`control`](crate::control)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    FlagsChanged,
    Other,
}

impl EventKind {
    /// Map a raw `CGEventType` value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            10 => EventKind::KeyDown,
            11 => EventKind::KeyUp,
            12 => EventKind::FlagsChanged,
            _ => EventKind::Other,
        }
    }
}

/// Why [`Engine::handle`] decided what it did.  Diagnostic only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    UnwantedEvent,
    UnknownKey,
    ModifierKey,
    Ignored,
    /// Resolved by the named scope.
    By(Arc<str>),
    Unbound,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::UnwantedEvent => write!(f, "unwanted event"),
            Reason::UnknownKey => write!(f, "unknown key"),
            Reason::ModifierKey => write!(f, "modifier key"),
            Reason::Ignored => write!(f, "ignored"),
            Reason::By(scope) => write!(f, "by {}", scope),
            Reason::Unbound => write!(f, "unbound"),
        }
    }
}

//  Key tracking

/// Per-key continuity state shared by all scopes of an engine.
#[derive(Debug, Default)]
pub struct KeyTracker {
    active: HashMap<u16, ScopeId>,
    ignored: HashMap<u16, Action>,
}

impl KeyTracker {
    /// Record `owner` as the scope handling the key's current press.
    pub(crate) fn claim(&mut self, code: u16, owner: ScopeId) {
        self.ignored.remove(&code);
        self.active.insert(code, owner);
    }

    /// The key was released.
    pub(crate) fn release(&mut self, code: u16) {
        self.active.remove(&code);
    }

    /// Replay `action` for the key's remaining events instead of resolving
    /// them.
    pub(crate) fn ignore(&mut self, code: u16, action: Action) {
        self.active.remove(&code);
        self.ignored.insert(code, action);
    }

    pub(crate) fn unignore(&mut self, code: u16) {
        self.ignored.remove(&code);
    }

    /// The committed action for an ignored key.  A release ends the replay.
    fn replay(&mut self, code: u16, is_release: bool) -> Option<Action> {
        if is_release {
            self.ignored.remove(&code)
        } else {
            self.ignored.get(&code).cloned()
        }
    }

    /// Scope that owns the held key, if any.
    pub fn owner(&self, code: u16) -> Option<ScopeId> {
        self.active.get(&code).copied()
    }

    /// Action replayed for the key, if it is ignored.
    pub fn ignored(&self, code: u16) -> Option<&Action> {
        self.ignored.get(&code)
    }
}

//  Engine

/// Global and per-application bindings plus the per-key state that keeps
/// multi-event sequences consistent.
#[derive(Debug)]
pub struct Engine {
    registry: &'static KeyRegistry,
    scopes: Vec<Bindings>,
    global: Option<ScopeId>,
    apps: HashMap<String, ScopeId>,
    /// Bindings of the frontmost application, if it has any.
    active: Option<ScopeId>,
    keys: KeyTracker,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(KeyRegistry::standard())
    }
}

impl Engine {
    pub fn new(registry: &'static KeyRegistry) -> Self {
        Self {
            registry,
            scopes: Vec::new(),
            global: None,
            apps: HashMap::new(),
            active: None,
            keys: KeyTracker::default(),
        }
    }

    pub fn registry(&self) -> &'static KeyRegistry {
        self.registry
    }

    /// Bindings for the named application, or the global bindings for
    /// `None`.  The table is created on first use.
    pub fn bindings(&mut self, scope: Option<&str>) -> &mut Bindings {
        let id = match scope {
            None => match self.global {
                Some(id) => id,
                None => {
                    let id = self.add_scope("globals");
                    self.global = Some(id);
                    id
                }
            },
            Some(app) => match self.apps.get(app) {
                Some(&id) => id,
                None => {
                    let id = self.add_scope(app);
                    self.apps.insert(app.to_string(), id);
                    id
                }
            },
        };
        &mut self.scopes[id.0]
    }

    fn add_scope(&mut self, description: &str) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Bindings::new(id, description));
        id
    }

    /// The frontmost application changed.  Apps without bindings, and
    /// `None`, leave only the global bindings in effect.
    ///
    /// Keys already held keep going to the scope that took their press.
    pub fn set_app(&mut self, name: Option<&str>) {
        match name.and_then(|n| self.apps.get(n).copied()) {
            Some(id) => {
                info!("bindings {} now active", self.scopes[id.0]);
                self.active = Some(id);
            }
            None => {
                if self.active.take().is_some() {
                    info!("global bindings restored");
                }
            }
        }
    }

    /// Description of the active application scope.
    pub fn active_scope(&self) -> Option<&str> {
        self.active.map(|id| &self.scopes[id.0].description()[..])
    }

    /// Description of the scope that owns a held key.
    pub fn owner_of(&self, code: u16) -> Option<&str> {
        self.keys
            .owner(code)
            .map(|id| &self.scopes[id.0].description()[..])
    }

    /// Action being replayed for a key resolved through a leader.
    pub fn ignored(&self, code: u16) -> Option<&Action> {
        self.keys.ignored(code)
    }

    /// Decide what to do with one keyboard event.
    ///
    /// `flags` are the raw event flags; bits outside
    /// [`Modifiers::RECOGNIZED`] are ignored for matching.
    pub fn handle(
        &mut self,
        kind: EventKind,
        keycode: i64,
        is_repeat: bool,
        flags: Modifiers,
    ) -> (Action, Reason) {
        let is_press = match kind {
            EventKind::KeyDown => true,
            EventKind::KeyUp => false,
            EventKind::FlagsChanged | EventKind::Other => {
                trace!("pass unwanted event {:?}", kind);
                return (Action::PassThrough, Reason::UnwantedEvent);
            }
        };

        let Some(key) = u16::try_from(keycode)
            .ok()
            .and_then(|code| self.registry.find_by_code(code))
        else {
            trace!("pass unknown key {}", keycode);
            return (Action::PassThrough, Reason::UnknownKey);
        };

        if key.is_modifier() {
            trace!("pass modifier key {}", key);
            return (Action::PassThrough, Reason::ModifierKey);
        }

        let code = key.code();
        if let Some(action) = self.keys.replay(code, !is_press) {
            debug!("{} ignored -> {}", key, action);
            return (action, Reason::Ignored);
        }

        let gesture = Gesture::new(Chord::new(key, flags.recognized()), is_press, is_repeat);
        trace!("got {} = {}", gesture, code);

        if let Some(owner) = self.keys.owner(code) {
            let bindings = &mut self.scopes[owner.0];
            return match bindings.receive(&gesture, &mut self.keys) {
                Some(action) => {
                    debug!("  -> {} ({}, held)", action, bindings);
                    (action, Reason::By(bindings.description().clone()))
                }
                None => {
                    debug!("  -> pass ({}, held, unbound)", bindings);
                    (Action::PassThrough, Reason::Unbound)
                }
            };
        }

        for id in [self.active, self.global].into_iter().flatten() {
            let bindings = &mut self.scopes[id.0];
            if let Some(action) = bindings.receive(&gesture, &mut self.keys) {
                debug!("  -> {} ({})", action, bindings);
                return (action, Reason::By(bindings.description().clone()));
            }
        }

        debug!("  -> pass (fell through)");
        (Action::PassThrough, Reason::Unbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chord::chord;
    use crate::keys::code;
    use EventKind::{KeyDown, KeyUp};

    fn engine() -> Engine {
        let mut e = Engine::default();
        let globals = e.bindings(None);
        globals.bind(None, chord("Command H"), Action::Substitute(chord("LeftArrow")));
        globals.bind(None, chord("Command J"), Action::Substitute(chord("DownArrow")));
        globals.bind(None, chord("Command K"), Action::Substitute(chord("UpArrow")));
        globals.bind(None, chord("Command L"), Action::Substitute(chord("RightArrow")));
        globals.bind(
            Some(chord("Command Semicolon")),
            chord("G"),
            Action::LaunchApp("Google Chrome".into()),
        );
        let slack = e.bindings(Some("Slack"));
        slack.bind(None, chord("Command G"), Action::Substitute(chord("Command K")));
        slack.bind(None, chord("Command S"), Action::Substitute(chord("Command G")));
        let chrome = e.bindings(Some("Google Chrome"));
        chrome.bind(None, chord("Command G"), Action::Substitute(chord("Command L")));
        e
    }

    /// Feed one event and compare `"<action> <reason>"`.
    fn verify(e: &mut Engine, kind: EventKind, repeat: bool, desc: &str, expected: &str) {
        let c = chord(desc);
        let (action, reason) = e.handle(kind, i64::from(c.key().code()), repeat, c.flags());
        assert_eq!(format!("{} {}", action, reason), expected, "{:?} {}", kind, desc);
        assert_exclusive(e);
    }

    fn assert_exclusive(e: &Engine) {
        for code in e.keys.active.keys() {
            assert!(
                !e.keys.ignored.contains_key(code),
                "key {} is both active and ignored",
                code
            );
        }
    }

    fn owner(e: &Engine, key: &str) -> String {
        let code = chord(key).key().code();
        e.owner_of(code).unwrap_or("none").to_string()
    }

    #[test]
    fn engine_basics() {
        let mut e = engine();
        verify(&mut e, KeyDown, false, "M", "pass unbound");
        verify(&mut e, KeyDown, true, "M", "pass unbound");
        verify(&mut e, KeyUp, false, "M", "pass unbound");

        verify(&mut e, KeyDown, false, "Control Shift G", "pass unbound");
        verify(&mut e, KeyDown, true, "Control Shift G", "pass unbound");
        verify(&mut e, KeyUp, false, "Control Shift G", "pass unbound");

        verify(&mut e, KeyDown, false, "Command J", "send DownArrow by globals");
        verify(&mut e, KeyDown, true, "Command J", "send DownArrow by globals");
        verify(&mut e, KeyUp, false, "Command J", "send DownArrow by globals");
    }

    #[test]
    fn substitute_fires_on_press_repeat_and_release() {
        let mut e = engine();
        verify(&mut e, KeyDown, false, "Command H", "send LeftArrow by globals");
        verify(&mut e, KeyDown, true, "Command H", "send LeftArrow by globals");
        verify(&mut e, KeyUp, false, "Command H", "send LeftArrow by globals");
    }

    #[test]
    fn unwanted_unknown_and_modifier_events_pass() {
        let mut e = engine();
        assert_eq!(
            e.handle(EventKind::FlagsChanged, i64::from(code::COMMAND), false, Modifiers::COMMAND),
            (Action::PassThrough, Reason::UnwantedEvent)
        );
        assert_eq!(
            e.handle(EventKind::Other, i64::from(code::H), false, Modifiers::COMMAND),
            (Action::PassThrough, Reason::UnwantedEvent)
        );
        for unknown in [9999, -1, i64::from(code::CAPS_LOCK), i64::from(u16::MAX) + 1] {
            assert_eq!(
                e.handle(KeyDown, unknown, false, Modifiers::NONE),
                (Action::PassThrough, Reason::UnknownKey)
            );
        }
        assert_eq!(
            e.handle(KeyDown, i64::from(code::RIGHT_SHIFT), false, Modifiers::SHIFT),
            (Action::PassThrough, Reason::ModifierKey)
        );
        assert_exclusive(&e);
    }

    #[test]
    fn device_flags_do_not_affect_matching() {
        let mut e = engine();
        let flags = Modifiers::COMMAND | Modifiers::NON_COALESCED | Modifiers::NUMERIC_PAD;
        let (action, reason) = e.handle(KeyDown, i64::from(code::H), false, flags);
        assert_eq!(action, Action::Substitute(chord("LeftArrow")));
        assert_eq!(reason.to_string(), "by globals");
    }

    #[test]
    fn app_bindings_shadow_globals() {
        let mut e = engine();
        e.bindings(Some("Slack"))
            .bind(None, chord("Command J"), Action::Discard);
        verify(&mut e, KeyDown, false, "Command J", "send DownArrow by globals");
        verify(&mut e, KeyUp, false, "Command J", "send DownArrow by globals");
        e.set_app(Some("Slack"));
        verify(&mut e, KeyDown, false, "Command J", "discard by Slack");
        verify(&mut e, KeyUp, false, "Command J", "discard by Slack");
        // Unshadowed globals still apply.
        verify(&mut e, KeyDown, false, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyUp, false, "Command K", "send UpArrow by globals");
    }

    #[test]
    fn app_scope_follows_focus() {
        let mut e = engine();
        verify(&mut e, KeyDown, false, "Command G", "pass unbound");
        verify(&mut e, KeyUp, false, "Command G", "pass unbound");
        e.set_app(Some("Google Chrome"));
        assert_eq!(e.active_scope(), Some("Google Chrome"));
        verify(&mut e, KeyDown, false, "Command G", "send Command L by Google Chrome");
        verify(&mut e, KeyUp, false, "Command G", "send Command L by Google Chrome");
        e.set_app(Some("Finder"));
        assert_eq!(e.active_scope(), None);
        verify(&mut e, KeyDown, false, "Command G", "pass unbound");
        verify(&mut e, KeyUp, false, "Command G", "pass unbound");
    }

    #[test]
    fn held_keys_stay_with_their_scope_across_focus_changes() {
        let mut e = engine();

        verify(&mut e, KeyDown, false, "Command G", "pass unbound");
        verify(&mut e, KeyUp, false, "Command G", "pass unbound");
        verify(&mut e, KeyDown, false, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyDown, true, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyUp, false, "Command L", "send RightArrow by globals");

        // Not a configured app.
        e.set_app(Some("Chrome"));
        assert_eq!(owner(&e, "G"), "none");
        assert_eq!(owner(&e, "L"), "none");

        // Change apps with these keys down.
        verify(&mut e, KeyDown, false, "Command G", "pass unbound");
        verify(&mut e, KeyDown, false, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyDown, true, "Command L", "send RightArrow by globals");

        e.set_app(Some("Google Chrome"));
        assert_eq!(owner(&e, "G"), "globals");
        assert_eq!(owner(&e, "L"), "globals");

        // The releases go to the scope that took the press.
        verify(&mut e, KeyUp, false, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyUp, false, "Command G", "pass unbound");
        // A fresh press sees the new scope.
        verify(&mut e, KeyDown, false, "Command G", "send Command L by Google Chrome");
        verify(&mut e, KeyUp, false, "Command G", "send Command L by Google Chrome");

        // Change apps with these keys down.
        verify(&mut e, KeyDown, false, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyDown, true, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyDown, false, "Command G", "send Command L by Google Chrome");

        e.set_app(Some("Slack"));
        assert_eq!(owner(&e, "G"), "Google Chrome");
        assert_eq!(owner(&e, "L"), "globals");

        verify(&mut e, KeyDown, true, "Command G", "send Command L by Google Chrome");
        verify(&mut e, KeyUp, false, "Command G", "send Command L by Google Chrome");
        verify(&mut e, KeyUp, false, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyDown, false, "Command G", "send Command K by Slack");
        verify(&mut e, KeyUp, false, "Command G", "send Command K by Slack");
        verify(&mut e, KeyDown, false, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyDown, true, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyUp, false, "Command K", "send UpArrow by globals");

        e.set_app(None);
        assert_eq!(owner(&e, "G"), "none");
        assert_eq!(owner(&e, "L"), "none");
        assert_eq!(owner(&e, "K"), "none");

        verify(&mut e, KeyDown, false, "Command G", "pass unbound");
        verify(&mut e, KeyUp, false, "Command G", "pass unbound");
        verify(&mut e, KeyDown, false, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyUp, false, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyDown, true, "Command L", "send RightArrow by globals");
        verify(&mut e, KeyUp, false, "Command L", "send RightArrow by globals");
    }

    #[test]
    fn overlapping_presses_route_independently() {
        let mut e = engine();
        e.set_app(Some("Slack"));
        verify(&mut e, KeyDown, false, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyDown, false, "Command G", "send Command K by Slack");
        verify(&mut e, KeyUp, false, "Command G", "send Command K by Slack");
        verify(&mut e, KeyDown, true, "Command K", "send UpArrow by globals");
        verify(&mut e, KeyUp, false, "Command K", "send UpArrow by globals");
    }

    #[test]
    fn unbound_leader_key_after_leader_key() {
        let mut e = engine();
        verify(&mut e, KeyDown, false, "Command Semicolon", "discard by globals");
        verify(&mut e, KeyDown, true, "Command Semicolon", "discard ignored");
        verify(&mut e, KeyUp, false, "Command Semicolon", "discard ignored");
        verify(&mut e, KeyDown, false, "Command Semicolon", "pass unbound");
        verify(&mut e, KeyDown, true, "Command Semicolon", "pass ignored");
        verify(&mut e, KeyUp, false, "Command Semicolon", "pass ignored");
        // Back to normal afterwards.
        verify(&mut e, KeyDown, false, "Command Semicolon", "discard by globals");
    }

    #[test]
    fn leader_and_follower() {
        let mut e = engine();
        e.bindings(None)
            .bind(Some(chord("Option Slash")), chord("T"), Action::LaunchApp("iTerm".into()));

        verify(&mut e, KeyDown, false, "Option Slash", "discard by globals");
        verify(&mut e, KeyDown, false, "T", "open iTerm by globals");
        verify(&mut e, KeyDown, true, "T", "discard ignored");
        verify(&mut e, KeyUp, false, "T", "discard ignored");
        verify(&mut e, KeyUp, false, "Option Slash", "discard ignored");

        // A second leader press with a follower that is not bound.
        verify(&mut e, KeyDown, false, "Option Slash", "discard by globals");
        verify(&mut e, KeyDown, false, "X", "pass unbound");
        verify(&mut e, KeyUp, false, "X", "pass ignored");
        verify(&mut e, KeyUp, false, "Option Slash", "discard ignored");

        // The leader is spent; T is unbound on its own.
        verify(&mut e, KeyDown, false, "T", "pass unbound");
        verify(&mut e, KeyUp, false, "T", "pass unbound");

        // The leader chord as its own follower.
        verify(&mut e, KeyDown, false, "Option Slash", "discard by globals");
        verify(&mut e, KeyUp, false, "Option Slash", "discard ignored");
        verify(&mut e, KeyDown, false, "Option Slash", "pass unbound");
        verify(&mut e, KeyUp, false, "Option Slash", "pass ignored");
    }

    #[test]
    fn follower_survives_focus_change() {
        let mut e = engine();
        verify(&mut e, KeyDown, false, "Command Semicolon", "discard by globals");
        e.set_app(Some("Slack"));
        verify(&mut e, KeyUp, false, "Command Semicolon", "discard ignored");
        verify(&mut e, KeyDown, false, "G", "open Google Chrome by globals");
        e.set_app(None);
        verify(&mut e, KeyUp, false, "G", "discard ignored");
    }

    #[test]
    fn app_leader_with_global_fallthrough() {
        let mut e = engine();
        e.bindings(Some("Slack")).bind(
            Some(chord("Control Space")),
            chord("J"),
            Action::Substitute(chord("Command J")),
        );
        e.set_app(Some("Slack"));
        verify(&mut e, KeyDown, false, "Control Space", "discard by Slack");
        verify(&mut e, KeyDown, false, "J", "send Command J by Slack");
        verify(&mut e, KeyUp, false, "J", "discard ignored");
        verify(&mut e, KeyUp, false, "Control Space", "discard ignored");
        // The global leader still works while Slack is active.
        verify(&mut e, KeyDown, false, "Command Semicolon", "discard by globals");
        verify(&mut e, KeyDown, false, "G", "open Google Chrome by globals");
    }

    #[test]
    fn side_effects_never_repeat() {
        let mut e = engine();
        e.bindings(None).bind(None, chord("Command O"), Action::MoveToNextScreen);
        verify(&mut e, KeyDown, false, "Command O", "next by globals");
        verify(&mut e, KeyDown, true, "Command O", "discard by globals");
        verify(&mut e, KeyDown, true, "Command O", "discard by globals");
        verify(&mut e, KeyUp, false, "Command O", "discard by globals");
    }

    #[test]
    fn unbound_everywhere_passes() {
        let mut e = engine();
        e.set_app(Some("Slack"));
        for desc in ["Q", "Shift Q", "Command Option Q", "F5"] {
            verify(&mut e, KeyDown, false, desc, "pass unbound");
            verify(&mut e, KeyDown, true, desc, "pass unbound");
            verify(&mut e, KeyUp, false, desc, "pass unbound");
        }
    }

    #[test]
    fn bindings_are_created_once_per_scope() {
        let mut e = engine();
        let first = e.bindings(Some("Slack")).id();
        let again = e.bindings(Some("Slack")).id();
        let global = e.bindings(None).id();
        assert_eq!(first, again);
        assert_ne!(first, global);
        assert_eq!(e.bindings(None).description().as_ref(), "globals");
    }

    #[test]
    fn event_kind_from_raw() {
        assert_eq!(EventKind::from_raw(10), EventKind::KeyDown);
        assert_eq!(EventKind::from_raw(11), EventKind::KeyUp);
        assert_eq!(EventKind::from_raw(12), EventKind::FlagsChanged);
        assert_eq!(EventKind::from_raw(1), EventKind::Other);
    }
}
