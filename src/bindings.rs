//! Binding tables for one scope (global, or a single application).
//!
//! A [`Bindings`] holds:
//!
//! * a *normal* map from chord to action,
//! * a *leader* map from a leader chord to its own follower map,
//! * the one-shot *pending leader*, set while a leader press waits for the
//!   next key.
//!
//! Resolution of a gesture happens in [`Bindings::receive`], which records
//! key ownership in the engine's [`KeyTracker`] and filters out side effects
//! on repeats and releases, and `process`, which does the actual lookup.

use crate::action::Action;
use crate::chord::{Chord, Gesture};
use crate::engine::{KeyTracker, ScopeId};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Normal and leader key bindings for one scope.
#[derive(Debug)]
pub struct Bindings {
    id: ScopeId,
    description: Arc<str>,
    normal: HashMap<Chord, Action>,
    leaders: HashMap<Chord, HashMap<Chord, Action>>,
    /// Leader whose follower map is consulted by the next gesture.
    pending: Option<Chord>,
}

impl Bindings {
    pub(crate) fn new(id: ScopeId, description: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            description: description.into(),
            normal: HashMap::new(),
            leaders: HashMap::new(),
            pending: None,
        }
    }

    /// `"globals"` or the application name.
    pub fn description(&self) -> &Arc<str> {
        &self.description
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Bind `chord` to `action`, behind `leader` if one is given.
    ///
    /// An existing binding for the same leader and chord is replaced; use
    /// [`has`](Self::has) first to report duplicates.
    pub fn bind(&mut self, leader: Option<Chord>, chord: Chord, action: Action) {
        match leader {
            Some(leader) => {
                self.leaders.entry(leader).or_default().insert(chord, action);
            }
            None => {
                self.normal.insert(chord, action);
            }
        }
    }

    /// Whether [`bind`](Self::bind) was already called for this leader and
    /// chord.
    pub fn has(&self, leader: Option<Chord>, chord: Chord) -> bool {
        match leader {
            Some(leader) => self
                .leaders
                .get(&leader)
                .is_some_and(|followers| followers.contains_key(&chord)),
            None => self.normal.contains_key(&chord),
        }
    }

    /// Whether a leader press is waiting for its follower.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Handle one gesture for a key this scope owns, or is being offered.
    ///
    /// Returns `None` when nothing here matches, so the caller may try the
    /// next scope.  Repeats and releases never produce side-effecting
    /// actions: those are turned into [`Action::Discard`].
    pub fn receive(&mut self, gesture: &Gesture, keys: &mut KeyTracker) -> Option<Action> {
        let code = gesture.code();
        if gesture.is_repeat {
            key_class_only(self.process(gesture, keys))
        } else if gesture.is_press {
            keys.claim(code, self.id);
            self.process(gesture, keys)
        } else {
            keys.release(code);
            let action = self.process(gesture, keys);
            // Nothing follows a release, so a decision committed for this
            // key just now has no event left to apply to.
            keys.unignore(code);
            key_class_only(action)
        }
    }

    fn process(&mut self, gesture: &Gesture, keys: &mut KeyTracker) -> Option<Action> {
        let code = gesture.code();

        if let Some(leader) = self.pending.take() {
            // One shot: whatever this gesture is, the leader is spent.
            let action = self
                .leaders
                .get(&leader)
                .and_then(|followers| followers.get(&gesture.chord))
                .cloned();
            let replay = if action.is_some() {
                Action::Discard
            } else {
                Action::PassThrough
            };
            debug!(
                "{}: follower {} of {} -> {}",
                self.description,
                gesture.chord,
                leader,
                action.as_ref().map_or("unbound".into(), |a| a.to_string())
            );
            keys.ignore(code, replay);
            return action;
        }

        if self.leaders.contains_key(&gesture.chord) {
            debug!("{}: leader {} awaiting follower", self.description, gesture.chord);
            self.pending = Some(gesture.chord);
            keys.ignore(code, Action::Discard);
            return Some(Action::Discard);
        }

        self.normal.get(&gesture.chord).cloned()
    }
}

/// Keep key-class actions, suppress everything else.
fn key_class_only(action: Option<Action>) -> Option<Action> {
    match action {
        Some(action) if !action.is_key_class() => Some(Action::Discard),
        other => other,
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}
