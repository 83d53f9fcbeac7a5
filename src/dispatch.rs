//! The single consumer of the control queue.
//!
//! [`Dispatcher`] owns the [`Engine`] and applies [`Control`] messages to it
//! one at a time, so focus changes and reloads never race with key
//! classification.  Key events come back as a [`Verdict`] for the event tap
//! to apply; anything with a side effect is forwarded to the effect thread
//! without waiting for it.

use crate::action::Action;
use crate::control::{Control, KeyEvent, Request, Verdict};
use crate::effects::Effect;
use crate::engine::Engine;
use crate::keys::Modifiers;
use crate::rules::{self, LineError, RuleError};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// Possible errors from the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no rules file to reload")]
    NoRulesFile,
    #[error(transparent)]
    Rules(#[from] RuleError),
}

/// Routes control messages to the engine and effects to the effect thread.
#[derive(Debug)]
pub struct Dispatcher {
    engine: Engine,
    rules: Option<PathBuf>,
    focused: Option<String>,
    effects: Option<mpsc::Sender<Effect>>,
}

impl Dispatcher {
    /// Dispatch with an engine that was set up by the caller.  Such a
    /// dispatcher cannot reload.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            rules: None,
            focused: None,
            effects: None,
        }
    }

    /// Build the engine from a rules file.  Line errors are returned
    /// alongside; the engine holds every rule that parsed.
    pub fn from_rules(path: &Path) -> Result<(Self, Vec<LineError>), DispatchError> {
        let (engine, errors) = rules::load_engine(path)?;
        let mut dispatcher = Self::new(engine);
        dispatcher.rules = Some(path.to_path_buf());
        Ok((dispatcher, errors))
    }

    /// Attach the channel that side effects are sent to.  Without one,
    /// side effects are logged and dropped.
    pub fn set_effects(&mut self, tx: mpsc::Sender<Effect>) {
        self.effects = Some(tx);
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Name of the frontmost application as last reported.
    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Apply one control message.  Only key events produce a verdict.
    pub fn handle(&mut self, msg: Control) -> Result<Option<Verdict>, DispatchError> {
        match msg {
            Control::Focus(app) => {
                info!("frontmost application: {}", app.as_deref().unwrap_or("none"));
                self.engine.set_app(app.as_deref());
                self.focused = app;
                Ok(None)
            }
            Control::Reload => {
                self.reload()?;
                Ok(None)
            }
            Control::Key(event) => Ok(Some(self.on_key(event))),
        }
    }

    /// Apply one request and answer its sender, if it is waiting for a
    /// verdict.
    pub fn serve(&mut self, request: Request) -> Result<(), DispatchError> {
        let Request { msg, reply } = request;
        if let (Some(verdict), Some(reply)) = (self.handle(msg)?, reply) {
            if reply.send(verdict).is_err() {
                debug!("sender of {:?} stopped waiting", verdict);
            }
        }
        Ok(())
    }

    /// Classify one key event.  Never blocks.
    pub fn on_key(&mut self, event: KeyEvent) -> Verdict {
        let (action, reason) = self
            .engine
            .handle(event.kind, event.keycode, event.repeat, event.flags);
        debug!("{:?} {} -> {} {}", event.kind, event.keycode, action, reason);
        match action {
            Action::PassThrough => Verdict::Forward,
            Action::Discard => Verdict::Suppress,
            Action::Substitute(chord) => Verdict::Replace {
                keycode: chord.key().code(),
                flags: event
                    .flags
                    .difference(Modifiers::RECOGNIZED)
                    .union(chord.flags()),
            },
            other => {
                if let Some(effect) = Effect::from_action(&other) {
                    self.send_effect(effect);
                }
                Verdict::Suppress
            }
        }
    }

    fn send_effect(&self, effect: Effect) {
        match &self.effects {
            Some(tx) => {
                if tx.send(effect).is_err() {
                    warn!("effect runner is gone, dropping side effect");
                }
            }
            None => warn!("no effect runner, dropping {}", effect),
        }
    }

    /// Re-read the rules file into a fresh engine and swap it in.
    ///
    /// On a line error the rules that did parse still take effect.  If the
    /// file cannot be read at all the current engine is kept.  Keys held
    /// across a reload are forgotten.
    pub fn reload(&mut self) -> Result<Vec<LineError>, DispatchError> {
        let path = self.rules.as_deref().ok_or(DispatchError::NoRulesFile)?;
        let (mut engine, errors) = rules::load_engine(path)?;
        for error in &errors {
            warn!("{}: {}", path.display(), error);
        }
        engine.set_app(self.focused.as_deref());
        self.engine = engine;
        info!("reloaded rules from {} ({} error(s))", path.display(), errors.len());
        Ok(errors)
    }
}
