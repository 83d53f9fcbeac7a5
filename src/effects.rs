//! Side effects, run off the keyboard path.
//!
//! The dispatcher turns every non key-class [`Action`] into an [`Effect`]
//! and sends it over an [`mpsc`] channel.  An [`EffectRunner`] drains that
//! channel on its own thread, so launching a program or moving a window can
//! take as long as it likes.

use crate::action::Action;
use crate::geometry::{next_screen, Tweaks};
use crate::traits::{Launcher, WindowManager};
use log::{debug, error, info};
use std::fmt;
use std::sync::mpsc;
use std::sync::Arc;

/// Work handed from the dispatcher to the effect thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Launch(Arc<str>),
    Run(Arc<str>),
    /// Ask for a command, then run it.
    Prompt,
    Resize(Tweaks),
    NextScreen,
}

impl Effect {
    /// The effect behind a side-effecting action.  `None` for key-class
    /// actions.
    pub fn from_action(action: &Action) -> Option<Self> {
        match action {
            Action::PassThrough | Action::Discard | Action::Substitute(_) => None,
            Action::LaunchApp(name) => Some(Effect::Launch(name.clone())),
            Action::RunExternal(command) => Some(Effect::Run(command.clone())),
            Action::PromptForText => Some(Effect::Prompt),
            Action::ResizeWindow(tweaks) => Some(Effect::Resize(*tweaks)),
            Action::MoveToNextScreen => Some(Effect::NextScreen),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Launch(name) => write!(f, "open {}", name),
            Effect::Run(command) => write!(f, "run {}", command),
            Effect::Prompt => write!(f, "prompt"),
            Effect::Resize(tweaks) => write!(f, "resize {}", tweaks),
            Effect::NextScreen => write!(f, "next screen"),
        }
    }
}

/// Why an effect could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error("window manager error: {0}")]
    WindowManager(String),
    #[error("launcher error: {0}")]
    Launcher(String),
    #[error("no frontmost window")]
    NoWindow,
    #[error("no screens")]
    NoScreens,
}

/// Executes [`Effect`]s against a window manager and a launcher.
pub struct EffectRunner<W: WindowManager, L: Launcher> {
    wm: W,
    launcher: L,
}

impl<W: WindowManager, L: Launcher> EffectRunner<W, L> {
    pub fn new(wm: W, launcher: L) -> Self {
        Self { wm, launcher }
    }

    pub fn window_manager(&self) -> &W {
        &self.wm
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Run effects until every sender is gone.  Failures are logged and do
    /// not stop the loop.
    pub fn run(&self, effects: mpsc::Receiver<Effect>) {
        for effect in effects {
            if let Err(e) = self.apply(&effect) {
                error!("{} failed: {}", effect, e);
            }
        }
        info!("effect channel closed");
    }

    /// Carry out a single effect.
    pub fn apply(&self, effect: &Effect) -> Result<(), EffectError> {
        debug!("applying {}", effect);
        match effect {
            Effect::Launch(name) => self.launcher.open_app(name).map_err(launcher_error),
            Effect::Run(command) => self.launcher.run_external(command).map_err(launcher_error),
            Effect::Prompt => match self.launcher.prompt().map_err(launcher_error)? {
                Some(text) if !text.trim().is_empty() => {
                    info!("prompted for {}", text);
                    self.launcher.run_external(&text).map_err(launcher_error)
                }
                _ => {
                    debug!("prompt cancelled");
                    Ok(())
                }
            },
            Effect::Resize(tweaks) => {
                let bounds = self.frontmost()?;
                let screens = self.wm.screens().map_err(wm_error)?;
                let within = screens.first().copied().ok_or(EffectError::NoScreens)?;
                let target = tweaks.apply(bounds, within);
                debug!("resize {} -> {}", bounds, target);
                self.wm.set_frontmost_bounds(target).map_err(wm_error)
            }
            Effect::NextScreen => {
                let bounds = self.frontmost()?;
                let screens = self.wm.screens().map_err(wm_error)?;
                let target = next_screen(bounds, &screens).ok_or(EffectError::NoScreens)?;
                debug!("next screen {} -> {}", bounds, target);
                self.wm.set_frontmost_bounds(target).map_err(wm_error)
            }
        }
    }

    fn frontmost(&self) -> Result<crate::geometry::Rect, EffectError> {
        self.wm
            .frontmost_bounds()
            .map_err(wm_error)?
            .ok_or(EffectError::NoWindow)
    }
}

fn wm_error(e: impl std::error::Error) -> EffectError {
    EffectError::WindowManager(e.to_string())
}

fn launcher_error(e: impl std::error::Error) -> EffectError {
    EffectError::Launcher(e.to_string())
}
