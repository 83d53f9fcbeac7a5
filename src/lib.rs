//! **lackeys**: a keyboard remapping daemon.
//!
//! Every key event is classified by an [`engine::Engine`] into exactly one
//! [`action::Action`]: pass it through, swallow it, replace it with another
//! chord, or trigger a side effect such as opening an application.
//! Bindings are global or per application, and a *leader* chord can
//! introduce a second key, as in `Option-/ T`.
//!
//! # Architecture
//!
//! * [`keys`], [`chord`], [`action`] and [`geometry`] are the vocabulary,
//!   each with its own textual grammar.
//! * [`bindings`] and [`engine`] classify events.  They never block or do
//!   I/O.
//! * [`rules`] builds an engine from the rules file, and [`config`] holds
//!   the daemon settings.
//! * [`dispatch::Dispatcher`] is the single consumer of [`control::Control`]
//!   messages.  It answers key events with a [`control::Verdict`] and
//!   forwards side effects to an [`effects::EffectRunner`] on another
//!   thread.
//!
//! The outside world sits behind the traits in [`traits`]:
//! [`traits::WindowManager`], [`traits::Launcher`] and
//! [`traits::ControlSource`].  [`exec`] and [`ipc`] hold the concrete
//! implementations the daemon ships with.

pub mod action;
pub mod bindings;
pub mod chord;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod effects;
pub mod engine;
pub mod exec;
pub mod geometry;
pub mod ipc;
pub mod keys;
pub mod rules;
pub mod traits;
