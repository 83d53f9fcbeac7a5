//! Seams between the key engine and the outside world.
//!
//! The [`Dispatcher`](crate::dispatch::Dispatcher) never touches windows,
//! processes or sockets itself.  Side effects go through a
//! [`WindowManager`] and a [`Launcher`] on the effect thread, and control
//! messages arrive from any number of [`ControlSource`]s.

use crate::control::Request;
use crate::geometry::Rect;
use std::sync::mpsc;

/// Abstraction over whatever can report and move the frontmost window.
///
/// Rectangles use a top-left origin in global screen coordinates.
pub trait WindowManager {
    /// The error type produced by this window manager.
    type Error: std::error::Error + Send + 'static;

    /// Visible frames of all attached displays, in no particular order.
    fn screens(&self) -> Result<Vec<Rect>, Self::Error>;

    /// Bounds of the frontmost window, or `None` if there is none.
    fn frontmost_bounds(&self) -> Result<Option<Rect>, Self::Error>;

    /// Move and resize the frontmost window.
    fn set_frontmost_bounds(&self, bounds: Rect) -> Result<(), Self::Error>;
}

/// Runs the side effects that are not about windows.
pub trait Launcher {
    type Error: std::error::Error + Send + 'static;

    /// Open (or focus) an application by name.
    fn open_app(&self, name: &str) -> Result<(), Self::Error>;

    /// Hand a command line to the external runner.
    fn run_external(&self, command: &str) -> Result<(), Self::Error>;

    /// Ask the user for a line of text.  `None` means cancelled.
    fn prompt(&self) -> Result<Option<String>, Self::Error>;
}

//  Control Source

/// A source of [`Control`](crate::control::Control) messages: focus
/// changes, reload requests and key events.  Key events carry a reply
/// channel when the source can hand the verdict back.
///
/// # Contract
///
/// * [`run`](ControlSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received message is sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait ControlSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Forward every incoming message into `sink`.  Blocks the calling
    /// thread.
    fn run(&mut self, sink: mpsc::Sender<Request>) -> Result<(), Self::Error>;
}
