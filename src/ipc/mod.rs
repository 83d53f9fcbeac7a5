//! Control socket.
//!
//! The app-focus notifier, the event tap bridge and ad-hoc scripts connect
//! to the socket and send newline-delimited JSON [`Control`](crate::control::Control)
//! messages.  Key events are answered on the same connection.

pub mod listener;
