//! Unix-socket [`ControlSource`] implementation.
//!
//! Binds a Unix stream socket and serves one connection at a time.  Each
//! line received is parsed as a JSON-encoded [`Control`] (see
//! [`control`](crate::control) for the wire format), e.g.
//!
//! ```text
//! $ echo '{"Focus":"Slack"}' | nc -U $XDG_RUNTIME_DIR/lackeys.sock
//! $ echo '"Reload"' | nc -U $XDG_RUNTIME_DIR/lackeys.sock
//! ```
//!
//! A `Key` line is answered with a [`Verdict`] line before the next line
//! is read, so an event tap bridge can keep one connection open and ask
//! about every event in turn.

use crate::control::{Control, Request, Verdict};
use crate::traits::ControlSource;
use log::{debug, error, info};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// A [`ControlSource`] that listens on a Unix stream socket for
/// JSON-encoded control messages.
pub struct UnixSocketListener {
    path: PathBuf,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("can't bind {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// How a connection ended.
enum Hangup {
    /// The client went away; wait for the next one.
    Client,
    /// Nobody consumes requests any more.
    Sink,
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](ControlSource::run) is called,
    /// replacing a stale one, and removed once the sink is closed.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn serve(&self, stream: UnixStream, sink: &mpsc::Sender<Request>) -> Hangup {
        let mut writer = match stream.try_clone() {
            Ok(writer) => writer,
            Err(e) => {
                error!("can't clone connection: {}", e);
                return Hangup::Client;
            }
        };
        for line in BufReader::new(stream).lines() {
            let text = match line {
                Ok(text) => text,
                Err(e) => {
                    error!("read error: {}", e);
                    break;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            let msg = match serde_json::from_str::<Control>(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("bad message: {}: {}", text, e);
                    continue;
                }
            };
            debug!("received {:?}", msg);

            if !matches!(msg, Control::Key(_)) {
                if sink.send(Request::new(msg)).is_err() {
                    return Hangup::Sink;
                }
                continue;
            }
            let (reply, verdict) = mpsc::channel();
            if sink.send(Request::with_reply(msg, reply)).is_err() {
                return Hangup::Sink;
            }
            // The dispatcher drops the reply channel unanswered only when
            // it is going away; the next send notices.
            let Ok(verdict) = verdict.recv() else {
                continue;
            };
            if let Err(e) = write_verdict(&mut writer, verdict) {
                error!("write error: {}", e);
                break;
            }
        }
        Hangup::Client
    }
}

fn write_verdict(out: &mut impl Write, verdict: Verdict) -> std::io::Result<()> {
    serde_json::to_writer(&mut *out, &verdict)?;
    out.write_all(b"\n")?;
    out.flush()
}

impl ControlSource for UnixSocketListener {
    type Error = SocketError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** indefinitely.  Run it on a dedicated thread.
    fn run(&mut self, sink: mpsc::Sender<Request>) -> Result<(), Self::Error> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path).map_err(|source| SocketError::Bind {
            path: self.path.clone(),
            source,
        })?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    debug!("client connected");
                    if let Hangup::Sink = self.serve(stream, &sink) {
                        info!("sink closed, shutting down");
                        let _ = std::fs::remove_file(&self.path);
                        return Ok(());
                    }
                    debug!("client disconnected");
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
        Ok(())
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::KeyEvent;
    use crate::engine::EventKind;
    use crate::keys::Modifiers;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("lackeys-test-{}-{}.sock", std::process::id(), id))
    }

    /// Start a listener and give it a moment to bind.
    fn start() -> (PathBuf, mpsc::Receiver<Request>) {
        let path = tmp_socket_path();
        let path_clone = path.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut listener = UnixSocketListener::new(&path_clone);
            let _ = listener.run(tx);
        });
        std::thread::sleep(Duration::from_millis(150));
        (path, rx)
    }

    /// Send `lines` over one connection and collect what arrived.  Key
    /// requests go unanswered.
    fn exchange(lines: &[&str]) -> Vec<Control> {
        let (path, rx) = start();
        {
            let mut stream = UnixStream::connect(&path).expect("connect");
            for line in lines {
                writeln!(stream, "{}", line).unwrap();
            }
            stream.shutdown(std::net::Shutdown::Write).unwrap();
        }

        let mut msgs = Vec::new();
        while let Ok(req) = rx.recv_timeout(Duration::from_millis(300)) {
            msgs.push(req.msg);
        }
        let _ = std::fs::remove_file(&path);
        msgs
    }

    #[test]
    fn round_trip_messages_over_socket() {
        let msgs = exchange(&[
            r#"{"Focus":"Slack"}"#,
            r#""Reload""#,
            r#"{"Key":{"kind":"KeyDown","keycode":4,"flags":1048576}}"#,
            r#"{"Focus":null}"#,
        ]);
        assert_eq!(
            msgs,
            vec![
                Control::Focus(Some("Slack".into())),
                Control::Reload,
                Control::Key(KeyEvent {
                    kind: EventKind::KeyDown,
                    keycode: 4,
                    repeat: false,
                    flags: Modifiers::COMMAND,
                }),
                Control::Focus(None),
            ]
        );
    }

    #[test]
    fn malformed_json_does_not_crash() {
        let msgs = exchange(&["not json at all", "", r#"{"Focus":null}"#]);
        // Only the valid message should have arrived.
        assert_eq!(msgs, vec![Control::Focus(None)]);
    }

    #[test]
    fn key_lines_are_answered_with_a_verdict() {
        let (path, rx) = start();
        // Stand-in dispatcher: shift key downs to the next code.
        std::thread::spawn(move || {
            for req in rx {
                let verdict = match req.msg {
                    Control::Key(KeyEvent {
                        kind: EventKind::KeyDown,
                        keycode,
                        ..
                    }) => Verdict::Replace {
                        keycode: keycode as u16 + 1,
                        flags: Modifiers::SHIFT,
                    },
                    _ => Verdict::Forward,
                };
                if let Some(reply) = req.reply {
                    reply.send(verdict).unwrap();
                }
            }
        });

        let mut stream = UnixStream::connect(&path).expect("connect");
        stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        for line in [
            r#"{"Key":{"kind":"KeyDown","keycode":4}}"#,
            r#"{"Focus":"Slack"}"#,
            r#"{"Key":{"kind":"KeyUp","keycode":4}}"#,
        ] {
            writeln!(stream, "{}", line).unwrap();
        }
        stream.shutdown(std::net::Shutdown::Write).unwrap();

        let replies: Vec<Verdict> = BufReader::new(stream)
            .lines()
            .map(|line| serde_json::from_str(&line.unwrap()).unwrap())
            .collect();
        assert_eq!(
            replies,
            vec![
                Verdict::Replace {
                    keycode: 5,
                    flags: Modifiers::SHIFT,
                },
                Verdict::Forward,
            ]
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn bind_failure_names_the_path() {
        let mut listener = UnixSocketListener::new("/nonexistent/dir/lackeys.sock");
        let (tx, _rx) = mpsc::channel();
        let err = listener.run(tx).unwrap_err();
        assert!(
            err.to_string().starts_with("can't bind /nonexistent/dir/lackeys.sock"),
            "{}",
            err
        );
    }
}
