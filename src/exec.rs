//! [`Launcher`] backed by a spawned opener and an append-only command feed.
//!
//! `order` commands are not executed here.  Each one is appended as a line
//! to the command-feed file, where an external runner (a shell loop
//! tailing the file, say) picks it up.

use crate::config::{Config, LauncherConfig};
use crate::traits::Launcher;
use log::{debug, info};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

/// Errors produced by the [`FeedLauncher`].
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("no open command configured")]
    NoOpenCommand,
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} {status}")]
    Exit { program: String, status: ExitStatus },
    #[error("can't write to {}: {source}", path.display())]
    Feed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Opens applications with a configured command and queues external
/// commands in a file.
#[derive(Debug, Clone)]
pub struct FeedLauncher {
    open_command: Vec<String>,
    feed: PathBuf,
}

impl FeedLauncher {
    pub fn new(launcher: &LauncherConfig, feed: impl AsRef<Path>) -> Self {
        Self {
            open_command: launcher.open_command.clone(),
            feed: feed.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.launcher, &config.paths.command_feed)
    }

    /// The command-feed file.
    pub fn feed(&self) -> &Path {
        &self.feed
    }
}

impl Launcher for FeedLauncher {
    type Error = ExecError;

    /// Runs the open command to completion.  The opener hands the
    /// application off and exits, so this only blocks the effect thread
    /// briefly.
    fn open_app(&self, name: &str) -> Result<(), ExecError> {
        let (program, args) = self
            .open_command
            .split_first()
            .ok_or(ExecError::NoOpenCommand)?;
        info!("opening {}", name);
        let mut child = Command::new(program)
            .args(args)
            .arg(name)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;
        let status = child.wait().map_err(|source| ExecError::Wait {
            program: program.clone(),
            source,
        })?;
        debug!("{} exited with {}", program, status);
        if !status.success() {
            return Err(ExecError::Exit {
                program: program.clone(),
                status,
            });
        }
        Ok(())
    }

    /// Appends `command` and a newline to the feed, creating it if needed.
    fn run_external(&self, command: &str) -> Result<(), ExecError> {
        let feed_error = |source| ExecError::Feed {
            path: self.feed.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.feed)
            .map_err(feed_error)?;
        writeln!(file, "{}", command).map_err(feed_error)?;
        debug!("queued {:?} in {}", command, self.feed.display());
        Ok(())
    }

    /// There is no prompt window; nothing is ever entered.
    fn prompt(&self) -> Result<Option<String>, ExecError> {
        debug!("prompt requested but no prompt UI is available");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    fn tmp_feed_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("lackeys-feed-test-{}-{}", std::process::id(), id))
    }

    fn launcher(open_command: &[&str], feed: &Path) -> FeedLauncher {
        let config = LauncherConfig {
            open_command: open_command.iter().map(|s| s.to_string()).collect(),
        };
        FeedLauncher::new(&config, feed)
    }

    #[test]
    fn run_external_appends_lines() {
        let path = tmp_feed_path();
        let _ = std::fs::remove_file(&path);
        let l = launcher(&["true"], &path);
        l.run_external("say hello").unwrap();
        l.run_external("make -C ~/src").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "say hello\nmake -C ~/src\n"
        );
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn run_external_reports_unwritable_feed() {
        let dir = tmp_feed_path();
        std::fs::create_dir_all(&dir).unwrap();
        let l = launcher(&["true"], &dir);
        let err = l.run_external("ls").unwrap_err();
        assert!(matches!(err, ExecError::Feed { .. }), "{}", err);
        let _ = std::fs::remove_dir(&dir);
    }

    #[test]
    fn open_app_needs_a_command() {
        let l = launcher(&[], &tmp_feed_path());
        assert!(matches!(l.open_app("Mail"), Err(ExecError::NoOpenCommand)));
    }

    #[test]
    fn open_app_reports_missing_program() {
        let l = launcher(&["/nonexistent/lackeys-opener"], &tmp_feed_path());
        let err = l.open_app("Mail").unwrap_err();
        assert!(
            err.to_string().starts_with("failed to spawn /nonexistent/lackeys-opener"),
            "{}",
            err
        );
    }

    /// Zombie children of this process whose command is `comm`.
    #[cfg(target_os = "linux")]
    fn zombies(comm: &str) -> usize {
        let me = std::process::id().to_string();
        let needle = format!("({})", comm);
        std::fs::read_dir("/proc")
            .unwrap()
            .filter_map(|entry| std::fs::read_to_string(entry.ok()?.path().join("stat")).ok())
            .filter(|stat| {
                // "pid (comm) state ppid ..."
                let Some(rest) = stat.rfind(')').map(|i| &stat[i + 1..]) else {
                    return false;
                };
                let mut fields = rest.split_whitespace();
                stat.contains(&needle) && fields.next() == Some("Z") && fields.next() == Some(me.as_str())
            })
            .count()
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn open_app_reaps_the_opener() {
        let l = launcher(&["true"], &tmp_feed_path());
        l.open_app("Mail").unwrap();
        l.open_app("Notes").unwrap();
        assert_eq!(zombies("true"), 0);
    }

    #[test]
    fn open_app_reports_a_failing_opener() {
        let l = launcher(&["false"], &tmp_feed_path());
        let err = l.open_app("Mail").unwrap_err();
        assert!(matches!(err, ExecError::Exit { .. }), "{}", err);
        assert!(err.to_string().starts_with("false exit"), "{}", err);
    }

    #[test]
    fn prompt_enters_nothing() {
        let l = launcher(&["true"], &tmp_feed_path());
        assert_eq!(l.prompt().unwrap(), None);
    }

    #[test]
    fn from_config_uses_paths() {
        let config = Config::default();
        let l = FeedLauncher::from_config(&config);
        assert_eq!(l.feed(), config.paths.command_feed.as_path());
    }
}
