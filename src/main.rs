//! Entry point for the **lackeys** daemon.
//!
//! Spawns the control socket listener and the effect runner on background
//! threads and dispatches control messages on the main thread.
//!
//! `lackeys --check` only parses the rules file and reports its errors.

use lackeys::config::{config_dir, Config};
use lackeys::control::Request;
use lackeys::dispatch::Dispatcher;
use lackeys::effects::{Effect, EffectRunner};
use lackeys::exec::FeedLauncher;
use lackeys::ipc::listener::UnixSocketListener;
use lackeys::rules;
use lackeys::traits::ControlSource;
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;
use std::sync::mpsc;

/// Try to load the config from `$XDG_CONFIG_HOME/lackeys/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load_optional(&path) {
        Ok(Some(cfg)) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Ok(None) => {
            info!("no config file at {}, using defaults", path.display());
            Config::default()
        }
        Err(e) => {
            warn!("{}, using defaults", e);
            Config::default()
        }
    }
}

//  No-op window manager

/// Window control needs the platform accessibility API, which this build
/// does not talk to.  Window effects fail with "no frontmost window".
mod noop_wm {
    use lackeys::geometry::Rect;
    use lackeys::traits::WindowManager;

    pub struct NoopWm;

    #[derive(Debug, thiserror::Error)]
    #[error("noop")]
    pub struct NoopWmError;

    impl WindowManager for NoopWm {
        type Error = NoopWmError;

        fn screens(&self) -> Result<Vec<Rect>, NoopWmError> {
            Ok(Vec::new())
        }

        fn frontmost_bounds(&self) -> Result<Option<Rect>, NoopWmError> {
            Ok(None)
        }

        fn set_frontmost_bounds(&self, _: Rect) -> Result<(), NoopWmError> {
            Ok(())
        }
    }
}

use noop_wm::NoopWm;

//  Main

fn main() -> ExitCode {
    env_logger::init();

    let config = load_config();
    if std::env::args().any(|a| a == "--check") {
        check_rules(&config.paths.rules)
    } else {
        run_daemon(config)
    }
}

/// Parse the rules file and print every error.
fn check_rules(path: &Path) -> ExitCode {
    match rules::load_engine(path) {
        Ok((_, errors)) if errors.is_empty() => {
            println!("{}: ok", path.display());
            ExitCode::SUCCESS
        }
        Ok((_, errors)) => {
            for e in &errors {
                println!("{}: {}", path.display(), e);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Normal daemon mode.
fn run_daemon(config: Config) -> ExitCode {
    let (mut dispatcher, errors) = match Dispatcher::from_rules(&config.paths.rules) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    for e in &errors {
        warn!("{}: {}", config.paths.rules.display(), e);
    }

    let (effect_tx, effect_rx) = mpsc::channel::<Effect>();
    dispatcher.set_effects(effect_tx);
    let launcher = FeedLauncher::from_config(&config);
    std::thread::spawn(move || EffectRunner::new(NoopWm, launcher).run(effect_rx));

    let (control_tx, control_rx) = mpsc::channel::<Request>();
    spawn_control_sources(control_tx, &config);

    info!("lackeys running");
    for request in control_rx {
        if let Err(e) = dispatcher.serve(request) {
            error!("control error: {}", e);
        }
    }
    info!("all control sources closed, exiting");
    ExitCode::SUCCESS
}

//  Helpers

fn spawn_control_sources(tx: mpsc::Sender<Request>, config: &Config) {
    let path = config.paths.socket.clone();
    std::thread::spawn(move || {
        let mut source = UnixSocketListener::new(&path);
        if let Err(e) = source.run(tx) {
            error!("socket listener error: {}", e);
        }
    });
}
