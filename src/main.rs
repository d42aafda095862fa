//! Terminal dashboard for the miqat engine.
//!
//! The binary is a thin view over the library:
//!
//! 1. Argument parsing and early exit for help/version
//! 2. Configuration loading and preference store setup
//! 3. Engine start on a current-thread tokio runtime
//! 4. Either a single settled snapshot (`--once`) or a follow loop that prints
//!    every published change until SIGINT/SIGTERM
//!
//! `--at` freezes the clock at a given local time through the global time
//! source; log lines then carry the simulated time.
//!
//! In follow mode, pressing Enter while a retryable failure is shown asks the
//! engine to try again.

#[macro_use]
extern crate miqat;

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use miqat::args::{self, CliAction, ParsedArgs};
use miqat::common::constants::{EXIT_FAILURE, EXIT_SUCCESS};
use miqat::config::{self, Config};
use miqat::core::{Companion, CompanionHandle, EngineStatus, LiveSnapshot};
use miqat::display::{render_dashboard, render_update};
use miqat::geo::ConfiguredLocation;
use miqat::logger::Log;
use miqat::schedule::{AladhanClient, CalculationMethod, PrayerSchedule};
use miqat::state::{FileStore, Preferences};
use miqat::time_source::{FixedTimeSource, init_time_source};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    let code = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            EXIT_SUCCESS
        }
        CliAction::ShowHelp => {
            args::display_help();
            EXIT_SUCCESS
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            EXIT_FAILURE
        }
        CliAction::Run {
            debug_enabled,
            config_dir,
            once,
            method,
            at,
        } => match run(debug_enabled, config_dir, once, method, at) {
            Ok(code) => code,
            Err(e) => {
                log_error_exit!("{:#}", e);
                EXIT_FAILURE
            }
        },
    };

    std::process::exit(code);
}

fn run(
    debug_enabled: bool,
    config_dir: Option<String>,
    once: bool,
    method: Option<CalculationMethod>,
    at: Option<String>,
) -> Result<i32> {
    Log::set_debug(debug_enabled);
    if let Some(at) = at {
        let clock = FixedTimeSource::at(&at).map_err(anyhow::Error::msg)?;
        init_time_source(Arc::new(clock));
    }
    log_version!();
    if debug_enabled {
        log_pipe!();
        log_debug!("Debug mode enabled - showing engine transitions");
    }

    config::set_config_dir(config_dir)?;
    let config = Config::load()?;
    config.log_config();

    let store = FileStore::for_config_dir(config::get_custom_config_dir().as_deref())?;
    log_debug!("Preferences stored at {}", store.path().display());
    let preferences = Preferences::new(Arc::new(store));
    preferences.log_preferences();

    if let Some(method) = method {
        preferences
            .set_calculation_method(method)
            .context("Failed to save calculation method")?;
        log_pipe!();
        log_info!("Calculation method set to {}", method);
    }

    let location =
        ConfiguredLocation::first_of([config.coordinate(), preferences.cached_coordinate()]);
    let client = AladhanClient::new(config.api_url(), config.request_timeout())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let companion = Companion::new(location, client, preferences)
        .with_default_method(config.calculation_method())
        .with_location_timeout(config.location_timeout())
        .with_heading_debounce(config.heading_debounce());

    runtime.block_on(serve(companion, once))
}

async fn serve(
    companion: Companion<ConfiguredLocation, AladhanClient>,
    once: bool,
) -> Result<i32> {
    let handle = companion.start();
    watch_signals(handle.clone())?;

    if once {
        Ok(show_once(&handle).await)
    } else {
        watch_stdin(handle.clone());
        follow(&handle).await;
        Ok(EXIT_SUCCESS)
    }
}

/// Shut the engine down on the first SIGINT or SIGTERM.
fn watch_signals(handle: CompanionHandle) -> Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            log_debug!("Received signal {}, shutting down", sig);
            handle.shutdown();
        }
    });
    Ok(())
}

/// Retry whichever step failed when the user presses Enter.
fn watch_stdin(handle: CompanionHandle) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            if line.is_err() || !handle.is_running() {
                break;
            }
            let snapshot = handle.snapshot();
            match snapshot.status {
                EngineStatus::ScheduleFailed { .. } => {
                    log_decorated!("Retrying schedule fetch...");
                    handle.retry();
                }
                _ if snapshot.uses_default_location() => {
                    log_decorated!("Retrying location...");
                    handle.retry_location();
                }
                _ => {}
            }
        }
    });
}

fn print_dashboard(snapshot: &LiveSnapshot) {
    log_block_start!("{}", snapshot.method);
    for line in render_dashboard(snapshot).lines() {
        log_indented!("{}", line);
    }
}

async fn show_once(handle: &CompanionHandle) -> i32 {
    let settled = handle.wait_for(|s| s.status.is_settled()).await;
    handle.shutdown();
    handle.stopped().await;

    match settled {
        Some(snapshot) => {
            print_dashboard(&snapshot);
            log_end!();
            if snapshot.status == EngineStatus::Live {
                EXIT_SUCCESS
            } else {
                EXIT_FAILURE
            }
        }
        None => {
            log_warning!("Stopped before a schedule was available");
            log_end!();
            EXIT_FAILURE
        }
    }
}

/// What was last printed in full.
#[derive(Default)]
struct Shown {
    status: Option<EngineStatus>,
    schedule: Option<Arc<PrayerSchedule>>,
}

impl Shown {
    fn differs_from(&self, snapshot: &LiveSnapshot) -> bool {
        let same_schedule = match (&self.schedule, &snapshot.schedule) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.status != Some(snapshot.status) || !same_schedule
    }
}

async fn follow(handle: &CompanionHandle) {
    let mut receiver = handle.subscribe();
    let mut shown = Shown::default();

    loop {
        let snapshot = receiver.borrow_and_update().clone();
        if snapshot.status.is_settled() && shown.differs_from(&snapshot) {
            print_dashboard(&snapshot);
        } else if shown.status != Some(snapshot.status) || snapshot.status == EngineStatus::Live {
            log_decorated!("{}", render_update(&snapshot));
        }
        shown = Shown {
            status: Some(snapshot.status),
            schedule: snapshot.schedule.clone(),
        };

        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = handle.stopped() => break,
        }
    }

    log_decorated!("Stopped");
    log_end!();
}
