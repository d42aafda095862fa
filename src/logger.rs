//! Structured logging system with visual formatting.
//!
//! This module provides the box-drawing log style used throughout miqat. Every
//! line goes through [`Log::line`], which prepends the simulated-clock prefix
//! and hands the result to [`write_output`]. Output is flushed immediately so
//! the terminal stays in step with the live clock.
//!
//! The logger can be switched off for quiet operation during tests, and has a
//! separate debug switch so `log_debug!` lines only appear with `--debug`.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Severity of a tagged line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
    Debug,
}

impl Level {
    /// Coloured `[LEVEL]` tag as shown in the terminal.
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "[\x1b[32mINFO\x1b[0m]",
            Level::Warning => "[\x1b[33mWARNING\x1b[0m]",
            Level::Error => "[\x1b[31mERROR\x1b[0m]",
            Level::Debug => "[\x1b[36mDEBUG\x1b[0m]",
        }
    }
}

/// Main logging interface.
///
/// ## Line shapes
///
/// - **`log_block_start!`**: opens a block with an empty `┃` spacer, then `┣ message`
/// - **`log_decorated!`**: a line inside the current block, `┣ message`
/// - **`log_indented!`**: detail under the preceding line, `┃   message`
/// - **`log_pipe!`**: a lone `┃` spacer
/// - **`log_version!`**: the header, `┏ miqat vX.Y.Z ━━╸`
/// - **`log_end!`**: the closing `╹`
/// - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`**: `┣[LEVEL] message`
/// - **`log_error_exit!`**: a spacer followed by `┗[ERROR] message`, for fatal errors
pub struct Log;

impl Log {
    /// Enable or disable logging globally.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Timestamp prefix shown when the clock is simulated.
    ///
    /// Real-time runs return an empty string; the terminal already shows when a
    /// line was printed.
    pub fn get_timestamp_prefix() -> String {
        if crate::time_source::is_initialized() && crate::time_source::is_simulated() {
            format!("[{}] ", crate::time_source::now().format("%H:%M:%S"))
        } else {
            String::new()
        }
    }

    /// Print `lead` followed by `message` as one line.
    pub fn line(lead: &str, message: fmt::Arguments<'_>) {
        if Self::is_enabled() {
            write_output(&format!("{}{lead}{message}\n", Self::get_timestamp_prefix()));
        }
    }

    /// Same as [`Log::line`], preceded by an empty `┃` spacer.
    pub fn spaced(lead: &str, message: fmt::Arguments<'_>) {
        if Self::is_enabled() {
            let prefix = Self::get_timestamp_prefix();
            write_output(&format!("{prefix}┃\n{prefix}{lead}{message}\n"));
        }
    }

    /// Print a line tagged with its severity. Debug lines need `--debug`.
    pub fn tagged(level: Level, message: fmt::Arguments<'_>) {
        if level == Level::Debug && !Self::is_debug() {
            return;
        }
        Self::line(&format!("┣{} ", level.tag()), message);
    }

    /// Print a bare glyph line such as `┃` or `╹`.
    pub fn mark(glyph: &str) {
        Self::line(glyph, format_args!(""));
    }
}

/// Write already formatted text to stdout and flush.
pub fn write_output(text: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

// Every macro takes either a format string with arguments or a single
// displayable expression.

/// Log a line inside the current block.
#[macro_export]
macro_rules! log_decorated {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::line("┣ ", format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::line("┣ ", format_args!("{}", $expr))
    };
}

/// Log a detail line nested under the previous one.
#[macro_export]
macro_rules! log_indented {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::line("┃   ", format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::line("┃   ", format_args!("{}", $expr))
    };
}

/// Open a new block.
#[macro_export]
macro_rules! log_block_start {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::spaced("┣ ", format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::spaced("┣ ", format_args!("{}", $expr))
    };
}

#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::Log::mark("┃")
    };
}

#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::Log::mark("╹")
    };
}

/// Log the application header with the crate version.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::Log::line(
            "┏ ",
            format_args!("miqat v{} ━━╸", env!("CARGO_PKG_VERSION")),
        )
    };
}

#[macro_export]
macro_rules! log_info {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::tagged($crate::logger::Level::Info, format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::tagged($crate::logger::Level::Info, format_args!("{}", $expr))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::tagged($crate::logger::Level::Warning, format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::tagged($crate::logger::Level::Warning, format_args!("{}", $expr))
    };
}

#[macro_export]
macro_rules! log_error {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::tagged($crate::logger::Level::Error, format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::tagged($crate::logger::Level::Error, format_args!("{}", $expr))
    };
}

/// Log a debug line. Silent unless `--debug` was given.
#[macro_export]
macro_rules! log_debug {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::tagged($crate::logger::Level::Debug, format_args!($fmt $($arg)*))
    };
    ($expr:expr) => {
        $crate::logger::Log::tagged($crate::logger::Level::Debug, format_args!("{}", $expr))
    };
}

/// Log a fatal error that ends the program, closing the log block.
#[macro_export]
macro_rules! log_error_exit {
    ($fmt:literal $($arg:tt)*) => {
        $crate::logger::Log::spaced(
            &format!("┗{} ", $crate::logger::Level::Error.tag()),
            format_args!($fmt $($arg)*),
        )
    };
    ($expr:expr) => {
        $crate::logger::Log::spaced(
            &format!("┗{} ", $crate::logger::Level::Error.tag()),
            format_args!("{}", $expr),
        )
    };
}
