//! Command-line handling for the `miqat` binary.
//!
//! Parsing is hand-rolled: the binary only takes a handful of flags, and
//! unknown or malformed arguments fall back to printing help.

use crate::schedule::CalculationMethod;
use crate::time_source::parse_datetime;

/// What the binary should do, as decided by its arguments.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the dashboard with these settings
    Run {
        debug_enabled: bool,
        config_dir: Option<String>,
        /// Print the first settled state and exit
        once: bool,
        /// Calculation method to persist before starting
        method: Option<CalculationMethod>,
        /// Fixed local time ("YYYY-MM-DD HH:MM:SS") to evaluate the schedule at
        at: Option<String>,
    },
    ShowHelp,
    ShowVersion,
    /// Help printed after a bad argument; exits non-zero
    ShowHelpDueToError,
}

pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Turn an argument list into a [`CliAction`].
    ///
    /// The first item is the program name and is skipped. Version takes
    /// precedence over errors, and errors over help.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut help = false;
        let mut version = false;
        let mut once = false;
        let mut method = None;
        let mut config_dir = None;
        let mut at = None;
        let mut invalid = false;

        let mut args = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .peekable();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--help" | "-h" => help = true,
                "--version" | "-V" | "-v" => version = true,
                "--debug" | "-d" => debug_enabled = true,
                "--once" => once = true,
                "--config" | "-c" => match args.next_if(|next| !next.starts_with('-')) {
                    Some(dir) => config_dir = Some(dir),
                    None => {
                        log_warning!("--config needs a directory. Usage: --config <dir>");
                        invalid = true;
                    }
                },
                "--method" | "-m" => match args.next() {
                    Some(value) => {
                        match value.parse::<u8>().ok().map(CalculationMethod::try_from) {
                            Some(Ok(parsed)) => method = Some(parsed),
                            _ => {
                                log_warning!(
                                    "Unknown calculation method {}. See --help for the list",
                                    value
                                );
                                invalid = true;
                            }
                        }
                    }
                    None => {
                        log_warning!("--method needs an id. Usage: --method <id>");
                        invalid = true;
                    }
                },
                "--at" | "-a" => match args.next() {
                    Some(value) => match parse_datetime(&value) {
                        Ok(_) => at = Some(value),
                        Err(e) => {
                            log_error!("Invalid time for --at: {}", e);
                            invalid = true;
                        }
                    },
                    None => {
                        log_warning!("--at needs a time. Usage: --at \"YYYY-MM-DD HH:MM:SS\"");
                        invalid = true;
                    }
                },
                other if other.starts_with('-') => {
                    log_warning!("Unknown option: {}", other);
                    invalid = true;
                }
                other => {
                    log_warning!("Unexpected argument: {}", other);
                    invalid = true;
                }
            }
        }

        let action = match (version, invalid, help) {
            (true, _, _) => CliAction::ShowVersion,
            (false, true, _) => CliAction::ShowHelpDueToError,
            (false, false, true) => CliAction::ShowHelp,
            (false, false, false) => CliAction::Run {
                debug_enabled,
                config_dir,
                // A frozen clock never ticks
                once: once || at.is_some(),
                method,
                at,
            },
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

/// Print the version banner.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Print usage, options and the calculation method ids.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("miqat [OPTIONS]");
    log_block_start!("Options:");
    log_indented!("-a, --at <datetime>    Evaluate at a fixed local time (implies --once)");
    log_indented!("                       Usage: --at \"YYYY-MM-DD HH:MM:SS\"");
    log_indented!("-c, --config <dir>     Read miqat.toml from this directory");
    log_indented!("-d, --debug            Show engine transitions and requests");
    log_indented!("-h, --help             Show this help");
    log_indented!("-m, --method <id>      Set and remember the calculation method");
    log_indented!("    --once             Print the current schedule and exit");
    log_indented!("-V, --version          Show the version");
    log_block_start!("Calculation methods:");
    for method in CalculationMethod::ALL {
        log_indented!("{:>2}  {}", method.id(), method.display_name());
    }
    log_end!();
}
