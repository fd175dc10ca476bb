//! Command-line configuration.

use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::units::control_unit::RunLimits;

/// Usage text printed for `--help` and on argument errors.
pub const USAGE_TEXT: &str = "\
Usage: bpf-fuzz <command> [options]

Commands:
  run --strategy <name> [options]  Run the fuzzer with a strategy
  strategies                       List registered strategies

Options (run):
  -s, --strategy <name>          Strategy to run (required)
  --corpus-dir <dir>             Where generated programs are written (default: corpus)
  --iterations <n>               Stop after n programs (default: unbounded)
  --timeout-ms <ms>              Per-program executor timeout
  --seed <n>                     Generator seed (default: random)
  --report-interval-ms <ms>      Status report period (default: 1000)
  --metrics-json <file>          Write the final metrics snapshot as JSON
  -h, --help                     Show this help message

Logging is controlled with RUST_LOG (default: info).
";

/// Default status report period.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_millis(1000);

/// Options of the `run` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzerConfig {
    /// Strategy name.
    pub strategy: String,
    /// Corpus output directory.
    pub corpus_dir: PathBuf,
    /// Run bounds forwarded to the control unit.
    pub limits: RunLimits,
    /// Status report period.
    pub report_interval: Duration,
    /// Final metrics destination.
    pub metrics_json: Option<PathBuf>,
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the fuzzer.
    Run(FuzzerConfig),
    /// List registered strategies.
    Strategies,
    /// Print usage.
    Help,
}

fn value(
    flag: &OsString,
    args: &mut impl Iterator<Item = OsString>,
) -> Result<String, ConfigError> {
    args.next()
        .map(|v| v.to_string_lossy().into_owned())
        .ok_or_else(|| ConfigError::MissingValue {
            flag: flag.to_string_lossy().into_owned(),
        })
}

fn number<T: FromStr>(
    flag: &OsString,
    args: &mut impl Iterator<Item = OsString>,
) -> Result<T, ConfigError> {
    let raw = value(flag, args)?;
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string_lossy().into_owned(),
        value: raw,
    })
}

/// Parses arguments (without the program name).
///
/// # Errors
///
/// Returns [`ConfigError`] for a missing or unknown command, an unknown
/// option, or a missing or malformed option value.
pub fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<Command, ConfigError> {
    let first = args.next().ok_or(ConfigError::MissingCommand)?;
    if first == "--help" || first == "-h" {
        return Ok(Command::Help);
    }

    match first.to_string_lossy().as_ref() {
        "run" => parse_run_args(args),
        "strategies" => match args.next() {
            None => Ok(Command::Strategies),
            Some(arg) if arg == "--help" || arg == "-h" => Ok(Command::Help),
            Some(arg) => Err(ConfigError::UnknownOption(
                arg.to_string_lossy().into_owned(),
            )),
        },
        other => Err(ConfigError::UnknownCommand(other.to_string())),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_run_args(mut args: impl Iterator<Item = OsString>) -> Result<Command, ConfigError> {
    let mut strategy = None;
    let mut corpus_dir = PathBuf::from("corpus");
    let mut limits = RunLimits::default();
    let mut report_interval = DEFAULT_REPORT_INTERVAL;
    let mut metrics_json = None;

    while let Some(arg) = args.next() {
        match arg.to_string_lossy().as_ref() {
            "-h" | "--help" => return Ok(Command::Help),
            "-s" | "--strategy" => strategy = Some(value(&arg, &mut args)?),
            "--corpus-dir" => corpus_dir = PathBuf::from(value(&arg, &mut args)?),
            "--iterations" => limits.iterations = Some(number(&arg, &mut args)?),
            "--timeout-ms" => {
                limits.timeout = Some(Duration::from_millis(number(&arg, &mut args)?));
            }
            "--seed" => limits.seed = Some(number(&arg, &mut args)?),
            "--report-interval-ms" => {
                report_interval = Duration::from_millis(number(&arg, &mut args)?);
            }
            "--metrics-json" => metrics_json = Some(PathBuf::from(value(&arg, &mut args)?)),
            other => return Err(ConfigError::UnknownOption(other.to_string())),
        }
    }

    Ok(Command::Run(FuzzerConfig {
        strategy: strategy.ok_or(ConfigError::MissingStrategy)?,
        corpus_dir,
        limits,
        report_interval,
        metrics_json,
    }))
}

#[cfg(test)]
mod tests {
    use super::{parse_args, Command, DEFAULT_REPORT_INTERVAL};
    use crate::errors::ConfigError;
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::time::Duration;

    fn args(list: &[&str]) -> impl Iterator<Item = OsString> {
        list.iter()
            .map(OsString::from)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn parses_full_run_command() {
        let Command::Run(config) = parse_args(args(&[
            "run",
            "--strategy",
            "stack_corruption",
            "--corpus-dir",
            "/tmp/c",
            "--iterations",
            "10",
            "--timeout-ms",
            "250",
            "--seed",
            "42",
            "--report-interval-ms",
            "500",
            "--metrics-json",
            "m.json",
        ]))
        .expect("valid arguments") else {
            panic!("expected run command");
        };
        assert_eq!(config.strategy, "stack_corruption");
        assert_eq!(config.corpus_dir, PathBuf::from("/tmp/c"));
        assert_eq!(config.limits.iterations, Some(10));
        assert_eq!(config.limits.timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.limits.seed, Some(42));
        assert_eq!(config.report_interval, Duration::from_millis(500));
        assert_eq!(config.metrics_json, Some(PathBuf::from("m.json")));
    }

    #[test]
    fn run_defaults() {
        let Command::Run(config) =
            parse_args(args(&["run", "-s", "playground"])).expect("valid arguments")
        else {
            panic!("expected run command");
        };
        assert_eq!(config.corpus_dir, PathBuf::from("corpus"));
        assert_eq!(config.limits.iterations, None);
        assert_eq!(config.report_interval, DEFAULT_REPORT_INTERVAL);
        assert_eq!(config.metrics_json, None);
    }

    #[test]
    fn run_requires_strategy() {
        assert_eq!(parse_args(args(&["run"])), Err(ConfigError::MissingStrategy));
    }

    #[test]
    fn rejects_bad_values_and_options() {
        assert_eq!(
            parse_args(args(&["run", "-s", "playground", "--iterations", "many"])),
            Err(ConfigError::InvalidValue {
                flag: "--iterations".into(),
                value: "many".into(),
            })
        );
        assert_eq!(
            parse_args(args(&["run", "--strategy"])),
            Err(ConfigError::MissingValue {
                flag: "--strategy".into(),
            })
        );
        assert_eq!(
            parse_args(args(&["run", "--verbose"])),
            Err(ConfigError::UnknownOption("--verbose".into()))
        );
    }

    #[test]
    fn parses_other_commands() {
        assert_eq!(parse_args(args(&["strategies"])), Ok(Command::Strategies));
        assert_eq!(parse_args(args(&["--help"])), Ok(Command::Help));
        assert_eq!(parse_args(args(&[])), Err(ConfigError::MissingCommand));
        assert_eq!(
            parse_args(args(&["fuzz"])),
            Err(ConfigError::UnknownCommand("fuzz".into()))
        );
    }
}
