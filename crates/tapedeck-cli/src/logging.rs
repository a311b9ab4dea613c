//! Log filtering and subscriber setup for the `tapedeck` binary.
//!
//! Core events are emitted under `tapedeck::{startup,db,writer,trim,diff}`.
//! A preset picks a level for each of them, `--log TARGET=LEVEL` adjusts
//! single targets, and `RUST_LOG`, when set, replaces the whole filter.
//! Logs always go to stderr so command output on stdout stays clean.

use clap::{Args, ValueEnum};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

const ROOT_TARGET: &str = "tapedeck";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogPreset {
    /// Startup, trims and diff passes; storage only on warnings
    #[default]
    Production,
    /// Every target at info
    Verbose,
    /// Commits and trim decisions
    Debug,
    /// Each queued row
    Trace,
    /// Warnings and errors only
    Quiet,
}

impl LogPreset {
    fn directives(self) -> &'static [&'static str] {
        match self {
            LogPreset::Production => &[
                "tapedeck=warn",
                "tapedeck::startup=info",
                "tapedeck::trim=info",
                "tapedeck::diff=info",
            ],
            LogPreset::Verbose => &["tapedeck=info"],
            LogPreset::Debug => &["tapedeck=debug"],
            LogPreset::Trace => &["tapedeck=trace"],
            LogPreset::Quiet => &["tapedeck=warn"],
        }
    }
}

/// A single `TARGET=LEVEL` override. Bare targets live under `tapedeck::`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLevel {
    pub target: String,
    pub level: LevelFilter,
}

impl FromStr for TargetLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, level) = s
            .split_once('=')
            .ok_or_else(|| format!("expected TARGET=LEVEL, got '{}'", s))?;
        let target = target.trim();
        if target.is_empty() {
            return Err(format!("missing target in '{}'", s));
        }
        let level = level
            .trim()
            .parse::<LevelFilter>()
            .map_err(|_| format!("unknown level '{}'", level.trim()))?;

        let target = if target == ROOT_TARGET || target.starts_with("tapedeck::") {
            target.to_string()
        } else {
            format!("{}::{}", ROOT_TARGET, target)
        };
        Ok(Self { target, level })
    }
}

impl fmt::Display for TargetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.target, self.level)
    }
}

/// Logging flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LogArgs {
    /// Logging preset
    #[arg(long = "log-preset", value_enum, default_value_t, global = true)]
    pub preset: LogPreset,

    /// Shorthand for --log-preset verbose
    #[arg(short, long, global = true, conflicts_with_all = ["debug", "trace", "quiet"])]
    pub verbose: bool,

    /// Shorthand for --log-preset debug
    #[arg(short, long, global = true, conflicts_with_all = ["trace", "quiet"])]
    pub debug: bool,

    /// Shorthand for --log-preset trace
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub trace: bool,

    /// Shorthand for --log-preset quiet
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Level for one target, e.g. "trim=debug"; comma-separated or repeated
    #[arg(
        long = "log",
        value_name = "TARGET=LEVEL",
        value_delimiter = ',',
        global = true
    )]
    pub overrides: Vec<TargetLevel>,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t, global = true)]
    pub format: LogFormat,
}

impl LogArgs {
    /// The preset in effect; a shorthand flag beats `--log-preset`.
    pub fn effective_preset(&self) -> LogPreset {
        match (self.verbose, self.debug, self.trace, self.quiet) {
            (true, ..) => LogPreset::Verbose,
            (_, true, ..) => LogPreset::Debug,
            (_, _, true, _) => LogPreset::Trace,
            (.., true) => LogPreset::Quiet,
            _ => self.preset,
        }
    }

    /// Filter directives: the preset's, then the overrides in order.
    pub fn directives(&self) -> Vec<String> {
        self.effective_preset()
            .directives()
            .iter()
            .map(|d| d.to_string())
            .chain(self.overrides.iter().map(TargetLevel::to_string))
            .collect()
    }

    fn filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(self.directives().join(","))
    }

    /// Install the global subscriber.
    pub fn init(&self) {
        let text = (self.format == LogFormat::Text).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
        });
        let json = (self.format == LogFormat::Json).then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::io::stderr)
        });

        tracing_subscriber::registry()
            .with(self.filter())
            .with(text)
            .with(json)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Harness {
        #[command(flatten)]
        log: LogArgs,
    }

    fn parse(args: &[&str]) -> Result<LogArgs, clap::Error> {
        let argv = std::iter::once("tapedeck").chain(args.iter().copied());
        Harness::try_parse_from(argv).map(|h| h.log)
    }

    #[test]
    fn test_production_is_the_default() {
        let log = parse(&[]).unwrap();
        assert_eq!(log.effective_preset(), LogPreset::Production);
        assert_eq!(log.format, LogFormat::Text);
        assert_eq!(log.directives()[0], "tapedeck=warn");
        assert!(log.directives().contains(&"tapedeck::trim=info".to_string()));
    }

    #[test]
    fn test_shorthand_beats_named_preset() {
        let log = parse(&["--log-preset", "quiet", "-d"]).unwrap();
        assert_eq!(log.preset, LogPreset::Quiet);
        assert_eq!(log.effective_preset(), LogPreset::Debug);
        assert_eq!(log.directives(), vec!["tapedeck=debug"]);

        let log = parse(&["--log-preset", "trace"]).unwrap();
        assert_eq!(log.effective_preset(), LogPreset::Trace);
    }

    #[test]
    fn test_shorthands_are_exclusive() {
        assert!(parse(&["-v", "-q"]).is_err());
        assert!(parse(&["--trace", "-d"]).is_err());
        assert!(parse(&["--log-preset", "loud"]).is_err());
    }

    #[test]
    fn test_overrides_are_prefixed_and_appended() {
        let log = parse(&[
            "--log",
            "trim=debug,writer=trace",
            "--log",
            "tapedeck::db=off",
        ])
        .unwrap();
        assert_eq!(
            log.overrides,
            vec![
                TargetLevel {
                    target: "tapedeck::trim".into(),
                    level: LevelFilter::DEBUG
                },
                TargetLevel {
                    target: "tapedeck::writer".into(),
                    level: LevelFilter::TRACE
                },
                TargetLevel {
                    target: "tapedeck::db".into(),
                    level: LevelFilter::OFF
                },
            ]
        );
        let directives = log.directives();
        assert_eq!(directives.len(), LogPreset::Production.directives().len() + 3);
        assert!(directives.last().unwrap().starts_with("tapedeck::db="));
    }

    #[test]
    fn test_bad_overrides_are_rejected() {
        assert!("trim".parse::<TargetLevel>().is_err());
        assert!("=debug".parse::<TargetLevel>().is_err());
        assert!("db=loud".parse::<TargetLevel>().is_err());
        assert!(parse(&["--log", "diff=sometimes"]).is_err());
    }

    #[test]
    fn test_json_format() {
        assert_eq!(parse(&["--log-format", "json"]).unwrap().format, LogFormat::Json);
        assert!(parse(&["--log-format", "xml"]).is_err());
    }
}
