//! Command-line interface for the demo host.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command line arguments. Every option overrides the configuration file.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the preload batch size
    pub batch_size: Option<usize>,
    /// Exit right after the demo session instead of waiting for a signal
    pub once: bool,
}

impl CliArgs {
    pub fn parse() -> Self {
        Self::from_matches(Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("Mod Host")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Runs the mod runtime against an in-memory world")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("mod_host.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("batch-size")
                    .short('b')
                    .long("batch-size")
                    .value_name("N")
                    .help("Maximum number of resource groups preloaded at once")
                    .value_parser(clap::value_parser!(usize)),
            )
            .arg(
                Arg::new("once")
                    .long("once")
                    .help("Exit after the demo session")
                    .action(ArgAction::SetTrue),
            )
    }

    fn from_matches(matches: clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("mod_host.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            batch_size: matches.get_one::<usize>("batch-size").copied(),
            once: matches.get_flag("once"),
        }
    }
}
