use anyhow::{Context, Result};
use clap::{Arg, Command};

pub const ARG_ATTEMPT_TTL: &str = "attempt-ttl";
pub const ARG_RETENTION: &str = "retention";
pub const ARG_SWEEP_INTERVAL: &str = "sweep-interval";
pub const ARG_TOKEN_TTL: &str = "token-ttl";

/// Parsed push flow tuning options.
#[derive(Debug)]
pub struct Options {
    pub attempt_ttl_seconds: i64,
    pub retention_seconds: i64,
    pub sweep_interval_seconds: u64,
    pub token_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if an argument is missing its default.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        Ok(Self {
            attempt_ttl_seconds: matches
                .get_one::<i64>(ARG_ATTEMPT_TTL)
                .copied()
                .context("missing attempt-ttl")?,
            retention_seconds: matches
                .get_one::<i64>(ARG_RETENTION)
                .copied()
                .context("missing retention")?,
            sweep_interval_seconds: matches
                .get_one::<u64>(ARG_SWEEP_INTERVAL)
                .copied()
                .context("missing sweep-interval")?,
            token_ttl_seconds: matches
                .get_one::<u64>(ARG_TOKEN_TTL)
                .copied()
                .context("missing token-ttl")?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ATTEMPT_TTL)
                .long(ARG_ATTEMPT_TTL)
                .help("Seconds a login attempt stays approvable")
                .default_value("120")
                .env("APROBO_ATTEMPT_TTL")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_RETENTION)
                .long(ARG_RETENTION)
                .help("Seconds expired attempts stay listable before the sweeper removes them")
                .default_value("3600")
                .env("APROBO_RETENTION")
                .value_parser(clap::value_parser!(i64).range(0..)),
        )
        .arg(
            Arg::new(ARG_SWEEP_INTERVAL)
                .long(ARG_SWEEP_INTERVAL)
                .help("Seconds between sweeper runs")
                .default_value("60")
                .env("APROBO_SWEEP_INTERVAL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL)
                .long(ARG_TOKEN_TTL)
                .help("Seconds an issued authentication token stays valid")
                .default_value("43200")
                .env("APROBO_TOKEN_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
