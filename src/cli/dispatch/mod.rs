//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run: the API server by
//! default, or the initiator-side `login` flow.

use crate::cli::actions::{Action, login, server};
use crate::cli::commands::{login as login_cmd, push};
use anyhow::{Context, Result};

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches(login_cmd::CMD_LOGIN) {
        return Ok(Action::Login(login::Args {
            server_url: sub
                .get_one::<String>(login_cmd::ARG_SERVER_URL)
                .cloned()
                .context("missing server-url")?,
            email: sub
                .get_one::<String>(login_cmd::ARG_EMAIL)
                .cloned()
                .context("missing required argument: --email")?,
            wait_timeout_seconds: sub
                .get_one::<u64>(login_cmd::ARG_WAIT_TIMEOUT)
                .copied()
                .context("missing wait-timeout")?,
        }));
    }

    let push_opts = push::Options::parse(matches)?;

    Ok(Action::Server(server::Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").cloned(),
        frontend_base_url: matches
            .get_one::<String>("frontend-url")
            .cloned()
            .context("missing frontend-url")?,
        attempt_ttl_seconds: push_opts.attempt_ttl_seconds,
        retention_seconds: push_opts.retention_seconds,
        sweep_interval_seconds: push_opts.sweep_interval_seconds,
        token_ttl_seconds: push_opts.token_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn defaults_dispatch_to_server() -> Result<()> {
        let matches = commands::new().get_matches_from(vec!["aprobo"]);
        match handler(&matches)? {
            Action::Server(args) => {
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, None);
                assert_eq!(args.frontend_base_url, "http://localhost:3000");
                assert_eq!(args.attempt_ttl_seconds, 120);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn login_subcommand_dispatches_to_login() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "aprobo",
            "login",
            "--email",
            "owner@example.com",
            "--wait-timeout",
            "60",
        ]);
        match handler(&matches)? {
            Action::Login(args) => {
                assert_eq!(args.email, "owner@example.com");
                assert_eq!(args.server_url, "http://localhost:8080");
                assert_eq!(args.wait_timeout_seconds, 60);
            }
            other => panic!("unexpected action: {other:?}"),
        }
        Ok(())
    }
}
