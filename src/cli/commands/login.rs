use clap::{Arg, Command};

pub const CMD_LOGIN: &str = "login";
pub const ARG_SERVER_URL: &str = "server-url";
pub const ARG_EMAIL: &str = "email";
pub const ARG_WAIT_TIMEOUT: &str = "wait-timeout";

/// The initiator-side `login` subcommand: request a push login and wait for
/// approval from a trusted device.
#[must_use]
pub fn command() -> Command {
    Command::new(CMD_LOGIN)
        .about("Request a push login and wait for approval")
        .arg(
            Arg::new(ARG_SERVER_URL)
                .short('s')
                .long(ARG_SERVER_URL)
                .help("Base URL of the aprobo server")
                .default_value("http://localhost:8080")
                .env("APROBO_SERVER_URL"),
        )
        .arg(
            Arg::new(ARG_EMAIL)
                .short('e')
                .long(ARG_EMAIL)
                .help("Account email to request a login for")
                .env("APROBO_EMAIL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_WAIT_TIMEOUT)
                .long(ARG_WAIT_TIMEOUT)
                .help("Seconds to wait for approval before giving up")
                .default_value("120")
                .env("APROBO_WAIT_TIMEOUT")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_email() {
        let command = Command::new("aprobo").subcommand(command());
        assert!(command
            .clone()
            .try_get_matches_from(vec!["aprobo", "login"])
            .is_err());

        let matches = command
            .get_matches_from(vec!["aprobo", "login", "--email", "owner@example.com"]);
        let (name, sub) = matches.subcommand().expect("subcommand");
        assert_eq!(name, CMD_LOGIN);
        assert_eq!(
            sub.get_one::<String>(ARG_EMAIL).map(String::as_str),
            Some("owner@example.com")
        );
        assert_eq!(
            sub.get_one::<String>(ARG_SERVER_URL).map(String::as_str),
            Some("http://localhost:8080")
        );
        assert_eq!(sub.get_one::<u64>(ARG_WAIT_TIMEOUT).copied(), Some(120));
    }
}
