use crate::session::routes::{DASHBOARD, LOGIN, SIGNUP};
use clap::{Arg, ArgAction, Command};

pub const ARG_PUBLIC_HOME: &str = "public-home";
pub const ARG_PROTECTED_HOME: &str = "protected-home";
pub const ARG_PUBLIC_ROUTE: &str = "public-route";
pub const ARG_AUTHORIZED_DOMAIN: &str = "authorized-domain";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PUBLIC_HOME)
                .long("public-home")
                .help("Where signed-out users are sent from protected routes")
                .env("LIFEPROGRESS_PUBLIC_HOME")
                .global(true)
                .default_value(LOGIN),
        )
        .arg(
            Arg::new(ARG_PROTECTED_HOME)
                .long("protected-home")
                .help("Where signed-in users are sent from public routes")
                .env("LIFEPROGRESS_PROTECTED_HOME")
                .global(true)
                .default_value(DASHBOARD),
        )
        .arg(
            Arg::new(ARG_PUBLIC_ROUTE)
                .long("public-route")
                .help("Route reachable without a session, repeat or comma separate")
                .env("LIFEPROGRESS_PUBLIC_ROUTES")
                .global(true)
                .action(ArgAction::Append)
                .value_delimiter(',')
                .default_values([LOGIN, SIGNUP]),
        )
        .arg(
            Arg::new(ARG_AUTHORIZED_DOMAIN)
                .long("authorized-domain")
                .help("Host allowed to start a sign-in, repeat or comma separate (default: any)")
                .env("LIFEPROGRESS_AUTHORIZED_DOMAINS")
                .global(true)
                .action(ArgAction::Append)
                .value_delimiter(','),
        )
}
