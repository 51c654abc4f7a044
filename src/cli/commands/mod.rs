pub mod logging;
pub mod routes;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const CMD_REPLAY: &str = "replay";
pub const CMD_STATS: &str = "stats";

fn replay() -> Command {
    Command::new(CMD_REPLAY)
        .about("Replay a session scenario against the route guard")
        .arg(
            Arg::new("scenario")
                .help("Path to a JSON scenario file")
                .required(true),
        )
        .arg(
            Arg::new("profile-url")
                .long("profile-url")
                .help("Profile backend base URL; profiles from the scenario are used when unset")
                .env("LIFEPROGRESS_PROFILE_URL"),
        )
        .arg(
            Arg::new("profile-timeout")
                .long("profile-timeout")
                .help("Profile backend request timeout in seconds")
                .env("LIFEPROGRESS_PROFILE_TIMEOUT")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn stats() -> Command {
    Command::new(CMD_STATS)
        .about("Show life progress for a birth date")
        .arg(
            Arg::new("birth-date")
                .long("birth-date")
                .help("Birth date, YYYY-MM-DD")
                .env("LIFEPROGRESS_BIRTH_DATE")
                .required(true),
        )
        .arg(
            Arg::new("life-expectancy")
                .long("life-expectancy")
                .help("Expected lifespan in years")
                .env("LIFEPROGRESS_LIFE_EXPECTANCY")
                .default_value("80")
                .value_parser(clap::value_parser!(u16)),
        )
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("lifeprogress")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(replay())
        .subcommand(stats());

    let command = routes::with_args(command);
    logging::with_args(command)
}
