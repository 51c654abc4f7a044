use crate::cli::{
    actions::{replay, stats, Action},
    commands::{self, routes},
    globals::GlobalArgs,
};
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use std::{path::PathBuf, time::Duration};

fn strings(matches: &clap::ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| {
            values
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn globals(matches: &clap::ArgMatches) -> GlobalArgs {
    let defaults = GlobalArgs::default();
    GlobalArgs {
        public_home: matches
            .get_one::<String>(routes::ARG_PUBLIC_HOME)
            .cloned()
            .unwrap_or(defaults.public_home),
        protected_home: matches
            .get_one::<String>(routes::ARG_PROTECTED_HOME)
            .cloned()
            .unwrap_or(defaults.protected_home),
        public_routes: strings(matches, routes::ARG_PUBLIC_ROUTE),
        authorized_domains: strings(matches, routes::ARG_AUTHORIZED_DOMAIN),
    }
}

/// # Errors
/// Returns an error if required arguments are missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let globals = globals(matches);

    match matches.subcommand() {
        Some((commands::CMD_REPLAY, sub_m)) => {
            let scenario = sub_m
                .get_one::<String>("scenario")
                .map(PathBuf::from)
                .context("missing required argument: <scenario>")?;
            let profile_url = sub_m.get_one::<String>("profile-url").cloned();
            let timeout = sub_m
                .get_one::<u64>("profile-timeout")
                .copied()
                .map_or(Duration::from_secs(5), Duration::from_secs);

            Ok(Action::Replay(replay::Args {
                globals,
                scenario,
                profile_url,
                timeout,
            }))
        }
        Some((commands::CMD_STATS, sub_m)) => {
            let birth_date = sub_m
                .get_one::<String>("birth-date")
                .context("missing required argument: --birth-date")?;
            let birth_date = NaiveDate::parse_from_str(birth_date, "%Y-%m-%d")
                .with_context(|| format!("invalid --birth-date: {birth_date}"))?;
            let life_expectancy = sub_m
                .get_one::<u16>("life-expectancy")
                .copied()
                .unwrap_or(crate::session::types::DEFAULT_LIFE_EXPECTANCY);

            Ok(Action::Stats(stats::Args {
                birth_date,
                life_expectancy,
            }))
        }
        Some((other, _)) => Err(anyhow!("unknown subcommand: {other}")),
        None => bail!("missing subcommand"),
    }
}
