use crate::progress::LifeProgress;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

#[derive(Debug)]
pub struct Args {
    pub birth_date: NaiveDate,
    pub life_expectancy: u16,
}

/// # Errors
/// Returns an error if the birth date or life expectancy is out of range.
#[instrument(skip_all, fields(birth_date = %args.birth_date))]
pub fn execute(args: &Args) -> Result<()> {
    let progress = LifeProgress::compute(args.birth_date, args.life_expectancy, Utc::now())
        .context("cannot compute life progress")?;
    info!(percent = progress.percent_lived, "life progress computed");

    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}
