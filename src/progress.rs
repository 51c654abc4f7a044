//! Life progress statistics derived from a profile's birth date and life
//! expectancy.

use crate::session::types::Profile;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: f64 = 86_400_000.0;
const DAYS_PER_YEAR: f64 = 365.25;
const DAYS_PER_MONTH: f64 = 30.44;

pub const MIN_LIFE_EXPECTANCY: u16 = 1;
pub const MAX_LIFE_EXPECTANCY: u16 = 150;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifeProgressError {
    #[error("birth date {0} is in the future")]
    BirthDateInFuture(NaiveDate),
    #[error("life expectancy {0} is outside {MIN_LIFE_EXPECTANCY}..={MAX_LIFE_EXPECTANCY}")]
    InvalidLifeExpectancy(u16),
    #[error("profile has no birth date yet")]
    MissingBirthDate,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LifeProgress {
    pub age_years: f64,
    pub remaining_years: f64,
    pub percent_lived: f64,
    pub days: u64,
    pub months: u64,
    pub seasons: u64,
    pub weekends: u64,
    pub hours: u64,
    pub sunrises: u64,
}

impl LifeProgress {
    /// # Errors
    ///
    /// Fails for a birth date after `now` or a life expectancy outside the
    /// accepted range.
    pub fn compute(
        birth_date: NaiveDate,
        life_expectancy: u16,
        now: DateTime<Utc>,
    ) -> Result<Self, LifeProgressError> {
        if !(MIN_LIFE_EXPECTANCY..=MAX_LIFE_EXPECTANCY).contains(&life_expectancy) {
            return Err(LifeProgressError::InvalidLifeExpectancy(life_expectancy));
        }

        let born = birth_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let elapsed_ms = (now - born).num_milliseconds();
        if elapsed_ms < 0 {
            return Err(LifeProgressError::BirthDateInFuture(birth_date));
        }

        #[allow(clippy::cast_precision_loss)]
        let elapsed_ms = elapsed_ms as f64;
        let age_years = elapsed_ms / MS_PER_DAY / DAYS_PER_YEAR;
        let expectancy = f64::from(life_expectancy);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (days, hours) = (
            (elapsed_ms / MS_PER_DAY).floor() as u64,
            (elapsed_ms / MS_PER_HOUR).floor() as u64,
        );
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let months = (days as f64 / DAYS_PER_MONTH).floor() as u64;

        Ok(Self {
            age_years,
            remaining_years: expectancy - age_years,
            percent_lived: (age_years / expectancy * 100.0).min(100.0),
            days,
            months,
            seasons: months / 3,
            weekends: days / 7 * 2,
            hours,
            sunrises: days,
        })
    }

    /// # Errors
    ///
    /// Returns [`LifeProgressError::MissingBirthDate`] while the profile still
    /// needs its initial setup.
    pub fn for_profile(profile: &Profile, now: DateTime<Utc>) -> Result<Self, LifeProgressError> {
        let birth_date = profile
            .birth_date
            .ok_or(LifeProgressError::MissingBirthDate)?;
        Self::compute(birth_date, profile.life_expectancy, now)
    }
}
