//! Summary periods and the totals of the settlements made in them.

use rusqlite::Connection;
use time::{Date, Duration, Month, PrimitiveDateTime};

use crate::{Error, auth::UserID, money::Amount};

/// The earliest year that can be summarised.
pub const MIN_YEAR: i32 = 1;
/// The latest year that can be summarised. The next year must still be a valid date.
pub const MAX_YEAR: i32 = 9998;
/// The largest week number, following SQLite's `%W`.
pub const MAX_WEEK: u8 = 53;

/// A span of local time to total settlements over.
///
/// Weeks start on Monday. Week 0 holds the days before the first Monday of the
/// year, and weeks are clipped to the calendar year, so week 0 and the last
/// week may be shorter than seven days or even empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPeriod {
    /// A calendar year.
    Yearly {
        /// The year, e.g. 2025.
        year: i32,
    },
    /// A calendar month.
    Monthly {
        /// The year, e.g. 2025.
        year: i32,
        /// The month of `year`.
        month: Month,
    },
    /// A Monday-based week of the year.
    Weekly {
        /// The year, e.g. 2025.
        year: i32,
        /// The week number, 0 to 53.
        week: u8,
    },
}

fn validate_year(year: i32) -> Result<i32, Error> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(year)
    } else {
        Err(Error::InvalidSummaryPeriod(format!(
            "the year must be between {MIN_YEAR} and {MAX_YEAR}, got {year}"
        )))
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, text: Option<&str>) -> Result<T, Error> {
    let text = text
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| Error::InvalidSummaryPeriod(format!("the {name} is required")))?;

    text.parse()
        .map_err(|_| Error::InvalidSummaryPeriod(format!("\"{text}\" is not a valid {name}")))
}

impl SummaryPeriod {
    /// A calendar year.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSummaryPeriod] if the year is out of range.
    pub fn yearly(year: i32) -> Result<Self, Error> {
        Ok(Self::Yearly {
            year: validate_year(year)?,
        })
    }

    /// A calendar month, where `month` is 1 for January to 12 for December.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSummaryPeriod] if the year or month is out of range.
    pub fn monthly(year: i32, month: u8) -> Result<Self, Error> {
        let month = Month::try_from(month).map_err(|_| {
            Error::InvalidSummaryPeriod(format!("the month must be between 1 and 12, got {month}"))
        })?;

        Ok(Self::Monthly {
            year: validate_year(year)?,
            month,
        })
    }

    /// A Monday-based week of the year, from 0 to [MAX_WEEK].
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSummaryPeriod] if the year or week is out of range.
    pub fn weekly(year: i32, week: u8) -> Result<Self, Error> {
        if week > MAX_WEEK {
            return Err(Error::InvalidSummaryPeriod(format!(
                "the week must be between 0 and {MAX_WEEK}, got {week}"
            )));
        }

        Ok(Self::Weekly {
            year: validate_year(year)?,
            week,
        })
    }

    /// Build a period from the raw query parameters of a summary request.
    ///
    /// `period` is one of "yearly", "monthly" or "weekly". Only the parameters
    /// that period needs are read.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSummaryPeriod] if a needed parameter is missing,
    /// is not a number, or is out of range.
    pub fn from_query(
        period: Option<&str>,
        year: Option<&str>,
        month: Option<&str>,
        week: Option<&str>,
    ) -> Result<Self, Error> {
        match period.map(str::trim) {
            Some("yearly") => Self::yearly(parse_number("year", year)?),
            Some("monthly") => {
                Self::monthly(parse_number("year", year)?, parse_number("month", month)?)
            }
            Some("weekly") => {
                Self::weekly(parse_number("year", year)?, parse_number("week", week)?)
            }
            _ => Err(Error::InvalidSummaryPeriod(
                "the period must be one of yearly, monthly or weekly".to_owned(),
            )),
        }
    }

    /// The half-open range `[start, end)` the period covers, in local time.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidSummaryPeriod] if the dates cannot be represented.
    pub fn bounds(&self) -> Result<(PrimitiveDateTime, PrimitiveDateTime), Error> {
        let out_of_range =
            |error: time::error::ComponentRange| Error::InvalidSummaryPeriod(error.to_string());
        let first_day_of = |year: i32| {
            Date::from_calendar_date(year, Month::January, 1).map_err(out_of_range)
        };

        let (start, end) = match *self {
            SummaryPeriod::Yearly { year } => (first_day_of(year)?, first_day_of(year + 1)?),
            SummaryPeriod::Monthly { year, month } => {
                let start = Date::from_calendar_date(year, month, 1).map_err(out_of_range)?;
                let end = match month {
                    Month::December => first_day_of(year + 1)?,
                    _ => Date::from_calendar_date(year, month.next(), 1).map_err(out_of_range)?,
                };

                (start, end)
            }
            SummaryPeriod::Weekly { year, week } => {
                let year_start = first_day_of(year)?;
                let year_end = first_day_of(year + 1)?;
                let days_to_monday = (7 - year_start.weekday().number_days_from_monday()) % 7;
                let first_monday = year_start + Duration::days(days_to_monday.into());

                if week == 0 {
                    (year_start, first_monday)
                } else {
                    let start = first_monday + Duration::weeks(i64::from(week) - 1);
                    let end = start + Duration::weeks(1);

                    (start.min(year_end), end.min(year_end))
                }
            }
        };

        Ok((start.midnight(), end.midnight()))
    }

    /// A short description of the period, e.g. "March 2025".
    pub fn label(&self) -> String {
        match self {
            SummaryPeriod::Yearly { year } => year.to_string(),
            SummaryPeriod::Monthly { year, month } => format!("{month} {year}"),
            SummaryPeriod::Weekly { year, week } => format!("Week {week} of {year}"),
        }
    }
}

/// The sums of the settlement totals in a period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodTotals {
    /// The sum of the settlements' total amounts.
    pub total_amount: Amount,
    /// The sum of the settlements' non-fuel amounts.
    pub total_amount_excluding_fuel: Amount,
    /// The sum of the settlements' fuel expenses.
    pub total_fuel_expense: Amount,
}

/// Sum the totals of the settlements `user_id` made during `period`.
///
/// A period without settlements has zero totals.
///
/// # Errors
///
/// Returns [Error::InvalidSummaryPeriod] if the period bounds are invalid, or
/// [Error::SqlError] if there is an SQL error.
pub fn get_period_totals(
    user_id: UserID,
    period: SummaryPeriod,
    connection: &Connection,
) -> Result<PeriodTotals, Error> {
    let (start, end) = period.bounds()?;

    let totals = connection
        .prepare(
            "SELECT COALESCE(SUM(total_amount), 0),
                COALESCE(SUM(total_amount_excluding_fuel), 0),
                COALESCE(SUM(total_fuel_expense), 0)
             FROM settlement
             WHERE user_id = :user_id
                AND settlement_time >= :start
                AND settlement_time < :end",
        )?
        .query_row(
            rusqlite::named_params! {":user_id": user_id, ":start": start, ":end": end},
            |row| {
                Ok(PeriodTotals {
                    total_amount: row.get(0)?,
                    total_amount_excluding_fuel: row.get(1)?,
                    total_fuel_expense: row.get(2)?,
                })
            },
        )?;

    Ok(totals)
}
