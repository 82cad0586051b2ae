//! Parsing of durations, date-times and UTC offsets from user input.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use regex::Regex;

use crate::error::CommandError;
use crate::text::Text;

pub struct TimeParser {
    duration_shape: Regex,
    duration_part: Regex,
    iso_date: Regex,
    slash_date: Regex,
    clock: Regex,
    offset: Regex,
}

impl TimeParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(TimeParser {
            duration_shape: Regex::new(r"^(\d+[a-z]+)+$")?,
            duration_part: Regex::new(r"(\d+)([a-z]+)")?,
            iso_date: Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$")?,
            slash_date: Regex::new(r"^(\d{1,2})/(\d{1,2})(?:/(\d{2}|\d{4}))?$")?,
            clock: Regex::new(r"^(\d{1,2})(?::(\d{2}))?(?::(\d{2}))?\s*(am|pm)?$")?,
            offset: Regex::new(r"^([+-])(\d{1,2})(?::?(\d{2}))?$")?,
        })
    }

    /// Reads durations such as `1h30m`, `in 2 days`, `-5m` or `10 minutes ago`.
    pub fn duration(&self, input: &str) -> Result<Duration, CommandError> {
        let lowered = input.trim().to_lowercase();
        let mut words: Vec<&str> = lowered
            .split_whitespace()
            .filter(|word| *word != "in")
            .collect();

        let mut negative = false;
        if words.last() == Some(&"ago") {
            words.pop();
            negative = true;
        }
        let joined = words.concat();
        let body = match joined.strip_prefix('-') {
            Some(rest) => {
                negative = !negative;
                rest
            }
            None => joined.as_str(),
        };

        if !self.duration_shape.is_match(body) {
            return Err(CommandError::user(
                Text::library("exception.duration.regex").arg(input.trim()),
            ));
        }

        let mut total = Duration::zero();
        for part in self.duration_part.captures_iter(body) {
            let unit = &part[2];
            let seconds_per_unit: i64 = match unit {
                "s" | "sec" | "secs" | "second" | "seconds" => 1,
                "m" | "min" | "mins" | "minute" | "minutes" => 60,
                "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
                "d" | "day" | "days" => 86_400,
                "w" | "week" | "weeks" => 604_800,
                other => {
                    return Err(CommandError::user(
                        Text::library("exception.duration.unit").arg(other),
                    ))
                }
            };
            let step = part[1]
                .parse::<i64>()
                .ok()
                .and_then(|amount| amount.checked_mul(seconds_per_unit))
                .and_then(Duration::try_seconds)
                .and_then(|step| total.checked_add(&step));
            total = step.ok_or_else(|| {
                CommandError::user(Text::library("exception.number_range").arg(input.trim()))
            })?;
        }

        Ok(if negative { -total } else { total })
    }

    /// Reads a point in time, either relative to `now` or as `[date] [time]` in UTC.
    ///
    /// Dates are `yyyy-mm-dd` or `mm/dd[/yyyy]`; times are `h[:mm[:ss]] [am|pm]`.
    /// A bare time that already passed today means tomorrow, a date without a
    /// year that already passed this year means next year.
    pub fn date_time(&self, input: &str, now: DateTime<Utc>) -> Result<DateTime<FixedOffset>, CommandError> {
        let invalid_date = || CommandError::user(Text::library("exception.invalid_date").arg(input.trim()));
        let lowered = input.trim().to_lowercase();
        if lowered.is_empty() {
            return Err(invalid_date());
        }

        if let Ok(offset) = self.duration(&lowered) {
            return now
                .checked_add_signed(offset)
                .map(|moment| moment.with_timezone(&Utc.fix()))
                .ok_or_else(invalid_date);
        }

        let mut words = lowered.split_whitespace();
        let first = words.next().unwrap_or_default();
        let (date, explicit_year, rest) = match self.date(first, now)? {
            Some((date, explicit_year)) => (Some(date), explicit_year, words.collect::<Vec<_>>().join(" ")),
            None => (None, false, lowered.clone()),
        };

        let time = if rest.is_empty() {
            None
        } else {
            Some(self.clock(&rest).ok_or_else(|| {
                CommandError::user(Text::library("exception.invalid_time").arg(rest.as_str()))
            })?)
        };

        let today = now.date_naive();
        let moment = match (date, time) {
            (Some(date), time) => {
                let moment = NaiveDateTime::new(date, time.unwrap_or(NaiveTime::MIN));
                if !explicit_year && moment < now.naive_utc() {
                    date.with_year(date.year() + 1)
                        .map(|next| NaiveDateTime::new(next, moment.time()))
                        .ok_or_else(invalid_date)?
                } else {
                    moment
                }
            }
            (None, Some(time)) => {
                let moment = NaiveDateTime::new(today, time);
                if moment <= now.naive_utc() {
                    moment + Duration::days(1)
                } else {
                    moment
                }
            }
            (None, None) => return Err(invalid_date()),
        };

        Ok(DateTime::<FixedOffset>::from_naive_utc_and_offset(moment, Utc.fix()))
    }

    /// Reads `UTC`, `GMT`, `Z`, `+05:30`, `-3`, `UTC+5` or `GMT-03:00`.
    pub fn offset(&self, input: &str) -> Option<FixedOffset> {
        let upper = input.trim().to_uppercase();
        let rest = upper
            .strip_prefix("UTC")
            .or_else(|| upper.strip_prefix("GMT"))
            .unwrap_or(&upper);
        if rest.is_empty() || rest == "Z" {
            return FixedOffset::east_opt(0);
        }

        let captures = self.offset.captures(rest)?;
        let hours: i32 = captures[2].parse().ok()?;
        let minutes: i32 = captures.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        if hours > 14 || minutes >= 60 {
            return None;
        }
        let seconds = hours * 3_600 + minutes * 60;
        let sign = if &captures[1] == "-" { -1 } else { 1 };
        FixedOffset::east_opt(sign * seconds)
    }

    /// Returns the parsed date and whether the input named its year.
    fn date(&self, word: &str, now: DateTime<Utc>) -> Result<Option<(NaiveDate, bool)>, CommandError> {
        let invalid = || CommandError::user(Text::library("exception.invalid_date").arg(word));

        if let Some(captures) = self.iso_date.captures(word) {
            let year: i32 = captures[1].parse().map_err(|_| invalid())?;
            let month: u32 = captures[2].parse().map_err(|_| invalid())?;
            let day: u32 = captures[3].parse().map_err(|_| invalid())?;
            return NaiveDate::from_ymd_opt(year, month, day)
                .map(|date| Some((date, true)))
                .ok_or_else(invalid);
        }

        if let Some(captures) = self.slash_date.captures(word) {
            let month: u32 = captures[1].parse().map_err(|_| invalid())?;
            let day: u32 = captures[2].parse().map_err(|_| invalid())?;
            let year = match captures.get(3) {
                Some(year) => {
                    let year: i32 = year.as_str().parse().map_err(|_| invalid())?;
                    Some(if year < 100 { year + 2000 } else { year })
                }
                None => None,
            };
            return NaiveDate::from_ymd_opt(year.unwrap_or_else(|| now.year()), month, day)
                .map(|date| Some((date, year.is_some())))
                .ok_or_else(invalid);
        }

        Ok(None)
    }

    fn clock(&self, input: &str) -> Option<NaiveTime> {
        let captures = self.clock.captures(input)?;
        let mut hour: u32 = captures[1].parse().ok()?;
        let minute: u32 = captures.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        let second: u32 = captures.get(3).map_or(Ok(0), |m| m.as_str().parse()).ok()?;

        if let Some(meridiem) = captures.get(4) {
            if hour == 0 || hour > 12 {
                return None;
            }
            hour %= 12;
            if meridiem.as_str() == "pm" {
                hour += 12;
            }
        }
        NaiveTime::from_hms_opt(hour, minute, second)
    }
}
