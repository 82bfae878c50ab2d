//! Cron schedule for repeated sync passes.
//!
//! Accepts standard 5-field crontab expressions (`min hour dom month dow`)
//! as well as the seconds-first 6/7-field form understood by the `cron`
//! crate. Crontab day-of-week numbers (`0`-`7`, Sunday is `0` or `7`) are
//! translated to the crate's `1`-`7` numbering where Sunday is `1`.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone};
use cron::Schedule;

use crate::error::DaemonError;

#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, DaemonError> {
        let invalid = |reason: String| DaemonError::InvalidSchedule {
            expression: expression.to_owned(),
            reason,
        };

        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalized = match fields.as_slice() {
            [macro_name] if macro_name.starts_with('@') => (*macro_name).to_owned(),
            [minute, hour, dom, month, dow] => {
                let dow = crontab_day_of_week(dow).map_err(invalid)?;
                format!("0 {minute} {hour} {dom} {month} {dow}")
            }
            [_, _, _, _, _, _] | [_, _, _, _, _, _, _] => fields.join(" "),
            _ => {
                return Err(invalid(format!(
                    "expected 5, 6 or 7 fields, found {}",
                    fields.len()
                )))
            }
        };

        let schedule = Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))?;
        Ok(Self {
            expression: expression.trim().to_owned(),
            schedule,
        })
    }

    /// The expression as written in the config.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `now`.
    pub fn next_fire<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(now).next()
    }

    /// How long to sleep from `now` until the next fire time, and that time.
    pub fn delay_until_next<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Option<(Duration, DateTime<Tz>)> {
        let next = self.next_fire(now)?;
        let delay = (next.clone() - now.clone()).to_std().unwrap_or_default();
        Some((delay, next))
    }
}

/// Rewrite a crontab day-of-week field into `cron` crate numbering.
///
/// Named days (`MON`, `SUN-SAT`) and `*` steps are left alone; `*/n` selects
/// the same weekdays in both numberings.
fn crontab_day_of_week(field: &str) -> Result<String, String> {
    let items = field
        .split(',')
        .map(translate_day_item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items.join(","))
}

fn translate_day_item(item: &str) -> Result<String, String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => (base, Some(step)),
        None => (item, None),
    };
    let suffix = step.map(|s| format!("/{s}")).unwrap_or_default();

    match base.split_once('-') {
        None => match day_number(base)? {
            Some(day) => Ok(format!("{}{suffix}", shift(day))),
            None => Ok(item.to_owned()),
        },
        Some((lo, hi)) => match (day_number(lo)?, day_number(hi)?) {
            (Some(0), Some(7)) => Ok(format!("1-7{suffix}")),
            (Some(7), Some(7)) => Ok(format!("1{suffix}")),
            (Some(lo), Some(7)) => {
                // Sunday closes the crontab range but opens the shifted one.
                let step: u8 = match step {
                    Some(s) => s.parse().map_err(|_| format!("invalid step '{s}'"))?,
                    None => 1,
                };
                let mut out = format!("{}-7{suffix}", lo + 1);
                if step > 0 && (7 - lo) % step == 0 {
                    out.push_str(",1");
                }
                Ok(out)
            }
            (Some(lo), Some(hi)) => Ok(format!("{}-{}{suffix}", shift(lo), shift(hi))),
            _ => Ok(item.to_owned()),
        },
    }
}

fn day_number(token: &str) -> Result<Option<u8>, String> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match token.parse::<u8>() {
        Ok(day) if day <= 7 => Ok(Some(day)),
        _ => Err(format!("day of week '{token}' out of range 0-7")),
    }
}

fn shift(day: u8) -> u8 {
    day % 7 + 1
}
