//! Cron expression parsing.
//!
//! Accepts the six/seven-field form understood by the `cron` crate
//! (`sec min hour dom mon dow [year]`) as well as the classic five-field
//! form, which gets a `0` seconds field prepended. `?` is read as `*`.
//!
//! Numeric day-of-week values use the classic numbering, where `0` and `7`
//! are Sunday and `1` is Monday. The `cron` crate counts `1` as Sunday, so
//! numbers in that field are rewritten before parsing. Day names pass
//! through unchanged.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::error::ParseError;

/// Parse a cron expression into a [`Schedule`].
pub fn parse_schedule(expression: &str) -> Result<Schedule, ParseError> {
    let normalized = normalize(expression);
    Schedule::from_str(&normalized).map_err(|source| ParseError {
        expression: expression.to_string(),
        source,
    })
}

/// Next fire time strictly after `after`.
pub fn next_fire_after(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

const DAY_OF_WEEK_FIELD: usize = 5;

fn normalize(expression: &str) -> String {
    let mut fields: Vec<String> = expression
        .split_whitespace()
        .map(|field| if field == "?" { "*" } else { field }.to_string())
        .collect();

    if fields.len() == 5 {
        fields.insert(0, "0".to_string());
    }
    if let Some(field) = fields.get_mut(DAY_OF_WEEK_FIELD) {
        *field = normalize_day_of_week(field);
    }
    fields.join(" ")
}

fn normalize_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(normalize_day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

/// Rewrite one list item (`n`, `a-b`, `a-b/s` or `a/s`) as an explicit list
/// of `cron` crate ordinals. Anything else is returned as is and left for
/// the parser to accept or reject.
fn normalize_day_of_week_item(item: &str) -> String {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => match step.parse::<usize>() {
            Ok(step) if step > 0 => (base, step),
            _ => return item.to_string(),
        },
        None => (item, 1),
    };

    // `*` and `*/s` count from Sunday in both numberings.
    if base == "*" {
        return item.to_string();
    }

    let days = match base.split_once('-') {
        Some((start, end)) => match (classic_day(start), classic_day(end)) {
            (Some(start), Some(end)) if start <= end => start..=end,
            _ => return item.to_string(),
        },
        None => match classic_day(base) {
            Some(start) if item.contains('/') => start..=7,
            Some(day) => day..=day,
            None => return item.to_string(),
        },
    };

    days.step_by(step)
        .map(|day| if day == 7 { 1 } else { day + 1 })
        .collect::<BTreeSet<u32>>()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn classic_day(value: &str) -> Option<u32> {
    value.parse::<u32>().ok().filter(|day| *day <= 7)
}
