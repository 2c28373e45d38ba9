//! Five-field schedule expressions
//!
//! Schedules are written in standard cron form
//! (`minute hour day-of-month month day-of-week`, Sunday = 0 or 7). The
//! `cron` crate wants a leading seconds field and numbers weekdays from
//! Sunday = 1, so expressions are rewritten before parsing.

use chrono::{DateTime, Utc};
use cron::Schedule;
use feedflow_core::{Error, Result};
use std::str::FromStr;

fn invalid(expr: &str, reason: impl std::fmt::Display) -> Error {
    Error::Validation(format!("invalid schedule '{expr}': {reason}"))
}

fn shift_weekday(token: &str, expr: &str) -> Result<String> {
    match token.parse::<u8>() {
        Ok(0 | 7) => Ok("1".to_string()),
        Ok(day @ 1..=6) => Ok((day + 1).to_string()),
        Ok(day) => Err(invalid(expr, format!("day-of-week {day} out of range"))),
        // names such as MON pass through unchanged
        Err(_) => Ok(token.to_string()),
    }
}

/// Rewrite a standard day-of-week field for the `cron` crate's numbering
fn normalize_day_of_week(field: &str, expr: &str) -> Result<String> {
    let mut parts = Vec::new();

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (part, None),
        };

        let range = match range.split_once('-') {
            Some((start, end)) => match (start.parse::<u8>(), end.parse::<u8>()) {
                // 0-7 spans the whole week
                (Ok(0), Ok(7)) => "1-7".to_string(),
                // a range ending on Sunday wraps into the next week
                (Ok(first @ 1..=6), Ok(7)) => {
                    let hits_sunday = step.is_none_or(|step| {
                        step.parse::<u8>()
                            .is_ok_and(|step| step > 0 && (7 - first) % step == 0)
                    });
                    if hits_sunday {
                        parts.push("1".to_string());
                    }
                    format!("{}-7", first + 1)
                }
                _ => format!(
                    "{}-{}",
                    shift_weekday(start, expr)?,
                    shift_weekday(end, expr)?
                ),
            },
            None if range == "*" || range == "?" => range.to_string(),
            None => shift_weekday(range, expr)?,
        };

        parts.push(match step {
            Some(step) => format!("{range}/{step}"),
            None => range,
        });
    }

    Ok(parts.join(","))
}

/// Parse a five-field schedule expression
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(invalid(
            expr,
            format!("expected 5 fields, found {}", fields.len()),
        ));
    }

    let day_of_week = normalize_day_of_week(fields[4], expr)?;
    let six_field = format!(
        "0 {} {} {} {} {}",
        fields[0], fields[1], fields[2], fields[3], day_of_week
    );
    Schedule::from_str(&six_field).map_err(|e| invalid(expr, e))
}

/// Check an expression without keeping the parsed schedule
pub fn validate_schedule(expr: &str) -> Result<()> {
    parse_schedule(expr).map(|_| ())
}

/// First fire time strictly after `after`
pub fn next_fire(schedule: &Schedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&after).next()
}

/// The next `count` fire times after now
pub fn upcoming(expr: &str, count: usize) -> Result<Vec<DateTime<Utc>>> {
    Ok(parse_schedule(expr)?.upcoming(Utc).take(count).collect())
}
