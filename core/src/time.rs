use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use anyhow::{anyhow, Result};

/// Parses a due date relative to `today`.
///
/// Accepts `YYYY-MM-DD`, the keywords `today`/`tod`, `tomorrow`/`tom`,
/// `eow` (coming Sunday) and `eom` (last day of the month), relative offsets
/// (`+3d`, `+2w`, `+1m`) and weekdays (`fri`, `2:fri`).
pub fn parse_human_date(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("Empty date string"));
    }

    match input.to_lowercase().as_str() {
        "today" | "tod" => return Ok(today),
        "tomorrow" | "tom" => return add_days(today, 1),
        "eow" => {
            let days_to_sunday = 6 - today.weekday().num_days_from_monday() as u64;
            return add_days(today, days_to_sunday);
        }
        "eom" => return end_of_month(today),
        _ => {}
    }

    if let Some(rest) = input.strip_prefix('+') {
        return parse_relative(rest, today);
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Some((count, day_str)) = parse_weekday_token(input) {
        if let Ok(target) = parse_weekday_str(day_str) {
            let mut days_needed = target.num_days_from_sunday() as i64
                - today.weekday().num_days_from_sunday() as i64;
            if days_needed <= 0 {
                days_needed += 7;
            }
            // 1:fri is the next Friday, 2:fri the one after.
            let extra = (count.max(1) as u64 - 1)
                .checked_mul(7)
                .ok_or_else(|| anyhow!("Date out of range"))?;
            return add_days(today, days_needed as u64 + extra);
        }
    }

    Err(anyhow!("Could not parse date: {}", input))
}

/// Due date as shown in the list, e.g. `Mar 5, 2024`.
pub fn format_due(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

fn parse_relative(rest: &str, today: NaiveDate) -> Result<NaiveDate> {
    let (unit_at, unit) = rest
        .char_indices()
        .last()
        .ok_or_else(|| anyhow!("Invalid relative format"))?;
    let num_str = &rest[..unit_at];
    if num_str.is_empty() {
        return Err(anyhow!("Invalid relative format"));
    }
    let count: u32 = num_str.parse().map_err(|_| anyhow!("Invalid relative format"))?;

    match unit {
        'd' => add_days(today, count as u64),
        'w' => add_days(today, count as u64 * 7),
        // chrono clamps Jan 31 + 1m to the end of February.
        'm' => today
            .checked_add_months(Months::new(count))
            .ok_or_else(|| anyhow!("Date out of range")),
        _ => Err(anyhow!("Unknown unit in relative time: {}", unit)),
    }
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| anyhow!("Date out of range"))
}

fn end_of_month(today: NaiveDate) -> Result<NaiveDate> {
    let first = today
        .with_day(1)
        .and_then(|d| d.checked_add_months(Months::new(1)))
        .ok_or_else(|| anyhow!("Date out of range"))?;
    first.pred_opt().ok_or_else(|| anyhow!("Date out of range"))
}

fn parse_weekday_token(input: &str) -> Option<(i64, &str)> {
    if input.contains(':') {
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() == 2 {
            if let Ok(count) = parts[0].parse::<i64>() {
                return Some((count, parts[1]));
            }
        }
    } else {
        // Just "fri" means 1:fri
        return Some((1, input));
    }
    None
}

fn parse_weekday_str(s: &str) -> Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        _ => Err(anyhow!("Invalid weekday")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // 2024-03-06 is a Wednesday.
    const WED: (i32, u32, u32) = (2024, 3, 6);

    fn wed() -> NaiveDate {
        date(WED.0, WED.1, WED.2)
    }

    #[test]
    fn test_parse_weekday_token() {
        assert_eq!(parse_weekday_token("fri"), Some((1, "fri")));
        assert_eq!(parse_weekday_token("2:fri"), Some((2, "fri")));
        assert_eq!(parse_weekday_token("10:mon"), Some((10, "mon")));
        assert_eq!(parse_weekday_token("invalid"), Some((1, "invalid"))); // fails later at weekday parse
    }

    #[test]
    fn keywords() {
        assert_eq!(parse_human_date("today", wed()).unwrap(), wed());
        assert_eq!(parse_human_date("TOM", wed()).unwrap(), date(2024, 3, 7));
        assert_eq!(parse_human_date("eow", wed()).unwrap(), date(2024, 3, 10));
        assert_eq!(parse_human_date("eom", wed()).unwrap(), date(2024, 3, 31));
        assert_eq!(parse_human_date("eom", date(2024, 12, 15)).unwrap(), date(2024, 12, 31));
    }

    #[test]
    fn relative_offsets() {
        assert_eq!(parse_human_date("+3d", wed()).unwrap(), date(2024, 3, 9));
        assert_eq!(parse_human_date("+2w", wed()).unwrap(), date(2024, 3, 20));
        assert_eq!(parse_human_date("+1m", date(2024, 1, 31)).unwrap(), date(2024, 2, 29));
        assert!(parse_human_date("+d", wed()).is_err());
        assert!(parse_human_date("+3y", wed()).is_err());
    }

    #[test]
    fn weekdays_are_always_in_the_future() {
        assert_eq!(parse_human_date("fri", wed()).unwrap(), date(2024, 3, 8));
        assert_eq!(parse_human_date("wed", wed()).unwrap(), date(2024, 3, 13));
        assert_eq!(parse_human_date("2:fri", wed()).unwrap(), date(2024, 3, 15));
    }

    #[test]
    fn iso_dates_and_garbage() {
        assert_eq!(parse_human_date("2025-01-01", wed()).unwrap(), date(2025, 1, 1));
        assert!(parse_human_date("2025-13-01", wed()).is_err());
        assert!(parse_human_date("someday", wed()).is_err());
    }

    #[test]
    fn out_of_range_input_is_an_error() {
        assert!(parse_human_date("+é", wed()).is_err());
        assert!(parse_human_date("+3é", wed()).is_err());
        assert!(parse_human_date("+4000000000d", wed()).is_err());
        assert!(parse_human_date("+4000000000w", wed()).is_err());
        assert!(parse_human_date("99999999999999:fri", wed()).is_err());
        assert!(parse_human_date("tomorrow", NaiveDate::MAX).is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(format_due(date(2024, 3, 5)), "Mar 5, 2024");
    }
}
