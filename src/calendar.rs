use crate::errors::{AppError, AppResult};
use crate::models::{CalendarCell, Record};
use chrono::{Datelike, Local, NaiveDate};

const CELLS_PER_WEEK: usize = 7;

/// Projects records onto a month grid for calendar rendering.
///
/// The grid starts with padding cells up to the weekday of the 1st
/// (0 = Sunday), holds one cell per day of the month, and is padded at the
/// end to a multiple of seven. Each day cell carries the records dated that
/// day in input order; records outside the month appear nowhere.
pub fn build_month_grid(year: i32, month: u32, records: &[Record]) -> AppResult<Vec<CalendarCell>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        AppError::InvalidArgument(format!("Invalid calendar month {}-{}", year, month))
    })?;

    let leading = first.weekday().num_days_from_sunday() as usize;
    let days = days_in_month(year, month);

    let mut cells = Vec::with_capacity((leading + days as usize).next_multiple_of(CELLS_PER_WEEK));
    cells.resize_with(leading, CalendarCell::padding);

    for day in 1..=days {
        // day stays within the month, so the date is always constructible
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| AppError::Internal(format!("day {} out of range", day)))?;
        let matching = records
            .iter()
            .filter(|record| record.date == date)
            .cloned()
            .collect();
        cells.push(CalendarCell {
            date: Some(date),
            records: matching,
        });
    }

    while cells.len() % CELLS_PER_WEEK != 0 {
        cells.push(CalendarCell::padding());
    }

    Ok(cells)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_start = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (next_month_start, NaiveDate::from_ymd_opt(year, month, 1)) {
        (Some(next), Some(first)) => (next - first).num_days() as u32,
        _ => 0,
    }
}

pub fn is_same_day(a: NaiveDate, b: NaiveDate) -> bool {
    a == b
}

/// Reads the wall clock on every call; callers must not cache the answer
/// across renders.
pub fn is_today(date: NaiveDate) -> bool {
    date == Local::now().date_naive()
}

/// Heading text for a month view, e.g. "September 2025".
pub fn month_label(year: i32, month: u32) -> AppResult<String> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        AppError::InvalidArgument(format!("Invalid calendar month {}-{}", year, month))
    })?;
    Ok(first.format("%B %Y").to_string())
}
