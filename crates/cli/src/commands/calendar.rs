use chrono::Datelike;
use mediaplan_core::calendar::{is_leap_year, CalendarAllocation};
use mediaplan_core::domain::plan::PlanPeriod;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct CalendarDayView {
    day: String,
    date: String,
    weekday: String,
}

#[derive(Debug, Serialize)]
struct CalendarView {
    year: i32,
    month: u32,
    days_in_month: u32,
    leap_year: bool,
    days: Vec<CalendarDayView>,
}

pub fn run(year: i32, month: u32) -> CommandResult {
    let period = match PlanPeriod::new(year, month) {
        Ok(period) => period,
        Err(error) => return CommandResult::failure("calendar", error.kind(), error.to_string(), 2),
    };

    let allocation = CalendarAllocation::new(period);
    let days = allocation
        .days()
        .into_iter()
        .map(|date| CalendarDayView {
            day: format!("{:02}", date.day()),
            date: date.format("%Y-%m-%d").to_string(),
            weekday: date.weekday().to_string(),
        })
        .collect();

    let view = CalendarView {
        year,
        month,
        days_in_month: allocation.days_in_month(),
        leap_year: is_leap_year(year),
        days,
    };
    CommandResult::success_with_data(
        "calendar",
        format!("{period} has {} days", view.days_in_month),
        &view,
    )
}
