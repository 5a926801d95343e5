//! Time Window Resolver
//!
//! Intersects weekly opening hours and date-specific exceptions into a
//! per-date feasibility window, and schedules arrival/wait/service within it.
//! A day window is an ordered list of disjoint sub-ranges — a lunch-break gap
//! is simply two ranges. An empty list means closed all day.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::types::{ServiceLocationException, ServiceLocationHours};

/// Minutes in a day; windows are `[open, close)` with `close <= 1440`.
pub const DAY_MINUTES: i32 = 1440;

/// A single open sub-range in minutes-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub open: i32,
    pub close: i32,
}

/// Feasibility window for one date. Empty ranges = closed (infeasible).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayWindow {
    ranges: Vec<WindowRange>,
}

impl DayWindow {
    pub fn closed() -> Self {
        Self { ranges: vec![] }
    }

    pub fn always_open() -> Self {
        Self { ranges: vec![WindowRange { open: 0, close: DAY_MINUTES }] }
    }

    /// Build from candidate ranges, dropping invalid ones and ordering by
    /// opening minute. Overlapping ranges are kept as given; feasibility
    /// checking only relies on the ordering.
    pub fn from_ranges(candidates: Vec<WindowRange>) -> Self {
        let mut ranges: Vec<WindowRange> = candidates
            .into_iter()
            .filter(|r| r.open >= 0 && r.close <= DAY_MINUTES && r.close > r.open)
            .collect();
        ranges.sort_by_key(|r| r.open);
        Self { ranges }
    }

    pub fn is_closed(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[WindowRange] {
        &self.ranges
    }
}

/// Build a single-range window. Invalid or missing inputs resolve to closed.
pub fn build_window(is_closed: bool, open: Option<i32>, close: Option<i32>) -> DayWindow {
    if is_closed {
        return DayWindow::closed();
    }
    match (open, close) {
        (Some(open), Some(close)) => DayWindow::from_ranges(vec![WindowRange { open, close }]),
        _ => DayWindow::closed(),
    }
}

/// Resolve the feasibility window of one location for one date.
///
/// A date-specific exception fully replaces the weekly determination: a
/// closed exception means infeasible regardless of weekly hours, an open
/// exception defines the only usable range that day. Without weekly rows the
/// location is always open.
pub fn resolve_for_date(
    weekly: &[ServiceLocationHours],
    exceptions: &[ServiceLocationException],
    date: NaiveDate,
) -> DayWindow {
    if let Some(exception) = exceptions.iter().find(|e| e.date == date) {
        return build_window(exception.is_closed, exception.open_minute, exception.close_minute);
    }

    // 0-6, Sunday-first, matching the stored day_of_week convention
    let day_of_week = date.weekday().num_days_from_sunday() as i16;
    match weekly.iter().find(|h| h.day_of_week == day_of_week) {
        None => DayWindow::always_open(),
        Some(hours) if hours.is_closed => DayWindow::closed(),
        Some(hours) => {
            let mut ranges = vec![];
            if let (Some(open), Some(close)) = (hours.open_minute, hours.close_minute) {
                ranges.push(WindowRange { open, close });
            }
            if let (Some(open), Some(close)) = (hours.open_minute_2, hours.close_minute_2) {
                ranges.push(WindowRange { open, close });
            }
            if ranges.is_empty() {
                // A row without any range carries no information
                DayWindow::closed()
            } else {
                DayWindow::from_ranges(ranges)
            }
        }
    }
}

/// A feasible placement of a service visit within a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledVisit {
    pub wait_minutes: i32,
    pub start_minute: i32,
    pub end_minute: i32,
}

/// Schedule a visit of `service_minutes` arriving at `arrival_minute`.
///
/// Sub-ranges are evaluated independently in opening order and the earliest
/// one where the full service fits after waiting wins. Arriving before open
/// waits until open; feasibility requires `start + service <= close`.
pub fn try_schedule(window: &DayWindow, arrival_minute: i32, service_minutes: i32) -> Option<ScheduledVisit> {
    if service_minutes < 0 {
        return None;
    }
    for range in window.ranges() {
        let start = arrival_minute.max(range.open);
        if start + service_minutes <= range.close {
            return Some(ScheduledVisit {
                wait_minutes: start - arrival_minute,
                start_minute: start,
                end_minute: start + service_minutes,
            });
        }
    }
    None
}

/// Convert a minute-of-day into a `NaiveTime`, clamped to the day.
pub fn minute_to_time(minute: i32) -> NaiveTime {
    let clamped = minute.clamp(0, DAY_MINUTES - 1) as u32;
    NaiveTime::from_hms_opt(clamped / 60, clamped % 60, 0)
        .unwrap_or_else(|| NaiveTime::from_hms_opt(23, 59, 0).expect("valid time"))
}
