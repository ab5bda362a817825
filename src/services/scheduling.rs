use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::ToolError;
use crate::models::hours::{format_hhmm, parse_hhmm};
use crate::models::WorkingHours;

pub const SLOT_MINUTES: i32 = 30;

/// Mutable availability ledger. Candidate start times are derived from the
/// working hours at a fixed granularity; booked marks live in the
/// `calendar_slots` table and are written only by the booking engine, so
/// availability checks never mutate anything.
pub struct CalendarStore {
    hours: WorkingHours,
    slot_minutes: i32,
}

impl CalendarStore {
    pub fn new(hours: WorkingHours) -> Self {
        Self {
            hours,
            slot_minutes: SLOT_MINUTES,
        }
    }

    /// Rejects unparseable and past dates. The booking engine applies the
    /// same rule, so availability and booking never disagree on it.
    pub fn parse_date(&self, date: &str, today: NaiveDate) -> Result<NaiveDate, ToolError> {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| ToolError::InvalidDate(format!("{date} is not a YYYY-MM-DD date")))?;
        if parsed < today {
            return Err(ToolError::InvalidDate(format!("{date} is in the past")));
        }
        Ok(parsed)
    }

    pub fn slots_needed(&self, duration_minutes: i32) -> usize {
        ((duration_minutes + self.slot_minutes - 1) / self.slot_minutes) as usize
    }

    /// Ordered start times on `date` where `duration_minutes` fits in
    /// consecutive unbooked slots inside working hours. A day the shop is
    /// closed yields an empty list; only a malformed or past date is an
    /// error.
    pub fn check_availability(
        &self,
        conn: &Connection,
        date: &str,
        duration_minutes: i32,
        today: NaiveDate,
    ) -> Result<Vec<String>, ToolError> {
        if duration_minutes <= 0 {
            return Err(ToolError::InvalidArguments(
                "duration_minutes must be positive".to_string(),
            ));
        }

        let day = self.parse_date(date, today)?;
        let grid = self.day_grid(day);
        let needed = self.slots_needed(duration_minutes);
        if grid.len() < needed {
            return Ok(vec![]);
        }

        let booked: HashSet<String> = queries::booked_slots_for_day(conn, day)
            .map_err(ToolError::Internal)?
            .into_iter()
            .collect();

        // the grid is contiguous by construction, so a window of `needed`
        // consecutive entries is exactly one candidate block
        let mut available = Vec::new();
        for window in grid.windows(needed) {
            if window.iter().all(|time| !booked.contains(time)) {
                available.push(window[0].clone());
            }
        }
        Ok(available)
    }

    /// Marks every slot covered by `duration_minutes` starting at
    /// `start_time` as booked. Callers must have re-checked availability
    /// first.
    pub fn mark_span_booked(
        &self,
        conn: &Connection,
        day: NaiveDate,
        start_time: &str,
        duration_minutes: i32,
    ) -> Result<(), ToolError> {
        let start = parse_hhmm(start_time).ok_or_else(|| {
            ToolError::InvalidArguments(format!("{start_time} is not an HH:MM time"))
        })?;

        for offset in 0..self.slots_needed(duration_minutes) {
            let time = format_hhmm(start + offset as i32 * self.slot_minutes);
            queries::mark_slot_booked(conn, day, &time).map_err(ToolError::Internal)?;
        }
        Ok(())
    }

    /// Candidate start times on `day`: every granularity step from opening
    /// until the last slot that still ends by closing.
    fn day_grid(&self, day: NaiveDate) -> Vec<String> {
        let Some(window) = self.hours.window_for(day) else {
            return vec![];
        };
        // validated at catalog load, but a bad window must not produce a grid
        let (Some(open), Some(close)) = (parse_hhmm(&window.start), parse_hhmm(&window.end)) else {
            return vec![];
        };

        let mut times = Vec::new();
        let mut start = open;
        while start + self.slot_minutes <= close {
            times.push(format_hhmm(start));
            start += self.slot_minutes;
        }
        times
    }
}
