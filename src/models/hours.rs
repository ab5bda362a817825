use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursWindow {
    pub day: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub windows: Vec<HoursWindow>,
}

impl WorkingHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: WorkingHours = serde_json::from_str(s)?;
        hours.validate()?;
        Ok(hours)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for window in &self.windows {
            parse_weekday(&window.day)?;
            let start = parse_hhmm(&window.start)
                .ok_or_else(|| anyhow::anyhow!("invalid time format: {}", window.start))?;
            let end = parse_hhmm(&window.end)
                .ok_or_else(|| anyhow::anyhow!("invalid time format: {}", window.end))?;
            if start >= end {
                anyhow::bail!(
                    "window for {} ends before it starts: {}-{}",
                    window.day,
                    window.start,
                    window.end
                );
            }
        }
        Ok(())
    }

    pub fn window_for(&self, date: NaiveDate) -> Option<&HoursWindow> {
        let weekday = date.format("%a").to_string().to_lowercase();
        self.windows
            .iter()
            .find(|w| w.day.to_lowercase() == weekday)
    }

    pub fn to_human_readable(&self) -> String {
        if self.windows.is_empty() {
            return String::new();
        }

        let day_order = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

        let mut sorted = self.windows.clone();
        sorted.sort_by_key(|w| {
            day_order
                .iter()
                .position(|d| *d == w.day.to_lowercase())
                .unwrap_or(7)
        });

        sorted
            .iter()
            .map(|w| format!("{}: {}-{}", capitalize(&w.day), w.start, w.end))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Minutes from midnight for an `HH:MM` string, or None if malformed.
pub fn parse_hhmm(s: &str) -> Option<i32> {
    let (hour_str, minute_str) = s.split_once(':')?;
    let hour: i32 = hour_str.parse().ok()?;
    let minute: i32 = minute_str.parse().ok()?;
    if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
        return None;
    }
    Some(hour * 60 + minute)
}

pub fn format_hhmm(minutes: i32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<()> {
    match s.to_lowercase().as_str() {
        "mon" | "tue" | "wed" | "thu" | "fri" | "sat" | "sun" => Ok(()),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}
