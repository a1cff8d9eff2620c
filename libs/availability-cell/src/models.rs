use std::fmt;

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

// ==============================================================================
// SCHEDULE INPUT
// ==============================================================================

/// Length of one grid cell. Every bookable window is composed from these.
pub const SLOT_MINUTES: i64 = 10;

/// Mon..Sat. Sunday is never part of the bookable window.
pub const BUSINESS_DAYS_PER_WEEK: i64 = 6;

/// Current week plus the following one.
pub const WEEKS_SHOWN: i64 = 2;

/// One continuous working interval for a doctor on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyScheduleEntry {
    #[serde(alias = "work_date")]
    pub work_date: NaiveDate,
    #[serde(alias = "start_time")]
    pub start_time: NaiveTime,
    #[serde(alias = "end_time")]
    pub end_time: NaiveTime,
}

impl WeeklyScheduleEntry {
    pub fn is_valid(&self) -> bool {
        self.start_time < self.end_time
    }
}

/// Working hours used for a week in which the doctor published nothing.
#[derive(Debug, Clone)]
pub struct ScheduleTemplate {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub working_days: Vec<Weekday>,
}

impl Default for ScheduleTemplate {
    fn default() -> Self {
        Self {
            start_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap_or(NaiveTime::MIN),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
        }
    }
}

impl ScheduleTemplate {
    pub fn works_on(&self, weekday: Weekday) -> bool {
        self.working_days.contains(&weekday)
    }
}

// ==============================================================================
// SLOT GRID
// ==============================================================================

/// Why a slot cannot be picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotBlockReason {
    DoctorBooked,
    PatientConflict,
    PastTime,
}

impl fmt::Display for SlotBlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotBlockReason::DoctorBooked => write!(f, "doctor-booked"),
            SlotBlockReason::PatientConflict => write!(f, "patient-conflict"),
            SlotBlockReason::PastTime => write!(f, "past-time"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SlotBlockReason>,
}

impl TimeSlot {
    pub fn open(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            start_time,
            end_time,
            available: true,
            reason: None,
        }
    }

    /// Marks the slot unavailable. The first reason recorded wins.
    pub fn block(&mut self, reason: SlotBlockReason) {
        self.available = false;
        if self.reason.is_none() {
            self.reason = Some(reason);
        }
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn overlaps(&self, start: NaiveTime, end: NaiveTime) -> bool {
        self.start_time < end && self.end_time > start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WeekLabel {
    ThisWeek,
    NextWeek,
}

impl WeekLabel {
    pub fn from_index(week: i64) -> Self {
        if week == 0 {
            WeekLabel::ThisWeek
        } else {
            WeekLabel::NextWeek
        }
    }
}

impl fmt::Display for WeekLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeekLabel::ThisWeek => write!(f, "This week"),
            WeekLabel::NextWeek => write!(f, "Next week"),
        }
    }
}

/// One calendar day's slot set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub label: String,
    pub week_label: WeekLabel,
    pub slots: Vec<TimeSlot>,
    /// True when the day's week follows the doctor's own schedule rather than the template.
    pub has_api_schedule: bool,
}

impl DaySchedule {
    pub fn label_for(date: NaiveDate) -> String {
        date.format("%a %d/%m").to_string()
    }

    pub fn available_slots(&self) -> impl Iterator<Item = &TimeSlot> {
        self.slots.iter().filter(|slot| slot.available)
    }

    pub fn slot_starting_at(&self, start: NaiveTime) -> Option<&TimeSlot> {
        self.slots.iter().find(|slot| slot.start_time == start)
    }

    pub fn has_slots(&self) -> bool {
        !self.slots.is_empty()
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Schedule data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for AvailabilityError {
    fn from(err: anyhow::Error) -> Self {
        AvailabilityError::Backend(err.to_string())
    }
}
