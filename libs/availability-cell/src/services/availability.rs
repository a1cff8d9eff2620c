use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    AvailabilityError, DaySchedule, ScheduleTemplate, TimeSlot, WeekLabel, WeeklyScheduleEntry,
    BUSINESS_DAYS_PER_WEEK, SLOT_MINUTES, WEEKS_SHOWN,
};
use crate::services::schedule::ScheduleSource;

/// Monday of the week containing `date`. Sunday belongs to the week that started six days earlier.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Contiguous fixed-length cells covering each interval. A trailing remainder shorter
/// than one cell is dropped; cells shared by overlapping intervals appear once.
pub fn generate_slots<I>(intervals: I, slot_minutes: i64) -> Vec<TimeSlot>
where
    I: IntoIterator<Item = (NaiveTime, NaiveTime)>,
{
    let step = Duration::minutes(slot_minutes);
    let mut cells: BTreeMap<NaiveTime, TimeSlot> = BTreeMap::new();

    for (start, end) in intervals {
        if start >= end {
            warn!("Ignoring empty or inverted working interval {}-{}", start, end);
            continue;
        }

        let mut current = start;
        loop {
            let (next, wrapped) = current.overflowing_add_signed(step);
            if wrapped != 0 || next > end {
                break;
            }
            cells.entry(current).or_insert_with(|| TimeSlot::open(current, next));
            current = next;
        }
    }

    cells.into_values().collect()
}

/// Turns a doctor's published intervals (or the default template) into the two-week grid.
#[derive(Debug, Clone)]
pub struct AvailabilityBuilder {
    template: ScheduleTemplate,
    slot_minutes: i64,
}

impl Default for AvailabilityBuilder {
    fn default() -> Self {
        Self::new(ScheduleTemplate::default())
    }
}

impl AvailabilityBuilder {
    pub fn new(template: ScheduleTemplate) -> Self {
        Self {
            template,
            slot_minutes: SLOT_MINUTES,
        }
    }

    /// Builds the 12-day window (Mon..Sat of this week and the next).
    ///
    /// The template applies per week: a week with any published entry only opens
    /// the dates that have one. Dates before `today` keep their place in the grid
    /// with no slots.
    pub fn compute_availability(
        &self,
        doctor_id: Uuid,
        today: NaiveDate,
        entries: &[WeeklyScheduleEntry],
    ) -> Vec<DaySchedule> {
        let first_monday = week_start(today);
        let mut days = Vec::with_capacity((WEEKS_SHOWN * BUSINESS_DAYS_PER_WEEK) as usize);

        for week in 0..WEEKS_SHOWN {
            let monday = first_monday + Duration::weeks(week);
            let sunday = monday + Duration::days(6);

            let week_entries: Vec<&WeeklyScheduleEntry> = entries
                .iter()
                .filter(|entry| entry.work_date >= monday && entry.work_date <= sunday)
                .collect();
            let has_api_schedule = !week_entries.is_empty();

            if !has_api_schedule {
                debug!("Doctor {} has no schedule for week of {}, using default template", doctor_id, monday);
            }

            for offset in 0..BUSINESS_DAYS_PER_WEEK {
                let date = monday + Duration::days(offset);

                let slots = if date < today {
                    Vec::new()
                } else if has_api_schedule {
                    generate_slots(
                        week_entries
                            .iter()
                            .filter(|entry| entry.work_date == date)
                            .map(|entry| (entry.start_time, entry.end_time)),
                        self.slot_minutes,
                    )
                } else if self.template.works_on(date.weekday()) {
                    generate_slots(
                        [(self.template.start_time, self.template.end_time)],
                        self.slot_minutes,
                    )
                } else {
                    Vec::new()
                };

                days.push(DaySchedule {
                    date,
                    label: DaySchedule::label_for(date),
                    week_label: WeekLabel::from_index(week),
                    slots,
                    has_api_schedule,
                });
            }
        }

        debug!(
            "Built {} days for doctor {} starting {} ({} bookable)",
            days.len(),
            doctor_id,
            first_monday,
            days.iter().filter(|day| day.has_slots()).count()
        );

        days
    }

    /// Grid for one date, from the same per-week rule as [`Self::compute_availability`].
    pub fn day_grid(
        &self,
        doctor_id: Uuid,
        today: NaiveDate,
        date: NaiveDate,
        entries: &[WeeklyScheduleEntry],
    ) -> Option<DaySchedule> {
        let window_start = week_start(today);
        if date < window_start || (week_start(date) - window_start).num_weeks() >= WEEKS_SHOWN {
            return None;
        }

        self.compute_availability(doctor_id, today, entries)
            .into_iter()
            .find(|day| day.date == date)
    }
}

/// Fetches a doctor's schedule and builds the grid. A failed fetch is reported,
/// never replaced by the template.
pub struct AvailabilityService {
    source: Arc<dyn ScheduleSource>,
    builder: AvailabilityBuilder,
}

impl AvailabilityService {
    pub fn new(source: Arc<dyn ScheduleSource>) -> Self {
        Self {
            source,
            builder: AvailabilityBuilder::default(),
        }
    }

    pub async fn get_two_week_availability(
        &self,
        doctor_id: Uuid,
        today: NaiveDate,
        auth_token: Option<&str>,
    ) -> Result<Vec<DaySchedule>, AvailabilityError> {
        let entries = self.source.fetch_weekly_schedule(doctor_id, auth_token).await?;
        Ok(self.builder.compute_availability(doctor_id, today, &entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> WeeklyScheduleEntry {
        WeeklyScheduleEntry { work_date: date, start_time: start, end_time: end }
    }

    #[test]
    fn week_start_anchors_on_monday() {
        // 2025-06-02 is a Monday.
        assert_eq!(week_start(d(2025, 6, 2)), d(2025, 6, 2));
        assert_eq!(week_start(d(2025, 6, 7)), d(2025, 6, 2));
        assert_eq!(week_start(d(2025, 6, 8)), d(2025, 6, 2));
        assert_eq!(week_start(d(2025, 6, 9)), d(2025, 6, 9));
    }

    #[test]
    fn generated_cells_are_contiguous_ten_minutes() {
        let slots = generate_slots([(t(8, 0), t(10, 0))], SLOT_MINUTES);

        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0].start_time, t(8, 0));
        assert_eq!(slots[11].end_time, t(10, 0));
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
        assert!(slots.iter().all(|s| s.duration_minutes() == 10 && s.available));
    }

    #[test]
    fn remainder_and_inverted_intervals_are_dropped() {
        let slots = generate_slots([(t(8, 0), t(8, 25)), (t(12, 0), t(11, 0))], SLOT_MINUTES);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end_time, t(8, 20));
    }

    #[test]
    fn overlapping_intervals_share_cells() {
        let slots = generate_slots([(t(9, 0), t(10, 0)), (t(8, 30), t(9, 30))], SLOT_MINUTES);

        assert_eq!(slots.first().unwrap().start_time, t(8, 30));
        assert_eq!(slots.last().unwrap().end_time, t(10, 0));
        assert_eq!(slots.len(), 9);
    }

    #[test]
    fn late_interval_does_not_wrap_past_midnight() {
        let slots = generate_slots([(t(23, 40), NaiveTime::from_hms_opt(23, 59, 59).unwrap())], SLOT_MINUTES);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn empty_schedule_uses_template_for_both_weeks() {
        let builder = AvailabilityBuilder::default();
        let days = builder.compute_availability(Uuid::new_v4(), d(2025, 6, 2), &[]);

        assert_eq!(days.len(), 12);
        assert!(days.iter().all(|day| day.date.weekday() != Weekday::Sun));
        for day in &days {
            assert!(!day.has_api_schedule);
            assert_eq!(day.slots.first().unwrap().start_time, t(7, 0));
            assert_eq!(day.slots.last().unwrap().end_time, t(17, 0));
            assert_eq!(day.slots.len(), 60);
        }
        assert_eq!(days[0].week_label, WeekLabel::ThisWeek);
        assert_eq!(days[6].week_label, WeekLabel::NextWeek);
        assert_eq!(days[6].date, d(2025, 6, 9));
    }

    #[test]
    fn single_entry_opens_only_its_day_in_that_week() {
        let builder = AvailabilityBuilder::default();
        let entries = vec![entry(d(2025, 6, 2), t(8, 0), t(10, 0))];
        let days = builder.compute_availability(Uuid::new_v4(), d(2025, 6, 2), &entries);

        let monday = &days[0];
        assert_eq!(monday.date, d(2025, 6, 2));
        assert!(monday.has_api_schedule);
        assert!(monday.slots.iter().all(|s| s.start_time >= t(8, 0) && s.end_time <= t(10, 0)));
        assert_eq!(monday.slots.len(), 12);

        for day in &days[1..6] {
            assert!(day.slots.is_empty(), "{} should be closed", day.date);
            assert!(day.has_api_schedule);
        }

        // The following week has no entries and falls back to the template.
        assert!(days[6..].iter().all(|day| !day.has_api_schedule && day.has_slots()));
    }

    #[test]
    fn past_days_stay_in_grid_without_slots() {
        let builder = AvailabilityBuilder::default();
        // Thursday
        let days = builder.compute_availability(Uuid::new_v4(), d(2025, 6, 5), &[]);

        assert_eq!(days.len(), 12);
        assert!(days[..3].iter().all(|day| day.slots.is_empty()));
        assert!(days[3..].iter().all(|day| day.has_slots()));
    }

    #[test]
    fn sunday_shows_previous_week_as_past() {
        let builder = AvailabilityBuilder::default();
        let days = builder.compute_availability(Uuid::new_v4(), d(2025, 6, 8), &[]);

        assert_eq!(days[0].date, d(2025, 6, 2));
        assert!(days[..6].iter().all(|day| day.slots.is_empty()));
        assert!(days[6..].iter().all(|day| day.has_slots()));
    }

    #[test]
    fn sunday_entry_counts_toward_its_week() {
        let builder = AvailabilityBuilder::default();
        let entries = vec![entry(d(2025, 6, 8), t(8, 0), t(9, 0))];
        let days = builder.compute_availability(Uuid::new_v4(), d(2025, 6, 2), &entries);

        assert!(days[..6].iter().all(|day| day.has_api_schedule && day.slots.is_empty()));
    }

    #[test]
    fn day_grid_matches_window_and_rejects_far_dates() {
        let builder = AvailabilityBuilder::default();
        let doctor = Uuid::new_v4();
        let entries = vec![entry(d(2025, 6, 10), t(13, 0), t(14, 0))];

        let day = builder.day_grid(doctor, d(2025, 6, 4), d(2025, 6, 10), &entries).unwrap();
        assert_eq!(day.slots.len(), 6);
        assert_eq!(day.week_label, WeekLabel::NextWeek);

        assert!(builder.day_grid(doctor, d(2025, 6, 4), d(2025, 6, 16), &entries).is_none());
        assert!(builder.day_grid(doctor, d(2025, 6, 4), d(2025, 6, 8), &entries).is_none());
    }
}
