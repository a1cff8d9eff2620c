use std::cmp::Ordering;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::{debug, info};

use availability_cell::{DaySchedule, SlotBlockReason};
use shared_config::AppConfig;

use crate::models::{
    BookingError, ConsultationSlot, MedicalExamination, MultiStepTimeline, ServiceSlot, ServiceType,
};

/// Minutes and thresholds the sequencer works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencingRules {
    pub service_gap_minutes: i64,
    pub consultation_gap_minutes: i64,
    pub default_service_minutes: i64,
    pub default_consultation_minutes: i64,
    /// Services strictly shorter than this count as short.
    pub short_service_minutes: i64,
}

impl Default for SequencingRules {
    fn default() -> Self {
        Self {
            service_gap_minutes: 5,
            consultation_gap_minutes: 5,
            default_service_minutes: 30,
            default_consultation_minutes: 10,
            short_service_minutes: 30,
        }
    }
}

impl SequencingRules {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            service_gap_minutes: config.service_gap_minutes.max(0),
            consultation_gap_minutes: config.consultation_gap_minutes.max(0),
            ..Self::default()
        }
    }
}

/// Lower runs earlier: WAIT before STAY within each length band, short before long,
/// untyped services last.
pub fn service_priority(service: &MedicalExamination, rules: &SequencingRules) -> u8 {
    let short = service.duration_or(rules.default_service_minutes) < rules.short_service_minutes;
    match (service.service_type, short) {
        (Some(ServiceType::Wait), true) => 1,
        (Some(ServiceType::Stay), true) => 2,
        (Some(ServiceType::Wait), false) => 3,
        (Some(ServiceType::Stay), false) => 4,
        (None, _) => 5,
    }
}

/// Lays selected services and the consultation onto one day's filtered grid.
#[derive(Debug, Clone, Default)]
pub struct ServiceSequencer {
    rules: SequencingRules,
}

impl ServiceSequencer {
    pub fn new(rules: SequencingRules) -> Self {
        Self { rules }
    }

    /// Deterministic execution order. Ties fall back to duration, then name, then id.
    pub fn order_services<'a>(&self, services: &[&'a MedicalExamination]) -> Vec<&'a MedicalExamination> {
        let mut ordered = services.to_vec();
        ordered.sort_by(|a, b| self.compare(a, b));
        ordered
    }

    fn compare(&self, a: &MedicalExamination, b: &MedicalExamination) -> Ordering {
        let default = self.rules.default_service_minutes;
        service_priority(a, &self.rules)
            .cmp(&service_priority(b, &self.rules))
            .then_with(|| a.duration_or(default).cmp(&b.duration_or(default)))
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn consultation_minutes(&self, consultation: &MedicalExamination) -> i64 {
        consultation.duration_or(self.rules.default_consultation_minutes)
    }

    /// A consultation alone, starting at the chosen slot.
    pub fn sequence_consultation(
        &self,
        day: &DaySchedule,
        start: NaiveTime,
        consultation: &MedicalExamination,
    ) -> Result<MultiStepTimeline, BookingError> {
        self.require_start_slot(day, start)?;

        let minutes = self.consultation_minutes(consultation);
        let end = Self::fitting_window(day, start, minutes).ok_or_else(|| {
            BookingError::invalid(
                "startTime",
                format!("a {} minute consultation does not fit at {}", minutes, start),
            )
        })?;

        Ok(MultiStepTimeline {
            work_date: day.date,
            service_slots: Vec::new(),
            consultation_slot: ConsultationSlot { start_time: start, end_time: end },
        })
    }

    /// Services back to back from `start` in priority order, then the earliest
    /// consultation the grid can hold after the last one.
    pub fn sequence_services(
        &self,
        day: &DaySchedule,
        start: NaiveTime,
        services: &[&MedicalExamination],
        consultation: &MedicalExamination,
    ) -> Result<MultiStepTimeline, BookingError> {
        if services.is_empty() {
            return Err(BookingError::invalid(
                "medicalExaminationIds",
                "select at least one service besides the consultation",
            ));
        }
        self.require_start_slot(day, start)?;

        let date = day.date;
        let mut cursor = date.and_time(start);
        let mut service_slots = Vec::with_capacity(services.len());

        for service in self.order_services(services) {
            let minutes = service.duration_or(self.rules.default_service_minutes);
            let end = cursor + Duration::minutes(minutes);
            if !Self::ends_on(date, end) {
                return Err(BookingError::DataUnavailable(format!(
                    "{} would run past the end of {}",
                    service.name, date
                )));
            }

            service_slots.push(ServiceSlot {
                service_id: service.id,
                start_time: cursor.time(),
                end_time: end.time(),
            });
            cursor = end + Duration::minutes(self.rules.service_gap_minutes);
        }

        let last_end = service_slots
            .last()
            .map(|slot| date.and_time(slot.end_time))
            .unwrap_or(cursor);
        let earliest = last_end + Duration::minutes(self.rules.consultation_gap_minutes);
        let consultation_slot = self
            .find_consultation_slot(day, earliest, self.consultation_minutes(consultation))
            .ok_or_else(|| {
                BookingError::DataUnavailable(format!(
                    "no consultation slot is free after the selected services on {}",
                    date
                ))
            })?;

        info!(
            "Sequenced {} services on {} from {} with consultation at {}",
            service_slots.len(),
            date,
            start,
            consultation_slot.start_time
        );

        Ok(MultiStepTimeline {
            work_date: date,
            service_slots,
            consultation_slot,
        })
    }

    fn find_consultation_slot(
        &self,
        day: &DaySchedule,
        earliest: NaiveDateTime,
        minutes: i64,
    ) -> Option<ConsultationSlot> {
        if earliest.date() != day.date {
            return None;
        }

        day.available_slots()
            .filter(|slot| slot.start_time >= earliest.time())
            .find_map(|slot| {
                Self::fitting_window(day, slot.start_time, minutes).map(|end| ConsultationSlot {
                    start_time: slot.start_time,
                    end_time: end,
                })
            })
    }

    /// End time of a `minutes` window at `start` when contiguous available cells
    /// cover all of it on the same day.
    pub fn fitting_window(day: &DaySchedule, start: NaiveTime, minutes: i64) -> Option<NaiveTime> {
        let end = day.date.and_time(start) + Duration::minutes(minutes);
        if minutes <= 0 || !Self::ends_on(day.date, end) {
            return None;
        }

        let end = end.time();
        let mut cursor = start;
        while cursor < end {
            let cell = day.slot_starting_at(cursor).filter(|slot| slot.available)?;
            cursor = cell.end_time;
        }

        debug!("Window {}-{} fits on {}", start, end, day.date);
        Some(end)
    }

    fn require_start_slot(&self, day: &DaySchedule, start: NaiveTime) -> Result<(), BookingError> {
        let slot = day
            .slot_starting_at(start)
            .ok_or_else(|| BookingError::invalid("startTime", format!("{} is not a slot on {}", start, day.date)))?;

        if !slot.available {
            return Err(BookingError::SlotRejected {
                start: slot.start_time,
                end: slot.end_time,
                reason: slot.reason.unwrap_or(SlotBlockReason::DoctorBooked),
            });
        }
        Ok(())
    }

    fn ends_on(date: chrono::NaiveDate, end: NaiveDateTime) -> bool {
        end.date() == date
    }
}
