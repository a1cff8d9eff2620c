use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use availability_cell::{DaySchedule, SlotBlockReason};

use crate::models::Appointment;

/// Half-open interval overlap: touching windows do not conflict.
pub fn windows_overlap(
    start1: NaiveTime,
    end1: NaiveTime,
    start2: NaiveTime,
    end2: NaiveTime,
) -> bool {
    start1 < end2 && start2 < end1
}

/// Marks a day's grid against existing appointments and the current instant.
///
/// Only parent-level, non-cancelled appointments count. Every check in one
/// filter uses the same `now` snapshot.
pub struct ConflictFilter<'a> {
    now: NaiveDateTime,
    doctor_appointments: &'a [Appointment],
    patient_appointments: &'a [Appointment],
}

impl<'a> ConflictFilter<'a> {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            doctor_appointments: &[],
            patient_appointments: &[],
        }
    }

    pub fn with_doctor_appointments(mut self, appointments: &'a [Appointment]) -> Self {
        self.doctor_appointments = appointments;
        self
    }

    pub fn with_patient_appointments(mut self, appointments: &'a [Appointment]) -> Self {
        self.patient_appointments = appointments;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Doctor-booked and past-time marking. Patient conflicts are checked per
    /// candidate window instead, since they depend on the full booking span.
    pub fn apply(&self, day: &mut DaySchedule) {
        let date = day.date;
        let mut blocked = 0usize;

        for slot in day.slots.iter_mut().filter(|slot| slot.available) {
            if date.and_time(slot.start_time) < self.now {
                slot.block(SlotBlockReason::PastTime);
            } else if Self::any_overlap(self.doctor_appointments, date, slot.start_time, slot.end_time) {
                slot.block(SlotBlockReason::DoctorBooked);
            } else {
                continue;
            }
            blocked += 1;
        }

        debug!("Blocked {} of {} slots on {}", blocked, day.slots.len(), date);
    }

    /// Checks one candidate window. Past time is reported first, then the
    /// doctor's own bookings, then the patient's.
    pub fn validate_window(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<(), SlotBlockReason> {
        if date.and_time(start) < self.now {
            return Err(SlotBlockReason::PastTime);
        }
        if Self::any_overlap(self.doctor_appointments, date, start, end) {
            return Err(SlotBlockReason::DoctorBooked);
        }
        self.check_patient_window(date, start, end)
    }

    /// A patient may not hold two overlapping active bookings, across all doctors.
    pub fn check_patient_window(
        &self,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<(), SlotBlockReason> {
        if Self::any_overlap(self.patient_appointments, date, start, end) {
            return Err(SlotBlockReason::PatientConflict);
        }
        Ok(())
    }

    fn any_overlap(appointments: &[Appointment], date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        appointments
            .iter()
            .filter(|appointment| appointment.reserves_time())
            .filter(|appointment| appointment.work_date == date)
            .any(|appointment| windows_overlap(start, end, appointment.start_time, appointment.end_time))
    }
}

/// Grid with doctor and past-time conflicts applied, as a new value.
pub fn filter_day(day: &DaySchedule, doctor_appointments: &[Appointment], now: NaiveDateTime) -> DaySchedule {
    let mut filtered = day.clone();
    ConflictFilter::new(now)
        .with_doctor_appointments(doctor_appointments)
        .apply(&mut filtered);
    filtered
}
