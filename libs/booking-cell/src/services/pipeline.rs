use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use availability_cell::{AvailabilityBuilder, Clock, DaySchedule, ScheduleSource, SlotBlockReason, TimeSlot};

use crate::models::{Appointment, BookingContext, BookingError, BookingPayload, MultiStepTimeline};
use crate::services::conflict::{filter_day, ConflictFilter};
use crate::services::gateway::BookingDataSource;
use crate::services::sequencer::ServiceSequencer;

/// Identifies one day fetch. Only the most recently issued ticket may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    counter: Arc<AtomicU64>,
}

impl RequestGeneration {
    pub fn issue(&self) -> Ticket {
        Ticket(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.counter.load(Ordering::SeqCst) == ticket.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySelection {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
}

/// Raw inputs for one day, before conflict filtering.
#[derive(Debug, Clone)]
pub struct DaySnapshot {
    pub grid: DaySchedule,
    pub doctor_appointments: Vec<Appointment>,
    pub patient_appointments: Vec<Appointment>,
}

#[derive(Debug)]
pub struct DayFetch {
    pub ticket: Ticket,
    pub selection: DaySelection,
    pub result: Result<DaySnapshot, BookingError>,
}

/// A conflict-filtered day and the appointments it was filtered against.
#[derive(Debug, Clone)]
pub struct ReadyDay {
    pub selection: DaySelection,
    pub day: DaySchedule,
    pub doctor_appointments: Vec<Appointment>,
    pub patient_appointments: Vec<Appointment>,
    pub now: NaiveDateTime,
}

impl ReadyDay {
    pub fn check_timeline(&self, timeline: &MultiStepTimeline) -> Result<(), BookingError> {
        if timeline.work_date != self.selection.date {
            return Err(BookingError::invalid("workDate", "timeline is for a different day"));
        }
        let consultation = timeline.consultation_slot;
        self.check_windows(
            Some((consultation.start_time, consultation.end_time)),
            (timeline.starts_at(), timeline.ends_at()),
        )
    }

    pub fn check_payload(&self, payload: &BookingPayload) -> Result<(), BookingError> {
        if payload.work_date() != self.selection.date {
            return Err(BookingError::invalid("workDate", "booking is for a different day"));
        }
        self.check_windows(payload.doctor_window(), payload.patient_window())
    }

    /// The doctor window must sit on open cells of the filtered grid; the whole
    /// span must be in the future and clear of the patient's other bookings.
    fn check_windows(
        &self,
        doctor_window: Option<(NaiveTime, NaiveTime)>,
        patient_window: (NaiveTime, NaiveTime),
    ) -> Result<(), BookingError> {
        let date = self.selection.date;

        if let Some((start, end)) = doctor_window {
            if let Some(blocked) = self.day.slots.iter().find(|slot| !slot.available && slot.overlaps(start, end)) {
                return Err(BookingError::SlotRejected {
                    start,
                    end,
                    reason: blocked.reason.unwrap_or(SlotBlockReason::DoctorBooked),
                });
            }
            ConflictFilter::new(self.now)
                .with_doctor_appointments(&self.doctor_appointments)
                .validate_window(date, start, end)
                .map_err(|reason| BookingError::SlotRejected { start, end, reason })?;

            let minutes = (end - start).num_minutes();
            if ServiceSequencer::fitting_window(&self.day, start, minutes) != Some(end) {
                return Err(BookingError::invalid("startTime", "window is outside the doctor's working hours"));
            }
        }

        let (start, end) = patient_window;
        ConflictFilter::new(self.now)
            .with_patient_appointments(&self.patient_appointments)
            .validate_window(date, start, end)
            .map_err(|reason| BookingError::SlotRejected { start, end, reason })
    }
}

#[derive(Debug, Clone)]
pub enum DayView {
    Idle,
    Loading(DaySelection),
    Ready(ReadyDay),
    NoSlots { selection: DaySelection, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    Stale,
}

/// One patient's view of a selected day. Slots are only selectable once the
/// latest fetch has been applied and filtered.
///
/// Stale-fetch protection only holds for a session kept alive across selections
/// by a long-lived client. Server requests build one session per call, so each
/// sees exactly one ticket.
pub struct BookingSession {
    context: BookingContext,
    generation: RequestGeneration,
    clock: Arc<dyn Clock>,
    view: DayView,
}

impl BookingSession {
    pub fn new(context: BookingContext, clock: Arc<dyn Clock>) -> Self {
        Self {
            context,
            generation: RequestGeneration::default(),
            clock,
            view: DayView::Idle,
        }
    }

    pub fn view(&self) -> &DayView {
        &self.view
    }

    /// Starts a new fetch generation; anything still in flight becomes stale.
    pub fn select_day(&mut self, doctor_id: Uuid, date: NaiveDate) -> (Ticket, DaySelection) {
        let selection = DaySelection { doctor_id, date };
        let ticket = self.generation.issue();
        self.view = DayView::Loading(selection);
        debug!("Selected {} for doctor {} ({:?})", date, doctor_id, ticket);
        (ticket, selection)
    }

    /// Selects a day and applies its fetch, unless a newer selection overtook it.
    pub async fn load(&mut self, pipeline: &BookingPipeline, doctor_id: Uuid, date: NaiveDate) -> ApplyOutcome {
        let (ticket, selection) = self.select_day(doctor_id, date);
        let fetch = pipeline
            .fetch_day(ticket, selection, &self.context, self.clock.today())
            .await;
        self.apply(fetch)
    }

    pub fn apply(&mut self, fetch: DayFetch) -> ApplyOutcome {
        if !self.generation.is_current(fetch.ticket) {
            warn!("Discarding stale fetch for {}", fetch.selection.date);
            return ApplyOutcome::Stale;
        }

        self.view = match fetch.result {
            Ok(snapshot) => {
                let now = self.clock.now();
                let day = filter_day(&snapshot.grid, &snapshot.doctor_appointments, now);
                DayView::Ready(ReadyDay {
                    selection: fetch.selection,
                    day,
                    doctor_appointments: snapshot.doctor_appointments,
                    patient_appointments: snapshot.patient_appointments,
                    now,
                })
            }
            Err(err) => {
                warn!("Day {} has no bookable slots: {}", fetch.selection.date, err);
                DayView::NoSlots {
                    selection: fetch.selection,
                    reason: err.to_string(),
                }
            }
        };
        ApplyOutcome::Applied
    }

    pub fn ready(&self) -> Option<&ReadyDay> {
        match &self.view {
            DayView::Ready(ready) => Some(ready),
            _ => None,
        }
    }

    pub fn selectable_slots(&self) -> Vec<&TimeSlot> {
        self.ready()
            .map(|ready| ready.day.available_slots().collect())
            .unwrap_or_default()
    }

    pub fn into_ready(self) -> Result<ReadyDay, BookingError> {
        match self.view {
            DayView::Ready(ready) => Ok(ready),
            DayView::NoSlots { reason, .. } => Err(BookingError::DataUnavailable(reason)),
            DayView::Idle | DayView::Loading(_) => {
                Err(BookingError::DataUnavailable("day has not finished loading".to_string()))
            }
        }
    }
}

/// Fetches everything a day view needs, concurrently.
pub struct BookingPipeline {
    schedules: Arc<dyn ScheduleSource>,
    data: Arc<dyn BookingDataSource>,
    builder: AvailabilityBuilder,
}

impl BookingPipeline {
    pub fn new(schedules: Arc<dyn ScheduleSource>, data: Arc<dyn BookingDataSource>) -> Self {
        Self {
            schedules,
            data,
            builder: AvailabilityBuilder::default(),
        }
    }

    pub fn data(&self) -> &Arc<dyn BookingDataSource> {
        &self.data
    }

    pub async fn fetch_day(
        &self,
        ticket: Ticket,
        selection: DaySelection,
        context: &BookingContext,
        today: NaiveDate,
    ) -> DayFetch {
        let result = self.load_snapshot(selection, context, today).await;
        DayFetch { ticket, selection, result }
    }

    async fn load_snapshot(
        &self,
        selection: DaySelection,
        context: &BookingContext,
        today: NaiveDate,
    ) -> Result<DaySnapshot, BookingError> {
        let token = context.token();

        let (entries, doctor_appointments, patient_appointments) = tokio::try_join!(
            async {
                self.schedules
                    .fetch_weekly_schedule(selection.doctor_id, token)
                    .await
                    .map_err(BookingError::from)
            },
            self.data.fetch_appointments_for_doctor_on_date(selection.doctor_id, selection.date, token),
            self.data.fetch_appointments_for_patient(context.patient_id, token),
        )?;

        let grid = self.builder
            .day_grid(selection.doctor_id, today, selection.date, &entries)
            .ok_or_else(|| {
                BookingError::DataUnavailable(format!("{} is outside the bookable window", selection.date))
            })?;

        Ok(DaySnapshot {
            grid,
            doctor_appointments,
            patient_appointments,
        })
    }
}
