use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use availability_cell::{ClinicClock, Clock, ScheduleSource, SupabaseScheduleSource};
use shared_config::AppConfig;

use crate::models::{
    BookingContext, BookingDraft, BookingError, BookingPayload, BookingRequest, BookingType,
    MedicalExamination, MultiStepTimeline, PriceBreakdown, PriceRequest, TimelineRequest,
};
use crate::services::catalog::ServiceCatalog;
use crate::services::composer::BookingComposer;
use crate::services::conflict::ConflictFilter;
use crate::services::draft_store::DraftStore;
use crate::services::gateway::{BookingDataSource, SupabaseBookingSource};
use crate::services::payment::{HttpPaymentGateway, PaymentGateway};
use crate::services::pipeline::{BookingPipeline, BookingSession, ReadyDay};
use crate::services::pricing::PricingCalculator;
use crate::services::sequencer::{SequencingRules, ServiceSequencer};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedBooking {
    pub redirect_url: String,
    pub draft: BookingDraft,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTimeline {
    pub timeline: MultiStepTimeline,
    pub price: PriceBreakdown,
}

/// Entry points for the booking flow: day loading, sequencing, pricing and submission.
pub struct BookingService {
    pipeline: BookingPipeline,
    drafts: Arc<dyn DraftStore>,
    payments: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    sequencer: ServiceSequencer,
    pricing: PricingCalculator,
    composer: BookingComposer,
    consultation_keyword: String,
    draft_ttl: Duration,
}

impl BookingService {
    pub fn new(config: &AppConfig, drafts: Arc<dyn DraftStore>) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(SupabaseScheduleSource::new(config)),
            Arc::new(SupabaseBookingSource::new(config)),
            drafts,
            Arc::new(HttpPaymentGateway::new(config)),
        )
    }

    pub fn with_collaborators(
        config: &AppConfig,
        schedules: Arc<dyn ScheduleSource>,
        data: Arc<dyn BookingDataSource>,
        drafts: Arc<dyn DraftStore>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let pricing = PricingCalculator::from_config(config);
        Self {
            pipeline: BookingPipeline::new(schedules, data),
            drafts,
            payments,
            clock: Arc::new(ClinicClock::from_offset_minutes(config.clinic_utc_offset_minutes)),
            sequencer: ServiceSequencer::new(SequencingRules::from_config(config)),
            pricing,
            composer: BookingComposer::new(pricing),
            consultation_keyword: config.consultation_service_keyword.clone(),
            draft_ttl: Duration::from_secs(config.booking_draft_ttl_seconds),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fetches, filters and returns one doctor-day for the caller.
    pub async fn load_day(
        &self,
        context: &BookingContext,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<ReadyDay, BookingError> {
        let mut session = BookingSession::new(context.clone(), self.clock.clone());
        session.load(&self.pipeline, doctor_id, date).await;
        session.into_ready()
    }

    pub async fn load_catalog(
        &self,
        context: &BookingContext,
        specialty_code: &str,
    ) -> Result<ServiceCatalog, BookingError> {
        let services = self.pipeline
            .data()
            .fetch_services_by_specialty(specialty_code, context.token())
            .await?;

        let catalog = ServiceCatalog::new(services, self.consultation_keyword.clone());
        if catalog.is_empty() {
            return Err(BookingError::DataUnavailable(format!(
                "no services are offered for specialty {}",
                specialty_code
            )));
        }
        Ok(catalog)
    }

    /// Sequences the selection onto the chosen day and prices it.
    pub async fn plan_timeline(
        &self,
        context: &BookingContext,
        request: &TimelineRequest,
    ) -> Result<PlannedTimeline, BookingError> {
        if request.booking_type == BookingType::PreventiveService {
            return Err(BookingError::invalid(
                "bookingType",
                "preventive bookings carry their own window",
            ));
        }

        let (catalog, ready) = tokio::try_join!(
            self.load_catalog(context, &request.specialty_code),
            self.load_day(context, request.doctor_id, request.work_date),
        )?;

        let (ancillary, consultation) = catalog.split(&request.medical_examination_ids)?;
        let timeline = match request.booking_type {
            BookingType::ServiceAndConsultation => {
                self.sequencer.sequence_services(&ready.day, request.start_time, &ancillary, consultation)?
            }
            _ => {
                if !ancillary.is_empty() {
                    return Err(BookingError::invalid(
                        "medicalExaminationIds",
                        "a consultation booking cannot include other services",
                    ));
                }
                self.sequencer.sequence_consultation(&ready.day, request.start_time, consultation)?
            }
        };
        ready.check_timeline(&timeline)?;

        let mut priced: Vec<&MedicalExamination> = ancillary;
        priced.push(consultation);

        Ok(PlannedTimeline {
            timeline,
            price: self.pricing.calculate(&priced),
        })
    }

    pub async fn quote(
        &self,
        context: &BookingContext,
        request: &PriceRequest,
    ) -> Result<PriceBreakdown, BookingError> {
        let catalog = self.load_catalog(context, &request.specialty_code).await?;
        let selected = catalog.resolve(&request.medical_examination_ids)?;
        Ok(self.pricing.calculate(&selected))
    }

    /// Validates, re-checks conflicts, stores the draft and starts the deposit payment.
    /// A failed payment initiation removes the draft again.
    pub async fn submit(
        &self,
        context: &BookingContext,
        request: &BookingRequest,
    ) -> Result<SubmittedBooking, BookingError> {
        let specialty_code = request
            .specialty_code
            .as_deref()
            .ok_or(BookingError::MissingField("specialtyCode"))?;

        let catalog = self.load_catalog(context, specialty_code).await?;
        let composed = self.composer.compose(request, &catalog)?;
        self.verify_payload(context, &composed.payload, &catalog).await?;

        let draft = BookingDraft {
            patient_id: context.patient_id,
            payload: composed.payload,
            total_price: composed.price.total,
            discounted_price: composed.price.discounted,
            created_at: Utc::now(),
        };
        self.drafts.save(&draft, self.draft_ttl).await?;

        match self.payments.initiate_deposit(&draft, context.token()).await {
            Ok(redirect_url) => {
                info!(
                    "Booking draft for patient {} stored, deposit {} pending",
                    context.patient_id,
                    draft.payload.deposit()
                );
                Ok(SubmittedBooking { redirect_url, draft })
            }
            Err(err) => {
                error!("Deposit initiation failed for patient {}: {}", context.patient_id, err);
                if let Err(clear_err) = self.drafts.clear(context.patient_id).await {
                    warn!("Could not remove draft after failed payment: {}", clear_err);
                }
                Err(err)
            }
        }
    }

    pub async fn resume_draft(&self, context: &BookingContext) -> Result<Option<BookingDraft>, BookingError> {
        self.drafts.load(context.patient_id).await
    }

    pub async fn clear_draft(&self, context: &BookingContext) -> Result<(), BookingError> {
        self.drafts.clear(context.patient_id).await
    }

    async fn verify_payload(
        &self,
        context: &BookingContext,
        payload: &BookingPayload,
        catalog: &ServiceCatalog,
    ) -> Result<(), BookingError> {
        match payload.doctor_id() {
            Some(doctor_id) => {
                let ready = self.load_day(context, doctor_id, payload.work_date()).await?;
                ready.check_payload(payload)?;
                self.check_sequence(&ready, payload, catalog)
            }
            None => {
                let patient_appointments = self.pipeline
                    .data()
                    .fetch_appointments_for_patient(context.patient_id, context.token())
                    .await?;
                let (start, end) = payload.patient_window();

                ConflictFilter::new(self.clock.now())
                    .with_patient_appointments(&patient_appointments)
                    .validate_window(payload.work_date(), start, end)
                    .map_err(|reason| BookingError::SlotRejected { start, end, reason })
            }
        }
    }

    /// Submitted windows must be exactly the timeline the sequencer derives from
    /// the first submitted start on the filtered day.
    fn check_sequence(
        &self,
        ready: &ReadyDay,
        payload: &BookingPayload,
        catalog: &ServiceCatalog,
    ) -> Result<(), BookingError> {
        let (ancillary, consultation) = catalog.split(payload.medical_examination_ids())?;

        match payload {
            BookingPayload::ConsultationOnly { start_time, end_time, .. } => {
                let expected = self.sequencer.sequence_consultation(&ready.day, *start_time, consultation)?;
                if expected.consultation_slot.end_time != *end_time {
                    return Err(BookingError::invalid(
                        "endTime",
                        format!(
                            "a consultation starting at {} ends at {}",
                            start_time, expected.consultation_slot.end_time
                        ),
                    ));
                }
            }
            BookingPayload::ServiceAndConsultation { service_slots, consultation_slot, .. } => {
                let start = service_slots
                    .first()
                    .map(|slot| slot.start_time)
                    .ok_or(BookingError::MissingField("serviceSlots"))?;
                let expected = self.sequencer.sequence_services(&ready.day, start, &ancillary, consultation)?;

                if *service_slots != expected.service_slots {
                    return Err(BookingError::invalid(
                        "serviceSlots",
                        "services must run in priority order for their full duration with the fixed gap",
                    ));
                }
                if *consultation_slot != expected.consultation_slot {
                    return Err(BookingError::invalid(
                        "consultationSlot",
                        format!(
                            "the consultation runs {}-{}",
                            expected.consultation_slot.start_time, expected.consultation_slot.end_time
                        ),
                    ));
                }
            }
            BookingPayload::PreventiveService { .. } => {}
        }

        Ok(())
    }
}
