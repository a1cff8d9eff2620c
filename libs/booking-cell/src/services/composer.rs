use std::collections::HashSet;

use chrono::NaiveTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    BookingError, BookingPayload, BookingRequest, BookingType, ConsultationSlot, DepositStatus,
    PriceBreakdown, ServiceSlot,
};
use crate::services::catalog::ServiceCatalog;
use crate::services::pricing::PricingCalculator;

/// A validated payload and the price it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedBooking {
    pub payload: BookingPayload,
    pub price: PriceBreakdown,
}

/// Turns a booking request into the typed payload for payment initiation.
///
/// Validation happens before any payload exists; a payload is never partially
/// built. Discount and deposit come from the calculator, not the request.
#[derive(Debug, Clone, Default)]
pub struct BookingComposer {
    pricing: PricingCalculator,
}

impl BookingComposer {
    pub fn new(pricing: PricingCalculator) -> Self {
        Self { pricing }
    }

    pub fn compose(
        &self,
        request: &BookingRequest,
        catalog: &ServiceCatalog,
    ) -> Result<ComposedBooking, BookingError> {
        let work_date = request.work_date.ok_or(BookingError::MissingField("workDate"))?;
        if request.medical_examination_ids.is_empty() {
            return Err(BookingError::MissingField("medicalExaminationIds"));
        }

        let selected = catalog.resolve(&request.medical_examination_ids)?;
        let medical_examination_ids: Vec<Uuid> = selected.iter().map(|service| service.id).collect();
        let has_consultation = selected.iter().any(|service| catalog.is_consultation(service));

        let price = self.pricing.calculate(&selected);
        let discount = self.pricing.discount_percent();
        let deposit = price.deposit;
        let deposit_status = DepositStatus::Pending;

        let payload = match request.booking_type {
            BookingType::ConsultationOnly => {
                let doctor_id = request.doctor_id.ok_or(BookingError::MissingField("doctorId"))?;
                let (start_time, end_time) = Self::explicit_window(request)?;
                if !has_consultation {
                    return Err(BookingError::invalid(
                        "medicalExaminationIds",
                        "a consultation booking must include the consultation service",
                    ));
                }
                if selected.iter().any(|service| !catalog.is_consultation(service)) {
                    return Err(BookingError::invalid(
                        "medicalExaminationIds",
                        "a consultation booking cannot include other services",
                    ));
                }

                BookingPayload::ConsultationOnly {
                    doctor_id,
                    work_date,
                    start_time,
                    end_time,
                    medical_examination_ids,
                    discount,
                    deposit,
                    deposit_status,
                }
            }
            BookingType::ServiceAndConsultation => {
                let doctor_id = request.doctor_id.ok_or(BookingError::MissingField("doctorId"))?;
                if request.service_slots.is_empty() {
                    return Err(BookingError::MissingField("serviceSlots"));
                }
                let consultation_slot = request
                    .consultation_slot
                    .ok_or(BookingError::MissingField("consultationSlot"))?;
                if !has_consultation {
                    return Err(BookingError::Configuration(
                        "selected services do not include a consultation service".to_string(),
                    ));
                }

                let ancillary: HashSet<Uuid> = selected
                    .iter()
                    .filter(|service| !catalog.is_consultation(service))
                    .map(|service| service.id)
                    .collect();
                let service_slots = Self::ordered_service_slots(&request.service_slots, &ancillary, consultation_slot)?;

                BookingPayload::ServiceAndConsultation {
                    doctor_id,
                    work_date,
                    service_slots,
                    consultation_slot,
                    medical_examination_ids,
                    discount,
                    deposit,
                    deposit_status,
                }
            }
            BookingType::PreventiveService => {
                let (start_time, end_time) = Self::explicit_window(request)?;
                if request.doctor_id.is_some() {
                    debug!("Ignoring doctorId on a preventive booking");
                }

                BookingPayload::PreventiveService {
                    doctor_id: None,
                    work_date,
                    start_time,
                    end_time,
                    medical_examination_ids,
                    discount,
                    deposit,
                    deposit_status,
                }
            }
        };

        info!(
            "Composed {} booking on {} with deposit {}",
            request.booking_type, work_date, deposit
        );

        Ok(ComposedBooking { payload, price })
    }

    fn explicit_window(request: &BookingRequest) -> Result<(NaiveTime, NaiveTime), BookingError> {
        let start = request.start_time.ok_or(BookingError::MissingField("startTime"))?;
        let end = request.end_time.ok_or(BookingError::MissingField("endTime"))?;
        if end <= start {
            return Err(BookingError::invalid("endTime", "must be after startTime"));
        }
        Ok((start, end))
    }

    /// Slots sorted by start, one per ancillary service, non-overlapping and all
    /// finished before the consultation begins.
    fn ordered_service_slots(
        slots: &[ServiceSlot],
        ancillary: &HashSet<Uuid>,
        consultation: ConsultationSlot,
    ) -> Result<Vec<ServiceSlot>, BookingError> {
        let mut ordered = slots.to_vec();
        ordered.sort_by_key(|slot| slot.start_time);

        let slot_ids: HashSet<Uuid> = ordered.iter().map(|slot| slot.service_id).collect();
        if slot_ids.len() != ordered.len() || &slot_ids != ancillary {
            return Err(BookingError::invalid(
                "serviceSlots",
                "each selected service needs exactly one slot",
            ));
        }

        if ordered.iter().any(|slot| slot.end_time <= slot.start_time) {
            return Err(BookingError::invalid("serviceSlots", "slot ends before it starts"));
        }
        if ordered.windows(2).any(|pair| pair[0].end_time > pair[1].start_time) {
            return Err(BookingError::invalid("serviceSlots", "service slots overlap"));
        }

        if consultation.end_time <= consultation.start_time {
            return Err(BookingError::invalid("consultationSlot", "slot ends before it starts"));
        }
        let last_end = ordered.last().map(|slot| slot.end_time);
        if last_end.is_some_and(|end| consultation.start_time < end) {
            return Err(BookingError::invalid(
                "consultationSlot",
                "consultation must start after the last service",
            ));
        }

        Ok(ordered)
    }
}
