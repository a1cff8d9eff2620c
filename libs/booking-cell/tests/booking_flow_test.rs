use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::{method, path, query_param}};

use availability_cell::{FixedClock, SlotBlockReason};
use booking_cell::{
    BookingContext, BookingError, BookingPayload, BookingRequest, BookingService, BookingType,
    ConsultationSlot, DraftStore, InMemoryDraftStore, PriceRequest, ServiceSlot, TimelineRequest,
};
use shared_utils::test_utils::TestConfig;

struct Backend {
    server: MockServer,
    doctor_id: Uuid,
    patient_id: Uuid,
    consult_id: Uuid,
    xray_id: Uuid,
    ecg_id: Uuid,
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn monday_morning() -> NaiveDateTime {
    d(2025, 6, 2).and_hms_opt(7, 30, 0).unwrap()
}

async fn backend() -> Backend {
    let server = MockServer::start().await;
    let backend = Backend {
        server,
        doctor_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        consult_id: Uuid::new_v4(),
        xray_id: Uuid::new_v4(),
        ecg_id: Uuid::new_v4(),
    };

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&backend.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", backend.doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "doctor_id": backend.doctor_id,
            "work_date": "2025-06-02",
            "start_time": "09:00:00",
            "end_time": "09:30:00",
            "status": "SCHEDULED",
            "parent_appointment_id": null
        }])))
        .mount(&backend.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", backend.patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patient_id": backend.patient_id,
            "doctor_id": Uuid::new_v4(),
            "work_date": "2025-06-02",
            "start_time": "11:00:00",
            "end_time": "11:20:00",
            "status": "SCHEDULED",
            "parent_appointment_id": null
        }])))
        .mount(&backend.server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/medical_examinations"))
        .and(query_param("specialty_code", "eq.CARD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": backend.consult_id, "name": "Cardiology consultation", "price": 300000, "min_duration": 10, "type": null, "role": "CONSULTATION" },
            { "id": backend.xray_id, "name": "Chest X-ray", "price": 200000, "min_duration": 10, "type": "WAIT", "role": "DIAGNOSTIC" },
            { "id": backend.ecg_id, "name": "ECG", "price": 100000, "min_duration": 20, "type": "STAY", "role": "DIAGNOSTIC" }
        ])))
        .mount(&backend.server)
        .await;

    backend
}

fn service_for(backend: &Backend, drafts: Arc<InMemoryDraftStore>) -> BookingService {
    let config = TestConfig::with_mock_server(&backend.server.uri()).to_app_config();
    BookingService::new(&config, drafts).with_clock(Arc::new(FixedClock(monday_morning())))
}

fn context(backend: &Backend) -> BookingContext {
    BookingContext::new(backend.patient_id, Some("patient-token".to_string()))
}

fn consultation_request(backend: &Backend, start: NaiveTime, end: NaiveTime) -> BookingRequest {
    BookingRequest {
        booking_type: BookingType::ConsultationOnly,
        specialty_code: Some("CARD".to_string()),
        work_date: Some(d(2025, 6, 2)),
        doctor_id: Some(backend.doctor_id),
        start_time: Some(start),
        end_time: Some(end),
        service_slots: vec![],
        consultation_slot: None,
        medical_examination_ids: vec![backend.consult_id],
    }
}

fn service_request(
    backend: &Backend,
    service_slots: Vec<ServiceSlot>,
    consultation: (NaiveTime, NaiveTime),
) -> BookingRequest {
    BookingRequest {
        booking_type: BookingType::ServiceAndConsultation,
        specialty_code: Some("CARD".to_string()),
        work_date: Some(d(2025, 6, 2)),
        doctor_id: Some(backend.doctor_id),
        start_time: None,
        end_time: None,
        service_slots,
        consultation_slot: Some(ConsultationSlot { start_time: consultation.0, end_time: consultation.1 }),
        medical_examination_ids: vec![backend.ecg_id, backend.xray_id, backend.consult_id],
    }
}

fn slot(service_id: Uuid, start: NaiveTime, end: NaiveTime) -> ServiceSlot {
    ServiceSlot { service_id, start_time: start, end_time: end }
}

fn preventive_request(backend: &Backend, start: NaiveTime, end: NaiveTime) -> BookingRequest {
    BookingRequest {
        booking_type: BookingType::PreventiveService,
        medical_examination_ids: vec![backend.xray_id],
        ..consultation_request(backend, start, end)
    }
}

async fn mount_payment(backend: &Backend, status: u16, calls: u64) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(json!({ "redirectUrl": "https://pay.example/session/abc" }))
    } else {
        ResponseTemplate::new(status).set_body_string("gateway down")
    };

    Mock::given(method("POST"))
        .and(path("/payments/deposit"))
        .respond_with(response)
        .expect(calls)
        .mount(&backend.server)
        .await;
}

#[tokio::test]
async fn day_marks_past_and_doctor_booked_slots() {
    let backend = backend().await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));

    let ready = service.load_day(&context(&backend), backend.doctor_id, d(2025, 6, 2)).await.unwrap();

    assert_eq!(ready.day.slots.len(), 60);
    assert_eq!(ready.day.slot_starting_at(t(7, 20)).unwrap().reason, Some(SlotBlockReason::PastTime));
    assert!(ready.day.slot_starting_at(t(7, 30)).unwrap().available);
    assert_eq!(ready.day.slot_starting_at(t(9, 10)).unwrap().reason, Some(SlotBlockReason::DoctorBooked));
    assert!(ready.day.slot_starting_at(t(9, 30)).unwrap().available);
}

#[tokio::test]
async fn consultation_submission_stores_draft_and_redirects() {
    let backend = backend().await;
    mount_payment(&backend, 200, 1).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    let submitted = service
        .submit(&context(&backend), &consultation_request(&backend, t(10, 0), t(10, 10)))
        .await
        .unwrap();

    assert_eq!(submitted.redirect_url, "https://pay.example/session/abc");
    assert_eq!(submitted.draft.total_price, 300_000);
    assert_matches!(
        submitted.draft.payload,
        BookingPayload::ConsultationOnly { deposit: 135_000, discount: 10, .. }
    );

    let stored = drafts.load(backend.patient_id).await.unwrap().unwrap();
    assert_eq!(stored, submitted.draft);
}

#[tokio::test]
async fn doctor_booked_window_is_rejected_before_payment() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    let result = service
        .submit(&context(&backend), &consultation_request(&backend, t(9, 10), t(9, 20)))
        .await;

    assert_matches!(result, Err(BookingError::SlotRejected { reason: SlotBlockReason::DoctorBooked, .. }));
    assert!(drafts.load(backend.patient_id).await.unwrap().is_none());
}

#[tokio::test]
async fn patient_overlap_with_another_doctor_is_rejected() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));

    let result = service
        .submit(&context(&backend), &consultation_request(&backend, t(11, 10), t(11, 20)))
        .await;

    assert_matches!(result, Err(BookingError::SlotRejected { reason: SlotBlockReason::PatientConflict, .. }));
}

#[tokio::test]
async fn failed_payment_removes_the_draft() {
    let backend = backend().await;
    mount_payment(&backend, 502, 1).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());
    let context = context(&backend);

    let result = service
        .submit(&context, &consultation_request(&backend, t(10, 0), t(10, 10)))
        .await;

    assert_matches!(result, Err(BookingError::Payment(_)));
    assert!(service.resume_draft(&context).await.unwrap().is_none());
}

#[tokio::test]
async fn timeline_orders_services_and_prices_the_selection() {
    let backend = backend().await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));

    let planned = service
        .plan_timeline(
            &context(&backend),
            &TimelineRequest {
                booking_type: BookingType::ServiceAndConsultation,
                specialty_code: "CARD".to_string(),
                doctor_id: backend.doctor_id,
                work_date: d(2025, 6, 2),
                start_time: t(8, 0),
                medical_examination_ids: vec![backend.ecg_id, backend.xray_id, backend.consult_id],
            },
        )
        .await
        .unwrap();

    let order: Vec<_> = planned.timeline.service_slots.iter().map(|slot| slot.service_id).collect();
    assert_eq!(order, vec![backend.xray_id, backend.ecg_id]);
    assert_eq!(planned.timeline.service_slots[1].start_time, t(8, 15));
    assert_eq!(planned.timeline.consultation_slot.start_time, t(8, 40));
    assert_eq!(planned.price.total, 600_000);
    assert_eq!(planned.price.discounted, 540_000);
    assert_eq!(planned.price.deposit, 270_000);
}

#[tokio::test]
async fn quote_rejects_unknown_services() {
    let backend = backend().await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));

    let result = service
        .quote(
            &context(&backend),
            &PriceRequest {
                specialty_code: "CARD".to_string(),
                medical_examination_ids: vec![Uuid::new_v4()],
            },
        )
        .await;

    assert_matches!(result, Err(BookingError::InvalidField { field: "medicalExaminationIds", .. }));
}

#[tokio::test]
async fn failed_appointment_fetch_leaves_no_slots() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_server(&server.uri()).to_app_config();
    let service = BookingService::new(&config, Arc::new(InMemoryDraftStore::new()))
        .with_clock(Arc::new(FixedClock(monday_morning())));

    let result = service
        .load_day(&BookingContext::new(Uuid::new_v4(), None), Uuid::new_v4(), d(2025, 6, 2))
        .await;

    assert_matches!(result, Err(BookingError::DataUnavailable(_)));
}

#[tokio::test]
async fn specialty_without_consultation_is_misconfigured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/medical_examinations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "name": "Ultrasound", "price": 250000, "min_duration": 20, "type": "STAY", "role": "DIAGNOSTIC" }
        ])))
        .mount(&server)
        .await;

    let config = TestConfig::with_mock_server(&server.uri()).to_app_config();
    let service = BookingService::new(&config, Arc::new(InMemoryDraftStore::new()));
    let catalog = service
        .load_catalog(&BookingContext::new(Uuid::new_v4(), None), "OBGYN")
        .await
        .unwrap();

    assert_matches!(catalog.consultation(), Err(BookingError::Configuration(_)));
}

#[tokio::test]
async fn consultation_must_last_its_configured_duration() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    let result = service
        .submit(&context(&backend), &consultation_request(&backend, t(12, 0), t(14, 0)))
        .await;

    assert_matches!(result, Err(BookingError::InvalidField { field: "endTime", .. }));
    assert!(drafts.load(backend.patient_id).await.unwrap().is_none());
}

#[tokio::test]
async fn consultation_only_plan_and_submit_agree_on_services() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));
    let ids = vec![backend.consult_id, backend.xray_id];

    let planned = service
        .plan_timeline(
            &context(&backend),
            &TimelineRequest {
                booking_type: BookingType::ConsultationOnly,
                specialty_code: "CARD".to_string(),
                doctor_id: backend.doctor_id,
                work_date: d(2025, 6, 2),
                start_time: t(10, 0),
                medical_examination_ids: ids.clone(),
            },
        )
        .await;
    assert_matches!(planned, Err(BookingError::InvalidField { field: "medicalExaminationIds", .. }));

    let mut request = consultation_request(&backend, t(10, 0), t(10, 10));
    request.medical_examination_ids = ids;
    let submitted = service.submit(&context(&backend), &request).await;
    assert_matches!(submitted, Err(BookingError::InvalidField { field: "medicalExaminationIds", .. }));
}

#[tokio::test]
async fn sequenced_service_booking_is_stored_and_paid() {
    let backend = backend().await;
    mount_payment(&backend, 200, 1).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    let request = service_request(
        &backend,
        vec![
            slot(backend.ecg_id, t(8, 15), t(8, 35)),
            slot(backend.xray_id, t(8, 0), t(8, 10)),
        ],
        (t(8, 40), t(8, 50)),
    );
    let submitted = service.submit(&context(&backend), &request).await.unwrap();

    assert_eq!(submitted.draft.total_price, 600_000);
    assert_eq!(submitted.draft.discounted_price, 540_000);
    assert_matches!(
        &submitted.draft.payload,
        BookingPayload::ServiceAndConsultation { service_slots, consultation_slot, deposit: 270_000, .. }
            if service_slots[0].service_id == backend.xray_id
                && service_slots[1].service_id == backend.ecg_id
                && consultation_slot.start_time == t(8, 40)
    );
    assert_eq!(drafts.load(backend.patient_id).await.unwrap(), Some(submitted.draft));
}

#[tokio::test]
async fn unsequenced_service_slots_are_rejected() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    // wrong order, one-minute services, no gaps
    let request = service_request(
        &backend,
        vec![
            slot(backend.ecg_id, t(8, 0), t(8, 1)),
            slot(backend.xray_id, t(8, 1), t(8, 2)),
        ],
        (t(8, 10), t(8, 11)),
    );
    let result = service.submit(&context(&backend), &request).await;

    assert_matches!(result, Err(BookingError::InvalidField { field: "serviceSlots", .. }));
    assert!(drafts.load(backend.patient_id).await.unwrap().is_none());
}

#[tokio::test]
async fn consultation_must_take_the_earliest_fitting_slot() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));

    let request = service_request(
        &backend,
        vec![
            slot(backend.xray_id, t(8, 0), t(8, 10)),
            slot(backend.ecg_id, t(8, 15), t(8, 35)),
        ],
        (t(9, 40), t(9, 50)),
    );
    let result = service.submit(&context(&backend), &request).await;

    assert_matches!(result, Err(BookingError::InvalidField { field: "consultationSlot", .. }));
}

#[tokio::test]
async fn patient_conflict_covers_the_whole_service_span() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let service = service_for(&backend, Arc::new(InMemoryDraftStore::new()));

    // the consultation itself clears 11:00-11:20, the ECG does not
    let request = service_request(
        &backend,
        vec![
            slot(backend.xray_id, t(10, 40), t(10, 50)),
            slot(backend.ecg_id, t(10, 55), t(11, 15)),
        ],
        (t(11, 20), t(11, 30)),
    );
    let result = service.submit(&context(&backend), &request).await;

    assert_matches!(result, Err(BookingError::SlotRejected { reason: SlotBlockReason::PatientConflict, .. }));
}

#[tokio::test]
async fn preventive_booking_is_not_bound_to_a_doctor() {
    let backend = backend().await;
    mount_payment(&backend, 200, 1).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    // the doctor is booked 09:00-09:30, which does not matter here
    let submitted = service
        .submit(&context(&backend), &preventive_request(&backend, t(9, 0), t(9, 20)))
        .await
        .unwrap();

    assert_matches!(
        submitted.draft.payload,
        BookingPayload::PreventiveService { doctor_id: None, deposit: 90_000, .. }
    );
    let stored = serde_json::to_value(drafts.load(backend.patient_id).await.unwrap().unwrap()).unwrap();
    assert_eq!(stored["bookingType"], "PREVENTIVE_SERVICE");
    assert!(stored["doctorId"].is_null());
}

#[tokio::test]
async fn preventive_booking_still_checks_the_patient() {
    let backend = backend().await;
    mount_payment(&backend, 200, 0).await;
    let drafts = Arc::new(InMemoryDraftStore::new());
    let service = service_for(&backend, drafts.clone());

    let result = service
        .submit(&context(&backend), &preventive_request(&backend, t(11, 10), t(11, 30)))
        .await;

    assert_matches!(result, Err(BookingError::SlotRejected { reason: SlotBlockReason::PatientConflict, .. }));
    assert!(drafts.load(backend.patient_id).await.unwrap().is_none());
}
