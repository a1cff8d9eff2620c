pub mod booking;
pub mod catalog;
pub mod composer;
pub mod conflict;
pub mod draft_store;
pub mod gateway;
pub mod payment;
pub mod pipeline;
pub mod pricing;
pub mod sequencer;

pub use booking::{BookingService, PlannedTimeline, SubmittedBooking};
pub use catalog::ServiceCatalog;
pub use composer::{BookingComposer, ComposedBooking};
pub use conflict::{filter_day, windows_overlap, ConflictFilter};
pub use draft_store::{draft_key, DraftStore, InMemoryDraftStore, RedisDraftStore};
pub use gateway::{BookingDataSource, SupabaseBookingSource};
pub use payment::{HttpPaymentGateway, PaymentGateway};
pub use pipeline::{ApplyOutcome, BookingPipeline, BookingSession, DayFetch, DaySelection, DayView, ReadyDay, RequestGeneration, Ticket};
pub use pricing::{price_booking, round_half_up, PricingCalculator};
pub use sequencer::{service_priority, SequencingRules, ServiceSequencer};
