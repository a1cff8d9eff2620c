pub mod availability;
pub mod schedule;

pub use availability::{AvailabilityBuilder, AvailabilityService, generate_slots, week_start};
pub use schedule::{ScheduleSource, SupabaseScheduleSource};
