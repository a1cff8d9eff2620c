pub mod clock;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use clock::{ClinicClock, Clock, FixedClock};
pub use models::*;
pub use services::*;
