use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Clinic wall-clock time. Every derivation takes one `now` snapshot from here.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// System time shifted into the clinic's fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct ClinicClock {
    offset: FixedOffset,
}

impl ClinicClock {
    pub fn from_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl Clock for ClinicClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}

/// Frozen time for tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
