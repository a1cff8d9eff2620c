use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub payment_initiation_url: String,
    pub clinic_utc_offset_minutes: i32,
    pub online_discount_percent: u32,
    pub deposit_percent: u32,
    pub service_gap_minutes: i64,
    pub consultation_gap_minutes: i64,
    pub booking_draft_ttl_seconds: u64,
    pub consultation_service_keyword: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            redis_url: None,
            payment_initiation_url: String::new(),
            clinic_utc_offset_minutes: 420,
            online_discount_percent: 10,
            deposit_percent: 50,
            service_gap_minutes: 5,
            consultation_gap_minutes: 5,
            booking_draft_ttl_seconds: 1800,
            consultation_service_keyword: "consultation".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok(),
            payment_initiation_url: env::var("PAYMENT_INITIATION_URL")
                .unwrap_or_else(|_| {
                    warn!("PAYMENT_INITIATION_URL not set, using empty value");
                    String::new()
                }),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
            online_discount_percent: parse_or("ONLINE_DISCOUNT_PERCENT", defaults.online_discount_percent),
            deposit_percent: parse_or("DEPOSIT_PERCENT", defaults.deposit_percent),
            service_gap_minutes: parse_or("SERVICE_GAP_MINUTES", defaults.service_gap_minutes),
            consultation_gap_minutes: parse_or("CONSULTATION_GAP_MINUTES", defaults.consultation_gap_minutes),
            booking_draft_ttl_seconds: parse_or("BOOKING_DRAFT_TTL_SECONDS", defaults.booking_draft_ttl_seconds),
            consultation_service_keyword: env::var("CONSULTATION_SERVICE_KEYWORD")
                .unwrap_or(defaults.consultation_service_keyword),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        if config.redis_url.is_none() {
            warn!("REDIS_URL not set, booking drafts will be kept in memory");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_payment_configured(&self) -> bool {
        !self.payment_initiation_url.is_empty()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_booking_policy() {
        let config = AppConfig::default();

        assert_eq!(config.online_discount_percent, 10);
        assert_eq!(config.deposit_percent, 50);
        assert_eq!(config.service_gap_minutes, 5);
        assert_eq!(config.consultation_gap_minutes, 5);
        assert!(config.redis_url.is_none());
        assert!(!config.is_configured());
    }

    #[test]
    fn parse_or_falls_back_on_garbage() {
        env::set_var("BOOKING_TEST_PARSE_OR", "not-a-number");
        assert_eq!(parse_or("BOOKING_TEST_PARSE_OR", 7u32), 7);

        env::set_var("BOOKING_TEST_PARSE_OR", " 12 ");
        assert_eq!(parse_or("BOOKING_TEST_PARSE_OR", 7u32), 12);
        env::remove_var("BOOKING_TEST_PARSE_OR");
    }
}
