use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use crate::models::{BookingError, MedicalExamination, ServiceRole};

/// Services offered under one specialty, with consultation lookup.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    services: Vec<MedicalExamination>,
    consultation_keyword: String,
}

impl ServiceCatalog {
    pub fn new(services: Vec<MedicalExamination>, consultation_keyword: impl Into<String>) -> Self {
        Self {
            services,
            consultation_keyword: consultation_keyword.into(),
        }
    }

    pub fn services(&self) -> &[MedicalExamination] {
        &self.services
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn find(&self, id: Uuid) -> Option<&MedicalExamination> {
        self.services.iter().find(|service| service.id == id)
    }

    pub fn is_consultation(&self, service: &MedicalExamination) -> bool {
        service.is_consultation(&self.consultation_keyword)
    }

    /// The consultation service of this specialty. A catalog without one is
    /// misconfigured and blocks consultation bookings.
    pub fn consultation(&self) -> Result<&MedicalExamination, BookingError> {
        if let Some(tagged) = self
            .services
            .iter()
            .find(|service| service.role == Some(ServiceRole::Consultation))
        {
            return Ok(tagged);
        }

        let by_name = self
            .services
            .iter()
            .find(|service| service.is_consultation(&self.consultation_keyword))
            .ok_or_else(|| {
                BookingError::Configuration("no consultation service is configured for this specialty".to_string())
            })?;

        warn!("Consultation service {} resolved by name, it has no role set", by_name.id);
        Ok(by_name)
    }

    /// Looks up each id once, keeping the caller's order.
    pub fn resolve(&self, ids: &[Uuid]) -> Result<Vec<&MedicalExamination>, BookingError> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter(|id| seen.insert(**id))
            .map(|id| {
                self.find(*id).ok_or_else(|| {
                    BookingError::invalid("medicalExaminationIds", format!("unknown service {}", id))
                })
            })
            .collect()
    }

    /// Splits a selection into its ancillary services and the consultation that
    /// closes the visit. Without a selected consultation the specialty's own is used.
    pub fn split(
        &self,
        ids: &[Uuid],
    ) -> Result<(Vec<&MedicalExamination>, &MedicalExamination), BookingError> {
        let selected = self.resolve(ids)?;
        let consultation = match selected.iter().find(|service| self.is_consultation(service)) {
            Some(chosen) => *chosen,
            None => self.consultation()?,
        };
        let ancillary = selected
            .into_iter()
            .filter(|service| !self.is_consultation(service))
            .collect();

        Ok((ancillary, consultation))
    }
}
