//! Patient store: create, list, get, update, delete and stats for patient
//! records.
//!
//! Pure data operations - no API concerns. HTTP mapping belongs in
//! `api-rest`.

use chrono::Utc;
use carelog_types::RecordId;

use crate::cascade::CascadeCoordinator;
use crate::error::{StoreError, StoreResult};
use crate::model::{NewPatient, Patient, PatientStats, PatientUpdate, VisitTypeCounts};
use crate::query::{matches_search, Page, PatientListQuery};
use crate::store::Database;

/// Service owning patient identity and email uniqueness.
#[derive(Clone)]
pub struct PatientService {
    db: Database,
}

impl PatientService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates and persists a new patient.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateEmail`] if another patient already
    /// holds the same email.
    pub async fn create(&self, fields: NewPatient) -> StoreResult<Patient> {
        let now = Utc::now();
        let patient = Patient {
            id: RecordId::new(),
            first_name: fields.first_name.into_string(),
            last_name: fields.last_name.into_string(),
            dob: fields.dob,
            email: fields.email.as_str().to_owned(),
            phone_number: fields.phone_number.as_str().to_owned(),
            address: fields.address.into_string(),
            date_created: now,
            date_updated: now,
        };

        let created = self
            .db
            .write(|c| c.patients.insert(patient.clone()).map(|_| patient))
            .await?;

        tracing::info!(id = %created.id, "patient created");
        Ok(created)
    }

    /// Lists patients, newest first, optionally filtered by a
    /// case-insensitive search over first name, last name and email.
    pub async fn list(&self, query: PatientListQuery) -> StoreResult<Page<Patient>> {
        query.validate()?;

        let matched = self
            .db
            .read(|c| {
                let mut matched: Vec<Patient> = c
                    .patients
                    .iter()
                    .filter(|p| match &query.search {
                        Some(search) => matches_search(p, search),
                        None => true,
                    })
                    .cloned()
                    .collect();
                matched.sort_by(|a, b| {
                    b.date_created
                        .cmp(&a.date_created)
                        .then_with(|| b.id.cmp(&a.id))
                });
                matched
            })
            .await;

        Ok(Page::build(matched, query.page, query.limit))
    }

    /// Fetches a patient by id.
    pub async fn get(&self, id: RecordId) -> StoreResult<Patient> {
        self.db
            .read(|c| c.patients.get(&id).cloned())
            .await
            .ok_or_else(|| StoreError::patient_not_found(id))
    }

    /// Applies a partial update and refreshes the updated timestamp.
    ///
    /// # Errors
    ///
    /// `NotFound` if the id is absent; [`StoreError::DuplicateEmail`] if the
    /// new email collides with another patient's.
    pub async fn update(&self, id: RecordId, fields: PatientUpdate) -> StoreResult<Patient> {
        let updated = self
            .db
            .write(|c| {
                let mut patient = c
                    .patients
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::patient_not_found(id))?;

                if let Some(first_name) = fields.first_name {
                    patient.first_name = first_name.into_string();
                }
                if let Some(last_name) = fields.last_name {
                    patient.last_name = last_name.into_string();
                }
                if let Some(dob) = fields.dob {
                    patient.dob = dob;
                }
                if let Some(email) = fields.email {
                    patient.email = email.as_str().to_owned();
                }
                if let Some(phone_number) = fields.phone_number {
                    patient.phone_number = phone_number.as_str().to_owned();
                }
                if let Some(address) = fields.address {
                    patient.address = address.into_string();
                }
                patient.date_updated = Utc::now();

                c.patients.replace(patient.clone())?;
                Ok(patient)
            })
            .await?;

        tracing::info!(id = %updated.id, "patient updated");
        Ok(updated)
    }

    /// Deletes a patient and all of its visits as one atomic unit.
    ///
    /// Delegates to the cascade coordinator; `NotFound` if the id is absent.
    pub async fn delete(&self, id: RecordId) -> StoreResult<()> {
        let visits_removed = CascadeCoordinator::new(self.db.clone())
            .delete_patient(id)
            .await?;
        tracing::info!(%id, visits_removed, "patient deleted");
        Ok(())
    }

    /// Returns the patient together with its visit-count breakdown.
    ///
    /// The breakdown always carries all three visit types, each ≥ 0.
    pub async fn stats(&self, id: RecordId) -> StoreResult<PatientStats> {
        self.db
            .read(|c| {
                let patient = c
                    .patients
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::patient_not_found(id))?;

                let visits_by_type =
                    VisitTypeCounts::tally(c.visits.iter().filter(|v| v.patient_id == id));

                Ok(PatientStats {
                    patient,
                    total_visits: visits_by_type.total(),
                    visits_by_type,
                })
            })
            .await
    }
}
