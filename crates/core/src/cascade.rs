//! Cascade delete coordination.
//!
//! Deleting a patient must remove the patient document and every visit
//! referencing it as one all-or-nothing unit. This is the single
//! multi-document consistency boundary in the system; nothing else runs
//! inside a transaction.

use carelog_types::RecordId;

use crate::error::{StoreError, StoreResult};
use crate::store::Database;

/// Phases of a cascade delete, traced for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePhase {
    Verifying,
    InTransaction,
    Committed,
    Aborted,
}

/// Coordinates the atomic removal of a patient and its visits.
#[derive(Clone)]
pub struct CascadeCoordinator {
    db: Database,
}

impl CascadeCoordinator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Deletes the patient and all dependent visits.
    ///
    /// Verifies existence first; if the patient is absent no transaction is
    /// opened and `NotFound` is returned. Any failure inside the unit of
    /// work rolls the store back to its pre-call state and re-raises the
    /// underlying error unchanged.
    ///
    /// Returns the number of visits removed alongside the patient.
    pub async fn delete_patient(&self, id: RecordId) -> StoreResult<usize> {
        tracing::debug!(phase = ?CascadePhase::Verifying, %id, "cascade delete");
        let exists = self.db.read(|c| c.patients.contains(&id)).await;
        if !exists {
            return Err(StoreError::patient_not_found(id));
        }

        tracing::debug!(phase = ?CascadePhase::InTransaction, %id, "cascade delete");
        let result = self
            .db
            .transaction(|c| {
                let visits_removed = c.visits.remove_by_patient(&id);
                c.patients
                    .remove(&id)
                    .ok_or_else(|| StoreError::patient_not_found(id))?;
                Ok(visits_removed)
            })
            .await;

        match &result {
            Ok(visits_removed) => {
                tracing::debug!(
                    phase = ?CascadePhase::Committed,
                    %id,
                    visits_removed,
                    "cascade delete"
                );
            }
            Err(err) => {
                tracing::debug!(phase = ?CascadePhase::Aborted, %id, %err, "cascade delete");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Patient, Visit, VisitType};
    use chrono::Utc;

    fn patient(email: &str) -> Patient {
        let now = Utc::now();
        Patient {
            id: RecordId::new(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            dob: "1990-01-01".parse().expect("valid date"),
            email: email.into(),
            phone_number: "+1234567890".into(),
            address: "1 Main St".into(),
            date_created: now,
            date_updated: now,
        }
    }

    fn visit(patient_id: RecordId) -> Visit {
        let now = Utc::now();
        Visit {
            id: RecordId::new(),
            patient_id,
            visit_date: now,
            visit_type: VisitType::Home,
            notes: None,
            date_created: now,
            date_updated: now,
        }
    }

    #[tokio::test]
    async fn test_delete_removes_patient_and_all_its_visits() {
        let db = Database::new();
        let jane = patient("jane@x.com");
        let jane_id = jane.id;
        let other = patient("bob@x.com");
        let other_id = other.id;
        db.write(|c| {
            c.patients.insert(jane).expect("seed jane");
            c.patients.insert(other).expect("seed bob");
            c.visits.insert(visit(jane_id));
            c.visits.insert(visit(jane_id));
            c.visits.insert(visit(other_id));
        })
        .await;

        let visits_removed = CascadeCoordinator::new(db.clone())
            .delete_patient(jane_id)
            .await
            .expect("delete should succeed");
        assert_eq!(visits_removed, 2);

        db.read(|c| {
            assert!(!c.patients.contains(&jane_id), "patient should be gone");
            assert!(
                c.visits.iter().all(|v| v.patient_id != jane_id),
                "no orphan visits may remain"
            );
            assert!(c.patients.contains(&other_id), "other patient untouched");
            assert_eq!(c.visits.len(), 1, "other patient's visit untouched");
        })
        .await;
    }

    #[tokio::test]
    async fn test_delete_of_unknown_patient_fails_without_side_effects() {
        let db = Database::new();
        let bystander = patient("bob@x.com");
        let bystander_id = bystander.id;
        db.write(|c| {
            c.patients.insert(bystander).expect("seed");
            c.visits.insert(visit(bystander_id));
        })
        .await;

        let err = CascadeCoordinator::new(db.clone())
            .delete_patient(RecordId::new())
            .await
            .expect_err("unknown patient should fail");
        assert!(matches!(err, StoreError::NotFound { .. }));

        let (patients, visits) = db.read(|c| (c.patients.len(), c.visits.len())).await;
        assert_eq!(patients, 1);
        assert_eq!(visits, 1);
    }

    #[tokio::test]
    async fn test_delete_with_no_visits_still_removes_patient() {
        let db = Database::new();
        let jane = patient("jane@x.com");
        let jane_id = jane.id;
        db.write(|c| c.patients.insert(jane).expect("seed")).await;

        let visits_removed = CascadeCoordinator::new(db.clone())
            .delete_patient(jane_id)
            .await
            .expect("delete should succeed");

        assert_eq!(visits_removed, 0);
        assert!(!db.read(|c| c.patients.contains(&jane_id)).await);
    }
}
