//! In-process document store backing the record services.
//!
//! One [`Database`] handle is cloned and shared process-wide. Readers run
//! concurrently, writers serialise, and the single multi-document transaction
//! ([`Database::transaction`]) is snapshot-based: on error the pre-call
//! state is restored wholesale before the error is re-raised.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use carelog_types::RecordId;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::model::{Patient, Visit};

/// Patient documents plus the unique (case-insensitive) email index.
#[derive(Debug, Clone, Default)]
pub struct PatientCollection {
    docs: BTreeMap<RecordId, Patient>,
    email_index: HashMap<String, RecordId>,
}

impl PatientCollection {
    /// Inserts a new patient document.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if another document already
    /// holds the same canonical email.
    pub fn insert(&mut self, patient: Patient) -> StoreResult<()> {
        if self.email_index.contains_key(&patient.email) {
            return Err(StoreError::DuplicateEmail);
        }
        self.email_index.insert(patient.email.clone(), patient.id);
        self.docs.insert(patient.id, patient);
        Ok(())
    }

    pub fn get(&self, id: &RecordId) -> Option<&Patient> {
        self.docs.get(id)
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.docs.contains_key(id)
    }

    /// Replaces an existing document, keeping the email index consistent.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the new email belongs to
    /// a different patient, or `NotFound` if the id is absent.
    pub fn replace(&mut self, patient: Patient) -> StoreResult<()> {
        let previous = self
            .docs
            .get(&patient.id)
            .ok_or_else(|| StoreError::patient_not_found(patient.id))?;

        if let Some(owner) = self.email_index.get(&patient.email) {
            if *owner != patient.id {
                return Err(StoreError::DuplicateEmail);
            }
        }

        if previous.email != patient.email {
            self.email_index.remove(&previous.email);
            self.email_index.insert(patient.email.clone(), patient.id);
        }
        self.docs.insert(patient.id, patient);
        Ok(())
    }

    /// Removes a document, returning it if present.
    pub fn remove(&mut self, id: &RecordId) -> Option<Patient> {
        let removed = self.docs.remove(id);
        if let Some(patient) = &removed {
            self.email_index.remove(&patient.email);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patient> {
        self.docs.values()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Visit documents keyed by id.
#[derive(Debug, Clone, Default)]
pub struct VisitCollection {
    docs: BTreeMap<RecordId, Visit>,
}

impl VisitCollection {
    pub fn insert(&mut self, visit: Visit) {
        self.docs.insert(visit.id, visit);
    }

    pub fn get(&self, id: &RecordId) -> Option<&Visit> {
        self.docs.get(id)
    }

    /// Replaces an existing document; `NotFound` if the id is absent.
    pub fn replace(&mut self, visit: Visit) -> StoreResult<()> {
        if !self.docs.contains_key(&visit.id) {
            return Err(StoreError::visit_not_found(visit.id));
        }
        self.docs.insert(visit.id, visit);
        Ok(())
    }

    pub fn remove(&mut self, id: &RecordId) -> Option<Visit> {
        self.docs.remove(id)
    }

    /// Deletes every visit referencing `patient_id`, returning the count.
    pub fn remove_by_patient(&mut self, patient_id: &RecordId) -> usize {
        let before = self.docs.len();
        self.docs.retain(|_, visit| visit.patient_id != *patient_id);
        before - self.docs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Visit> {
        self.docs.values()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Both collections, cloneable as one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub patients: PatientCollection,
    pub visits: VisitCollection,
}

/// Process-wide store handle shared by all services.
#[derive(Clone, Default)]
pub struct Database {
    inner: Arc<RwLock<Collections>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a closure against a consistent read view of both collections.
    pub async fn read<T>(&self, f: impl FnOnce(&Collections) -> T) -> T {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Runs a closure with exclusive write access.
    pub async fn write<T>(&self, f: impl FnOnce(&mut Collections) -> T) -> T {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    /// Runs a fallible closure as an atomic unit of work.
    ///
    /// The pre-call state is snapshotted; if the closure errors, the
    /// snapshot is restored before the error is returned, so partial
    /// mutations are never observable.
    pub async fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Collections) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut guard = self.inner.write().await;
        let snapshot = guard.clone();
        match f(&mut guard) {
            Ok(value) => Ok(value),
            Err(err) => {
                *guard = snapshot;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VisitType;
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
            visit_type: VisitType::Clinic,
            notes: None,
            date_created: now,
            date_updated: now,
        }
    }

    #[test]
    fn test_insert_rejects_duplicate_email() {
        let mut patients = PatientCollection::default();
        patients.insert(patient("jane@x.com")).expect("first insert should succeed");

        let err = patients
            .insert(patient("jane@x.com"))
            .expect_err("second insert with same email should fail");
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(patients.len(), 1, "first document should be unaffected");
    }

    #[test]
    fn test_replace_guards_other_patients_email() {
        let mut patients = PatientCollection::default();
        let jane = patient("jane@x.com");
        patients.insert(jane.clone()).expect("insert jane");
        let mut bob = patient("bob@x.com");
        patients.insert(bob.clone()).expect("insert bob");

        bob.email = "jane@x.com".into();
        let err = patients
            .replace(bob)
            .expect_err("stealing jane's email should fail");
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[test]
    fn test_replace_moves_email_index_entry() {
        let mut patients = PatientCollection::default();
        let mut jane = patient("jane@x.com");
        patients.insert(jane.clone()).expect("insert jane");

        jane.email = "jane@y.com".into();
        patients.replace(jane).expect("email change should succeed");

        // The old address is free again.
        patients
            .insert(patient("jane@x.com"))
            .expect("released email should be reusable");
    }

    #[test]
    fn test_remove_releases_email() {
        let mut patients = PatientCollection::default();
        let jane = patient("jane@x.com");
        patients.insert(jane.clone()).expect("insert jane");

        patients.remove(&jane.id).expect("remove should return the document");
        patients
            .insert(patient("jane@x.com"))
            .expect("email should be reusable after removal");
    }

    #[test]
    fn test_remove_by_patient_only_touches_that_patient() {
        let mut visits = VisitCollection::default();
        let target = RecordId::new();
        let other = RecordId::new();
        visits.insert(visit(target));
        visits.insert(visit(target));
        visits.insert(visit(other));

        let removed = visits.remove_by_patient(&target);

        assert_eq!(removed, 2);
        assert_eq!(visits.len(), 1);
        assert!(visits.iter().all(|v| v.patient_id == other));
    }

    #[tokio::test]
    async fn test_transaction_commits_on_success() {
        let db = Database::new();
        let jane = patient("jane@x.com");
        let jane_id = jane.id;

        db.transaction(|c| c.patients.insert(jane))
            .await
            .expect("transaction should commit");

        let present = db.read(|c| c.patients.contains(&jane_id)).await;
        assert!(present, "committed write should be visible");
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_partial_mutations() {
        let db = Database::new();
        let jane = patient("jane@x.com");
        let jane_id = jane.id;
        let v = visit(jane_id);
        db.write(|c| {
            c.patients.insert(jane).expect("seed patient");
            c.visits.insert(v);
        })
        .await;

        let err = db
            .transaction(|c| {
                c.visits.remove_by_patient(&jane_id);
                c.patients.remove(&jane_id);
                Err::<(), _>(StoreError::InvalidInput("boom".into()))
            })
            .await
            .expect_err("transaction should abort");
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let (patient_count, visit_count) =
            db.read(|c| (c.patients.len(), c.visits.len())).await;
        assert_eq!(patient_count, 1, "patient should be restored");
        assert_eq!(visit_count, 1, "visit should be restored");
    }
}
