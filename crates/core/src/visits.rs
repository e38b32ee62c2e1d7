//! Visit store: visit CRUD, filtered listing with a read-side patient join,
//! and per-patient statistics.
//!
//! Every operation that creates or aggregates by patient consults the
//! patient store first; a visit is never written for an id the patient
//! store does not know.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use carelog_types::RecordId;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    NewVisit, PatientSummary, Visit, VisitStats, VisitTypeCounts, VisitUpdate, VisitWithPatient,
};
use crate::patients::PatientService;
use crate::query::{Page, SortOrder, VisitListQuery, VisitSortField};
use crate::store::{Collections, Database};

/// How many visits `stats` reports as most recent.
const RECENT_VISITS: usize = 5;

/// Normalises a client-supplied visit date into UTC.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00Z`), a naive datetime without
/// offset, or a bare date (taken as midnight UTC).
pub fn parse_visit_date(raw: &str) -> StoreResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }
    Err(StoreError::InvalidInput(format!(
        "invalid visit date: {raw}"
    )))
}

/// Service owning visit identity; read-only dependency on the patient store.
#[derive(Clone)]
pub struct VisitService {
    db: Database,
    patients: PatientService,
}

impl VisitService {
    pub fn new(db: Database, patients: PatientService) -> Self {
        Self { db, patients }
    }

    /// Creates a visit for an existing patient.
    ///
    /// # Errors
    ///
    /// Propagates `NotFound` unchanged if the patient does not exist (no
    /// visit is written); `InvalidInput` if the date cannot be parsed.
    pub async fn create(&self, patient_id: RecordId, fields: NewVisit) -> StoreResult<Visit> {
        self.patients.get(patient_id).await?;
        let visit_date = parse_visit_date(&fields.visit_date)?;

        let now = Utc::now();
        let visit = Visit {
            id: RecordId::new(),
            patient_id,
            visit_date,
            visit_type: fields.visit_type,
            notes: fields.notes,
            date_created: now,
            date_updated: now,
        };

        self.db.write(|c| c.visits.insert(visit.clone())).await;
        tracing::info!(id = %visit.id, %patient_id, "visit created");
        Ok(visit)
    }

    /// Lists visits with optional patient/type equality filters, sorted per
    /// the query, each row joined with its patient's summary fields.
    pub async fn list(&self, query: VisitListQuery) -> StoreResult<Page<VisitWithPatient>> {
        query.validate()?;

        let page = self
            .db
            .read(|c| {
                let mut matched: Vec<Visit> = c
                    .visits
                    .iter()
                    .filter(|v| {
                        query.patient_id.map_or(true, |id| v.patient_id == id)
                            && query.visit_type.map_or(true, |t| v.visit_type == t)
                    })
                    .cloned()
                    .collect();
                sort_visits(&mut matched, query.sort_by, query.sort_order);

                let page = Page::build(matched, query.page, query.limit);
                Page {
                    data: page
                        .data
                        .into_iter()
                        .map(|visit| join_patient(c, visit))
                        .collect(),
                    total: page.total,
                    page: page.page,
                    limit: page.limit,
                    total_pages: page.total_pages,
                }
            })
            .await;

        Ok(page)
    }

    /// All visits for one patient, visit date descending, unbounded.
    ///
    /// `NotFound` is propagated unchanged if the patient does not exist.
    pub async fn list_by_patient(&self, patient_id: RecordId) -> StoreResult<Vec<Visit>> {
        self.patients.get(patient_id).await?;

        let mut visits = self
            .db
            .read(|c| {
                c.visits
                    .iter()
                    .filter(|v| v.patient_id == patient_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;
        sort_visits(&mut visits, VisitSortField::VisitDate, SortOrder::Desc);
        Ok(visits)
    }

    /// Fetches a visit by id, joined with its patient summary.
    pub async fn get(&self, id: RecordId) -> StoreResult<VisitWithPatient> {
        self.db
            .read(|c| {
                let visit = c
                    .visits
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::visit_not_found(id))?;
                Ok(join_patient(c, visit))
            })
            .await
    }

    /// Applies a partial update and refreshes the updated timestamp.
    ///
    /// A supplied visit date is re-parsed; `InvalidInput` on failure leaves
    /// the record untouched. `NotFound` if the id is absent.
    pub async fn update(&self, id: RecordId, fields: VisitUpdate) -> StoreResult<VisitWithPatient> {
        let visit_date = fields.visit_date.as_deref().map(parse_visit_date).transpose()?;

        let updated = self
            .db
            .write(|c| {
                let mut visit = c
                    .visits
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| StoreError::visit_not_found(id))?;

                if let Some(visit_date) = visit_date {
                    visit.visit_date = visit_date;
                }
                if let Some(visit_type) = fields.visit_type {
                    visit.visit_type = visit_type;
                }
                if let Some(notes) = fields.notes {
                    visit.notes = Some(notes);
                }
                visit.date_updated = Utc::now();

                c.visits.replace(visit.clone())?;
                Ok(join_patient(c, visit))
            })
            .await?;

        tracing::info!(%id, "visit updated");
        Ok(updated)
    }

    /// Removes a single visit; the patient is untouched.
    pub async fn delete(&self, id: RecordId) -> StoreResult<()> {
        self.db
            .write(|c| c.visits.remove(&id))
            .await
            .ok_or_else(|| StoreError::visit_not_found(id))?;
        tracing::info!(%id, "visit deleted");
        Ok(())
    }

    /// Visit statistics for one patient: total, per-type breakdown (all
    /// three types always present), and the five most recent visits.
    ///
    /// `NotFound` is propagated unchanged if the patient does not exist.
    pub async fn stats(&self, patient_id: RecordId) -> StoreResult<VisitStats> {
        self.patients.get(patient_id).await?;

        let mut visits = self
            .db
            .read(|c| {
                c.visits
                    .iter()
                    .filter(|v| v.patient_id == patient_id)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await;

        let visits_by_type = VisitTypeCounts::tally(&visits);
        sort_visits(&mut visits, VisitSortField::VisitDate, SortOrder::Desc);
        visits.truncate(RECENT_VISITS);

        Ok(VisitStats {
            total_visits: visits_by_type.total(),
            visits_by_type,
            recent_visits: visits,
        })
    }
}

fn sort_visits(visits: &mut [Visit], field: VisitSortField, order: SortOrder) {
    visits.sort_by(|a, b| {
        let ordering = match field {
            VisitSortField::VisitDate => a.visit_date.cmp(&b.visit_date),
            VisitSortField::DateCreated => a.date_created.cmp(&b.date_created),
        }
        .then_with(|| a.id.cmp(&b.id));
        match order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn join_patient(c: &Collections, visit: Visit) -> VisitWithPatient {
    let patient = c.patients.get(&visit.patient_id).map(PatientSummary::from);
    if patient.is_none() {
        tracing::warn!(
            visit = %visit.id,
            patient = %visit.patient_id,
            "visit references a missing patient"
        );
    }
    VisitWithPatient { visit, patient }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewPatient, VisitType};
    use carelog_types::{EmailAddress, NonEmptyText, PhoneNumber};

    fn new_patient(first: &str, email: &str) -> NewPatient {
        NewPatient {
            first_name: NonEmptyText::new(first).unwrap(),
            last_name: NonEmptyText::new("Doe").unwrap(),
            dob: "1990-01-01".parse().unwrap(),
            email: EmailAddress::parse(email).unwrap(),
            phone_number: PhoneNumber::parse("+1234567890").unwrap(),
            address: NonEmptyText::new("1 Main St").unwrap(),
        }
    }

    fn new_visit(date: &str, visit_type: VisitType) -> NewVisit {
        NewVisit {
            visit_date: date.into(),
            visit_type,
            notes: None,
        }
    }

    fn services() -> (PatientService, VisitService) {
        let db = Database::new();
        let patients = PatientService::new(db.clone());
        let visits = VisitService::new(db, patients.clone());
        (patients, visits)
    }

    #[test]
    fn test_parse_visit_date_accepts_all_supported_forms() {
        let rfc = parse_visit_date("2024-03-01T10:30:00Z").expect("rfc3339 should parse");
        assert_eq!(rfc.to_rfc3339(), "2024-03-01T10:30:00+00:00");

        let offset = parse_visit_date("2024-03-01T10:30:00+02:00").expect("offset should parse");
        assert_eq!(offset.to_rfc3339(), "2024-03-01T08:30:00+00:00");

        let naive = parse_visit_date("2024-03-01T10:30:00").expect("naive should parse");
        assert_eq!(naive, rfc);

        let bare = parse_visit_date("2024-03-01").expect("bare date should parse");
        assert_eq!(bare.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_visit_date_rejects_garbage() {
        for bad in ["", "soon", "01/03/2024", "2024-13-40"] {
            let err = parse_visit_date(bad).expect_err("should fail");
            assert!(matches!(err, StoreError::InvalidInput(_)), "input {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_create_for_unknown_patient_fails_and_writes_nothing() {
        let (_, visits) = services();

        let err = visits
            .create(
                RecordId::new(),
                new_visit("2024-03-01", VisitType::Home),
            )
            .await
            .expect_err("unknown patient should fail");
        assert!(matches!(
            err,
            StoreError::NotFound {
                entity: crate::error::Entity::Patient,
                ..
            }
        ));

        let page = visits
            .list(VisitListQuery::default())
            .await
            .expect("list should succeed");
        assert_eq!(page.total, 0, "no visit record may be created");
    }

    #[tokio::test]
    async fn test_create_normalises_the_supplied_date() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");

        let visit = visits
            .create(jane.id, new_visit("2024-03-01", VisitType::Clinic))
            .await
            .expect("create should succeed");

        assert_eq!(visit.visit_date.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(visit.patient_id, jane.id);
    }

    #[tokio::test]
    async fn test_list_filters_and_joins_patient_summary() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        let bob = patients
            .create(new_patient("Bob", "bob@x.com"))
            .await
            .expect("create bob");

        visits
            .create(jane.id, new_visit("2024-03-01", VisitType::Home))
            .await
            .expect("jane home");
        visits
            .create(jane.id, new_visit("2024-03-02", VisitType::Clinic))
            .await
            .expect("jane clinic");
        visits
            .create(bob.id, new_visit("2024-03-03", VisitType::Clinic))
            .await
            .expect("bob clinic");

        let janes = visits
            .list(VisitListQuery {
                patient_id: Some(jane.id),
                ..Default::default()
            })
            .await
            .expect("filtered list");
        assert_eq!(janes.total, 2);
        for row in &janes.data {
            let summary = row.patient.as_ref().expect("join should find the patient");
            assert_eq!(summary.first_name, "Jane");
            assert_eq!(summary.email, "jane@x.com");
        }

        let clinics = visits
            .list(VisitListQuery {
                visit_type: Some(VisitType::Clinic),
                ..Default::default()
            })
            .await
            .expect("type filter");
        assert_eq!(clinics.total, 2);

        let both = visits
            .list(VisitListQuery {
                patient_id: Some(jane.id),
                visit_type: Some(VisitType::Clinic),
                ..Default::default()
            })
            .await
            .expect("combined filter");
        assert_eq!(both.total, 1);
    }

    #[tokio::test]
    async fn test_list_sorts_by_requested_field_and_order() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        for date in ["2024-03-02", "2024-03-01", "2024-03-03"] {
            visits
                .create(jane.id, new_visit(date, VisitType::Home))
                .await
                .expect("create visit");
        }

        let desc = visits
            .list(VisitListQuery::default())
            .await
            .expect("default sort");
        let dates: Vec<String> = desc
            .data
            .iter()
            .map(|r| r.visit.visit_date.format("%Y-%m-%d").to_string())
            .collect();
        assert_eq!(dates, vec!["2024-03-03", "2024-03-02", "2024-03-01"]);

        let asc = visits
            .list(VisitListQuery {
                sort_order: SortOrder::Asc,
                ..Default::default()
            })
            .await
            .expect("asc sort");
        let dates: Vec<String> = asc
            .data
            .iter()
            .map(|r| r.visit.visit_date.format("%Y-%m-%d").to_string())
            .collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03"]);
    }

    #[tokio::test]
    async fn test_list_by_patient_is_unbounded_and_newest_first() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        for day in 1..=15 {
            visits
                .create(
                    jane.id,
                    new_visit(&format!("2024-03-{day:02}"), VisitType::Home),
                )
                .await
                .expect("create visit");
        }

        let all = visits
            .list_by_patient(jane.id)
            .await
            .expect("list_by_patient");
        assert_eq!(all.len(), 15, "no pagination applies");
        assert!(
            all.windows(2).all(|w| w[0].visit_date >= w[1].visit_date),
            "should be sorted by visit date descending"
        );
    }

    #[tokio::test]
    async fn test_list_by_patient_unknown_patient_is_not_found() {
        let (_, visits) = services();
        let err = visits
            .list_by_patient(RecordId::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_unparseable_date_and_leaves_record_untouched() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        let visit = visits
            .create(jane.id, new_visit("2024-03-01", VisitType::Home))
            .await
            .expect("create visit");

        let err = visits
            .update(
                visit.id,
                VisitUpdate {
                    visit_date: Some("never".into()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("garbage date should fail");
        assert!(matches!(err, StoreError::InvalidInput(_)));

        let unchanged = visits.get(visit.id).await.expect("still readable");
        assert_eq!(unchanged.visit.visit_date, visit.visit_date);
        assert_eq!(unchanged.visit.date_updated, visit.date_updated);
    }

    #[tokio::test]
    async fn test_update_applies_fields_and_refreshes_timestamp() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        let visit = visits
            .create(jane.id, new_visit("2024-03-01", VisitType::Home))
            .await
            .expect("create visit");

        let updated = visits
            .update(
                visit.id,
                VisitUpdate {
                    visit_type: Some(VisitType::Telehealth),
                    notes: Some("follow-up call".into()),
                    ..Default::default()
                },
            )
            .await
            .expect("update should succeed");

        assert_eq!(updated.visit.visit_type, VisitType::Telehealth);
        assert_eq!(updated.visit.notes.as_deref(), Some("follow-up call"));
        assert!(updated.visit.date_updated > visit.date_updated);
        assert!(updated.patient.is_some(), "update responses carry the join");
    }

    #[tokio::test]
    async fn test_update_unknown_visit_is_not_found() {
        let (_, visits) = services();
        let err = visits
            .update(RecordId::new(), VisitUpdate::default())
            .await
            .expect_err("should fail");
        assert!(matches!(
            err,
            StoreError::NotFound {
                entity: crate::error::Entity::Visit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_only_the_visit() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        let visit = visits
            .create(jane.id, new_visit("2024-03-01", VisitType::Home))
            .await
            .expect("create visit");

        visits.delete(visit.id).await.expect("delete should succeed");

        let err = visits.get(visit.id).await.expect_err("visit gone");
        assert!(matches!(err, StoreError::NotFound { .. }));
        patients.get(jane.id).await.expect("patient untouched");
    }

    #[tokio::test]
    async fn test_delete_unknown_visit_is_not_found() {
        let (_, visits) = services();
        let err = visits
            .delete(RecordId::new())
            .await
            .expect_err("should fail");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_stats_reports_all_types_and_five_most_recent() {
        let (patients, visits) = services();
        let jane = patients
            .create(new_patient("Jane", "jane@x.com"))
            .await
            .expect("create jane");
        for day in 1..=7 {
            visits
                .create(
                    jane.id,
                    new_visit(&format!("2024-03-{day:02}"), VisitType::Home),
                )
                .await
                .expect("create visit");
        }

        let stats = visits.stats(jane.id).await.expect("stats should succeed");

        assert_eq!(stats.total_visits, 7);
        assert_eq!(stats.visits_by_type.home, 7);
        assert_eq!(stats.visits_by_type.telehealth, 0);
        assert_eq!(stats.visits_by_type.clinic, 0);
        assert_eq!(
            stats.visits_by_type.total(),
            stats.total_visits,
            "per-type counts must sum to the total"
        );
        assert_eq!(stats.recent_visits.len(), 5);
        assert_eq!(
            stats.recent_visits[0].visit_date.format("%Y-%m-%d").to_string(),
            "2024-03-07",
            "most recent first"
        );
    }

    #[tokio::test]
    async fn test_stats_unknown_patient_is_not_found() {
        let (_, visits) = services();
        let err = visits.stats(RecordId::new()).await.expect_err("should fail");
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
