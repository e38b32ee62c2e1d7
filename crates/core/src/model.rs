//! Domain model for patient and visit records.
//!
//! Documents are serialised with the camelCase field names the browser
//! client already speaks. Validated input types live in `carelog-types`;
//! the stored documents keep plain canonical strings so partial updates and
//! serde stay straightforward.

use carelog_types::{EmailAddress, NonEmptyText, PhoneNumber, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A patient document as persisted by the patient store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[schema(value_type = String)]
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub dob: NaiveDate,
    /// Canonical (lowercased) form; unique across all patients.
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Validated fields for creating a patient.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPatient {
    #[schema(value_type = String)]
    pub first_name: NonEmptyText,
    #[schema(value_type = String)]
    pub last_name: NonEmptyText,
    pub dob: NaiveDate,
    #[schema(value_type = String, format = "email")]
    pub email: EmailAddress,
    #[schema(value_type = String)]
    pub phone_number: PhoneNumber,
    #[schema(value_type = String)]
    pub address: NonEmptyText,
}

/// Partial update for a patient. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientUpdate {
    #[schema(value_type = Option<String>)]
    pub first_name: Option<NonEmptyText>,
    #[schema(value_type = Option<String>)]
    pub last_name: Option<NonEmptyText>,
    pub dob: Option<NaiveDate>,
    #[schema(value_type = Option<String>, format = "email")]
    pub email: Option<EmailAddress>,
    #[schema(value_type = Option<String>)]
    pub phone_number: Option<PhoneNumber>,
    #[schema(value_type = Option<String>)]
    pub address: Option<NonEmptyText>,
}

/// The kind of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum VisitType {
    Home,
    Telehealth,
    Clinic,
}

impl VisitType {
    /// All visit types, in the order stats reports them.
    pub const ALL: [VisitType; 3] = [VisitType::Home, VisitType::Telehealth, VisitType::Clinic];
}

impl std::fmt::Display for VisitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitType::Home => write!(f, "Home"),
            VisitType::Telehealth => write!(f, "Telehealth"),
            VisitType::Clinic => write!(f, "Clinic"),
        }
    }
}

/// A visit document as persisted by the visit store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    #[schema(value_type = String)]
    pub id: RecordId,
    /// Owning patient; existence is validated before any visit is created.
    #[schema(value_type = String)]
    pub patient_id: RecordId,
    pub visit_date: DateTime<Utc>,
    pub visit_type: VisitType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
}

/// Fields for creating a visit. The date arrives as the client sent it and
/// is normalised by the visit store.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewVisit {
    pub visit_date: String,
    pub visit_type: VisitType,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a visit. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitUpdate {
    pub visit_date: Option<String>,
    pub visit_type: Option<VisitType>,
    pub notes: Option<String>,
}

/// The patient fields a visit row carries after the read-side join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[schema(value_type = String)]
    pub id: RecordId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            email: patient.email.clone(),
        }
    }
}

/// A visit joined with its patient's summary fields at read time.
///
/// `patient` is `None` only if the back-reference is dangling, which the
/// cascade delete is there to prevent.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitWithPatient {
    #[serde(flatten)]
    pub visit: Visit,
    pub patient: Option<PatientSummary>,
}

/// Per-type visit counts. All three keys are always present.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq, ToSchema)]
pub struct VisitTypeCounts {
    #[serde(rename = "Home")]
    pub home: u64,
    #[serde(rename = "Telehealth")]
    pub telehealth: u64,
    #[serde(rename = "Clinic")]
    pub clinic: u64,
}

impl VisitTypeCounts {
    /// Aggregates counts over a set of visits.
    pub fn tally<'a>(visits: impl IntoIterator<Item = &'a Visit>) -> Self {
        let mut counts = Self::default();
        for visit in visits {
            match visit.visit_type {
                VisitType::Home => counts.home += 1,
                VisitType::Telehealth => counts.telehealth += 1,
                VisitType::Clinic => counts.clinic += 1,
            }
        }
        counts
    }

    /// Sum across all three types.
    pub fn total(&self) -> u64 {
        self.home + self.telehealth + self.clinic
    }
}

/// Visit statistics for one patient.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    pub total_visits: u64,
    pub visits_by_type: VisitTypeCounts,
    /// The five most recent visits by visit date, descending.
    pub recent_visits: Vec<Visit>,
}

/// Patient record plus its visit-count breakdown.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PatientStats {
    pub patient: Patient,
    pub total_visits: u64,
    pub visits_by_type: VisitTypeCounts,
}
