//! # Carelog Core
//!
//! Core business logic for the carelog patient/visit record system.
//!
//! This crate contains pure data operations:
//! - Patient store with store-enforced email uniqueness
//! - Visit store with referential checks against the patient store and a
//!   read-side patient join
//! - Cascade coordinator making patient deletion all-or-nothing
//! - Query builder translating list parameters into filters, sorts and the
//!   paginated `{data, total, page, limit, totalPages}` envelope
//!
//! **No API concerns**: HTTP routing, request validation shape and JSON
//! status mapping belong in `api-rest`.

pub mod cascade;
pub mod error;
pub mod model;
pub mod patients;
pub mod query;
pub mod store;
pub mod visits;

pub use cascade::{CascadeCoordinator, CascadePhase};
pub use error::{Entity, StoreError, StoreResult};
pub use model::{
    NewPatient, NewVisit, Patient, PatientStats, PatientSummary, PatientUpdate, Visit, VisitStats,
    VisitType, VisitTypeCounts, VisitUpdate, VisitWithPatient,
};
pub use patients::PatientService;
pub use query::{Page, PatientListQuery, PatientPage, SortOrder, VisitListQuery, VisitPage, VisitSortField};
pub use store::Database;
pub use visits::VisitService;
