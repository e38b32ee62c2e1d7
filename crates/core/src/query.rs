//! List-query descriptors and the paginated response envelope.
//!
//! Translates request-shaped filter/pagination/sort parameters into the
//! primitives the stores work with, and packages store results into the
//! `{data, total, page, limit, totalPages}` envelope the client expects.

use carelog_types::RecordId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::model::{Patient, VisitType, VisitWithPatient};
use utoipa::{IntoParams, ToSchema};

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

/// Sort direction. Maps onto the store as desc → -1, asc → +1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Sortable fields for visit lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum VisitSortField {
    #[default]
    VisitDate,
    DateCreated,
}

/// Query parameters for the patient list endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PatientListQuery {
    /// Case-insensitive substring matched against first name, last name or
    /// email.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

impl Default for PatientListQuery {
    fn default() -> Self {
        Self {
            search: None,
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PatientListQuery {
    /// Rejects out-of-range paging parameters (both must be ≥ 1).
    pub fn validate(&self) -> StoreResult<()> {
        validate_paging(self.page, self.limit)
    }
}

/// Query parameters for the visit list endpoint.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct VisitListQuery {
    /// Equality filter on the owning patient.
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub patient_id: Option<RecordId>,
    /// Equality filter on the visit type.
    #[serde(default)]
    pub visit_type: Option<VisitType>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub sort_by: VisitSortField,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl Default for VisitListQuery {
    fn default() -> Self {
        Self {
            patient_id: None,
            visit_type: None,
            page: default_page(),
            limit: default_limit(),
            sort_by: VisitSortField::default(),
            sort_order: SortOrder::default(),
        }
    }
}

impl VisitListQuery {
    /// Rejects out-of-range paging parameters (both must be ≥ 1).
    pub fn validate(&self) -> StoreResult<()> {
        validate_paging(self.page, self.limit)
    }
}

fn validate_paging(page: u64, limit: u64) -> StoreResult<()> {
    if page < 1 {
        return Err(StoreError::InvalidInput("page must be at least 1".into()));
    }
    if limit < 1 {
        return Err(StoreError::InvalidInput("limit must be at least 1".into()));
    }
    Ok(())
}

/// True if any of first name, last name or email contains `search`,
/// case-insensitively.
pub fn matches_search(patient: &Patient, search: &str) -> bool {
    let needle = search.to_lowercase();
    patient.first_name.to_lowercase().contains(&needle)
        || patient.last_name.to_lowercase().contains(&needle)
        || patient.email.to_lowercase().contains(&needle)
}

/// Paginated response envelope.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
#[aliases(PatientPage = Page<Patient>, VisitPage = Page<VisitWithPatient>)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Count of all records matching the filter, independent of the window.
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Windows an already filtered and sorted result set.
    ///
    /// `total` is taken from the full set before windowing, so `totalPages`
    /// stays correct on the last, partial page. A page beyond the range
    /// yields empty `data` with accurate totals, not an error. Callers
    /// validate `page`/`limit` ≥ 1 beforehand.
    pub fn build(matched: Vec<T>, page: u64, limit: u64) -> Self {
        let total = matched.len() as u64;
        let total_pages = total.div_ceil(limit.max(1));
        let skip = (page - 1).saturating_mul(limit) as usize;

        let data: Vec<T> = matched
            .into_iter()
            .skip(skip)
            .take(limit as usize)
            .collect();

        Self {
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }
}
