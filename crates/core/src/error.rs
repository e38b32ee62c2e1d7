use carelog_types::RecordId;

/// The kind of record an operation failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Patient,
    Visit,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Patient => write!(f, "patient"),
            Entity::Visit => write!(f, "visit"),
        }
    }
}

/// Errors surfaced by the record stores.
///
/// All variants propagate unmodified from the store to the caller; there is
/// no local recovery. The only translation anywhere in the core is the
/// patient collection signalling a unique-index violation as
/// [`StoreError::DuplicateEmail`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: Entity, id: RecordId },
    #[error("email already exists")]
    DuplicateEmail,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn patient_not_found(id: RecordId) -> Self {
        StoreError::NotFound {
            entity: Entity::Patient,
            id,
        }
    }

    pub fn visit_not_found(id: RecordId) -> Self {
        StoreError::NotFound {
            entity: Entity::Visit,
            id,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
