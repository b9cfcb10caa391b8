use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;

/// Reasons a write to the bracket is rejected. These are always recoverable
/// and never leave a partial write behind.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("the same team cannot occupy both slots of a match")]
    SameTeam,
    #[error("both slots derive the same outcome of the same source match")]
    DuplicateSource,
    #[error("a complete match needs both scores and an incomplete one none")]
    IncompleteScore,
    #[error("a source match must have a smaller number than its dependents")]
    SourceOrder,
    #[error("a slot with a source match must choose winner or loser")]
    MissingSelector,
    #[error("the timeslot and room are already used by another match")]
    SlotConflict,
    #[error(
        "a slot must be either a fixed team or a derived source, not both"
    )]
    MixedSlot,
    #[error("another match already derives this outcome of the source match")]
    SharedSource,
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl ValidationError {
    /// Stable code surfaced to callers.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::SameTeam => "SAME_TEAM",
            ValidationError::DuplicateSource => "DUPLICATE_SOURCE",
            ValidationError::IncompleteScore => "INCOMPLETE_SCORE",
            ValidationError::SourceOrder => "SOURCE_ORDER",
            ValidationError::MissingSelector => "MISSING_SELECTOR",
            ValidationError::SlotConflict => "SLOT_CONFLICT",
            ValidationError::MixedSlot => "MIXED_SLOT",
            ValidationError::SharedSource => "SHARED_SOURCE",
            ValidationError::InvalidField { .. } => "INVALID_FIELD",
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} `{id}` does not exist")]
    NotFound { entity: &'static str, id: String },
    /// A concurrent write won the race; retry with fresh state.
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(DieselError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<DieselError> for EngineError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                info,
            ) => EngineError::Conflict(info.message().to_string()),
            DieselError::DatabaseError(_, ref info)
                if info.message().contains("database is locked") =>
            {
                EngineError::Conflict(info.message().to_string())
            }
            e => EngineError::Database(e),
        }
    }
}

/// The JSON body sent back for a rejected request.
#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(e: &EngineError) -> Self {
        ErrorBody {
            error: match e {
                EngineError::Validation(v) => v.code(),
                EngineError::NotFound { .. } => "NOT_FOUND",
                EngineError::Conflict(_) => "CONFLICT",
                EngineError::Database(_) => "INTERNAL",
            },
            message: e.to_string(),
        }
    }
}
