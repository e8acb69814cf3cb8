//! Error types for mindful-core.
//!
//! Every operation the core exposes returns [`CoreResult`]. Domain failures
//! carry a stable kind (see [`CoreError::kind`]) so transports can map them
//! without string matching.

use thiserror::Error;
use uuid::Uuid;

use crate::publication::PublishBlocker;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Publish attempted while the program is not publishable.
    #[error("program cannot be published: {0}")]
    PublicationPrecondition(PublishBlocker),

    /// Mutation of a published program or one of its children.
    #[error("{resource} belongs to a published program and cannot be modified")]
    ImmutableResource { resource: &'static str },

    #[error("a session for week {week} already exists in this program")]
    DuplicateWeek { week: u32 },

    #[error("a {moment} questionnaire already exists in this program")]
    DuplicateMoment { moment: &'static str },

    #[error("participant already answered this questionnaire")]
    DuplicateResponse,

    #[error("participant already wrote a diary entry for this session")]
    DuplicateDiaryEntry,

    #[error("participant is already enrolled in this program")]
    AlreadyEnrolled,

    #[error("participant already has a program in progress ({program_id})")]
    AlreadyInAnotherProgram { program_id: Uuid },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Stable snake_case identifier of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PublicationPrecondition(_) => "publication_precondition",
            Self::ImmutableResource { .. } => "immutable_resource",
            Self::DuplicateWeek { .. } => "duplicate_week",
            Self::DuplicateMoment { .. } => "duplicate_moment",
            Self::DuplicateResponse => "duplicate_response",
            Self::DuplicateDiaryEntry => "duplicate_diary_entry",
            Self::AlreadyEnrolled => "already_enrolled",
            Self::AlreadyInAnotherProgram { .. } => "already_in_another_program",
            Self::InvalidState(_) => "invalid_state",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Forbidden(_) => "forbidden",
            Self::Storage(_) | Self::Serialization(_) | Self::Io(_) => "internal",
        }
    }

    /// Whether this is an unexpected failure rather than a domain rule.
    pub fn is_internal(&self) -> bool {
        self.kind() == "internal"
    }
}

/// True when the SQLite error is a UNIQUE constraint violation.
///
/// Used to turn a lost race against the storage backstop into the same
/// domain error the pre-check would have produced.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}
