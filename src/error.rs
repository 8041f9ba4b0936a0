use crate::models::validation::ValidationError;
use crate::rules::validate::format_errors;
use crate::store::StoreError;
use thiserror::Error;

/// Outcome classes callers need to tell apart: a 400-style validation
/// failure, a 404-style missing record, and an opaque storage failure.
#[derive(Debug, Error)]
pub enum BugError {
    #[error("validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
    #[error("bug {0} not found")]
    NotFound(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl BugError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self::Validation(vec![ValidationError::new(field, message)])
    }
}

impl From<StoreError> for BugError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
