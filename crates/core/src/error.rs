use thiserror::Error;

/// Form input rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("date is required")]
    MissingDate,

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}
