//! Error types for the layout engine.
//!
//! Only input validation fails with an error. Problems found while laying
//! out an individual element are logged and the element is skipped, so a
//! defect in one slur never aborts the rest of the document.

use thiserror::Error;

/// The main error type for layout operations.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid style value for `{field}`: {reason}")]
    InvalidStyle { field: &'static str, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("The score definition has no staff definitions but measures contain staves")]
    EmptyStaffDefinition,
}

impl LayoutError {
    /// Create a new `InvalidStyle` error for the given field.
    pub fn invalid_style(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidStyle {
            field,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LayoutError>;
