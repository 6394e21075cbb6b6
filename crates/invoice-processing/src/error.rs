//! Custom error types for invoice sheet processing.
//!
//! This module provides a single error hierarchy using `thiserror`. Variants
//! are grouped into [`ErrorKind`]s (validation, data, join, session) so a UI
//! can decide how to present a failure without re-deriving it.
//!
//! Errors are serializable as `{ code, kind, message, columns }`, which is
//! enough for a frontend to render a meaningful message.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for invoice processing.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Applying the deletion plan would leave the dataset without columns.
    #[error("Cannot delete all {0} columns, at least one column must remain")]
    AllColumnsRemoved(usize),

    /// The deletion plan references columns that are not in the dataset.
    #[error("Columns not found in dataset: {}", .0.join(", "))]
    UnknownColumn(Vec<String>),

    /// The dataset has no rows or no columns.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Column does not have a numeric type.
    #[error("Column '{0}' is not numeric")]
    NotNumeric(String),

    /// Every value in the column is null.
    #[error("No valid numeric values found in column '{0}'")]
    NoValidData(String),

    /// None of the configured join key candidates exist in the primary sheet.
    #[error("No join key available, expected one of: {}", .candidates.join(", "))]
    NoJoinKeyAvailable { candidates: Vec<String> },

    /// The lookup built from the detail sheet matched nothing.
    #[error("No rows matched between primary and detail sheets on '{join_key}'")]
    NoMatches { join_key: String },

    /// A sheet was requested that the index does not hold.
    #[error("Sheet '{0}' not found")]
    SheetNotFound(String),

    /// No dataset has been loaded into the session.
    #[error("No data loaded")]
    NoDataLoaded,

    /// The requested transition is not allowed from the current state.
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// Invalid configuration or arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Named template does not exist.
    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    /// Default templates cannot be removed.
    #[error("Template '{0}' is a default template and cannot be removed")]
    TemplateProtected(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

/// Broad category of a [`ProcessingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Deletion plan rejected.
    Validation,
    /// Dataset content does not support the operation.
    Data,
    /// Cross-sheet association failed.
    Join,
    /// Session lifecycle, configuration or template misuse.
    Session,
    /// IO, polars and serialization failures.
    Internal,
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AllColumnsRemoved(_) | Self::UnknownColumn(_) => ErrorKind::Validation,
            Self::EmptyDataset
            | Self::ColumnNotFound(_)
            | Self::NotNumeric(_)
            | Self::NoValidData(_) => ErrorKind::Data,
            Self::NoJoinKeyAvailable { .. } | Self::NoMatches { .. } | Self::SheetNotFound(_) => {
                ErrorKind::Join
            }
            Self::NoDataLoaded
            | Self::InvalidState(_)
            | Self::InvalidConfig(_)
            | Self::TemplateNotFound(_)
            | Self::TemplateProtected(_) => ErrorKind::Session,
            Self::Io(_) | Self::Polars(_) | Self::Json(_) => ErrorKind::Internal,
            Self::WithContext { source, .. } => source.kind(),
        }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AllColumnsRemoved(_) => "ALL_COLUMNS_REMOVED",
            Self::UnknownColumn(_) => "UNKNOWN_COLUMN",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::NotNumeric(_) => "NOT_NUMERIC",
            Self::NoValidData(_) => "NO_VALID_DATA",
            Self::NoJoinKeyAvailable { .. } => "NO_JOIN_KEY_AVAILABLE",
            Self::NoMatches { .. } => "NO_MATCHES",
            Self::SheetNotFound(_) => "SHEET_NOT_FOUND",
            Self::NoDataLoaded => "NO_DATA_LOADED",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
            Self::TemplateProtected(_) => "TEMPLATE_PROTECTED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Column names involved in the failure, if any.
    pub fn affected_columns(&self) -> Vec<String> {
        match self {
            Self::UnknownColumn(columns) => columns.clone(),
            Self::ColumnNotFound(column) | Self::NotNumeric(column) | Self::NoValidData(column) => {
                vec![column.clone()]
            }
            Self::NoJoinKeyAvailable { candidates } => candidates.clone(),
            Self::NoMatches { join_key } => vec![join_key.clone()],
            Self::WithContext { source, .. } => source.affected_columns(),
            _ => Vec::new(),
        }
    }

    /// Check if the session can keep going after this error.
    ///
    /// Join failures leave the primary dataset untouched, so the deletion and
    /// recalculation steps can still run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Join)
            || matches!(
                self,
                Self::NoDataLoaded | Self::InvalidConfig(_) | Self::InvalidState(_)
            )
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 4)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("kind", &self.kind())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("columns", &self.affected_columns())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;
