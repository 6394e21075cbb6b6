//! Plans, history records and summaries shared across the crate.

use serde::{Deserialize, Serialize};

// ============================================================================
// Plans
// ============================================================================

/// Columns selected for deletion.
///
/// Built by [`crate::ColumnDeletionEngine::set_deletion_plan`], which only
/// admits columns present in the dataset. Names that were requested but not
/// found are kept in `ignored` so a UI can warn about them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPlan {
    /// Columns to delete, in request order, without duplicates.
    pub columns: Vec<String>,
    /// Requested names that do not exist in the dataset.
    pub ignored: Vec<String>,
}

impl ColumnPlan {
    /// A plan that deletes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a plan from column names, skipping duplicates.
    ///
    /// No existence check is made; use the deletion engine for that.
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut plan = Self::default();
        for column in columns {
            let column = column.into();
            if !plan.columns.contains(&column) {
                plan.columns.push(column);
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Columns whose summary-row cell is recomputed after processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalculationPlan {
    /// Numeric columns to recompute.
    pub columns: Vec<String>,
    /// Requested names that were missing or not numeric.
    pub skipped: Vec<String>,
}

impl RecalculationPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

// ============================================================================
// Processing History
// ============================================================================

/// Kind of transformation recorded in the history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Columns were deleted (and summary cells possibly recalculated).
    DeleteColumns,
    /// Processing ran with an empty deletion plan.
    NoOp,
    /// A derived column was added from a detail sheet.
    CrossSheetAssociation,
}

impl ActionKind {
    /// Get a human-readable display name for the action kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::DeleteColumns => "Columns Deleted",
            Self::NoOp => "No Changes",
            Self::CrossSheetAssociation => "Cross-Sheet Association",
        }
    }
}

/// A single completed transformation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRecord {
    pub action: ActionKind,
    /// Deleted columns, or the appended column for associations.
    pub affected_columns: Vec<String>,
    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    /// Summary-row cells rewritten during this step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recalculated_columns: Vec<String>,
    /// Number of invoice keys matched by an association.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_keys: Option<usize>,
}

impl ProcessingRecord {
    pub fn new(
        action: ActionKind,
        affected_columns: Vec<String>,
        shape_before: (usize, usize),
        shape_after: (usize, usize),
    ) -> Self {
        Self {
            action,
            affected_columns,
            rows_before: shape_before.0,
            columns_before: shape_before.1,
            rows_after: shape_after.0,
            columns_after: shape_after.1,
            recalculated_columns: Vec::new(),
            matched_keys: None,
        }
    }

    pub fn with_recalculated(mut self, columns: Vec<String>) -> Self {
        self.recalculated_columns = columns;
        self
    }

    pub fn with_matched_keys(mut self, matched: usize) -> Self {
        self.matched_keys = Some(matched);
        self
    }
}

/// Append-only log of processing steps for one loaded dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingHistory {
    records: Vec<ProcessingRecord>,
}

impl ProcessingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of this history with one more record.
    pub(crate) fn appended(&self, record: ProcessingRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    pub fn records(&self) -> &[ProcessingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&ProcessingRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProcessingRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a ProcessingHistory {
    type Item = &'a ProcessingRecord;
    type IntoIter = std::slice::Iter<'a, ProcessingRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ============================================================================
// Summaries (for UI integration)
// ============================================================================

/// What processing did to the loaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub original_column_count: usize,
    pub deleted_column_count: usize,
    pub deleted_columns: Vec<String>,
    pub remaining_column_count: usize,
    pub remaining_columns: Vec<String>,
    pub row_count: usize,
    pub history: ProcessingHistory,
}

/// Sum statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub column: String,
    pub sum: f64,
    /// Sum with two decimals and no thousands separators.
    pub formatted_sum: String,
    pub total_count: usize,
    pub valid_count: usize,
    pub null_count: usize,
    pub average: f64,
}

/// Statistics for every numeric column of a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    /// Per-column statistics, in column order.
    pub columns: Vec<ColumnStats>,
    /// Number of numeric columns found.
    pub total_numeric_columns: usize,
    /// Number of numeric columns with statistics.
    pub processed_columns: usize,
}

impl NumericSummary {
    pub fn get(&self, column: &str) -> Option<&ColumnStats> {
        self.columns.iter().find(|stats| stats.column == column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Per-column overview shown in column pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub index: usize,
    /// Spreadsheet column label (A, B, ..., AA).
    pub excel_column: String,
    pub name: String,
    pub dtype: String,
    pub non_null_count: usize,
    pub null_count: usize,
    pub selected_for_deletion: bool,
}

// ============================================================================
// Tests
// ============================================================================
