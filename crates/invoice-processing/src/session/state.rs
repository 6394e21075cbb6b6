//! Session states and the transitions between them.
//!
//! Every transition borrows the current state and returns a new one, so a
//! failing transition cannot leave a half-updated session behind.

use crate::association::{AssociationOutcome, AssociationRequest, CrossSheetAssociator};
use crate::deletion::ColumnDeletionEngine;
use crate::error::{ProcessingError, Result};
use crate::summary::SummaryRecalculator;
use crate::types::{
    ActionKind, ColumnPlan, ProcessingHistory, ProcessingRecord, RecalculationPlan,
};
use crate::utils::{has_column, is_empty_dataset, is_numeric_column};
use polars::prelude::*;
use tracing::{info, warn};

/// Datasets, plans and history of a loaded session.
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The dataset as loaded. Never modified.
    pub original: DataFrame,
    /// Input of `process`: the original, or the original enriched by
    /// cross-sheet association.
    pub source: DataFrame,
    /// Result of the last `process`, or `source` before that.
    pub processed: DataFrame,
    pub deletion_plan: ColumnPlan,
    pub recalculation_plan: RecalculationPlan,
    pub history: ProcessingHistory,
    pub association_applied: bool,
}

impl SessionData {
    fn new(df: DataFrame) -> Self {
        Self {
            original: df.clone(),
            source: df.clone(),
            processed: df,
            deletion_plan: ColumnPlan::empty(),
            recalculation_plan: RecalculationPlan::empty(),
            history: ProcessingHistory::new(),
            association_applied: false,
        }
    }
}

/// Lifecycle of a [`super::ProcessingSession`].
///
/// ```text
/// Empty --load--> Loaded --set plans / associate--> Configured --process--> Processed
///                   ^                                                          |
///                   +------------------------- reset -------------------------+
/// ```
#[derive(Debug, Clone, Default)]
pub enum SessionState {
    /// Nothing loaded yet.
    #[default]
    Empty,
    /// A dataset is loaded, no plan set.
    Loaded(SessionData),
    /// Plans set or association run, not processed yet.
    Configured(SessionData),
    /// `process` has run at least once.
    Processed(SessionData),
}

impl SessionState {
    /// Short name of the state, for logs and UIs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Loaded(_) => "loaded",
            Self::Configured(_) => "configured",
            Self::Processed(_) => "processed",
        }
    }

    pub fn data(&self) -> Option<&SessionData> {
        match self {
            Self::Empty => None,
            Self::Loaded(data) | Self::Configured(data) | Self::Processed(data) => Some(data),
        }
    }

    pub(crate) fn require_data(&self) -> Result<&SessionData> {
        self.data().ok_or(ProcessingError::NoDataLoaded)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Any state to `Loaded` with a fresh dataset.
    pub(crate) fn load(df: DataFrame) -> Result<Self> {
        if is_empty_dataset(&df) {
            return Err(ProcessingError::EmptyDataset);
        }
        info!("Loaded data: {} rows x {} columns", df.height(), df.width());
        Ok(Self::Loaded(SessionData::new(df)))
    }

    pub(crate) fn with_deletion_plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<Self> {
        let data = self.require_data()?;
        let plan = ColumnDeletionEngine::set_deletion_plan(&data.source, requested);
        Ok(Self::Configured(SessionData {
            deletion_plan: plan,
            ..data.clone()
        }))
    }

    pub(crate) fn with_recalculation_plan<S: AsRef<str>>(&self, requested: &[S]) -> Result<Self> {
        let data = self.require_data()?;
        let mut plan = RecalculationPlan::empty();

        for name in requested {
            let name = name.as_ref();
            if plan.columns.iter().any(|c| c == name) {
                continue;
            }
            if !has_column(&data.source, name) {
                warn!("Column '{}' does not exist, not recalculated", name);
                plan.skipped.push(name.to_string());
            } else if !is_numeric_column(&data.source, name) {
                warn!("Column '{}' is not numeric, not recalculated", name);
                plan.skipped.push(name.to_string());
            } else {
                plan.columns.push(name.to_string());
            }
        }

        info!("Recalculation plan set: {} columns", plan.columns.len());
        Ok(Self::Configured(SessionData {
            recalculation_plan: plan,
            ..data.clone()
        }))
    }

    /// `Loaded`/`Configured` to `Configured`, with the source dataset
    /// replaced by its enriched version.
    pub(crate) fn with_association(
        &self,
        detail: &DataFrame,
        request: &AssociationRequest,
        associator: &CrossSheetAssociator,
    ) -> Result<(Self, AssociationOutcome)> {
        let data = match self {
            Self::Empty => return Err(ProcessingError::NoDataLoaded),
            Self::Processed(_) => {
                return Err(ProcessingError::InvalidState(
                    "cross-sheet association must run before processing".to_string(),
                ));
            }
            Self::Loaded(data) | Self::Configured(data) => data,
        };
        if data.association_applied {
            return Err(ProcessingError::InvalidState(
                "cross-sheet association already applied to this dataset".to_string(),
            ));
        }

        let outcome = associator.associate(&data.source, detail, request)?;
        let record = ProcessingRecord::new(
            ActionKind::CrossSheetAssociation,
            vec![outcome.new_column_name.clone()],
            data.source.shape(),
            outcome.dataset.shape(),
        )
        .with_matched_keys(outcome.matched_keys);

        let next = Self::Configured(SessionData {
            source: outcome.dataset.clone(),
            processed: outcome.dataset.clone(),
            history: data.history.appended(record),
            association_applied: true,
            ..data.clone()
        });
        Ok((next, outcome))
    }

    /// `Loaded`/`Configured`/`Processed` to `Processed`.
    ///
    /// Always starts from the source dataset, so processing twice gives the
    /// same result.
    pub(crate) fn processed(&self, recalculator: &SummaryRecalculator) -> Result<Self> {
        let data = self.require_data()?;
        let plan = &data.deletion_plan;

        ColumnDeletionEngine::validate(&data.source, plan)?;
        let mut processed = ColumnDeletionEngine::apply(&data.source, plan)?;

        let recalc_columns: Vec<&str> = data
            .recalculation_plan
            .columns
            .iter()
            .map(String::as_str)
            .filter(|name| has_column(&processed, name))
            .collect();
        let mut recalculated = Vec::new();
        if !recalc_columns.is_empty() {
            let outcome = recalculator.recalculate(&processed, &recalc_columns)?;
            recalculated = outcome.recalculated_columns();
            processed = outcome.dataset;
        }

        let action = if plan.is_empty() {
            ActionKind::NoOp
        } else {
            ActionKind::DeleteColumns
        };
        let record = ProcessingRecord::new(
            action,
            plan.columns.clone(),
            data.source.shape(),
            processed.shape(),
        )
        .with_recalculated(recalculated);

        info!(
            "Processing complete: deleted {} columns, {} remain",
            plan.len(),
            processed.width()
        );

        Ok(Self::Processed(SessionData {
            processed,
            history: data.history.appended(record),
            ..data.clone()
        }))
    }

    /// Back to `Loaded` with the original dataset. `Empty` stays `Empty`.
    pub(crate) fn reset(&self) -> Self {
        match self.data() {
            None => Self::Empty,
            Some(data) => Self::Loaded(SessionData::new(data.original.clone())),
        }
    }
}
