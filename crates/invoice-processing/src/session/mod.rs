//! Processing session.
//!
//! A [`ProcessingSession`] sequences one unit of work: load a dataset, set
//! the deletion and recalculation plans, optionally enrich it from a detail
//! sheet, process, and read back the result.
//!
//! # Example
//!
//! ```rust,ignore
//! use invoice_processing::{ProcessingConfig, ProcessingSession};
//!
//! let mut session = ProcessingSession::new(ProcessingConfig::default());
//! session.load(df)?;
//! session.set_deletion_plan(&["开票人", "发票来源"])?;
//! session.set_recalculation_plan(&["金额", "税额"])?;
//! session.process()?;
//!
//! let summary = session.processing_summary()?;
//! ```

mod state;

pub use state::{SessionData, SessionState};

use crate::association::{AssociationOutcome, AssociationRequest, CrossSheetAssociator};
use crate::config::ProcessingConfig;
use crate::deletion::{ColumnDeletionEngine, Preview};
use crate::error::{ProcessingError, Result};
use crate::summary::{NumericAggregator, SummaryRecalculator, SummaryRowLocator};
use crate::templates::TemplateMatcher;
use crate::types::{
    ColumnInfo, ColumnPlan, NumericSummary, ProcessingRecord, ProcessingSummary,
    RecalculationPlan,
};
use crate::utils::column_names;
use polars::prelude::*;
use tracing::{debug, error, info};

/// Explicit state machine over one loaded dataset.
///
/// Operations that fail leave the session exactly as it was.
#[derive(Debug, Clone)]
pub struct ProcessingSession {
    config: ProcessingConfig,
    state: SessionState,
    recalculator: SummaryRecalculator,
    associator: CrossSheetAssociator,
}

static_assertions::assert_impl_all!(ProcessingSession: Send);

impl Default for ProcessingSession {
    fn default() -> Self {
        Self::new(ProcessingConfig::default())
    }
}

impl ProcessingSession {
    pub fn new(config: ProcessingConfig) -> Self {
        let recalculator = SummaryRecalculator::new(SummaryRowLocator::from_config(&config));
        let associator = CrossSheetAssociator::from_config(&config);
        Self {
            config,
            state: SessionState::Empty,
            recalculator,
            associator,
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_name(&self) -> &'static str {
        self.state.name()
    }

    /// Swap in the state produced by `f`, or keep the current one on error.
    fn transition<F>(&mut self, operation: &str, f: F) -> Result<()>
    where
        F: FnOnce(&SessionState) -> Result<SessionState>,
    {
        match f(&self.state) {
            Ok(next) => {
                debug!("{}: {} -> {}", operation, self.state.name(), next.name());
                self.state = next;
                Ok(())
            }
            Err(e) => {
                error!("{} failed: {}", operation, e);
                Err(e)
            }
        }
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Load a dataset, discarding everything from a previous load.
    pub fn load(&mut self, df: DataFrame) -> Result<()> {
        self.transition("load", |_| SessionState::load(df))
    }

    /// Set the columns to delete. Unknown names are dropped with a warning
    /// and reported in the returned plan.
    pub fn set_deletion_plan<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<ColumnPlan> {
        self.transition("set_deletion_plan", |state| {
            state.with_deletion_plan(columns)
        })?;
        Ok(self.deletion_plan().cloned().unwrap_or_default())
    }

    /// Set the columns whose summary-row cell is recomputed. Missing and
    /// non-numeric columns are skipped with a warning.
    pub fn set_recalculation_plan<S: AsRef<str>>(
        &mut self,
        columns: &[S],
    ) -> Result<RecalculationPlan> {
        self.transition("set_recalculation_plan", |state| {
            state.with_recalculation_plan(columns)
        })?;
        Ok(self.recalculation_plan().cloned().unwrap_or_default())
    }

    /// Match template column names against the source columns and use the
    /// matches as the deletion plan.
    pub fn apply_template<S: AsRef<str>>(&mut self, template_columns: &[S]) -> Result<ColumnPlan> {
        let data = self.state.require_data()?;
        let matched = TemplateMatcher::match_columns(template_columns, &column_names(&data.source));
        info!(
            "Template matched {} of {} columns",
            matched.len(),
            template_columns.len()
        );
        self.set_deletion_plan(&matched)
    }

    /// Enrich the source dataset with a column looked up from `detail`.
    ///
    /// Allowed once per load, before processing. On failure the session is
    /// unchanged and processing can continue without the extra column.
    pub fn run_cross_sheet_association(
        &mut self,
        detail: &DataFrame,
        request: &AssociationRequest,
    ) -> Result<AssociationOutcome> {
        match self
            .state
            .with_association(detail, request, &self.associator)
        {
            Ok((next, outcome)) => {
                debug!(
                    "run_cross_sheet_association: {} -> {}",
                    self.state.name(),
                    next.name()
                );
                self.state = next;
                Ok(outcome)
            }
            Err(e) => {
                error!("run_cross_sheet_association failed: {}", e);
                Err(e)
            }
        }
    }

    /// Apply the deletion plan to the source dataset and recalculate the
    /// summary row.
    pub fn process(&mut self) -> Result<&DataFrame> {
        let recalculator = &self.recalculator;
        match self.state.processed(recalculator) {
            Ok(next) => {
                debug!("process: {} -> {}", self.state.name(), next.name());
                self.state = next;
            }
            Err(e) => {
                error!("process failed: {}", e);
                return Err(e);
            }
        }
        self.state
            .data()
            .map(|data| &data.processed)
            .ok_or(ProcessingError::NoDataLoaded)
    }

    /// Return to the freshly loaded dataset, dropping plans, history and any
    /// association.
    pub fn reset(&mut self) {
        self.state = self.state.reset();
        info!("Session reset");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn original_dataset(&self) -> Option<&DataFrame> {
        self.state.data().map(|data| &data.original)
    }

    pub fn source_dataset(&self) -> Option<&DataFrame> {
        self.state.data().map(|data| &data.source)
    }

    pub fn processed_dataset(&self) -> Option<&DataFrame> {
        self.state.data().map(|data| &data.processed)
    }

    pub fn deletion_plan(&self) -> Option<&ColumnPlan> {
        self.state.data().map(|data| &data.deletion_plan)
    }

    pub fn recalculation_plan(&self) -> Option<&RecalculationPlan> {
        self.state.data().map(|data| &data.recalculation_plan)
    }

    pub fn history(&self) -> &[ProcessingRecord] {
        self.state
            .data()
            .map(|data| data.history.records())
            .unwrap_or(&[])
    }

    pub fn association_applied(&self) -> bool {
        self.state.data().is_some_and(|data| data.association_applied)
    }

    pub fn processing_summary(&self) -> Result<ProcessingSummary> {
        let data = self.state.require_data()?;
        let remaining_columns = column_names(&data.processed);
        Ok(ProcessingSummary {
            original_column_count: data.source.width(),
            deleted_column_count: data.deletion_plan.len(),
            deleted_columns: data.deletion_plan.columns.clone(),
            remaining_column_count: remaining_columns.len(),
            remaining_columns,
            row_count: data.processed.height(),
            history: data.history.clone(),
        })
    }

    /// Sum statistics of the numeric columns of the processed dataset.
    pub fn column_statistics(&self) -> Result<NumericSummary> {
        let data = self.state.require_data()?;
        NumericAggregator::sum_all(&data.processed)
    }

    /// Numeric columns of the source dataset that can be recalculated.
    pub fn recalculable_columns(&self) -> Result<Vec<String>> {
        let data = self.state.require_data()?;
        Ok(NumericAggregator::numeric_columns(&data.source))
    }

    /// First `rows` rows of the source dataset before and after deletion.
    pub fn preview(&self, rows: usize) -> Result<Preview> {
        let data = self.state.require_data()?;
        ColumnDeletionEngine::generate_preview(&data.source, &data.deletion_plan, rows)
    }

    /// Preview with the configured number of rows.
    pub fn default_preview(&self) -> Result<Preview> {
        self.preview(self.config.preview_rows)
    }

    pub fn column_info(&self) -> Result<Vec<ColumnInfo>> {
        let data = self.state.require_data()?;
        Ok(ColumnDeletionEngine::column_info(
            &data.source,
            &data.deletion_plan,
        ))
    }
}
