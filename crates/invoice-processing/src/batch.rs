//! Batch processing of several invoice files.
//!
//! Each job runs in its own [`ProcessingSession`] on its own scoped thread.
//! A failing job never affects the others, and outcomes are returned in
//! input order.

use crate::association::AssociationRequest;
use crate::config::ProcessingConfig;
use crate::error::{ProcessingError, Result};
use crate::session::ProcessingSession;
use crate::templates::TemplateMatcher;
use crate::types::{ColumnPlan, ProcessingSummary, RecalculationPlan};
use crate::utils::column_names;
use polars::prelude::*;
use serde::Serialize;
use tracing::{error, info, warn};

/// One unit of batch work.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Label used in reports, usually the input file name.
    pub name: String,
    pub dataset: DataFrame,
    /// Detail sheet for cross-sheet association.
    pub detail: Option<DataFrame>,
    /// Columns to delete.
    pub deletion: Vec<String>,
    /// Template column names, matched against the dataset and added to
    /// `deletion`.
    pub template: Option<Vec<String>>,
    /// Columns whose summary-row cell is recomputed.
    pub recalculation: Vec<String>,
    /// Association parameters; the config defaults are used when `None`.
    pub association: Option<AssociationRequest>,
}

impl BatchJob {
    pub fn new(name: impl Into<String>, dataset: DataFrame) -> Self {
        Self {
            name: name.into(),
            dataset,
            detail: None,
            deletion: Vec::new(),
            template: None,
            recalculation: Vec::new(),
            association: None,
        }
    }

    pub fn with_detail(mut self, detail: DataFrame) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_deletion<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deletion = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_template(mut self, columns: Vec<String>) -> Self {
        self.template = Some(columns);
        self
    }

    pub fn with_recalculation<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recalculation = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_association(mut self, request: AssociationRequest) -> Self {
        self.association = Some(request);
        self
    }
}

/// Association details of a batch job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssociationSummary {
    pub join_key: String,
    pub new_column_name: String,
    pub matched_keys: usize,
}

/// Result of a successful batch job.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// The processed dataset.
    pub dataset: DataFrame,
    pub summary: ProcessingSummary,
    pub deletion_plan: ColumnPlan,
    pub recalculation_plan: RecalculationPlan,
    pub association: Option<AssociationSummary>,
    /// Non-fatal problems, such as a failed association.
    pub warnings: Vec<String>,
}

/// Outcome of one batch job.
#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: Result<BatchReport>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every job in its own session, concurrently.
pub fn run_batch(jobs: Vec<BatchJob>, config: &ProcessingConfig) -> Vec<BatchOutcome> {
    info!("Starting batch of {} jobs", jobs.len());

    let outcomes: Vec<BatchOutcome> = std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .into_iter()
            .map(|job| {
                let name = job.name.clone();
                (name, scope.spawn(move || run_job(job, config)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(ProcessingError::InvalidState(format!(
                        "job '{name}' panicked"
                    )))
                });
                BatchOutcome { name, result }
            })
            .collect()
    });

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    info!(
        "Batch complete: {} succeeded, {} failed",
        outcomes.len() - failed,
        failed
    );
    outcomes
}

/// Process a single job in a fresh session.
pub fn run_job(job: BatchJob, config: &ProcessingConfig) -> Result<BatchReport> {
    let BatchJob {
        name,
        dataset,
        detail,
        deletion,
        template,
        recalculation,
        association,
    } = job;

    let mut session = ProcessingSession::new(config.clone());
    session
        .load(dataset)
        .map_err(|e| e.with_context(format!("Job '{name}'")))?;

    let mut warnings = Vec::new();
    let mut association_summary = None;
    if let Some(detail) = detail {
        let request = association.unwrap_or_else(|| AssociationRequest::from_config(config));
        match session.run_cross_sheet_association(&detail, &request) {
            Ok(outcome) => {
                association_summary = Some(AssociationSummary {
                    join_key: outcome.join_key,
                    new_column_name: outcome.new_column_name,
                    matched_keys: outcome.matched_keys,
                });
            }
            // The session is untouched on failure; deletion and recalculation
            // still run on the unenriched dataset.
            Err(e) => {
                warn!("Job '{}': association skipped: {}", name, e);
                warnings.push(format!("Cross-sheet association skipped: {e}"));
            }
        }
    }

    let mut requested = match &template {
        Some(template) => {
            let columns = session
                .source_dataset()
                .map(column_names)
                .unwrap_or_default();
            TemplateMatcher::match_columns(template, &columns)
        }
        None => Vec::new(),
    };
    requested.extend(deletion);

    let deletion_plan = session.set_deletion_plan(&requested)?;
    if !deletion_plan.ignored.is_empty() {
        warnings.push(format!(
            "Columns not found: {}",
            deletion_plan.ignored.join(", ")
        ));
    }
    let recalculation_plan = session.set_recalculation_plan(&recalculation)?;
    if !recalculation_plan.skipped.is_empty() {
        warnings.push(format!(
            "Columns not recalculated: {}",
            recalculation_plan.skipped.join(", ")
        ));
    }

    let dataset = match session.process() {
        Ok(df) => df.clone(),
        Err(e) => {
            error!("Job '{}' failed: {}", name, e);
            return Err(e.with_context(format!("Job '{name}'")));
        }
    };

    Ok(BatchReport {
        dataset,
        summary: session.processing_summary()?,
        deletion_plan,
        recalculation_plan,
        association: association_summary,
        warnings,
    })
}
