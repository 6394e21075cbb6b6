//! Column deletion module.
//!
//! This module provides functionality for:
//! - Building a deletion plan from requested column names
//! - Validating the plan before anything is removed
//! - Applying the plan to produce a new dataset
//! - Generating before/after previews

use crate::error::{ProcessingError, Result};
use crate::types::{ColumnInfo, ColumnPlan};
use crate::utils::{column_names, excel_column_name, has_column};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// First rows of a dataset before and after a deletion plan.
#[derive(Debug, Clone)]
pub struct Preview {
    pub before: DataFrame,
    pub after: DataFrame,
}

/// Validates and applies column removal plans.
pub struct ColumnDeletionEngine;

impl ColumnDeletionEngine {
    /// Build a deletion plan from requested column names.
    ///
    /// Names that are not columns of `df` are left out of the plan and
    /// reported in [`ColumnPlan::ignored`]. An empty plan means "delete
    /// nothing".
    pub fn set_deletion_plan<S: AsRef<str>>(df: &DataFrame, requested: &[S]) -> ColumnPlan {
        let mut plan = ColumnPlan::empty();

        for name in requested {
            let name = name.as_ref();
            if has_column(df, name) {
                if !plan.contains(name) {
                    plan.columns.push(name.to_string());
                }
            } else if !plan.ignored.iter().any(|n| n == name) {
                plan.ignored.push(name.to_string());
            }
        }

        if !plan.ignored.is_empty() {
            warn!("Ignoring columns not in dataset: {:?}", plan.ignored);
        }
        info!("Deletion plan set: {} columns", plan.len());

        plan
    }

    /// Check that a plan can be applied to `df`.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::UnknownColumn`] if the plan names columns absent from `df`
    /// - [`ProcessingError::AllColumnsRemoved`] if no column would remain
    pub fn validate(df: &DataFrame, plan: &ColumnPlan) -> Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        let unknown: Vec<String> = plan
            .columns
            .iter()
            .filter(|name| !has_column(df, name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ProcessingError::UnknownColumn(unknown));
        }

        if Self::kept_columns(df, plan).is_empty() {
            return Err(ProcessingError::AllColumnsRemoved(df.width()));
        }

        Ok(())
    }

    /// Remove the planned columns, keeping row order and the order of the
    /// remaining columns.
    ///
    /// The plan is re-validated, so an invalid plan yields an error rather
    /// than a partially transformed dataset.
    pub fn apply(df: &DataFrame, plan: &ColumnPlan) -> Result<DataFrame> {
        Self::validate(df, plan)?;

        if plan.is_empty() {
            return Ok(df.clone());
        }

        let kept = Self::kept_columns(df, plan);
        let result = df.select(kept)?;

        debug!(
            "Deleted {} columns, {} remain: {:?}",
            plan.len(),
            result.width(),
            plan.columns
        );
        Ok(result)
    }

    /// Preview the first `row_limit` rows before and after deletion.
    ///
    /// `df` is not modified. Planned names missing from `df` are ignored.
    pub fn generate_preview(df: &DataFrame, plan: &ColumnPlan, row_limit: usize) -> Result<Preview> {
        let before = df.head(Some(row_limit));
        let after = df.select(Self::kept_columns(df, plan))?.head(Some(row_limit));

        debug!(
            "Generated preview: {} columns before, {} columns after",
            before.width(),
            after.width()
        );
        Ok(Preview { before, after })
    }

    /// Describe every column of `df`, flagging those selected by `plan`.
    pub fn column_info(df: &DataFrame, plan: &ColumnPlan) -> Vec<ColumnInfo> {
        df.get_columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let null_count = column.null_count();
                let name = column.name().to_string();
                ColumnInfo {
                    index,
                    excel_column: excel_column_name(index),
                    selected_for_deletion: plan.contains(&name),
                    name,
                    dtype: format!("{:?}", column.dtype()),
                    non_null_count: column.len() - null_count,
                    null_count,
                }
            })
            .collect()
    }

    fn kept_columns(df: &DataFrame, plan: &ColumnPlan) -> Vec<String> {
        column_names(df)
            .into_iter()
            .filter(|name| !plan.contains(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_df() -> DataFrame {
        df![
            "发票代码" => ["044001", "044002", "044003"],
            "发票号码" => ["1001", "1002", "1003"],
            "购方名称" => ["甲公司", "乙公司", "丙公司"],
            "金额" => [100.0, 200.0, 300.0]
        ]
        .unwrap()
    }

    // ========================================================================
    // set_deletion_plan() tests
    // ========================================================================

    #[test]
    fn test_set_deletion_plan_filters_unknown() {
        let df = invoice_df();
        let plan = ColumnDeletionEngine::set_deletion_plan(&df, &["发票代码", "开票人", "金额"]);

        assert_eq!(plan.columns, vec!["发票代码", "金额"]);
        assert_eq!(plan.ignored, vec!["开票人"]);
    }

    #[test]
    fn test_set_deletion_plan_empty_request() {
        let df = invoice_df();
        let plan = ColumnDeletionEngine::set_deletion_plan::<&str>(&df, &[]);
        assert!(plan.is_empty());
        assert!(plan.ignored.is_empty());
    }

    // ========================================================================
    // validate() tests
    // ========================================================================

    #[test]
    fn test_validate_empty_plan() {
        let df = invoice_df();
        assert!(ColumnDeletionEngine::validate(&df, &ColumnPlan::empty()).is_ok());
    }

    #[test]
    fn test_validate_rejects_all_columns() {
        let df = invoice_df();
        let plan = ColumnPlan::from_columns(column_names(&df));
        let err = ColumnDeletionEngine::validate(&df, &plan).unwrap_err();
        assert!(matches!(err, ProcessingError::AllColumnsRemoved(4)));
    }

    #[test]
    fn test_validate_rejects_all_columns_single_column() {
        let df = df!["金额" => [1.0]].unwrap();
        let plan = ColumnPlan::from_columns(["金额"]);
        assert!(matches!(
            ColumnDeletionEngine::validate(&df, &plan),
            Err(ProcessingError::AllColumnsRemoved(1))
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_column() {
        let df = invoice_df();
        let plan = ColumnPlan::from_columns(["发票代码", "不存在"]);
        let err = ColumnDeletionEngine::validate(&df, &plan).unwrap_err();
        assert_eq!(err.affected_columns(), vec!["不存在"]);
    }

    // ========================================================================
    // apply() tests
    // ========================================================================

    #[test]
    fn test_apply_strict_subset() {
        let df = invoice_df();
        let plan = ColumnPlan::from_columns(["发票代码", "购方名称"]);
        let result = ColumnDeletionEngine::apply(&df, &plan).unwrap();

        assert_eq!(result.width(), df.width() - plan.len());
        assert_eq!(result.height(), df.height());
        assert_eq!(column_names(&result), vec!["发票号码", "金额"]);
        let amount = result.column("金额").unwrap().as_materialized_series();
        assert!(amount.equals(df.column("金额").unwrap().as_materialized_series()));
    }

    #[test]
    fn test_apply_every_single_column_plan() {
        let df = invoice_df();
        for name in column_names(&df) {
            let plan = ColumnPlan::from_columns([name.clone()]);
            let result = ColumnDeletionEngine::apply(&df, &plan).unwrap();
            assert_eq!(result.width(), df.width() - 1);
            assert_eq!(result.height(), df.height());
            assert!(!has_column(&result, &name));
        }
    }

    #[test]
    fn test_apply_empty_plan_is_identity() {
        let df = invoice_df();
        let result = ColumnDeletionEngine::apply(&df, &ColumnPlan::empty()).unwrap();
        assert!(result.equals(&df));
    }

    #[test]
    fn test_apply_invalid_plan_errors() {
        let df = invoice_df();
        let plan = ColumnPlan::from_columns(column_names(&df));
        assert!(ColumnDeletionEngine::apply(&df, &plan).is_err());
    }

    // ========================================================================
    // generate_preview() tests
    // ========================================================================

    #[test]
    fn test_generate_preview_limits_rows() {
        let df = invoice_df();
        let plan = ColumnPlan::from_columns(["发票代码"]);
        let preview = ColumnDeletionEngine::generate_preview(&df, &plan, 2).unwrap();

        assert_eq!(preview.before.height(), 2);
        assert_eq!(preview.before.width(), 4);
        assert_eq!(preview.after.height(), 2);
        assert_eq!(preview.after.width(), 3);
        assert_eq!(df.width(), 4);
    }

    #[test]
    fn test_generate_preview_short_dataset() {
        let df = invoice_df();
        let preview =
            ColumnDeletionEngine::generate_preview(&df, &ColumnPlan::empty(), 50).unwrap();
        assert_eq!(preview.before.height(), 3);
        assert!(preview.after.equals(&df));
    }

    // ========================================================================
    // column_info() tests
    // ========================================================================

    #[test]
    fn test_column_info() {
        let df = df![
            "发票号码" => [Some("1001"), None],
            "金额" => [Some(1.0), Some(2.0)]
        ]
        .unwrap();
        let plan = ColumnPlan::from_columns(["金额"]);
        let info = ColumnDeletionEngine::column_info(&df, &plan);

        assert_eq!(info.len(), 2);
        assert_eq!(info[0].excel_column, "A");
        assert_eq!(info[0].null_count, 1);
        assert_eq!(info[0].non_null_count, 1);
        assert!(!info[0].selected_for_deletion);
        assert_eq!(info[1].excel_column, "B");
        assert!(info[1].selected_for_deletion);
    }
}
