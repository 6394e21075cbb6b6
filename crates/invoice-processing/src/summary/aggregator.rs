//! Per-column sum statistics.

use crate::error::{ProcessingError, Result};
use crate::types::{ColumnStats, NumericSummary};
use crate::utils::{format_sum, has_column, is_empty_dataset, is_numeric_dtype, numeric_values};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Computes sums, counts and averages over numeric columns.
pub struct NumericAggregator;

impl NumericAggregator {
    /// Statistics for a single column.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::ColumnNotFound`] if `column` is not in `df`
    /// - [`ProcessingError::NotNumeric`] if its dtype is not numeric
    /// - [`ProcessingError::NoValidData`] if it has no non-null value
    pub fn sum_column(df: &DataFrame, column: &str) -> Result<ColumnStats> {
        if !has_column(df, column) {
            return Err(ProcessingError::ColumnNotFound(column.to_string()));
        }

        let series = df.column(column)?.as_materialized_series();
        if !is_numeric_dtype(series.dtype()) {
            return Err(ProcessingError::NotNumeric(column.to_string()));
        }

        let values = numeric_values(series)?;
        let total_count = values.len();
        let valid: Vec<f64> = values.into_iter().flatten().collect();
        let valid_count = valid.len();
        if valid_count == 0 {
            return Err(ProcessingError::NoValidData(column.to_string()));
        }

        let sum: f64 = valid.iter().sum();
        let stats = ColumnStats {
            column: column.to_string(),
            sum,
            formatted_sum: format_sum(sum),
            total_count,
            valid_count,
            null_count: total_count - valid_count,
            average: sum / valid_count as f64,
        };

        debug!(
            "Column '{}': sum={}, valid={}/{}",
            column, stats.formatted_sum, valid_count, total_count
        );
        Ok(stats)
    }

    /// Statistics for every numeric column, in column order.
    ///
    /// Columns that cannot be summed (for instance all null) are skipped
    /// with a warning.
    pub fn sum_all(df: &DataFrame) -> Result<NumericSummary> {
        if is_empty_dataset(df) {
            return Err(ProcessingError::EmptyDataset);
        }

        let numeric = Self::numeric_columns(df);
        let mut columns = Vec::with_capacity(numeric.len());
        for name in &numeric {
            match Self::sum_column(df, name) {
                Ok(stats) => columns.push(stats),
                Err(e) => warn!("Skipping statistics for '{}': {}", name, e),
            }
        }

        info!(
            "Numeric statistics: {} numeric columns, {} processed",
            numeric.len(),
            columns.len()
        );
        Ok(NumericSummary {
            total_numeric_columns: numeric.len(),
            processed_columns: columns.len(),
            columns,
        })
    }

    /// Names of the numeric columns of `df`, in order.
    pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| is_numeric_dtype(col.dtype()))
            .map(|col| col.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_column_with_null() {
        let df = df!["金额" => [Some(1i64), None, Some(3)]].unwrap();
        let stats = NumericAggregator::sum_column(&df, "金额").unwrap();

        assert_eq!(stats.sum, 4.0);
        assert_eq!(stats.formatted_sum, "4.00");
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.valid_count, 2);
        assert_eq!(stats.null_count, 1);
        assert_eq!(stats.average, 2.0);
    }

    #[test]
    fn test_sum_column_all_null() {
        let df = df!["金额" => [None::<f64>, None]].unwrap();
        assert!(matches!(
            NumericAggregator::sum_column(&df, "金额"),
            Err(ProcessingError::NoValidData(_))
        ));
    }

    #[test]
    fn test_sum_column_zero_rows() {
        let df = df!["金额" => Vec::<f64>::new()].unwrap();
        assert!(matches!(
            NumericAggregator::sum_column(&df, "金额"),
            Err(ProcessingError::NoValidData(_))
        ));
    }

    #[test]
    fn test_sum_column_errors() {
        let df = df![
            "名称" => ["a", "b"],
            "金额" => [1.0, 2.0]
        ]
        .unwrap();
        assert!(matches!(
            NumericAggregator::sum_column(&df, "税额"),
            Err(ProcessingError::ColumnNotFound(_))
        ));
        assert!(matches!(
            NumericAggregator::sum_column(&df, "名称"),
            Err(ProcessingError::NotNumeric(_))
        ));
    }

    #[test]
    fn test_sum_all_skips_failing_columns() {
        let df = df![
            "名称" => ["a", "b"],
            "金额" => [1.5, 2.5],
            "数量" => [3i64, 4],
            "空列" => [None::<f64>, None]
        ]
        .unwrap();
        let summary = NumericAggregator::sum_all(&df).unwrap();

        assert_eq!(summary.total_numeric_columns, 3);
        assert_eq!(summary.processed_columns, 2);
        assert_eq!(summary.get("金额").unwrap().sum, 4.0);
        assert_eq!(summary.get("数量").unwrap().sum, 7.0);
        assert!(summary.get("空列").is_none());
        assert_eq!(summary.columns[0].column, "金额");
    }

    #[test]
    fn test_sum_all_no_numeric_columns() {
        let df = df!["名称" => ["a", "b"]].unwrap();
        let summary = NumericAggregator::sum_all(&df).unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.total_numeric_columns, 0);
    }

    #[test]
    fn test_sum_all_empty_dataset() {
        let df = df!["金额" => Vec::<f64>::new()].unwrap();
        assert!(matches!(
            NumericAggregator::sum_all(&df),
            Err(ProcessingError::EmptyDataset)
        ));
        assert!(matches!(
            NumericAggregator::sum_all(&DataFrame::empty()),
            Err(ProcessingError::EmptyDataset)
        ));
    }

    #[test]
    fn test_numeric_columns() {
        let df = df![
            "名称" => ["a"],
            "金额" => [1.0],
            "数量" => [1i32]
        ]
        .unwrap();
        assert_eq!(NumericAggregator::numeric_columns(&df), vec!["金额", "数量"]);
    }
}
