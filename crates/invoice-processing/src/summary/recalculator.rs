//! Summary row recomputation.

use super::aggregator::NumericAggregator;
use super::locator::SummaryRowLocator;
use crate::error::Result;
use crate::utils::{has_column, is_integer_dtype, is_numeric_column, is_unsigned_dtype};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Result of a summary row recalculation.
#[derive(Debug, Clone)]
pub struct RecalculationOutcome {
    /// The dataset with updated summary cells.
    pub dataset: DataFrame,
    /// Index of the summary row, `None` if the dataset has none.
    pub summary_row: Option<usize>,
    /// Recomputed columns with their new totals, in request order.
    pub recalculated: Vec<(String, f64)>,
    /// Requested columns that were missing, not numeric, or had no data.
    pub skipped: Vec<String>,
}

impl RecalculationOutcome {
    pub fn recalculated_columns(&self) -> Vec<String> {
        self.recalculated.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Rewrites the totals in the summary row after the data changed.
#[derive(Debug, Clone, Default)]
pub struct SummaryRecalculator {
    locator: SummaryRowLocator,
}

impl SummaryRecalculator {
    pub fn new(locator: SummaryRowLocator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &SummaryRowLocator {
        &self.locator
    }

    /// Recompute the summary-row cell of each requested column as the sum of
    /// every other row.
    ///
    /// Only the summary-row cells of recomputed columns change. Integer
    /// columns keep their dtype. Without a summary row the dataset is
    /// returned unchanged.
    pub fn recalculate<S: AsRef<str>>(
        &self,
        df: &DataFrame,
        columns: &[S],
    ) -> Result<RecalculationOutcome> {
        let Some(summary_row) = self.locator.locate(df)? else {
            warn!("No summary row found, skipping recalculation");
            return Ok(RecalculationOutcome {
                dataset: df.clone(),
                summary_row: None,
                recalculated: Vec::new(),
                skipped: Vec::new(),
            });
        };

        let data_rows = Self::data_rows(df, summary_row)?;
        let mut dataset = df.clone();
        let mut recalculated: Vec<(String, f64)> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();

        for name in columns {
            let name = name.as_ref();
            if recalculated.iter().any(|(n, _)| n == name) || skipped.iter().any(|n| n == name) {
                continue;
            }

            if !has_column(df, name) {
                warn!("Column '{}' does not exist, skipping recalculation", name);
                skipped.push(name.to_string());
                continue;
            }
            if !is_numeric_column(df, name) {
                warn!("Column '{}' is not numeric, skipping recalculation", name);
                skipped.push(name.to_string());
                continue;
            }

            match NumericAggregator::sum_column(&data_rows, name) {
                Ok(stats) => {
                    let total = Self::write_cell(&mut dataset, name, summary_row, stats.sum)?;
                    debug!("Recalculated '{}' total: {}", name, total);
                    recalculated.push((name.to_string(), total));
                }
                Err(e) => {
                    warn!("Skipping recalculation of '{}': {}", name, e);
                    skipped.push(name.to_string());
                }
            }
        }

        info!(
            "Updated summary row {}: {} columns recalculated, {} skipped",
            summary_row,
            recalculated.len(),
            skipped.len()
        );

        Ok(RecalculationOutcome {
            dataset,
            summary_row: Some(summary_row),
            recalculated,
            skipped,
        })
    }

    /// All rows except `summary_row`.
    fn data_rows(df: &DataFrame, summary_row: usize) -> Result<DataFrame> {
        let mask: BooleanChunked = (0..df.height()).map(|idx| idx != summary_row).collect();
        Ok(df.filter(&mask)?)
    }

    /// Replace the summary cell of `column`, leaving every other cell as is.
    ///
    /// Integer columns get an exact integer total computed from the data
    /// rows; the column is only widened when the total does not fit its
    /// dtype. Returns the value written.
    fn write_cell(df: &mut DataFrame, column: &str, row: usize, float_sum: f64) -> Result<f64> {
        let series = df.column(column)?.as_materialized_series().clone();
        let dtype = series.dtype().clone();

        let (updated, written) = if is_integer_dtype(&dtype) {
            match Self::integer_cell(&series, row)? {
                Some(updated) => updated,
                None => {
                    warn!("Total of '{}' overflows, storing it as a float", column);
                    Self::float_cell(&series, row, float_sum)?
                }
            }
        } else {
            Self::float_cell(&series, row, float_sum)?
        };

        // Widen instead of nulling the total when it does not fit the dtype.
        let updated = match updated.strict_cast(&dtype) {
            Ok(cast) => cast,
            Err(_) => updated,
        };
        df.replace(column, updated)?;
        Ok(written)
    }

    fn integer_cell(series: &Series, row: usize) -> Result<Option<(Series, f64)>> {
        if is_unsigned_dtype(series.dtype()) {
            let values = series.cast(&DataType::UInt64)?;
            let values = values.u64()?;
            let total = exact_total(values.into_iter().map(|v| v.map(i128::from)), row)
                .and_then(|total| u64::try_from(total).ok());
            Ok(total.map(|total| {
                let updated = with_cell(values, row, total).into_series();
                (updated, total as f64)
            }))
        } else {
            let values = series.cast(&DataType::Int64)?;
            let values = values.i64()?;
            let total = exact_total(values.into_iter().map(|v| v.map(i128::from)), row)
                .and_then(|total| i64::try_from(total).ok());
            Ok(total.map(|total| {
                let updated = with_cell(values, row, total).into_series();
                (updated, total as f64)
            }))
        }
    }

    fn float_cell(series: &Series, row: usize, sum: f64) -> Result<(Series, f64)> {
        let values = series.cast(&DataType::Float64)?;
        let updated = with_cell(values.f64()?, row, sum).into_series();
        Ok((updated, sum))
    }
}

/// Checked sum of every value except the one at `skip`.
fn exact_total(values: impl Iterator<Item = Option<i128>>, skip: usize) -> Option<i128> {
    values
        .enumerate()
        .filter(|(idx, _)| *idx != skip)
        .filter_map(|(_, value)| value)
        .try_fold(0i128, |acc, value| acc.checked_add(value))
}

/// Copy of `values` with the cell at `row` set to `value`.
fn with_cell<T: PolarsNumericType>(
    values: &ChunkedArray<T>,
    row: usize,
    value: T::Native,
) -> ChunkedArray<T> {
    let updated: ChunkedArray<T> = values
        .into_iter()
        .enumerate()
        .map(|(idx, current)| if idx == row { Some(value) } else { current })
        .collect();
    updated.with_name(values.name().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_with_total() -> DataFrame {
        df![
            "名称" => ["商品A", "商品B", "合计"],
            "金额" => [10.0, 20.0, 999.0],
            "数量" => [1i64, 2, 100],
            "单价" => [10.0, 10.0, 0.0]
        ]
        .unwrap()
    }

    #[test]
    fn test_recalculate_writes_sum_of_data_rows() {
        let df = invoice_with_total();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["金额"])
            .unwrap();

        assert_eq!(outcome.summary_row, Some(2));
        assert_eq!(outcome.recalculated, vec![("金额".to_string(), 30.0)]);

        let amount = outcome.dataset.column("金额").unwrap();
        assert_eq!(amount.get(2).unwrap(), AnyValue::Float64(30.0));
        assert_eq!(amount.get(0).unwrap(), AnyValue::Float64(10.0));
        assert_eq!(amount.get(1).unwrap(), AnyValue::Float64(20.0));
    }

    #[test]
    fn test_recalculate_leaves_other_columns() {
        let df = invoice_with_total();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["金额"])
            .unwrap();

        for name in ["名称", "数量", "单价"] {
            let after = outcome.dataset.column(name).unwrap().as_materialized_series();
            let before = df.column(name).unwrap().as_materialized_series();
            assert!(after.equals_missing(before));
        }
    }

    #[test]
    fn test_recalculate_keeps_integer_dtype() {
        let df = invoice_with_total();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["数量"])
            .unwrap();

        let quantity = outcome.dataset.column("数量").unwrap();
        assert_eq!(quantity.dtype(), &DataType::Int64);
        assert_eq!(quantity.get(2).unwrap(), AnyValue::Int64(3));
    }

    #[test]
    fn test_recalculate_large_integers_exact() {
        let big = 9_007_199_254_740_993i64; // 2^53 + 1
        let df = df![
            "名称" => ["a", "b", "合计"],
            "数量" => [big, 1, 0],
            "件数" => [u64::MAX - 1, 1, 0]
        ]
        .unwrap();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["数量", "件数"])
            .unwrap();

        let quantity = outcome.dataset.column("数量").unwrap();
        assert_eq!(quantity.get(0).unwrap(), AnyValue::Int64(big));
        assert_eq!(quantity.get(2).unwrap(), AnyValue::Int64(big + 1));

        let pieces = outcome.dataset.column("件数").unwrap();
        assert_eq!(pieces.dtype(), &DataType::UInt64);
        assert_eq!(pieces.get(0).unwrap(), AnyValue::UInt64(u64::MAX - 1));
        assert_eq!(pieces.get(2).unwrap(), AnyValue::UInt64(u64::MAX));
    }

    #[test]
    fn test_recalculate_widens_small_integer_total() {
        let df = df![
            "名称" => ["a", "b", "合计"],
            "数量" => [100i8, 100, 0]
        ]
        .unwrap();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["数量"])
            .unwrap();

        let quantity = outcome.dataset.column("数量").unwrap();
        assert_eq!(quantity.dtype(), &DataType::Int64);
        assert_eq!(quantity.get(0).unwrap(), AnyValue::Int64(100));
        assert_eq!(quantity.get(2).unwrap(), AnyValue::Int64(200));
    }

    #[test]
    fn test_recalculate_skips_bad_columns() {
        let df = invoice_with_total();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["名称", "税额", "金额"])
            .unwrap();

        assert_eq!(outcome.recalculated_columns(), vec!["金额"]);
        assert_eq!(outcome.skipped, vec!["名称", "税额"]);
    }

    #[test]
    fn test_recalculate_all_null_data_rows_skipped() {
        let df = df![
            "名称" => ["a", "合计"],
            "税额" => [None, Some(5.0)]
        ]
        .unwrap();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["税额"])
            .unwrap();
        assert!(outcome.recalculated.is_empty());
        assert_eq!(outcome.skipped, vec!["税额"]);
        assert!(outcome.dataset.equals_missing(&df));
    }

    #[test]
    fn test_recalculate_without_summary_row() {
        let df = df![
            "名称" => ["a", "b"],
            "金额" => [1.0, 2.0]
        ]
        .unwrap();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["金额"])
            .unwrap();

        assert_eq!(outcome.summary_row, None);
        assert!(outcome.recalculated.is_empty());
        assert!(outcome.dataset.equals(&df));
    }

    #[test]
    fn test_recalculate_summary_row_first() {
        let df = df![
            "名称" => ["总计", "a", "b"],
            "金额" => [Some(0.0), Some(1.25), None]
        ]
        .unwrap();
        let outcome = SummaryRecalculator::default()
            .recalculate(&df, &["金额"])
            .unwrap();

        let amount = outcome.dataset.column("金额").unwrap();
        assert_eq!(amount.get(0).unwrap(), AnyValue::Float64(1.25));
        assert_eq!(amount.get(2).unwrap(), AnyValue::Null);
    }
}
