//! Shared utilities for working with invoice datasets.
//!
//! This module contains common helper functions used across multiple modules
//! to reduce code duplication and keep cell/column handling consistent.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    is_numeric_dtype(dtype) && !matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is an unsigned integer type.
#[inline]
pub fn is_unsigned_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64
    )
}

/// Check whether the named column exists and has a numeric dtype.
pub fn is_numeric_column(df: &DataFrame, name: &str) -> bool {
    df.column(name)
        .map(|col| is_numeric_dtype(col.dtype()))
        .unwrap_or(false)
}

// =============================================================================
// Column Utilities
// =============================================================================

/// Column names of a DataFrame, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}

/// Check whether a column with this exact name exists.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|col| col.as_str() == name)
}

/// A dataset with no rows or no columns.
pub fn is_empty_dataset(df: &DataFrame) -> bool {
    df.height() == 0 || df.width() == 0
}

// =============================================================================
// Cell Utilities
// =============================================================================

/// Text representation of a cell, `None` for null.
///
/// Strings are returned verbatim (no quoting); every other value uses its
/// display form.
pub fn any_value_text(value: &AnyValue<'_>) -> Option<String> {
    match value {
        AnyValue::Null => None,
        AnyValue::String(s) => Some((*s).to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string()),
    }
}

/// Text of every cell in a column, `None` for nulls.
pub fn column_texts(column: &Column) -> PolarsResult<Vec<Option<String>>> {
    let mut texts = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        texts.push(any_value_text(&column.get(idx)?));
    }
    Ok(texts)
}

/// Trimmed text of a cell; `None` for nulls and blank strings.
pub fn normalized_text(value: &AnyValue<'_>) -> Option<String> {
    any_value_text(value)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Numeric values of a series as `f64`, keeping nulls.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let float_series = series.cast(&DataType::Float64)?;
    let f64_series = float_series.f64()?;
    Ok(f64_series.into_iter().collect())
}

// =============================================================================
// Loading Utilities
// =============================================================================

/// Digit strings that must stay text: leading zeros or more digits than an
/// `f64` holds exactly.
pub fn looks_like_identifier(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text.chars().all(|c| c.is_ascii_digit())
        && (text.len() > 15 || (text.len() > 1 && text.starts_with('0')))
}

/// Cast text columns of a dataset read without type inference to Int64 or
/// Float64 where every value parses.
///
/// Columns named in `text_columns`, columns holding identifier-like values
/// and columns with no values stay text.
pub fn infer_numeric_columns<S: AsRef<str>>(
    mut df: DataFrame,
    text_columns: &[S],
) -> PolarsResult<DataFrame> {
    for name in column_names(&df) {
        if text_columns.iter().any(|c| c.as_ref() == name) {
            continue;
        }

        let series = df.column(&name)?.as_materialized_series();
        if series.dtype() != &DataType::String || series.null_count() == series.len() {
            continue;
        }
        if series.str()?.into_iter().flatten().any(looks_like_identifier) {
            continue;
        }

        let parsed = [DataType::Int64, DataType::Float64]
            .iter()
            .find_map(|dtype| series.strict_cast(dtype).ok());
        if let Some(parsed) = parsed {
            df.replace(&name, parsed)?;
        }
    }
    Ok(df)
}

// =============================================================================
// Formatting Utilities
// =============================================================================

/// Format a sum with two decimals and no thousands separators.
pub fn format_sum(value: f64) -> String {
    format!("{value:.2}")
}

/// Convert a 0-based column index into a spreadsheet column label (A, B, ..., AA).
pub fn excel_column_name(index: usize) -> String {
    let mut label = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    label.iter().rev().collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
        assert!(!is_numeric_dtype(&DataType::Null));
    }

    #[test]
    fn test_is_integer_dtype() {
        assert!(is_integer_dtype(&DataType::Int32));
        assert!(is_integer_dtype(&DataType::UInt64));
        assert!(!is_integer_dtype(&DataType::Float64));
        assert!(!is_integer_dtype(&DataType::String));
        assert!(is_unsigned_dtype(&DataType::UInt32));
        assert!(!is_unsigned_dtype(&DataType::Int64));
    }

    #[test]
    fn test_column_helpers() {
        let df = df![
            "发票号码" => ["001", "002"],
            "金额" => [10.0, 20.0]
        ]
        .unwrap();

        assert_eq!(column_names(&df), vec!["发票号码", "金额"]);
        assert!(has_column(&df, "金额"));
        assert!(!has_column(&df, "税额"));
        assert!(is_numeric_column(&df, "金额"));
        assert!(!is_numeric_column(&df, "发票号码"));
        assert!(!is_numeric_column(&df, "税额"));
        assert!(!is_empty_dataset(&df));
    }

    #[test]
    fn test_looks_like_identifier() {
        assert!(looks_like_identifier("044001900111"));
        assert!(looks_like_identifier("24442000000012345678"));
        assert!(!looks_like_identifier("12345678"));
        assert!(!looks_like_identifier("0"));
        assert!(!looks_like_identifier("0.50"));
        assert!(!looks_like_identifier("合计"));
    }

    #[test]
    fn test_infer_numeric_columns() {
        let df = df![
            "发票代码" => ["044001900111", "044001900112"],
            "数电发票号码" => ["24442000000012345678", "24442000000012345679"],
            "发票号码" => ["12345678", "12345679"],
            "金额" => ["100.00", "-20.5"],
            "数量" => ["1", "2"],
            "备注" => [None::<&str>, None],
            "开票人" => ["张三", "李四"]
        ]
        .unwrap();

        let df = infer_numeric_columns(df, &["发票号码"]).unwrap();
        let dtype = |name: &str| df.column(name).unwrap().dtype().clone();

        assert_eq!(dtype("发票代码"), DataType::String);
        assert_eq!(dtype("数电发票号码"), DataType::String);
        assert_eq!(dtype("发票号码"), DataType::String);
        assert_eq!(dtype("金额"), DataType::Float64);
        assert_eq!(dtype("数量"), DataType::Int64);
        assert_eq!(dtype("备注"), DataType::String);
        assert_eq!(dtype("开票人"), DataType::String);
        assert_eq!(
            df.column("发票代码").unwrap().get(0).unwrap(),
            AnyValue::String("044001900111")
        );
    }

    #[test]
    fn test_any_value_text() {
        assert_eq!(any_value_text(&AnyValue::Null), None);
        assert_eq!(
            any_value_text(&AnyValue::String("合计")),
            Some("合计".to_string())
        );
        assert_eq!(any_value_text(&AnyValue::Int64(42)), Some("42".to_string()));
    }

    #[test]
    fn test_normalized_text() {
        assert_eq!(
            normalized_text(&AnyValue::String("  INV-1 ")),
            Some("INV-1".to_string())
        );
        assert_eq!(normalized_text(&AnyValue::String("   ")), None);
        assert_eq!(normalized_text(&AnyValue::Null), None);
    }

    #[test]
    fn test_column_texts() {
        let df = df!["名称" => [Some("a"), None, Some("c")]].unwrap();
        let texts = column_texts(df.column("名称").unwrap()).unwrap();
        assert_eq!(texts, vec![Some("a".to_string()), None, Some("c".to_string())]);
    }

    #[test]
    fn test_numeric_values() {
        let series = Series::new("amount".into(), &[Some(1i64), None, Some(3)]);
        assert_eq!(
            numeric_values(&series).unwrap(),
            vec![Some(1.0), None, Some(3.0)]
        );
    }

    #[test]
    fn test_format_sum() {
        assert_eq!(format_sum(1234567.5), "1234567.50");
        assert_eq!(format_sum(0.0), "0.00");
    }

    #[test]
    fn test_excel_column_name() {
        assert_eq!(excel_column_name(0), "A");
        assert_eq!(excel_column_name(25), "Z");
        assert_eq!(excel_column_name(26), "AA");
        assert_eq!(excel_column_name(27), "AB");
        assert_eq!(excel_column_name(701), "ZZ");
        assert_eq!(excel_column_name(702), "AAA");
    }
}
