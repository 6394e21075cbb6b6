//! Summary ("total") row detection.

use crate::config::{DEFAULT_SUMMARY_KEYWORDS, ProcessingConfig};
use crate::error::Result;
use crate::utils::column_texts;
use polars::prelude::*;
use tracing::{debug, info};

/// Finds the row holding column totals.
///
/// Rows are scanned top to bottom and cells left to right; the first row
/// where any trimmed cell text contains one of the keywords is the summary
/// row. This is a plain substring heuristic: a product description such as
/// "Total Station" also matches.
#[derive(Debug, Clone)]
pub struct SummaryRowLocator {
    keywords: Vec<String>,
}

impl Default for SummaryRowLocator {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_KEYWORDS)
    }
}

impl SummaryRowLocator {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.summary_keywords.iter().cloned())
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Index of the summary row, or `None` when no cell matches.
    pub fn locate(&self, df: &DataFrame) -> Result<Option<usize>> {
        if df.height() == 0 || df.width() == 0 {
            return Ok(None);
        }

        let columns = df
            .get_columns()
            .iter()
            .map(column_texts)
            .collect::<PolarsResult<Vec<_>>>()?;

        for row in 0..df.height() {
            let hit = columns.iter().find_map(|texts| {
                texts[row]
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| self.matches(text))
            });
            if let Some(text) = hit {
                info!("Found summary row at index {} ('{}')", row, text);
                return Ok(Some(row));
            }
        }

        debug!("No summary row found");
        Ok(None)
    }

    fn matches(&self, text: &str) -> bool {
        self.keywords
            .iter()
            .any(|keyword| text.contains(keyword.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_middle_row() {
        let df = df![
            "名称" => ["商品A", "合计", "商品B"],
            "金额" => [1.0, 2.0, 3.0]
        ]
        .unwrap();
        let locator = SummaryRowLocator::default();
        assert_eq!(locator.locate(&df).unwrap(), Some(1));
    }

    #[test]
    fn test_locate_first_match_wins() {
        let df = df![
            "名称" => ["商品A", "小计", "总计"],
            "金额" => [1.0, 2.0, 3.0]
        ]
        .unwrap();
        assert_eq!(SummaryRowLocator::default().locate(&df).unwrap(), Some(1));
    }

    #[test]
    fn test_locate_keyword_in_later_column() {
        let df = df![
            "序号" => [Some("1"), Some("2"), None],
            "备注" => ["", "", "  本页合计  "],
            "金额" => [1, 2, 3]
        ]
        .unwrap();
        assert_eq!(SummaryRowLocator::default().locate(&df).unwrap(), Some(2));
    }

    #[test]
    fn test_locate_no_summary() {
        let df = df![
            "名称" => ["商品A", "商品B"],
            "金额" => [1.0, 2.0]
        ]
        .unwrap();
        assert_eq!(SummaryRowLocator::default().locate(&df).unwrap(), None);
    }

    #[test]
    fn test_locate_nulls_never_match() {
        let df = df!["名称" => [None::<&str>, None]].unwrap();
        assert_eq!(SummaryRowLocator::default().locate(&df).unwrap(), None);
    }

    #[test]
    fn test_locate_substring_misfire_is_kept() {
        let df = df!["名称" => ["Total Station 全站仪", "合计"]].unwrap();
        assert_eq!(SummaryRowLocator::default().locate(&df).unwrap(), Some(0));
    }

    #[test]
    fn test_locate_custom_keywords() {
        let df = df!["名称" => ["商品A", "合计", "本月累计"]].unwrap();
        let locator = SummaryRowLocator::new(["累计"]);
        assert_eq!(locator.locate(&df).unwrap(), Some(2));
    }

    #[test]
    fn test_locate_empty_dataset() {
        let df = DataFrame::empty();
        assert_eq!(SummaryRowLocator::default().locate(&df).unwrap(), None);
    }
}
