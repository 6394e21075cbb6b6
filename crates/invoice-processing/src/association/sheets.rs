//! Ordered collection of the worksheets of one workbook.

use super::associator::{AssociationOutcome, AssociationRequest, CrossSheetAssociator};
use crate::error::{ProcessingError, Result};
use crate::utils::has_column;
use polars::prelude::*;
use tracing::{debug, info};

/// Worksheets of a workbook by name, in workbook order.
///
/// Association only ever replaces the primary sheet; every other sheet is
/// read-only.
#[derive(Debug, Clone, Default)]
pub struct CrossSheetIndex {
    sheets: Vec<(String, DataFrame)>,
}

impl CrossSheetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sheet, or replace the sheet with the same name in place.
    pub fn insert(&mut self, name: impl Into<String>, df: DataFrame) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = df,
            None => self.sheets.push((name, df)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DataFrame> {
        self.sheets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, df)| df)
    }

    /// Look up a sheet, failing with `SheetNotFound`.
    pub fn require(&self, name: &str) -> Result<&DataFrame> {
        self.get(name)
            .ok_or_else(|| ProcessingError::SheetNotFound(name.to_string()))
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Pick the sheet holding invoice basics.
    ///
    /// Hints are tried in priority order; for each, the first sheet whose
    /// name contains it wins. Without a hint match the first sheet with
    /// data is used, then simply the first sheet.
    pub fn primary_sheet<S: AsRef<str>>(&self, hints: &[S]) -> Option<&str> {
        for hint in hints {
            let hint = hint.as_ref();
            if let Some((name, _)) = self.sheets.iter().find(|(name, _)| name.contains(hint)) {
                debug!("Primary sheet '{}' matched hint '{}'", name, hint);
                return Some(name.as_str());
            }
        }

        self.sheets
            .iter()
            .find(|(_, df)| df.height() > 0 && df.width() > 0)
            .or_else(|| self.sheets.first())
            .map(|(name, _)| name.as_str())
    }

    /// First sheet other than `primary` that has `goods_column`.
    pub fn detail_sheet_for(&self, primary: &str, goods_column: &str) -> Option<&str> {
        self.sheets
            .iter()
            .find(|(name, df)| name != primary && has_column(df, goods_column))
            .map(|(name, _)| name.as_str())
    }

    /// Run association between two sheets and store the enriched primary
    /// sheet in place.
    ///
    /// On error no sheet is modified.
    pub fn enrich(
        &mut self,
        primary: &str,
        detail: &str,
        request: &AssociationRequest,
        associator: &CrossSheetAssociator,
    ) -> Result<AssociationOutcome> {
        let outcome =
            associator.associate(self.require(primary)?, self.require(detail)?, request)?;

        self.insert(primary, outcome.dataset.clone());
        info!(
            "Enriched sheet '{}' from '{}' ({} invoices matched)",
            primary, detail, outcome.matched_keys
        );
        Ok(outcome)
    }
}

impl<S: Into<String>> FromIterator<(S, DataFrame)> for CrossSheetIndex {
    fn from_iter<I: IntoIterator<Item = (S, DataFrame)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (name, df) in iter {
            index.insert(name, df);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PRIMARY_SHEET_HINTS;
    use crate::utils::column_names;

    fn workbook() -> CrossSheetIndex {
        [
            (
                "信息汇总表",
                df![
                    "发票号码" => ["A", "B"],
                    "货物或应税劳务名称" => ["纸", "笔"]
                ]
                .unwrap(),
            ),
            (
                "发票基础信息",
                df![
                    "发票号码" => ["A", "B", "C"],
                    "金额" => [1.0, 2.0, 3.0]
                ]
                .unwrap(),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut index = workbook();
        index.insert("信息汇总表", df!["x" => [1]].unwrap());
        index.insert("其他", df!["y" => [1]].unwrap());

        assert_eq!(index.sheet_names(), vec!["信息汇总表", "发票基础信息", "其他"]);
        assert_eq!(index.get("信息汇总表").unwrap().width(), 1);
        assert!(matches!(
            index.require("不存在"),
            Err(ProcessingError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_primary_sheet_by_hint() {
        let index = workbook();
        assert_eq!(
            index.primary_sheet(&DEFAULT_PRIMARY_SHEET_HINTS),
            Some("发票基础信息")
        );
    }

    #[test]
    fn test_primary_sheet_hint_priority() {
        let index: CrossSheetIndex = [
            ("基础信息备份", df!["a" => [1]].unwrap()),
            ("发票信息", df!["a" => [1]].unwrap()),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            index.primary_sheet(&DEFAULT_PRIMARY_SHEET_HINTS),
            Some("发票信息")
        );
    }

    #[test]
    fn test_primary_sheet_falls_back_to_first_with_data() {
        let index: CrossSheetIndex = [
            ("Sheet1", DataFrame::empty()),
            ("Sheet2", df!["a" => [1]].unwrap()),
        ]
        .into_iter()
        .collect();
        assert_eq!(index.primary_sheet(&["发票"]), Some("Sheet2"));

        let empty_only: CrossSheetIndex = [("Sheet1", DataFrame::empty())].into_iter().collect();
        assert_eq!(empty_only.primary_sheet(&["发票"]), Some("Sheet1"));
        assert_eq!(CrossSheetIndex::new().primary_sheet(&["发票"]), None);
    }

    #[test]
    fn test_detail_sheet_for() {
        let index = workbook();
        assert_eq!(
            index.detail_sheet_for("发票基础信息", "货物或应税劳务名称"),
            Some("信息汇总表")
        );
        assert_eq!(index.detail_sheet_for("发票基础信息", "税率"), None);
    }

    #[test]
    fn test_enrich_replaces_only_primary() {
        let mut index = workbook();
        let detail_before = index.get("信息汇总表").unwrap().clone();
        let request = AssociationRequest::new("货物或应税劳务名称", "货物或应税劳务名称");

        let outcome = index
            .enrich(
                "发票基础信息",
                "信息汇总表",
                &request,
                &CrossSheetAssociator::default(),
            )
            .unwrap();

        assert_eq!(outcome.matched_keys, 2);
        assert_eq!(
            column_names(index.get("发票基础信息").unwrap()),
            vec!["发票号码", "金额", "货物或应税劳务名称"]
        );
        assert!(index.get("信息汇总表").unwrap().equals(&detail_before));
    }

    #[test]
    fn test_enrich_failure_leaves_sheets() {
        let mut index = workbook();
        let request = AssociationRequest::new("货物或应税劳务名称", "货物或应税劳务名称");
        let result = index.enrich(
            "发票基础信息",
            "不存在",
            &request,
            &CrossSheetAssociator::default(),
        );

        assert!(matches!(result, Err(ProcessingError::SheetNotFound(_))));
        assert_eq!(index.get("发票基础信息").unwrap().width(), 2);
    }
}
