//! Configuration types for invoice sheet processing.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic session setup.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Keywords that mark a row as the summary ("total") row.
pub const DEFAULT_SUMMARY_KEYWORDS: [&str; 5] = ["合计", "总计", "小计", "Total", "Sum"];

/// Join key candidates, in priority order.
pub const DEFAULT_JOIN_KEY_CANDIDATES: [&str; 2] = ["数电发票号码", "发票号码"];

/// Goods name column in the detail sheet.
pub const DEFAULT_GOODS_COLUMN: &str = "货物或应税劳务名称";

/// Substrings identifying the primary (invoice basics) sheet, in priority order.
pub const DEFAULT_PRIMARY_SHEET_HINTS: [&str; 3] = ["发票基础信息", "发票信息", "基础信息"];

/// Configuration for a processing session.
///
/// Use [`ProcessingConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use invoice_processing::config::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .join_key_candidates(["发票号码"])
///     .preview_rows(20)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Keywords searched (as substrings) to find the summary row.
    /// Default: 合计, 总计, 小计, Total, Sum
    pub summary_keywords: Vec<String>,

    /// Column names tried, in order, as the cross-sheet join key.
    /// Default: 数电发票号码, 发票号码
    pub join_key_candidates: Vec<String>,

    /// Column in the detail sheet whose value is copied over.
    /// Default: 货物或应税劳务名称
    pub goods_column: String,

    /// Name of the column appended to the primary sheet.
    /// Default: 货物或应税劳务名称
    pub new_column_name: String,

    /// Number of rows shown in before/after previews.
    /// Default: 10
    pub preview_rows: usize,

    /// Sheet name fragments used to pick the primary sheet.
    /// Default: 发票基础信息, 发票信息, 基础信息
    pub primary_sheet_hints: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            summary_keywords: to_strings(DEFAULT_SUMMARY_KEYWORDS),
            join_key_candidates: to_strings(DEFAULT_JOIN_KEY_CANDIDATES),
            goods_column: DEFAULT_GOODS_COLUMN.to_string(),
            new_column_name: DEFAULT_GOODS_COLUMN.to_string(),
            preview_rows: 10,
            primary_sheet_hints: to_strings(DEFAULT_PRIMARY_SHEET_HINTS),
        }
    }
}

fn to_strings<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values.into_iter().map(Into::into).collect()
}

impl ProcessingConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder::default()
    }

    /// Read a configuration from a JSON file and validate it.
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::ProcessingError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.summary_keywords.is_empty() {
            return Err(ConfigValidationError::EmptyList("summary_keywords".to_string()));
        }
        if self.summary_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigValidationError::BlankEntry("summary_keywords".to_string()));
        }

        if self.join_key_candidates.is_empty() {
            return Err(ConfigValidationError::EmptyList(
                "join_key_candidates".to_string(),
            ));
        }
        if self.join_key_candidates.iter().any(|k| k.trim().is_empty()) {
            return Err(ConfigValidationError::BlankEntry(
                "join_key_candidates".to_string(),
            ));
        }

        if self.goods_column.trim().is_empty() {
            return Err(ConfigValidationError::BlankEntry("goods_column".to_string()));
        }
        if self.new_column_name.trim().is_empty() {
            return Err(ConfigValidationError::BlankEntry(
                "new_column_name".to_string(),
            ));
        }

        if self.preview_rows == 0 {
            return Err(ConfigValidationError::InvalidPreviewRows(self.preview_rows));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("'{0}' must contain at least one entry")]
    EmptyList(String),

    #[error("'{0}' must not contain blank values")]
    BlankEntry(String),

    #[error("Invalid preview rows: {0} (must be at least 1)")]
    InvalidPreviewRows(usize),
}

/// Builder for [`ProcessingConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ProcessingConfigBuilder {
    summary_keywords: Option<Vec<String>>,
    join_key_candidates: Option<Vec<String>>,
    goods_column: Option<String>,
    new_column_name: Option<String>,
    preview_rows: Option<usize>,
    primary_sheet_hints: Option<Vec<String>>,
}

impl ProcessingConfigBuilder {
    /// Set the keywords that identify the summary row.
    pub fn summary_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summary_keywords = Some(to_strings(keywords));
        self
    }

    /// Set the join key candidates, highest priority first.
    pub fn join_key_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.join_key_candidates = Some(to_strings(candidates));
        self
    }

    /// Set the detail sheet column copied into the primary sheet.
    pub fn goods_column(mut self, column: impl Into<String>) -> Self {
        self.goods_column = Some(column.into());
        self
    }

    /// Set the name of the column appended by cross-sheet association.
    pub fn new_column_name(mut self, column: impl Into<String>) -> Self {
        self.new_column_name = Some(column.into());
        self
    }

    /// Set the number of preview rows.
    pub fn preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = Some(rows);
        self
    }

    /// Set the primary sheet name hints, highest priority first.
    pub fn primary_sheet_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_sheet_hints = Some(to_strings(hints));
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ProcessingConfig` or an error if validation fails.
    pub fn build(self) -> Result<ProcessingConfig, ConfigValidationError> {
        let defaults = ProcessingConfig::default();
        let config = ProcessingConfig {
            summary_keywords: self.summary_keywords.unwrap_or(defaults.summary_keywords),
            join_key_candidates: self
                .join_key_candidates
                .unwrap_or(defaults.join_key_candidates),
            goods_column: self.goods_column.unwrap_or(defaults.goods_column),
            new_column_name: self.new_column_name.unwrap_or(defaults.new_column_name),
            preview_rows: self.preview_rows.unwrap_or(defaults.preview_rows),
            primary_sheet_hints: self
                .primary_sheet_hints
                .unwrap_or(defaults.primary_sheet_hints),
        };

        config.validate()?;
        Ok(config)
    }
}
