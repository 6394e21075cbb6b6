//! Invoice-to-goods lookup between the primary and detail sheets.

use crate::config::{DEFAULT_JOIN_KEY_CANDIDATES, ProcessingConfig};
use crate::error::{ProcessingError, Result};
use crate::utils::{has_column, normalized_text};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Invoice key (trimmed text) to the goods name of its first detail row.
pub type InvoiceGoodsMap = HashMap<String, String>;

/// Parameters of one association run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationRequest {
    /// Join key to use; chosen from the candidates when `None`.
    pub join_key: Option<String>,
    /// Detail sheet column whose value is copied.
    pub value_column: String,
    /// Name of the column appended to the primary sheet.
    pub new_column_name: String,
}

impl AssociationRequest {
    pub fn new(value_column: impl Into<String>, new_column_name: impl Into<String>) -> Self {
        Self {
            join_key: None,
            value_column: value_column.into(),
            new_column_name: new_column_name.into(),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.goods_column.clone(), config.new_column_name.clone())
    }

    /// Use `join_key` instead of choosing from the candidates.
    pub fn with_join_key(mut self, join_key: impl Into<String>) -> Self {
        self.join_key = Some(join_key.into());
        self
    }
}

/// Result of a successful association.
#[derive(Debug, Clone)]
pub struct AssociationOutcome {
    /// Primary dataset with the derived column appended.
    pub dataset: DataFrame,
    pub join_key: String,
    pub new_column_name: String,
    /// Number of distinct invoice keys that received a value.
    pub matched_keys: usize,
}

/// Enriches the primary sheet with a value looked up from the detail sheet.
///
/// Each invoice gets the value of the *first* detail row carrying the same
/// key. This is a one-to-first-match lookup, not a relational join: later
/// detail rows for the same invoice are ignored and the row count of the
/// primary sheet never changes.
#[derive(Debug, Clone)]
pub struct CrossSheetAssociator {
    join_key_candidates: Vec<String>,
}

impl Default for CrossSheetAssociator {
    fn default() -> Self {
        Self::new(DEFAULT_JOIN_KEY_CANDIDATES)
    }
}

impl CrossSheetAssociator {
    /// Create an associator with join key candidates, highest priority first.
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            join_key_candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(config.join_key_candidates.iter().cloned())
    }

    pub fn join_key_candidates(&self) -> &[String] {
        &self.join_key_candidates
    }

    /// First candidate present in `primary`.
    pub fn choose_join_key(&self, primary: &DataFrame) -> Result<String> {
        match self
            .join_key_candidates
            .iter()
            .find(|candidate| has_column(primary, candidate))
        {
            Some(key) => {
                info!("Using join key '{}'", key);
                Ok(key.clone())
            }
            None => Err(ProcessingError::NoJoinKeyAvailable {
                candidates: self.join_key_candidates.clone(),
            }),
        }
    }

    /// Map each distinct primary key to the value of its first detail row.
    ///
    /// Keys are compared as trimmed text. Primary keys without a detail
    /// row, and detail rows whose value is null or blank, produce no entry.
    /// A blank value in the first matching row is not replaced by a later
    /// row.
    pub fn build_lookup(
        &self,
        primary: &DataFrame,
        detail: &DataFrame,
        join_key: &str,
        value_column: &str,
    ) -> Result<InvoiceGoodsMap> {
        if !has_column(primary, join_key) {
            return Err(
                ProcessingError::ColumnNotFound(join_key.to_string()).with_context("Primary sheet"),
            );
        }
        if !has_column(detail, join_key) {
            return Err(
                ProcessingError::ColumnNotFound(join_key.to_string()).with_context("Detail sheet"),
            );
        }
        if !has_column(detail, value_column) {
            return Err(
                ProcessingError::ColumnNotFound(value_column.to_string()).with_context("Detail sheet"),
            );
        }

        let detail_keys = detail.column(join_key)?;
        let detail_values = detail.column(value_column)?;

        // First detail row per key.
        let mut first_row: HashMap<String, usize> = HashMap::new();
        for idx in 0..detail.height() {
            if let Some(key) = normalized_text(&detail_keys.get(idx)?) {
                first_row.entry(key).or_insert(idx);
            }
        }

        let primary_keys = primary.column(join_key)?;
        let mut lookup = InvoiceGoodsMap::new();
        for idx in 0..primary.height() {
            let Some(key) = normalized_text(&primary_keys.get(idx)?) else {
                continue;
            };
            if lookup.contains_key(&key) {
                continue;
            }
            let Some(&detail_idx) = first_row.get(&key) else {
                continue;
            };
            match normalized_text(&detail_values.get(detail_idx)?) {
                Some(value) => {
                    lookup.insert(key, value);
                }
                None => debug!("Invoice '{}' has a blank '{}'", key, value_column),
            }
        }

        info!(
            "Built lookup for {} invoices from '{}' (key '{}')",
            lookup.len(),
            value_column,
            join_key
        );
        Ok(lookup)
    }

    /// Append `new_column` to `primary`, filled from `lookup` by join key.
    ///
    /// Rows without a match get an empty string. An existing column named
    /// `new_column` is replaced and moved to the end.
    pub fn apply(
        &self,
        primary: &DataFrame,
        lookup: &InvoiceGoodsMap,
        join_key: &str,
        new_column: &str,
    ) -> Result<DataFrame> {
        if new_column == join_key {
            return Err(ProcessingError::InvalidConfig(format!(
                "new column '{new_column}' would overwrite the join key"
            )));
        }
        if !has_column(primary, join_key) {
            return Err(ProcessingError::ColumnNotFound(join_key.to_string()));
        }

        let keys = primary.column(join_key)?;
        let mut values: Vec<String> = Vec::with_capacity(primary.height());
        for idx in 0..primary.height() {
            let value = normalized_text(&keys.get(idx)?)
                .and_then(|key| lookup.get(&key).cloned())
                .unwrap_or_default();
            values.push(value);
        }

        let mut result = primary.clone();
        if has_column(&result, new_column) {
            warn!("Replacing existing column '{}'", new_column);
            result = result.drop(new_column)?;
        }
        result.with_column(Series::new(new_column.into(), values))?;

        debug!("Appended column '{}' ({} rows)", new_column, result.height());
        Ok(result)
    }

    /// Choose the join key, build the lookup and append the derived column.
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::NoJoinKeyAvailable`] if no candidate is in `primary`
    /// - [`ProcessingError::ColumnNotFound`] for missing key or value columns
    /// - [`ProcessingError::NoMatches`] if no invoice found a value
    pub fn associate(
        &self,
        primary: &DataFrame,
        detail: &DataFrame,
        request: &AssociationRequest,
    ) -> Result<AssociationOutcome> {
        let join_key = match &request.join_key {
            Some(key) => key.clone(),
            None => self.choose_join_key(primary)?,
        };
        if request.new_column_name == join_key {
            return Err(ProcessingError::InvalidConfig(format!(
                "new column '{}' would overwrite the join key",
                request.new_column_name
            )));
        }

        let lookup = self.build_lookup(primary, detail, &join_key, &request.value_column)?;
        if lookup.is_empty() {
            warn!("No invoice matched a detail row on '{}'", join_key);
            return Err(ProcessingError::NoMatches { join_key });
        }

        let dataset = self.apply(primary, &lookup, &join_key, &request.new_column_name)?;
        info!(
            "Cross-sheet association complete: {} invoices matched on '{}'",
            lookup.len(),
            join_key
        );

        Ok(AssociationOutcome {
            dataset,
            join_key,
            new_column_name: request.new_column_name.clone(),
            matched_keys: lookup.len(),
        })
    }
}
