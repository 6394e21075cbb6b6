//! Summary row handling.
//!
//! Invoice exports usually end with a "合计" row holding column totals.
//! After columns are removed or data changes, those totals are recomputed
//! from the remaining rows.
//!
//! - [`SummaryRowLocator`] finds the summary row by keyword
//! - [`NumericAggregator`] computes per-column statistics
//! - [`SummaryRecalculator`] rewrites the summary-row cells

mod aggregator;
mod locator;
mod recalculator;

pub use aggregator::NumericAggregator;
pub use locator::SummaryRowLocator;
pub use recalculator::{RecalculationOutcome, SummaryRecalculator};
