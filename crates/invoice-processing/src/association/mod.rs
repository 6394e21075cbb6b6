//! Cross-sheet association.
//!
//! Invoice workbooks usually carry a basics sheet (one row per invoice) and
//! a detail sheet (one row per invoice line). Association copies the goods
//! name of each invoice's first detail line into a new column of the basics
//! sheet.
//!
//! - [`CrossSheetAssociator`] chooses the join key, builds the lookup and
//!   writes the derived column
//! - [`CrossSheetIndex`] holds the sheets of one workbook and picks the
//!   primary and detail sheets

mod associator;
mod sheets;

pub use associator::{
    AssociationOutcome, AssociationRequest, CrossSheetAssociator, InvoiceGoodsMap,
};
pub use sheets::CrossSheetIndex;
