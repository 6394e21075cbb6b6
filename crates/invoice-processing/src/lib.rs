//! Invoice Sheet Processing Library
//!
//! Column removal, summary-row recalculation and cross-sheet enrichment for
//! invoice worksheets, built with Rust and Polars.
//!
//! # Overview
//!
//! Invoice exports from tax platforms arrive as wide worksheets with many
//! columns nobody needs, a "合计" row holding column totals, and a second
//! sheet listing the goods of each invoice. This library provides:
//!
//! - **Column Deletion**: Validated removal plans that can never drop every column
//! - **Templates**: Saved deletion lists, fuzzy-matched against real headers
//! - **Summary Recalculation**: Locating the total row and recomputing its cells
//! - **Cross-Sheet Association**: Copying each invoice's first goods name from
//!   the detail sheet
//! - **Sessions**: An explicit state machine sequencing the steps above
//! - **Batch Processing**: Isolated sessions run concurrently, one per file
//!
//! Spreadsheet decoding and formatted output are left to the caller; datasets
//! are plain polars [`DataFrame`](polars::prelude::DataFrame)s.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use invoice_processing::{AssociationRequest, ProcessingConfig, ProcessingSession};
//! use polars::prelude::*;
//!
//! let invoices = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("发票基础信息.csv".into()))?
//!     .finish()?;
//! let details = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("信息汇总表.csv".into()))?
//!     .finish()?;
//!
//! let mut session = ProcessingSession::new(ProcessingConfig::default());
//! session.load(invoices)?;
//!
//! // Optional: add the goods name of each invoice
//! let request = AssociationRequest::from_config(session.config());
//! if let Err(e) = session.run_cross_sheet_association(&details, &request) {
//!     eprintln!("association skipped: {e}");
//! }
//!
//! session.set_deletion_plan(&["发票代码", "开票人"])?;
//! session.set_recalculation_plan(&["金额", "税额"])?;
//! let processed = session.process()?;
//!
//! println!("{} columns remain", processed.width());
//! ```
//!
//! # Configuration
//!
//! Use [`ProcessingConfig`] to customize keywords and column names:
//!
//! ```rust,ignore
//! use invoice_processing::ProcessingConfig;
//!
//! let config = ProcessingConfig::builder()
//!     .summary_keywords(["合计", "总计"])
//!     .join_key_candidates(["发票号码"])
//!     .new_column_name("商品名称")
//!     .build()?;
//! ```
//!
//! # Templates
//!
//! ```rust,ignore
//! use invoice_processing::{TemplateStore, DEFAULT_TEMPLATE_NAME};
//!
//! let store = TemplateStore::load_or_default("templates.json")?;
//! let template = store.require(DEFAULT_TEMPLATE_NAME)?;
//! session.apply_template(&template.columns_to_delete)?;
//! ```

pub mod association;
pub mod batch;
pub mod config;
pub mod deletion;
pub mod error;
pub mod session;
pub mod summary;
pub mod templates;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use association::{
    AssociationOutcome, AssociationRequest, CrossSheetAssociator, CrossSheetIndex, InvoiceGoodsMap,
};
pub use batch::{AssociationSummary, BatchJob, BatchOutcome, BatchReport, run_batch, run_job};
pub use config::{ConfigValidationError, ProcessingConfig, ProcessingConfigBuilder};
pub use deletion::{ColumnDeletionEngine, Preview};
pub use error::{ErrorKind, ProcessingError, Result as ProcessingResult};
pub use session::{ProcessingSession, SessionData, SessionState};
pub use summary::{NumericAggregator, RecalculationOutcome, SummaryRecalculator, SummaryRowLocator};
pub use templates::{DEFAULT_TEMPLATE_NAME, Template, TemplateMatcher, TemplateStore};
pub use types::{
    ActionKind, ColumnInfo, ColumnPlan, ColumnStats, NumericSummary, ProcessingHistory,
    ProcessingRecord, ProcessingSummary, RecalculationPlan,
};
pub use utils::{excel_column_name, format_sum, is_numeric_dtype};
