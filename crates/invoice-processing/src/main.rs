//! CLI entry point for invoice sheet processing.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use invoice_processing::{
    AssociationRequest, BatchJob, BatchOutcome, ColumnInfo, NumericSummary, ProcessingConfig,
    ProcessingResult, ProcessingSession, TemplateStore, run_batch,
};
use invoice_processing::utils::infer_numeric_columns;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde_json::json;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const BOM: char = '\u{feff}';

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Invoice worksheet processing: column removal, total recalculation, goods lookup",
    long_about = "Removes unwanted columns from invoice exports, recomputes the totals row \
                  and optionally adds each invoice's goods name from a detail sheet.\n\n\
                  EXAMPLES:\n  \
                  # Delete two columns and recompute the amount total\n  \
                  invoice-processing -i 发票基础信息.csv -d 发票代码,开票人 --recalc 金额\n\n  \
                  # Apply the built-in template and add goods names\n  \
                  invoice-processing -i 发票基础信息.csv --detail 信息汇总表.csv -t 发票数据标准模板\n\n  \
                  # Process several files at once\n  \
                  invoice-processing -i jan.csv -i feb.csv -d 开票人 -o results/\n\n  \
                  # Preview without writing anything\n  \
                  invoice-processing -i 发票基础信息.csv -d 开票人 --dry-run"
)]
struct Args {
    /// CSV file(s) to process; repeat for batch mode
    #[arg(short, long, required = true)]
    input: Vec<String>,

    /// Detail sheet CSV used for cross-sheet association
    #[arg(long)]
    detail: Option<String>,

    /// Columns to delete (comma separated or repeated)
    #[arg(short, long, value_delimiter = ',')]
    delete: Vec<String>,

    /// Name of a deletion template to apply
    #[arg(short, long)]
    template: Option<String>,

    /// Template store (JSON); built-in templates are used if absent
    #[arg(long)]
    templates_file: Option<String>,

    /// Numeric columns whose total is recomputed (comma separated or repeated)
    #[arg(long, value_delimiter = ',')]
    recalc: Vec<String>,

    /// Join key column; chosen automatically if not specified
    #[arg(long)]
    join_key: Option<String>,

    /// Detail sheet column copied into the invoice sheet
    #[arg(long)]
    goods_column: Option<String>,

    /// Name of the column added by cross-sheet association
    #[arg(long)]
    new_column: Option<String>,

    /// Output directory for processed files
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Preview what would be done without writing files
    ///
    /// Shows column overview, before/after preview and numeric statistics
    #[arg(long)]
    dry_run: bool,

    /// Write a UTF-8 byte order mark so spreadsheet apps detect the encoding
    #[arg(long)]
    bom: bool,

    /// Processing configuration (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and errors)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs so stdout holds only the JSON document.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    for input in &args.input {
        if !Path::new(input).exists() {
            return Err(anyhow!("Input file not found: {}", input));
        }
    }

    let config = build_config(&args)?;
    let template_columns = resolve_template(&args)?;
    let text_columns = text_columns(&args, &config, template_columns.as_deref());

    let detail = match &args.detail {
        Some(path) => {
            info!("Loading detail sheet from: {}", path);
            Some(load_csv(path, &text_columns)?)
        }
        None => None,
    };

    let mut request = AssociationRequest::from_config(&config);
    if let Some(ref key) = args.join_key {
        request = request.with_join_key(key);
    }

    let mut jobs = Vec::with_capacity(args.input.len());
    for input in &args.input {
        info!("Loading dataset from: {}", input);
        let data = load_csv(input, &text_columns)?;
        info!("Dataset loaded: {:?}", data.shape());

        let mut job = BatchJob::new(input.clone(), data)
            .with_deletion(args.delete.iter().cloned())
            .with_recalculation(args.recalc.iter().cloned())
            .with_association(request.clone());
        if let Some(ref columns) = template_columns {
            job = job.with_template(columns.clone());
        }
        if let Some(ref detail) = detail {
            job = job.with_detail(detail.clone());
        }
        jobs.push(job);
    }

    if args.dry_run {
        return run_dry_run(&args, &config, jobs);
    }

    if !Path::new(&args.output).exists() {
        std::fs::create_dir_all(&args.output)?;
        info!("Created output directory: {}", args.output);
    }

    let outcomes = run_batch(jobs, &config);
    handle_batch_output(&args, outcomes)
}

/// Merge the config file (if any) with command line overrides.
fn build_config(args: &Args) -> Result<ProcessingConfig> {
    let base = match &args.config {
        Some(path) => ProcessingConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config file {path}"))?,
        None => ProcessingConfig::default(),
    };

    let mut builder = ProcessingConfig::builder()
        .summary_keywords(base.summary_keywords)
        .join_key_candidates(base.join_key_candidates)
        .goods_column(base.goods_column)
        .new_column_name(base.new_column_name)
        .preview_rows(base.preview_rows)
        .primary_sheet_hints(base.primary_sheet_hints);

    if let Some(ref column) = args.goods_column {
        builder = builder.goods_column(column);
    }
    if let Some(ref column) = args.new_column {
        builder = builder.new_column_name(column);
    }

    Ok(builder.build()?)
}

/// Look up the requested template's column list.
fn resolve_template(args: &Args) -> Result<Option<Vec<String>>> {
    let Some(ref name) = args.template else {
        return Ok(None);
    };

    let store = match &args.templates_file {
        Some(path) => TemplateStore::load_or_default(path)?,
        None => TemplateStore::with_defaults(),
    };
    let template = store.require(name).map_err(|e| {
        anyhow!("{} (available: {})", e, store.names().join(", "))
    })?;

    info!(
        "Using template '{}': {} columns",
        name,
        template.columns_to_delete.len()
    );
    Ok(Some(template.columns_to_delete.clone()))
}

/// Run dry-run mode - show what would happen without processing
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
fn run_dry_run(args: &Args, config: &ProcessingConfig, jobs: Vec<BatchJob>) -> Result<()> {
    let mut reports = Vec::new();

    for job in jobs {
        let mut session = ProcessingSession::new(config.clone());
        session.load(job.dataset)?;

        let association = match (&job.detail, &job.association) {
            (Some(detail), Some(request)) => {
                match session.run_cross_sheet_association(detail, request) {
                    Ok(outcome) => Some(format!(
                        "'{}' via '{}' ({} invoices matched)",
                        outcome.new_column_name, outcome.join_key, outcome.matched_keys
                    )),
                    Err(e) => {
                        warn!("Association would be skipped: {}", e);
                        Some(format!("skipped: {e}"))
                    }
                }
            }
            _ => None,
        };

        let mut requested = Vec::new();
        if let Some(ref template) = job.template {
            requested = session.apply_template(template)?.columns;
        }
        requested.extend(job.deletion);
        let plan = session.set_deletion_plan(&requested)?;
        let recalc = session.set_recalculation_plan(&job.recalculation)?;

        let columns = session.column_info()?;
        let preview = session.default_preview()?;
        let statistics = session.column_statistics().unwrap_or_default();

        if args.json {
            reports.push(json!({
                "input": job.name,
                "columns": columns,
                "deletion_plan": plan,
                "recalculation_plan": recalc,
                "association": association,
                "statistics": statistics,
                "shape_after": preview.after.width(),
            }));
            continue;
        }

        println!("\n{}", "=".repeat(80));
        println!("DRY RUN - {}", job.name);
        println!("{}\n", "=".repeat(80));

        print_column_table(&columns);

        println!("PLANNED CHANGES");
        println!("{}", "-".repeat(40));
        if plan.is_empty() {
            println!("  No columns will be deleted");
        } else {
            println!("  Delete {} columns: {}", plan.len(), plan.columns.join(", "));
        }
        if !plan.ignored.is_empty() {
            println!("  Not found (ignored): {}", plan.ignored.join(", "));
        }
        if !recalc.columns.is_empty() {
            println!("  Recalculate totals: {}", recalc.columns.join(", "));
        }
        if !recalc.skipped.is_empty() {
            println!("  Not recalculated: {}", recalc.skipped.join(", "));
        }
        if let Some(ref association) = association {
            println!("  Cross-sheet association: {}", association);
        }
        println!();

        println!("PREVIEW (first {} rows after deletion)", preview.after.height());
        println!("{}", "-".repeat(40));
        println!("{}", preview.after);
        println!();

        print_statistics(&statistics);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!("{}", "=".repeat(80));
        println!("To execute this processing, run without --dry-run");
        println!("{}", "=".repeat(80));
    }
    Ok(())
}

fn print_column_table(columns: &[ColumnInfo]) {
    println!("COLUMNS");
    println!("{}", "-".repeat(40));
    println!(
        "{:<5} {:<24} {:<10} {:<10} {:<8}",
        "Col", "Name", "Type", "Non-null", "Delete"
    );
    println!("{}", "-".repeat(62));
    for col in columns {
        println!(
            "{:<5} {:<24} {:<10} {:<10} {:<8}",
            col.excel_column,
            truncate_str(&col.name, 23),
            col.dtype,
            col.non_null_count,
            if col.selected_for_deletion { "yes" } else { "" }
        );
    }
    println!();
}

fn print_statistics(statistics: &NumericSummary) {
    println!("NUMERIC COLUMNS");
    println!("{}", "-".repeat(40));
    if statistics.is_empty() {
        println!("  No numeric columns");
    }
    for stats in &statistics.columns {
        println!(
            "  {:<24} sum={:>16} valid={}/{}",
            truncate_str(&stats.column, 23),
            stats.formatted_sum,
            stats.valid_count,
            stats.total_count
        );
    }
    println!();
}

/// Truncate a string to max characters with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

/// Write processed files and report the batch outcome.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
fn handle_batch_output(args: &Args, outcomes: Vec<BatchOutcome>) -> Result<()> {
    let total = outcomes.len();
    let mut failed = 0;
    let mut json_reports = Vec::new();

    for outcome in outcomes {
        // A failed write only fails its own file.
        let written = outcome.result.and_then(|mut report| {
            let output_path = output_path_for(&outcome.name, &args.output);
            write_csv(&mut report.dataset, &output_path, args.bom).map_err(|e| {
                e.with_context(format!("Could not write {}", output_path.display()))
            })?;
            Ok((report, output_path))
        });

        match written {
            Ok((report, output_path)) => {
                if args.json {
                    json_reports.push(json!({
                        "input": outcome.name,
                        "output_file": output_path.display().to_string(),
                        "success": true,
                        "summary": report.summary,
                        "association": report.association,
                        "warnings": report.warnings,
                    }));
                } else {
                    println!();
                    println!("{}", "=".repeat(80));
                    println!("PROCESSED: {}", outcome.name);
                    println!("{}", "=".repeat(80));
                    println!("Output: {}", output_path.display());
                    let summary = &report.summary;
                    println!(
                        "  Columns: {} -> {} ({} deleted)",
                        summary.original_column_count,
                        summary.remaining_column_count,
                        summary.deleted_column_count
                    );
                    println!("  Rows: {}", summary.row_count);
                    if !summary.deleted_columns.is_empty() {
                        println!("  Deleted: {}", summary.deleted_columns.join(", "));
                    }
                    for record in &summary.history {
                        println!(
                            "  - {} ({} -> {} columns)",
                            record.action.display_name(),
                            record.columns_before,
                            record.columns_after
                        );
                    }
                    if let Some(ref association) = report.association {
                        println!(
                            "  Added '{}' for {} invoices (key '{}')",
                            association.new_column_name,
                            association.matched_keys,
                            association.join_key
                        );
                    }
                    for warning in &report.warnings {
                        println!("  ! {}", warning);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                error!("{} failed: {}", outcome.name, e);
                if args.json {
                    json_reports.push(json!({
                        "input": outcome.name,
                        "success": false,
                        "error": e,
                    }));
                } else {
                    println!();
                    println!("FAILED: {} ({})", outcome.name, e);
                }
            }
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_reports)?);
    } else {
        println!();
        println!("{}", "=".repeat(80));
        println!("{} of {} files processed", total - failed, total);
        println!("Use --json for machine-readable output");
        println!("{}", "=".repeat(80));
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} files failed", failed, total));
    }
    Ok(())
}

/// `<output_dir>/<input stem>_processed.csv`
fn output_path_for(input: &str, output_dir: &str) -> PathBuf {
    let stem = Path::new(input)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    Path::new(output_dir).join(format!("{stem}_processed.csv"))
}

fn write_csv(df: &mut DataFrame, path: &Path, bom: bool) -> ProcessingResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .include_bom(bom)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(df)?;
    info!("Saved: {}", path.display());
    Ok(())
}

/// Columns that always load as text: join keys, goods names and template
/// columns.
fn text_columns(
    args: &Args,
    config: &ProcessingConfig,
    template: Option<&[String]>,
) -> Vec<String> {
    let mut columns = config.join_key_candidates.clone();
    columns.push(config.goods_column.clone());
    columns.push(config.new_column_name.clone());
    columns.extend(args.join_key.iter().cloned());
    columns.extend(template.unwrap_or_default().iter().cloned());
    columns
}

/// Load a CSV export, retrying with cleaned content if the first attempt fails.
///
/// Every column is read as text first so invoice codes keep their leading
/// zeros and long e-invoice numbers load at all; numeric columns are cast
/// afterwards. Exports saved for Excel often start with a UTF-8 BOM, which is
/// stripped from the first header.
fn load_csv(path: &str, text_columns: &[String]) -> Result<DataFrame> {
    let df = match CsvReadOptions::default()
        .with_infer_schema_length(Some(0))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => df,
        Err(e) => {
            debug!("Standard loading failed: {}", e);
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Could not read {path}"))?;
            CsvReadOptions::default()
                .with_infer_schema_length(Some(0))
                .with_has_header(true)
                .into_reader_with_file_handle(Cursor::new(clean_csv_content(&content)))
                .finish()
                .with_context(|| format!("Could not parse {path}"))?
        }
    };
    let df = strip_bom_header(df)?;
    Ok(infer_numeric_columns(df, text_columns)?)
}

fn strip_bom_header(mut df: DataFrame) -> Result<DataFrame> {
    let first = df
        .get_column_names()
        .first()
        .map(|name| name.to_string())
        .filter(|name| name.starts_with(BOM));
    if let Some(name) = first {
        let trimmed = name.trim_start_matches(BOM).to_string();
        df.rename(&name, trimmed.into())?;
    }
    Ok(df)
}

/// Clean CSV content
fn clean_csv_content(content: &str) -> String {
    content
        .trim_start_matches(BOM)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
