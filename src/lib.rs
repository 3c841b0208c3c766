// Site Audit Report Engine - Core Library
// Turns site-crawl CSV exports into a combined audit workbook:
// rule-based metrics into the report's rule table, plus every other
// spreadsheet in the folder merged in as additional tabs.

pub mod catalog;
pub mod dataset;
pub mod merge;
pub mod metrics;
pub mod ooxml;
pub mod pipeline;
pub mod report;
pub mod template;
pub mod workbook;
pub mod xlsx_read;
pub mod xlsx_write;

// Re-export commonly used types
pub use catalog::{RuleCatalog, RuleEntry};
pub use dataset::{Dataset, DatasetStore, DATASET_FILES};
pub use merge::{is_merge_candidate, merge_external_workbooks, OUTPUT_NAME_MARKER};
pub use metrics::{evaluate, Calculation, MetricOutcome};
pub use pipeline::{
    default_output_dir, process_audit, sanitize_client_name, AuditOptions, AuditOutcome,
};
pub use report::{
    update_audit_values, UpdateSummary, Verdict, AUDIT_SHEET_NAME, PRIORITY_PASS,
    UNIMPLEMENTED_MARKER,
};
pub use template::{builtin_template, load_report_template, TEMPLATE_FILE_NAME};
pub use workbook::{Cell, CellRange, CellStyle, CellValue, Sheet, Workbook};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
