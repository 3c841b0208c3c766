// 📋 Report Template - Locate or bootstrap the audit workbook
// The real template ships next to the binary; when it cannot be found a
// minimal built-in rule table is constructed instead so a run always
// has a report to fill.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::report::AUDIT_SHEET_NAME;
use crate::workbook::{CellStyle, CellValue, Sheet, Workbook};
use crate::xlsx_read;

pub const TEMPLATE_FILE_NAME: &str = "Template __ Tech Audit.xlsx";

const AUDIT_HEADERS: [&str; 11] = [
    "Sort",
    "Checked",
    "Item ID",
    "Issue Name",
    "Column 19",
    "SF Error Name (For SF Issues)",
    "Parent Category",
    "Pass/Fail",
    "Expected Value",
    "Audit Value",
    "Priority",
];

// Starter rule rows for the built-in fallback: (item id, issue, category)
const STARTER_ITEMS: [(&str, &str, &str); 14] = [
    ("1", "Missing Page Titles", "SEO"),
    ("2", "Duplicate Page Titles", "SEO"),
    ("3", "Long Page Titles", "SEO"),
    ("4", "Short Page Titles", "SEO"),
    ("7", "Missing Meta Descriptions", "SEO"),
    ("8", "Duplicate Meta Descriptions", "SEO"),
    ("13", "Missing H1", "SEO"),
    ("14", "Duplicate H1", "SEO"),
    ("15", "Multiple H1", "SEO"),
    ("51", "Missing Canonical Tags", "Indexation"),
    ("56", "Pages with Noindex", "Indexation"),
    ("63", "4xx Errors", "Technical"),
    ("64", "5xx Errors", "Technical"),
    ("65", "404 Errors", "Technical"),
];

/// Load the report template into the model. Resolution order: an
/// explicit path, the template file next to the binary, the working
/// directory, and finally the built-in fallback table.
pub fn load_report_template(explicit: Option<&Path>) -> Result<Workbook> {
    if let Some(path) = resolve_template_path(explicit) {
        info!(path = %path.display(), "loading report template");
        return xlsx_read::read_workbook(&path);
    }

    info!("no template file found, using built-in rule table");
    Ok(builtin_template())
}

fn resolve_template_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join(TEMPLATE_FILE_NAME));
        }
    }
    candidates.push(PathBuf::from(TEMPLATE_FILE_NAME));

    for candidate in candidates {
        if candidate.exists() {
            return Some(candidate);
        }
        debug!(path = %candidate.display(), "template not found here");
    }

    None
}

/// The fallback report: a rule-table sheet with the standard headers and
/// a starter set of audit rows, plus an empty Opportunities sheet.
pub fn builtin_template() -> Workbook {
    let mut audit = Sheet::new(AUDIT_SHEET_NAME);

    for (col, header) in AUDIT_HEADERS.iter().enumerate() {
        audit.set_value(0, col as u16, CellValue::Text(header.to_string()));
        audit.set_style(0, col as u16, CellStyle::bold());
    }

    for (i, (id, issue, category)) in STARTER_ITEMS.iter().enumerate() {
        let row = (i + 1) as u32;
        audit.set_value(row, 0, CellValue::Text(format!("{}", i + 1)));
        audit.set_value(row, 1, CellValue::Text("x".to_string()));
        audit.set_value(row, 2, CellValue::Text(id.to_string()));
        audit.set_value(row, 3, CellValue::Text(issue.to_string()));
        audit.set_value(row, 6, CellValue::Text(category.to_string()));
        audit.set_value(row, 8, CellValue::Text("0".to_string()));
    }

    let mut workbook = Workbook::new();
    workbook.add_sheet(audit);
    workbook.add_sheet(Sheet::new("Opportunities"));
    workbook
}

// ============================================================================
// TESTS
// ============================================================================
