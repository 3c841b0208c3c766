// 📎 Workbook Merger - External spreadsheets into the report
// Scans the data folder for spreadsheet files and appends every sheet
// they contain to the output workbook under a collision-free name. One
// broken candidate never stops the rest of the merge.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::workbook::Workbook;
use crate::xlsx_read;

/// Any file carrying this marker is one of our own reports and is never
/// re-imported into a later run.
pub const OUTPUT_NAME_MARKER: &str = "Technical_Audit";
const LEGACY_OUTPUT_PREFIX: &str = "Tech_Audit_";

/// Office lock files start with `~`.
const LOCK_FILE_PREFIX: char = '~';

const SPREADSHEET_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xls"];

/// Whether a directory entry is worth trying to import.
pub fn is_merge_candidate(file_name: &str) -> bool {
    let has_spreadsheet_ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_lowercase();
            SPREADSHEET_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false);

    has_spreadsheet_ext
        && !file_name.starts_with(LOCK_FILE_PREFIX)
        && !file_name.contains(OUTPUT_NAME_MARKER)
        && !file_name.starts_with(LEGACY_OUTPUT_PREFIX)
}

/// Import every candidate spreadsheet in the folder into the workbook.
/// Returns how many files imported cleanly; failed candidates are logged
/// and skipped and do not count.
pub fn merge_external_workbooks(workbook: &mut Workbook, dir: &Path) -> Result<usize> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data folder: {}", dir.display()))?;

    let mut candidates: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_merge_candidate(name))
        .collect();

    if candidates.is_empty() {
        return Ok(0);
    }
    // Deterministic import order regardless of directory enumeration
    candidates.sort();

    let mut imported = 0;
    for file_name in &candidates {
        let path = dir.join(file_name);
        match import_file(workbook, &path) {
            Ok(sheets) => {
                info!(file = %file_name, sheets, "imported spreadsheet");
                imported += 1;
            }
            Err(err) => {
                warn!(file = %file_name, error = %err, "failed to import spreadsheet, skipping");
            }
        }
    }

    Ok(imported)
}

/// Copy every sheet of one spreadsheet into the workbook. The file is
/// fully read before anything is added, so a failure leaves the output
/// untouched.
fn import_file(workbook: &mut Workbook, path: &Path) -> Result<usize> {
    let source = xlsx_read::read_workbook(path)?;

    let mut sheets = 0;
    for sheet in source.sheets() {
        let mut copy = sheet.clone();
        copy.name = workbook.unique_sheet_name(&sheet.name);
        workbook.add_sheet(copy);
        sheets += 1;
    }

    Ok(sheets)
}

// ============================================================================
// TESTS
// ============================================================================
