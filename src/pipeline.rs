// ⚙️ Audit Pipeline - Load, update, merge, persist
// The strictly sequential run: datasets in, report template filled,
// external workbooks appended, one combined xlsx out. On an unrecovered
// failure the partial output file is removed before the error surfaces.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};

use crate::catalog::RuleCatalog;
use crate::dataset::DatasetStore;
use crate::merge;
use crate::report::{self, UpdateSummary};
use crate::template;
use crate::xlsx_write;

// ============================================================================
// OPTIONS AND OUTCOME
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// Explicit report template; otherwise the template file is looked up
    /// next to the binary and in the working directory, with the built-in
    /// rule table as last resort.
    pub template: Option<PathBuf>,
    /// Explicit output directory; otherwise the desktop (or its fallback
    /// folder) is used.
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub output_path: PathBuf,
    pub imported_files: usize,
    pub summary: UpdateSummary,
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Run the whole audit against a folder of crawl exports and produce the
/// combined report workbook.
pub fn process_audit(
    data_folder: &Path,
    client_name: &str,
    options: &AuditOptions,
) -> Result<AuditOutcome> {
    if !data_folder.is_dir() {
        bail!("Data folder does not exist: {}", data_folder.display());
    }

    let output_dir = options
        .output_dir
        .clone()
        .unwrap_or_else(default_output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output folder: {}", output_dir.display()))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_path = output_dir.join(output_file_name(client_name, &timestamp));
    info!(output = %output_path.display(), "starting audit run");

    match run_steps(data_folder, options, &output_path) {
        Ok((summary, imported_files)) => Ok(AuditOutcome {
            output_path,
            imported_files,
            summary,
        }),
        Err(err) => {
            // Never leave a half-written report behind
            if output_path.exists() {
                if let Err(cleanup_err) = std::fs::remove_file(&output_path) {
                    warn!(
                        path = %output_path.display(),
                        error = %cleanup_err,
                        "failed to remove partial output"
                    );
                }
            }
            Err(err)
        }
    }
}

fn run_steps(
    data_folder: &Path,
    options: &AuditOptions,
    output_path: &Path,
) -> Result<(UpdateSummary, usize)> {
    let store = DatasetStore::load_from_dir(data_folder);
    info!(datasets = store.len(), "crawl exports loaded");

    let mut workbook = template::load_report_template(options.template.as_deref())?;

    let catalog = RuleCatalog::standard();
    let summary = report::update_audit_values(&mut workbook, &catalog, &store)?;
    info!(
        rows = summary.rows_updated,
        passed = summary.passed,
        failed = summary.failed,
        "audit values updated"
    );

    let imported_files = merge::merge_external_workbooks(&mut workbook, data_folder)?;
    info!(files = imported_files, "external spreadsheets merged");

    xlsx_write::write_workbook(&workbook, output_path)?;
    Ok((summary, imported_files))
}

// ============================================================================
// OUTPUT NAMING AND LOCATION
// ============================================================================

/// Client label reduced to filename-safe characters: alphanumerics,
/// spaces, hyphens and underscores, with trailing whitespace trimmed.
pub fn sanitize_client_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().to_string()
}

/// `{client}_Technical_Audit_{timestamp}.xlsx`; the timestamp keeps each
/// run's file unique and the marker keeps it out of future merges.
pub fn output_file_name(client_name: &str, timestamp: &str) -> String {
    let clean = sanitize_client_name(client_name);
    if clean.is_empty() {
        format!("{}_{}.xlsx", merge::OUTPUT_NAME_MARKER, timestamp)
    } else {
        format!("{}_{}_{}.xlsx", clean, merge::OUTPUT_NAME_MARKER, timestamp)
    }
}

/// Where reports land: the user's desktop when one exists, otherwise a
/// reports folder under the home directory.
pub fn default_output_dir() -> PathBuf {
    let home = home_dir();

    for candidate in [
        home.join("Desktop"),
        home.join("OneDrive").join("Desktop"),
    ] {
        if candidate.is_dir() {
            return candidate;
        }
    }

    home.join("Tech Audit Reports")
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

// ============================================================================
// TESTS
// ============================================================================
