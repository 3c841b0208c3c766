// ✅ Report Updater - Audit values and verdicts into the rule table
// Walks the report's rule-table sheet row by row, computes each known
// item's metric and derives Pass / Fail / Opportunity from the row's
// expected-value policy. Touches nothing but the three cells it owns
// per row: audit value, verdict, priority.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::RuleCatalog;
use crate::dataset::DatasetStore;
use crate::metrics::{self, MetricOutcome};
use crate::workbook::{CellValue, Sheet, Workbook};

/// The rule-table sheet every report template must carry.
pub const AUDIT_SHEET_NAME: &str = "Full Audit";

/// Priority written when a rule passes. A failing rule keeps whatever
/// priority the template author triaged; only a pass overwrites it.
pub const PRIORITY_PASS: &str = "N/A - Pass";

/// Written into the audit-value cell of a rule that has no calculation,
/// so the gap is visible in the report instead of reading as "0 issues".
pub const UNIMPLEMENTED_MARKER: &str = "Not Implemented";

// Rule-table layout, fixed by template convention (0-indexed)
const COL_ITEM_ID: u16 = 2;
const COL_VERDICT: u16 = 7;
const COL_EXPECTED_VALUE: u16 = 8;
const COL_AUDIT_VALUE: u16 = 9;
const COL_PRIORITY: u16 = 10;

// ============================================================================
// EXPECTED VALUES AND VERDICTS
// ============================================================================

/// The expected-value cell's three recognized forms, checked in order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ExpectedValue {
    /// Literal "0": the rule passes only on a clean zero.
    Zero,
    /// A numeric ceiling: up to this many findings still pass.
    Ceiling(u64),
    /// Contains "manual" (any case): a human decides, the engine only
    /// records the value.
    Manual,
    /// Anything else, including blank: the verdict is left alone.
    Unset,
}

impl ExpectedValue {
    fn parse(text: &str) -> Self {
        let text = text.trim();
        if text == "0" {
            return ExpectedValue::Zero;
        }
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(ceiling) = text.parse() {
                return ExpectedValue::Ceiling(ceiling);
            }
        }
        if text.to_lowercase().contains("manual") {
            return ExpectedValue::Manual;
        }
        ExpectedValue::Unset
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
    Opportunity,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
            Verdict::Opportunity => "Opportunity",
        }
    }
}

/// What one update run did, for the progress report and for tests.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UpdateSummary {
    pub rows_updated: usize,
    pub passed: usize,
    pub failed: usize,
    pub opportunities: usize,
    pub unimplemented: usize,
}

// ============================================================================
// UPDATE PASS
// ============================================================================

/// Fill the rule table's audit values and verdicts. The rule-table sheet
/// missing from the template is the one fatal precondition here.
pub fn update_audit_values(
    workbook: &mut Workbook,
    catalog: &RuleCatalog,
    store: &DatasetStore,
) -> Result<UpdateSummary> {
    let Some(sheet) = workbook.sheet_mut(AUDIT_SHEET_NAME) else {
        bail!("'{}' sheet not found in report template", AUDIT_SHEET_NAME);
    };

    let mut summary = UpdateSummary::default();
    let Some(max_row) = sheet.max_row() else {
        return Ok(summary);
    };

    // Row 0 is the header
    for row in 1..=max_row {
        let item_id = sheet.value(row, COL_ITEM_ID).display();
        let item_id = item_id.trim();
        if item_id.is_empty() {
            continue;
        }

        // Unknown identifiers are not auditable; the row stays as authored
        let Some(entry) = catalog.lookup(item_id) else {
            continue;
        };

        let outcome = metrics::evaluate(store, entry.dataset, entry.calculation);
        let Some(value) = outcome.reported_value() else {
            warn!(item_id, "rule has no calculation, flagging in report");
            sheet.set_value(
                row,
                COL_AUDIT_VALUE,
                CellValue::Text(UNIMPLEMENTED_MARKER.to_string()),
            );
            summary.rows_updated += 1;
            summary.unimplemented += 1;
            continue;
        };

        if let MetricOutcome::MissingDataset | MetricOutcome::MissingColumn(_) = outcome {
            debug!(item_id, ?outcome, "metric degraded to zero");
        }

        sheet.set_value(row, COL_AUDIT_VALUE, CellValue::Number(value as f64));
        summary.rows_updated += 1;

        let expected = sheet.value(row, COL_EXPECTED_VALUE).display();
        match ExpectedValue::parse(&expected) {
            ExpectedValue::Zero => {
                if value == 0 {
                    record_pass(sheet, row, &mut summary);
                } else {
                    record_fail(sheet, row, &mut summary);
                }
            }
            ExpectedValue::Ceiling(ceiling) => {
                if value <= ceiling {
                    record_pass(sheet, row, &mut summary);
                } else {
                    record_fail(sheet, row, &mut summary);
                }
            }
            ExpectedValue::Manual => {
                // Value stays recorded for the reviewer; priority untouched
                sheet.set_value(
                    row,
                    COL_VERDICT,
                    CellValue::Text(Verdict::Opportunity.as_str().to_string()),
                );
                summary.opportunities += 1;
            }
            ExpectedValue::Unset => {}
        }
    }

    Ok(summary)
}

fn record_pass(sheet: &mut Sheet, row: u32, summary: &mut UpdateSummary) {
    sheet.set_value(
        row,
        COL_VERDICT,
        CellValue::Text(Verdict::Pass.as_str().to_string()),
    );
    sheet.set_value(
        row,
        COL_PRIORITY,
        CellValue::Text(PRIORITY_PASS.to_string()),
    );
    summary.passed += 1;
}

fn record_fail(sheet: &mut Sheet, row: u32, summary: &mut UpdateSummary) {
    // Fail keeps the author's priority triage in place
    sheet.set_value(
        row,
        COL_VERDICT,
        CellValue::Text(Verdict::Fail.as_str().to_string()),
    );
    summary.failed += 1;
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;

    /// Rule table with one data row per (item id, expected value, priority).
    fn report_with_rows(rows: &[(&str, &str, &str)]) -> Workbook {
        let mut sheet = Sheet::new(AUDIT_SHEET_NAME);
        sheet.set_value(0, COL_ITEM_ID, CellValue::Text("Item ID".to_string()));

        for (i, (id, expected, priority)) in rows.iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.set_value(row, COL_ITEM_ID, CellValue::Text(id.to_string()));
            sheet.set_value(row, 3, CellValue::Text("Issue name".to_string()));
            if !expected.is_empty() {
                sheet.set_value(row, COL_EXPECTED_VALUE, CellValue::Text(expected.to_string()));
            }
            if !priority.is_empty() {
                sheet.set_value(row, COL_PRIORITY, CellValue::Text(priority.to_string()));
            }
        }

        let mut wb = Workbook::new();
        wb.add_sheet(sheet);
        wb
    }

    fn store_with_titles(titles: &[&str]) -> DatasetStore {
        let mut store = DatasetStore::new();
        store.insert(Dataset::new(
            "internal_all.csv",
            vec!["Address".to_string(), "Title 1".to_string()],
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| vec![format!("https://a.com/{}", i), t.to_string()])
                .collect(),
        ));
        store
    }

    #[test]
    fn test_pass_forces_priority() {
        // Item 1 = missing page titles; none missing, expected 0
        let mut wb = report_with_rows(&[("1", "0", "High")]);
        let store = store_with_titles(&["Home", "About"]);

        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();
        assert_eq!(summary.passed, 1);

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(sheet.value(1, COL_VERDICT).display(), "Pass");
        assert_eq!(sheet.value(1, COL_AUDIT_VALUE), &CellValue::Number(0.0));
        assert_eq!(sheet.value(1, COL_PRIORITY).display(), PRIORITY_PASS);
    }

    #[test]
    fn test_fail_keeps_existing_priority() {
        let mut wb = report_with_rows(&[("1", "0", "High")]);
        let store = store_with_titles(&["Home", ""]);

        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();
        assert_eq!(summary.failed, 1);

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(sheet.value(1, COL_VERDICT).display(), "Fail");
        assert_eq!(sheet.value(1, COL_AUDIT_VALUE), &CellValue::Number(1.0));
        assert_eq!(sheet.value(1, COL_PRIORITY).display(), "High");
    }

    #[test]
    fn test_numeric_ceiling() {
        let mut wb = report_with_rows(&[("1", "5", ""), ("2", "1", "")]);
        // 3 missing titles; "Dup" appears twice
        let store = store_with_titles(&["", "", "", "Dup", "Dup"]);

        update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        // 3 <= 5 passes; 2 duplicates > ceiling 1 fails
        assert_eq!(sheet.value(1, COL_VERDICT).display(), "Pass");
        assert_eq!(sheet.value(2, COL_VERDICT).display(), "Fail");
        assert_eq!(sheet.value(2, COL_AUDIT_VALUE), &CellValue::Number(2.0));
    }

    #[test]
    fn test_manual_review_is_opportunity_regardless_of_value() {
        let mut wb = report_with_rows(&[("1", "Manual Review", "Medium")]);
        let store = store_with_titles(&["", "", ""]);

        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();
        assert_eq!(summary.opportunities, 1);

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(sheet.value(1, COL_VERDICT).display(), "Opportunity");
        // Value recorded for the reviewer, priority untouched
        assert_eq!(sheet.value(1, COL_AUDIT_VALUE), &CellValue::Number(3.0));
        assert_eq!(sheet.value(1, COL_PRIORITY).display(), "Medium");
    }

    #[test]
    fn test_blank_expected_value_leaves_verdict_alone() {
        let mut wb = report_with_rows(&[("1", "", "")]);
        let store = store_with_titles(&["Home"]);

        update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(sheet.value(1, COL_VERDICT), &CellValue::Empty);
        // The computed value is still written
        assert_eq!(sheet.value(1, COL_AUDIT_VALUE), &CellValue::Number(0.0));
    }

    #[test]
    fn test_unknown_and_blank_ids_left_untouched() {
        let mut wb = report_with_rows(&[("999", "0", "Low"), ("", "0", "")]);
        let store = store_with_titles(&["Home"]);

        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();
        assert_eq!(summary.rows_updated, 0);

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(sheet.value(1, COL_VERDICT), &CellValue::Empty);
        assert_eq!(sheet.value(1, COL_AUDIT_VALUE), &CellValue::Empty);
    }

    #[test]
    fn test_unimplemented_rule_is_flagged() {
        // Item 106 = urls not in sitemap, declared without a calculation
        let mut wb = report_with_rows(&[("106", "0", "High")]);
        let store = store_with_titles(&["Home"]);

        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();
        assert_eq!(summary.unimplemented, 1);

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(
            sheet.value(1, COL_AUDIT_VALUE).display(),
            UNIMPLEMENTED_MARKER
        );
        // No verdict is invented and the triage stays
        assert_eq!(sheet.value(1, COL_VERDICT), &CellValue::Empty);
        assert_eq!(sheet.value(1, COL_PRIORITY).display(), "High");
    }

    #[test]
    fn test_missing_dataset_is_a_zero_not_an_error() {
        let mut wb = report_with_rows(&[("70", "0", "")]);
        let store = DatasetStore::new();

        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();
        assert_eq!(summary.passed, 1);

        let sheet = wb.sheet(AUDIT_SHEET_NAME).unwrap();
        assert_eq!(sheet.value(1, COL_AUDIT_VALUE), &CellValue::Number(0.0));
    }

    #[test]
    fn test_missing_audit_sheet_is_fatal() {
        let mut wb = Workbook::new();
        wb.add_sheet(Sheet::new("Some Other Sheet"));
        let store = DatasetStore::new();

        let result = update_audit_values(&mut wb, &RuleCatalog::standard(), &store);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(AUDIT_SHEET_NAME));
    }

    #[test]
    fn test_numeric_item_ids_from_spreadsheet_cells_resolve() {
        // A template whose ID cells are numbers rather than text
        let mut sheet = Sheet::new(AUDIT_SHEET_NAME);
        sheet.set_value(0, COL_ITEM_ID, CellValue::Text("Item ID".to_string()));
        sheet.set_value(1, COL_ITEM_ID, CellValue::Number(1.0));
        sheet.set_value(1, COL_EXPECTED_VALUE, CellValue::Number(0.0));
        let mut wb = Workbook::new();
        wb.add_sheet(sheet);

        let store = store_with_titles(&["Home"]);
        let summary =
            update_audit_values(&mut wb, &RuleCatalog::standard(), &store).unwrap();

        assert_eq!(summary.rows_updated, 1);
        assert_eq!(summary.passed, 1);
    }
}
