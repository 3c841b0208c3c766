// 📥 Workbook Reader - xlsx/xls into the in-memory model
// Cell values come from calamine (last-evaluated results, never formula
// text); merged ranges, dimensions and the style subset come from the
// OOXML structure pass. A candidate that is not an OOXML zip still
// imports its values, with structure degraded to nothing.

use std::path::Path;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use tracing::warn;

use crate::ooxml::WorkbookStructure;
use crate::workbook::{CellValue, Sheet, Workbook};

/// Read a whole spreadsheet file into the model.
pub fn read_workbook(path: &Path) -> Result<Workbook> {
    let mut source = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet: {}", path.display()))?;

    let sheet_names: Vec<String> = source.sheet_names().to_vec();

    // Structure is best-effort: legacy .xls has none to offer.
    let structure = match WorkbookStructure::read(path) {
        Ok(structure) => structure,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "no OOXML structure, importing values only");
            WorkbookStructure::empty()
        }
    };

    let mut workbook = Workbook::new();
    for sheet_name in &sheet_names {
        let range = source
            .worksheet_range(sheet_name)
            .with_context(|| format!("Failed to read sheet '{}'", sheet_name))?;

        let mut sheet = Sheet::new(sheet_name);

        // The range is anchored at the first used cell, not at A1
        let (start_row, start_col) = range.start().unwrap_or((0, 0));
        for (row_idx, row) in range.rows().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let value = convert_value(cell);
                if value == CellValue::Empty {
                    continue;
                }
                let row = start_row + row_idx as u32;
                let col = start_col as u16 + col_idx as u16;
                sheet.set_value(row, col, value);
            }
        }

        if let Some(st) = structure.sheet(sheet_name) {
            sheet.merges = st.merges.clone();
            sheet.col_widths = st.col_widths.clone();
            sheet.row_heights = st.row_heights.clone();

            for ((row, col), style_id) in st.styled_cells() {
                match structure.style(style_id) {
                    Some(style) if !style.is_default() => sheet.set_style(row, col, style),
                    Some(_) => {}
                    None => {
                        // A dangling style index loses that cell's style,
                        // never its value
                        warn!(
                            sheet = %sheet_name,
                            row,
                            col,
                            style_id,
                            "unresolvable cell style, keeping default"
                        );
                    }
                }
            }
        }

        workbook.add_sheet(sheet);
    }

    Ok(workbook)
}

fn convert_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => {
            if s.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(s.clone())
            }
        }
        Data::Float(v) => CellValue::Number(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

// ============================================================================
// TESTS
// ============================================================================
