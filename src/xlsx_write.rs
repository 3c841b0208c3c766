// 📤 Workbook Writer - In-memory model to xlsx
// Renders the combined report through rust_xlsxwriter: values, the
// bounded format subset, merged ranges, column widths and row heights.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{
    Color, Format, FormatAlign, FormatPattern, Workbook as XlsxWorkbook, Worksheet, XlsxError,
};

use crate::workbook::{
    CellStyle, CellValue, FillPattern, HorizontalAlign, Sheet, VerticalAlign, Workbook,
};

/// Write the workbook model out as an xlsx file.
pub fn write_workbook(workbook: &Workbook, path: &Path) -> Result<()> {
    let mut out = XlsxWorkbook::new();

    for sheet in workbook.sheets() {
        let worksheet = out.add_worksheet();
        worksheet
            .set_name(&sheet.name)
            .with_context(|| format!("Invalid sheet name '{}'", sheet.name))?;

        render_sheet(sheet, worksheet)
            .with_context(|| format!("Failed to render sheet '{}'", sheet.name))?;
    }

    out.save(path)
        .with_context(|| format!("Failed to save workbook: {}", path.display()))?;
    Ok(())
}

fn render_sheet(sheet: &Sheet, worksheet: &mut Worksheet) -> Result<(), XlsxError> {
    // Merge ranges first; the anchor cell's value is written afterwards,
    // which rust_xlsxwriter permits for the first cell of a range.
    let mut merged_interior: HashSet<(u32, u16)> = HashSet::new();
    for merge in &sheet.merges {
        if merge.cell_count() < 2 {
            continue;
        }
        let anchor_format = to_format(&sheet.style(merge.first_row, merge.first_col));
        worksheet.merge_range(
            merge.first_row,
            merge.first_col,
            merge.last_row,
            merge.last_col,
            "",
            &anchor_format,
        )?;

        for row in merge.first_row..=merge.last_row {
            for col in merge.first_col..=merge.last_col {
                if (row, col) != (merge.first_row, merge.first_col) {
                    merged_interior.insert((row, col));
                }
            }
        }
    }

    for (&(row, col), cell) in sheet.cells() {
        // Interior cells of a merged range carry no independent content
        if merged_interior.contains(&(row, col)) {
            continue;
        }

        let styled = !cell.style.is_default();
        let format = to_format(&cell.style);
        match &cell.value {
            CellValue::Text(s) => {
                if styled {
                    worksheet.write_string_with_format(row, col, s, &format)?;
                } else {
                    worksheet.write_string(row, col, s)?;
                }
            }
            CellValue::Number(n) => {
                if styled {
                    worksheet.write_number_with_format(row, col, *n, &format)?;
                } else {
                    worksheet.write_number(row, col, *n)?;
                }
            }
            CellValue::Bool(b) => {
                if styled {
                    worksheet.write_boolean_with_format(row, col, *b, &format)?;
                } else {
                    worksheet.write_boolean(row, col, *b)?;
                }
            }
            CellValue::Empty => {
                if styled {
                    worksheet.write_blank(row, col, &format)?;
                }
            }
        }
    }

    for (&col, &width) in &sheet.col_widths {
        worksheet.set_column_width(col, width)?;
    }
    for (&row, &height) in &sheet.row_heights {
        worksheet.set_row_height(row, height)?;
    }

    Ok(())
}

/// Map the bounded style subset onto a rust_xlsxwriter format.
fn to_format(style: &CellStyle) -> Format {
    let mut format = Format::new();

    if style.bold {
        format = format.set_bold();
    }
    if style.italic {
        format = format.set_italic();
    }
    if let Some(color) = style.font_color {
        format = format.set_font_color(Color::RGB(color));
    }

    if let Some(fill) = style.fill {
        format = format.set_pattern(map_pattern(fill.pattern));
        if let Some(color) = fill.start_color {
            format = format.set_foreground_color(Color::RGB(color));
        }
        if let Some(color) = fill.end_color {
            format = format.set_background_color(Color::RGB(color));
        }
    }

    if let Some(align) = style.h_align {
        format = format.set_align(match align {
            HorizontalAlign::Left => FormatAlign::Left,
            HorizontalAlign::Center => FormatAlign::Center,
            HorizontalAlign::Right => FormatAlign::Right,
            HorizontalAlign::Justify => FormatAlign::Justify,
            HorizontalAlign::Fill => FormatAlign::Fill,
        });
    }
    if let Some(align) = style.v_align {
        format = format.set_align(match align {
            VerticalAlign::Top => FormatAlign::Top,
            VerticalAlign::Middle => FormatAlign::VerticalCenter,
            VerticalAlign::Bottom => FormatAlign::Bottom,
        });
    }
    if style.wrap_text {
        format = format.set_text_wrap();
    }

    format
}

fn map_pattern(pattern: FillPattern) -> FormatPattern {
    match pattern {
        FillPattern::Solid => FormatPattern::Solid,
        FillPattern::Gray125 => FormatPattern::Gray125,
        FillPattern::Gray0625 => FormatPattern::Gray0625,
        FillPattern::LightGray => FormatPattern::LightGray,
        FillPattern::MediumGray => FormatPattern::MediumGray,
        FillPattern::DarkGray => FormatPattern::DarkGray,
    }
}

// ============================================================================
// TESTS
// ============================================================================
