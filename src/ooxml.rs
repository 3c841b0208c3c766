// 🗜️ OOXML Structure Reader - The parts calamine does not expose
// Pulls merged ranges, column widths, row heights and the bounded cell
// style subset straight out of the xlsx zip (xl/workbook.xml,
// xl/styles.xml, worksheet XML). Values are read elsewhere; this module
// only cares about structure.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use tracing::warn;
use zip::ZipArchive;

use crate::workbook::{
    CellRange, CellStyle, Fill, FillPattern, HorizontalAlign, VerticalAlign,
};

// Column ranges in <cols> can span the whole 16384-column grid when they
// only carry style defaults; anything that wide is not a real layout.
const MAX_COL_SPAN: u32 = 1024;

// ============================================================================
// STRUCTURE MODEL
// ============================================================================

/// Per-sheet structure: everything except cell values.
#[derive(Debug, Default)]
pub struct SheetStructure {
    pub merges: Vec<CellRange>,
    pub col_widths: BTreeMap<u16, f64>,
    pub row_heights: BTreeMap<u32, f64>,
    cell_style_ids: HashMap<(u32, u16), usize>,
}

impl SheetStructure {
    pub fn style_id(&self, row: u32, col: u16) -> Option<usize> {
        self.cell_style_ids.get(&(row, col)).copied()
    }

    /// Every cell that declares a style, with its style table index.
    pub fn styled_cells(&self) -> impl Iterator<Item = ((u32, u16), usize)> + '_ {
        self.cell_style_ids.iter().map(|(&pos, &id)| (pos, id))
    }
}

/// Structure for a whole workbook: the resolved style table plus one
/// [`SheetStructure`] per sheet, keyed by sheet name.
#[derive(Debug, Default)]
pub struct WorkbookStructure {
    styles: Vec<CellStyle>,
    sheets: HashMap<String, SheetStructure>,
}

impl WorkbookStructure {
    /// No structure at all. Used when a candidate is not an OOXML zip
    /// (legacy .xls) or its structure XML cannot be parsed; values still
    /// merge, styles and dimensions degrade.
    pub fn empty() -> Self {
        WorkbookStructure::default()
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        let mut zip = ZipArchive::new(file)
            .with_context(|| format!("Not an xlsx zip: {}", path.display()))?;

        // Sheet name -> worksheet XML path, via the workbook relationships
        let workbook_xml = zip_read_to_string(&mut zip, "xl/workbook.xml")?;
        let rels_xml = zip_read_to_string(&mut zip, "xl/_rels/workbook.xml.rels")?;
        let sheet_rids = parse_workbook_sheet_rids(&workbook_xml);
        let rel_targets = parse_relationship_targets(&rels_xml);

        // Style parse failures degrade to "no styles"; structure and
        // values are still usable.
        let styles = match zip_read_to_string(&mut zip, "xl/styles.xml") {
            Ok(xml) => parse_styles(&xml),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "no readable styles.xml");
                Vec::new()
            }
        };

        let mut sheets = HashMap::new();
        for (name, rid) in sheet_rids {
            let Some(target) = rel_targets.get(&rid) else {
                continue;
            };
            let sheet_path = normalize_target(target);
            match zip_read_to_string(&mut zip, &sheet_path) {
                Ok(xml) => {
                    sheets.insert(name, parse_sheet_structure(&xml));
                }
                Err(err) => {
                    warn!(sheet = %name, error = %err, "failed to read worksheet XML");
                }
            }
        }

        Ok(WorkbookStructure { styles, sheets })
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetStructure> {
        self.sheets.get(name)
    }

    pub fn style(&self, id: usize) -> Option<CellStyle> {
        self.styles.get(id).copied()
    }

    /// Resolved style for one cell, if the sheet declares one.
    pub fn cell_style(&self, sheet: &str, row: u32, col: u16) -> Option<CellStyle> {
        let id = self.sheet(sheet)?.style_id(row, col)?;
        self.style(id)
    }
}

fn zip_read_to_string<R: Read + std::io::Seek>(
    zip: &mut ZipArchive<R>,
    name: &str,
) -> Result<String> {
    let mut entry = zip
        .by_name(name)
        .with_context(|| format!("Missing zip entry: {}", name))?;
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .with_context(|| format!("Failed to read zip entry: {}", name))?;
    Ok(content)
}

fn normalize_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

// ============================================================================
// WORKBOOK AND RELATIONSHIP XML
// ============================================================================

fn parse_workbook_sheet_rids(xml: &str) -> Vec<(String, String)> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf: Vec<u8> = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"sheet" {
                    let name = attr_value(&e, b"name");
                    let rid = attr_value(&e, b"r:id");
                    if let (Some(name), Some(rid)) = (name, rid) {
                        sheets.push((name, rid));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    sheets
}

fn parse_relationship_targets(xml: &str) -> HashMap<String, String> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf: Vec<u8> = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == b"Relationship" {
                    let id = attr_value(&e, b"Id");
                    let target = attr_value(&e, b"Target");
                    if let (Some(id), Some(target)) = (id, target) {
                        targets.insert(id, target);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    targets
}

// ============================================================================
// STYLES XML
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct FontDef {
    bold: bool,
    italic: bool,
    color: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
struct FillDef {
    pattern: Option<FillPattern>,
    start_color: Option<u32>,
    end_color: Option<u32>,
}

#[derive(PartialEq)]
enum StyleSection {
    None,
    Fonts,
    Fills,
    CellStyleXfs,
    CellXfs,
}

/// Walks xl/styles.xml. Container elements (`font`, `fill`, `xf`) arrive
/// as Start when they have children and as Empty when self-closing, so
/// the two event kinds are handled separately.
#[derive(Default)]
struct StylesParser {
    fonts: Vec<FontDef>,
    fills: Vec<FillDef>,
    styles: Vec<CellStyle>,
    font: Option<FontDef>,
    fill: Option<FillDef>,
    xf: Option<CellStyle>,
}

impl StylesParser {
    fn open(&mut self, e: &BytesStart, section: &StyleSection, self_closing: bool) {
        match e.name().as_ref() {
            b"font" if *section == StyleSection::Fonts => {
                if self_closing {
                    // <font/> with no children is the default font
                    self.fonts.push(FontDef::default());
                } else {
                    self.font = Some(FontDef::default());
                }
            }
            b"b" => {
                if let Some(f) = self.font.as_mut() {
                    f.bold = bool_attr(e, b"val").unwrap_or(true);
                }
            }
            b"i" => {
                if let Some(f) = self.font.as_mut() {
                    f.italic = bool_attr(e, b"val").unwrap_or(true);
                }
            }
            b"color" => {
                if let Some(f) = self.font.as_mut() {
                    if let Some(rgb) = rgb_attr(e) {
                        f.color = Some(rgb);
                    }
                }
            }

            b"fill" if *section == StyleSection::Fills => {
                if self_closing {
                    self.fills.push(FillDef::default());
                } else {
                    self.fill = Some(FillDef::default());
                }
            }
            b"patternFill" => {
                if let Some(f) = self.fill.as_mut() {
                    f.pattern = attr_value(e, b"patternType")
                        .as_deref()
                        .and_then(parse_pattern);
                }
            }
            b"fgColor" => {
                if let Some(f) = self.fill.as_mut() {
                    f.start_color = rgb_attr(e);
                }
            }
            b"bgColor" => {
                if let Some(f) = self.fill.as_mut() {
                    f.end_color = rgb_attr(e);
                }
            }

            b"xf" if *section == StyleSection::CellXfs => {
                let style = self.resolve_xf(e);
                if self_closing {
                    self.styles.push(style);
                } else {
                    self.xf = Some(style);
                }
            }
            b"alignment" => {
                if let Some(style) = self.xf.as_mut() {
                    style.h_align = attr_value(e, b"horizontal")
                        .as_deref()
                        .and_then(parse_h_align);
                    style.v_align = attr_value(e, b"vertical")
                        .as_deref()
                        .and_then(parse_v_align);
                    style.wrap_text = bool_attr(e, b"wrapText").unwrap_or(false);
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"font" => {
                if let Some(f) = self.font.take() {
                    self.fonts.push(f);
                }
            }
            b"fill" => {
                if let Some(f) = self.fill.take() {
                    self.fills.push(f);
                }
            }
            b"xf" => {
                if let Some(style) = self.xf.take() {
                    self.styles.push(style);
                }
            }
            _ => {}
        }
    }

    fn resolve_xf(&self, e: &BytesStart) -> CellStyle {
        let font_id: usize = attr_value(e, b"fontId")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let fill_id: usize = attr_value(e, b"fillId")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut style = CellStyle::default();
        if let Some(f) = self.fonts.get(font_id) {
            style.bold = f.bold;
            style.italic = f.italic;
            style.font_color = f.color;
        }
        if let Some(f) = self.fills.get(fill_id) {
            if let Some(pattern) = f.pattern {
                style.fill = Some(Fill {
                    pattern,
                    start_color: f.start_color,
                    end_color: f.end_color,
                });
            }
        }
        style
    }
}

/// Parse xl/styles.xml down to the resolved per-xf style subset. Only
/// the `cellXfs` table matters; `cellStyleXfs` is skipped.
fn parse_styles(xml: &str) -> Vec<CellStyle> {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf: Vec<u8> = Vec::new();

    let mut section = StyleSection::None;
    let mut parser = StylesParser::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.name().as_ref() {
                    b"fonts" => section = StyleSection::Fonts,
                    b"fills" => section = StyleSection::Fills,
                    b"cellStyleXfs" => section = StyleSection::CellStyleXfs,
                    b"cellXfs" => section = StyleSection::CellXfs,
                    _ => parser.open(&e, &section, false),
                }
            }
            Ok(Event::Empty(e)) => parser.open(&e, &section, true),
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"fonts" | b"fills" | b"cellStyleXfs" | b"cellXfs" => {
                    section = StyleSection::None
                }
                name => parser.close(name),
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    parser.styles
}

fn parse_pattern(name: &str) -> Option<FillPattern> {
    match name {
        "solid" => Some(FillPattern::Solid),
        "gray125" => Some(FillPattern::Gray125),
        "gray0625" => Some(FillPattern::Gray0625),
        "lightGray" => Some(FillPattern::LightGray),
        "mediumGray" => Some(FillPattern::MediumGray),
        "darkGray" => Some(FillPattern::DarkGray),
        _ => None,
    }
}

fn parse_h_align(name: &str) -> Option<HorizontalAlign> {
    match name {
        "left" => Some(HorizontalAlign::Left),
        "center" | "centerContinuous" => Some(HorizontalAlign::Center),
        "right" => Some(HorizontalAlign::Right),
        "justify" => Some(HorizontalAlign::Justify),
        "fill" => Some(HorizontalAlign::Fill),
        _ => None,
    }
}

fn parse_v_align(name: &str) -> Option<VerticalAlign> {
    match name {
        "top" => Some(VerticalAlign::Top),
        "center" => Some(VerticalAlign::Middle),
        "bottom" => Some(VerticalAlign::Bottom),
        _ => None,
    }
}

// ============================================================================
// WORKSHEET XML
// ============================================================================

fn parse_sheet_structure(xml: &str) -> SheetStructure {
    let mut reader = XmlReader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf: Vec<u8> = Vec::new();
    let mut structure = SheetStructure::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"col" => {
                    let min: u32 = match attr_value(&e, b"min").and_then(|v| v.parse().ok()) {
                        Some(v) => v,
                        None => 1,
                    };
                    let max: u32 = attr_value(&e, b"max")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(min);
                    let width: Option<f64> =
                        attr_value(&e, b"width").and_then(|v| v.parse().ok());

                    if let Some(width) = width {
                        if min >= 1 && max >= min && max - min < MAX_COL_SPAN {
                            for col in min..=max {
                                structure.col_widths.insert((col - 1) as u16, width);
                            }
                        }
                    }
                }
                b"row" => {
                    let r: Option<u32> = attr_value(&e, b"r").and_then(|v| v.parse().ok());
                    let height: Option<f64> =
                        attr_value(&e, b"ht").and_then(|v| v.parse().ok());
                    if let (Some(r), Some(height)) = (r, height) {
                        if r >= 1 {
                            structure.row_heights.insert(r - 1, height);
                        }
                    }
                }
                b"c" => {
                    let cell_ref = attr_value(&e, b"r");
                    let style_id: Option<usize> =
                        attr_value(&e, b"s").and_then(|v| v.parse().ok());
                    if let (Some(cell_ref), Some(style_id)) = (cell_ref, style_id) {
                        if let Some((row, col)) = parse_cell_ref(&cell_ref) {
                            structure.cell_style_ids.insert((row, col), style_id);
                        }
                    }
                }
                b"mergeCell" => {
                    if let Some(range) = attr_value(&e, b"ref").and_then(|r| parse_range_ref(&r))
                    {
                        structure.merges.push(range);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    structure
}

// ============================================================================
// CELL REFERENCES AND ATTRIBUTES
// ============================================================================

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    for attr in e.attributes().with_checks(false) {
        let Ok(attr) = attr else { continue };
        if attr.key.as_ref() == key {
            return attr.unescape_value().ok().map(|v| v.into_owned());
        }
    }
    None
}

fn bool_attr(e: &BytesStart, key: &[u8]) -> Option<bool> {
    attr_value(e, key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// `rgb="FFRRGGBB"` attribute as a 24-bit RGB value. Theme-indexed
/// colors have no rgb attribute and resolve to None.
fn rgb_attr(e: &BytesStart) -> Option<u32> {
    let rgb = attr_value(e, b"rgb")?;
    let parsed = u32::from_str_radix(&rgb, 16).ok()?;
    Some(parsed & 0x00FF_FFFF)
}

/// `"B3"` -> (2, 1), 0-indexed.
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u16)> {
    let split = cell_ref.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell_ref.split_at(split);

    let mut col: u32 = 0;
    for ch in letters.bytes() {
        let uc = ch.to_ascii_uppercase();
        if !uc.is_ascii_uppercase() {
            return None;
        }
        col = col * 26 + (uc - b'A' + 1) as u32;
    }
    if col == 0 || col > 16384 {
        return None;
    }

    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }

    Some((row - 1, (col - 1) as u16))
}

/// `"A1:B2"` -> inclusive range; a single-cell ref collapses to itself.
pub fn parse_range_ref(range_ref: &str) -> Option<CellRange> {
    let (first, last) = match range_ref.split_once(':') {
        Some((first, last)) => (first, last),
        None => (range_ref, range_ref),
    };
    let (first_row, first_col) = parse_cell_ref(first)?;
    let (last_row, last_col) = parse_cell_ref(last)?;

    Some(CellRange::new(first_row, first_col, last_row, last_col))
}

// ============================================================================
// TESTS
// ============================================================================
