//! Raw tabular sources: `.xlsx` workbooks and directories of CSV sheets
//!
//! A source exposes its sheet names and yields each sheet as rows of
//! untyped cells. Turning cells into records is the loader's job.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::LoadError;

static CELL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$?([A-Za-z]{1,3})\$?(\d+)$").expect("cell reference pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Error(String),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric value; numeric-looking text counts
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text value; whole numbers render without a fractional part
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Empty | Cell::Error(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based row number in the source
    pub number: usize,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

pub trait TabularSource {
    fn sheet_names(&self) -> &[String];

    fn read_sheet(&mut self, name: &str) -> Result<Sheet, LoadError>;
}

/// Open a workbook file or a directory of CSV sheets
pub fn open(path: &Path) -> Result<Box<dyn TabularSource>, LoadError> {
    if !path.exists() {
        return Err(LoadError::SourceNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Ok(Box::new(CsvDirectory::open(path)?));
    }

    let is_xlsx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
        .unwrap_or(false);
    if is_xlsx {
        Ok(Box::new(XlsxWorkbook::open(path)?))
    } else {
        Err(LoadError::UnsupportedSource(path.to_path_buf()))
    }
}

// ---------------------------------------------------------------------------
// xlsx
// ---------------------------------------------------------------------------

pub struct XlsxWorkbook {
    path: PathBuf,
    archive: ZipArchive<File>,
    names: Vec<String>,
    parts: HashMap<String, String>,
    shared_strings: Vec<String>,
}

impl XlsxWorkbook {
    pub fn open(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| LoadError::Archive {
            path: path.to_path_buf(),
            source,
        })?;

        let workbook_xml = read_part(&mut archive, path, "xl/workbook.xml")?.ok_or_else(|| {
            LoadError::MissingPart {
                part: "xl/workbook.xml".to_string(),
            }
        })?;
        let declared = parse_workbook(&workbook_xml).map_err(xml_error("xl/workbook.xml"))?;

        let rels = match read_part(&mut archive, path, "xl/_rels/workbook.xml.rels")? {
            Some(xml) => {
                parse_relationships(&xml).map_err(xml_error("xl/_rels/workbook.xml.rels"))?
            }
            None => HashMap::new(),
        };

        let mut names = Vec::with_capacity(declared.len());
        let mut parts = HashMap::new();
        for (i, (name, rel_id)) in declared.into_iter().enumerate() {
            let part = rel_id
                .and_then(|id| rels.get(&id))
                .map(|target| resolve_target(target))
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", i + 1));
            parts.insert(name.clone(), part);
            names.push(name);
        }

        let shared_strings = match read_part(&mut archive, path, "xl/sharedStrings.xml")? {
            Some(xml) => parse_shared_strings(&xml).map_err(xml_error("xl/sharedStrings.xml"))?,
            None => Vec::new(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            archive,
            names,
            parts,
            shared_strings,
        })
    }
}

impl TabularSource for XlsxWorkbook {
    fn sheet_names(&self) -> &[String] {
        &self.names
    }

    fn read_sheet(&mut self, name: &str) -> Result<Sheet, LoadError> {
        let part = self
            .parts
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::MissingPart {
                part: format!("worksheet '{}'", name),
            })?;
        let xml = read_part(&mut self.archive, &self.path, &part)?
            .ok_or_else(|| LoadError::MissingPart { part: part.clone() })?;
        let rows = parse_worksheet(name, &part, &xml, &self.shared_strings)?;
        Ok(Sheet {
            name: name.to_string(),
            rows,
        })
    }
}

fn read_part(
    archive: &mut ZipArchive<File>,
    path: &Path,
    part: &str,
) -> Result<Option<String>, LoadError> {
    let mut file = match archive.by_name(part) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(source) => {
            return Err(LoadError::Archive {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|source| LoadError::Io {
            path: path.join(part),
            source,
        })?;
    Ok(Some(contents))
}

fn xml_error(part: &str) -> impl FnOnce(quick_xml::Error) -> LoadError + '_ {
    move |source| LoadError::Xml {
        part: part.to_string(),
        source,
    }
}

fn attribute_value(event: &BytesStart, key: &str) -> Result<Option<String>, quick_xml::Error> {
    for attr in event.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Relationship targets are relative to `xl/` unless absolute
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}

/// Sheet names in workbook order, with their relationship ids
fn parse_workbook(xml: &str) -> Result<Vec<(String, Option<String>)>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e) if e.local_name().as_ref() == b"sheet" => {
                if let Some(name) = attribute_value(e, "name")? {
                    sheets.push((name, attribute_value(e, "id")?));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut rels = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(ref e) | Event::Empty(ref e)
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) =
                    (attribute_value(e, "Id")?, attribute_value(e, "Target")?)
                {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rels)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event()? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(ref e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(ref t) if in_text && !in_phonetic => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&t.unescape()?);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Zero-based column of an `A1` style reference
fn column_index(cell_ref: &str) -> Option<usize> {
    let caps = CELL_REF.captures(cell_ref)?;
    let col = caps[1]
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize);
    Some(col - 1)
}

#[derive(Default)]
struct PendingCell {
    column: usize,
    kind: Option<String>,
    value: Option<String>,
}

fn parse_worksheet(
    sheet: &str,
    part: &str,
    xml: &str,
    shared: &[String],
) -> Result<Vec<Row>, LoadError> {
    let mut reader = Reader::from_str(xml);
    let err = |source: quick_xml::Error| LoadError::Xml {
        part: part.to_string(),
        source,
    };

    let mut rows = Vec::new();
    let mut row: Option<Row> = None;
    let mut cell: Option<PendingCell> = None;
    let mut capture = false;

    loop {
        match reader.read_event().map_err(err)? {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"row" => {
                    let number = attribute_value(e, "r")
                        .map_err(err)?
                        .and_then(|r| r.parse().ok())
                        .unwrap_or_else(|| rows.last().map_or(1, |r: &Row| r.number + 1));
                    row = Some(Row {
                        number,
                        cells: Vec::new(),
                    });
                }
                b"c" => {
                    let next = row.as_ref().map_or(0, |r| r.cells.len());
                    let column = attribute_value(e, "r")
                        .map_err(err)?
                        .and_then(|r| column_index(&r))
                        .unwrap_or(next);
                    cell = Some(PendingCell {
                        column,
                        kind: attribute_value(e, "t").map_err(err)?,
                        value: None,
                    });
                }
                b"v" | b"t" if cell.is_some() => {
                    capture = true;
                    if let Some(c) = cell.as_mut() {
                        c.value.get_or_insert_with(String::new);
                    }
                }
                _ => {}
            },
            Event::Text(ref t) if capture => {
                let text = t.unescape().map_err(err)?;
                if let Some(value) = cell.as_mut().and_then(|c| c.value.as_mut()) {
                    value.push_str(&text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => {
                    if let (Some(pending), Some(r)) = (cell.take(), row.as_mut()) {
                        let column = pending.column;
                        let value = decode_cell(sheet, r.number, pending, shared)?;
                        if r.cells.len() <= column {
                            r.cells.resize(column + 1, Cell::Empty);
                        }
                        r.cells[column] = value;
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        rows.push(r);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}

fn decode_cell(
    sheet: &str,
    row: usize,
    pending: PendingCell,
    shared: &[String],
) -> Result<Cell, LoadError> {
    let invalid = |reason: String| LoadError::InvalidCell {
        sheet: sheet.to_string(),
        row,
        column: column_name(pending.column),
        reason,
    };

    let Some(value) = pending.value.as_deref() else {
        return Ok(Cell::Empty);
    };
    let cell = match pending.kind.as_deref() {
        Some("s") => {
            let idx: usize = value
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad shared string index '{}'", value)))?;
            let text = shared
                .get(idx)
                .ok_or_else(|| invalid(format!("shared string {} does not exist", idx)))?;
            Cell::Text(text.clone())
        }
        Some("inlineStr") | Some("str") | Some("d") => Cell::Text(value.to_string()),
        Some("b") => Cell::Bool(value.trim() == "1"),
        Some("e") => Cell::Error(value.to_string()),
        _ => {
            if value.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Number(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| invalid(format!("'{}' is not a number", value)))?,
                )
            }
        }
    };
    Ok(cell)
}

/// Spreadsheet letters for a zero-based column
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// CSV directory
// ---------------------------------------------------------------------------

/// A directory holding one `<sheet>.csv` per sheet
pub struct CsvDirectory {
    names: Vec<String>,
    files: HashMap<String, PathBuf>,
}

impl CsvDirectory {
    pub fn open(dir: &Path) -> Result<Self, LoadError> {
        let mut found: Vec<(String, PathBuf)> = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| LoadError::Io {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            let path = entry.path();
            let is_csv = path
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
            if !entry.file_type().is_file() || !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                found.push((stem.to_string(), path.to_path_buf()));
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            names: found.iter().map(|(name, _)| name.clone()).collect(),
            files: found.into_iter().collect(),
        })
    }
}

impl TabularSource for CsvDirectory {
    fn sheet_names(&self) -> &[String] {
        &self.names
    }

    fn read_sheet(&mut self, name: &str) -> Result<Sheet, LoadError> {
        let path = self.files.get(name).ok_or_else(|| LoadError::MissingPart {
            part: format!("{}.csv", name),
        })?;
        let csv_err = |source: csv::Error| LoadError::Csv {
            path: path.clone(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            rows.push(Row {
                number: i + 1,
                cells: record.iter().map(csv_cell).collect(),
            });
        }
        Ok(Sheet {
            name: name.to_string(),
            rows,
        })
    }
}

fn csv_cell(field: &str) -> Cell {
    if field.is_empty() {
        Cell::Empty
    } else if let Ok(n) = field.parse::<f64>() {
        Cell::Number(n)
    } else {
        Cell::Text(field.to_string())
    }
}
