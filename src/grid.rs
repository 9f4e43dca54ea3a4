//! Raw cell grids read from uploaded spreadsheets and the header-sliced
//! [`UploadedTable`] built from them.

use std::{
    collections::{HashMap, HashSet},
    io::Cursor,
};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::{Cell, excel_serial_to_datetime, parse_naive_datetime},
    error::{IngestError, IngestResult},
    io_utils,
    source::SourceFile,
};

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Delimited,
}

impl SourceFormat {
    pub fn detect(file_name: &str) -> IngestResult<Self> {
        let ext = io_utils::file_extension(file_name).unwrap_or_default();
        if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            Ok(SourceFormat::Spreadsheet)
        } else if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
            Ok(SourceFormat::Delimited)
        } else {
            Err(IngestError::parse(
                file_name,
                format!(
                    "unsupported file type '.{ext}' (expected one of {})",
                    SPREADSHEET_EXTENSIONS
                        .iter()
                        .chain(DELIMITED_EXTENSIONS)
                        .copied()
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ))
        }
    }
}

/// Options for turning uploaded bytes into a grid.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// Reads the first sheet (or the whole delimited file) into rows of cells.
pub fn read_grid(source: &SourceFile, options: &ReadOptions) -> IngestResult<Vec<Vec<Cell>>> {
    match SourceFormat::detect(&source.name)? {
        SourceFormat::Spreadsheet => read_spreadsheet(source),
        SourceFormat::Delimited => read_delimited(source, options),
    }
}

fn read_spreadsheet(source: &SourceFile) -> IngestResult<Vec<Vec<Cell>>> {
    let cursor = Cursor::new(source.bytes.clone());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|err| IngestError::parse(&source.name, err))?;
    let first_sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::parse(&source.name, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&first_sheet)
        .map_err(|err| IngestError::parse(&source.name, err))?;
    debug!(
        "Sheet '{first_sheet}' of '{}' spans {:?}",
        source.name,
        range.get_size()
    );
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_from_data).collect())
        .collect())
}

fn read_delimited(source: &SourceFile, options: &ReadOptions) -> IngestResult<Vec<Vec<Cell>>> {
    let delimiter = io_utils::resolve_input_delimiter(&source.name, options.delimiter);
    debug!(
        "Reading '{}' as delimited text (delimiter '{}', encoding {})",
        source.name,
        io_utils::printable_delimiter(delimiter),
        options.encoding.name()
    );
    let mut reader = io_utils::open_csv_reader(source.bytes.as_slice(), delimiter);
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            IngestError::parse(&source.name, format!("row {}: {err}", idx + 1))
        })?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .map_err(|err| IngestError::parse(&source.name, format!("row {}: {err}", idx + 1)))?;
        rows.push(
            decoded
                .into_iter()
                .map(|value| {
                    if value.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(value)
                    }
                })
                .collect(),
        );
    }
    Ok(rows)
}

fn cell_from_data(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Integer(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Boolean(*b),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Cell::DateTime)
            .unwrap_or(Cell::Float(dt.as_f64())),
        Data::DateTimeIso(s) => parse_naive_datetime(s)
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// A report after its header row has been located: named columns over rows
/// of typed cells. Column names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadedTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl UploadedTable {
    /// Slices `grid` so row `header_row` becomes the header and later rows the data.
    ///
    /// Blank header cells become `column_{n}` and repeated names gain `_{k}`
    /// suffixes. Rows that are entirely empty are dropped; short rows are
    /// padded with empty cells.
    pub fn from_grid(grid: Vec<Vec<Cell>>, header_row: usize) -> Self {
        let mut rows = grid.into_iter().skip(header_row);
        let Some(header_cells) = rows.next() else {
            return UploadedTable::default();
        };
        let data: Vec<Vec<Cell>> = rows
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();
        let width = data
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(last_non_empty(&header_cells)))
            .max()
            .unwrap_or(0);

        let raw_headers: Vec<String> = (0..width)
            .map(|idx| {
                header_cells
                    .get(idx)
                    .map(|cell| cell.as_display().trim().to_string())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| format!("column_{}", idx + 1))
            })
            .collect();
        let headers = dedupe_headers(raw_headers);

        let rows = data
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        UploadedTable { headers, rows }
    }

    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let headers = dedupe_headers(headers);
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        UploadedTable { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Renames one column in place. Returns `false` when `from` is unknown.
    ///
    /// Renaming onto a name another column already holds is rejected so
    /// headers stay unique.
    pub fn rename_column(&mut self, from: &str, to: &str) -> IngestResult<bool> {
        let Some(idx) = self.column_index(from) else {
            return Ok(false);
        };
        if from == to {
            return Ok(true);
        }
        if self.has_column(to) {
            return Err(IngestError::Resolve(format!(
                "Cannot rename '{from}' to '{to}': a column named '{to}' already exists"
            )));
        }
        self.headers[idx] = to.to_string();
        Ok(true)
    }

    /// First `{base}_{k}` (k from 2) that no column holds and `reserved`
    /// does not rule out.
    pub fn available_name(&self, base: &str, reserved: impl Fn(&str) -> bool) -> String {
        let mut suffix = 2usize;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !self.has_column(&candidate) && !reserved(&candidate) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Applies a whole rename map at once; unknown originals are skipped.
    ///
    /// Uniqueness is checked on the final header set, so `A -> B, B -> C`
    /// succeeds even though `B` is taken midway.
    pub fn rename_columns<'a, I>(&mut self, renames: I) -> IngestResult<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut renamed = self.headers.clone();
        let mut applied = 0usize;
        for (from, to) in renames {
            let Some(idx) = self.column_index(from) else {
                continue;
            };
            if from != to {
                renamed[idx] = to.to_string();
                applied += 1;
            }
        }
        let mut seen = HashSet::new();
        if let Some(clash) = renamed.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(IngestError::Resolve(format!(
                "Renaming would produce two columns named '{clash}'"
            )));
        }
        self.headers = renamed;
        Ok(applied)
    }

    pub fn column_mut(&mut self, idx: usize) -> impl Iterator<Item = &mut Cell> {
        self.rows.iter_mut().filter_map(move |row| row.get_mut(idx))
    }

    /// Adds a column, or overwrites it when the name already exists.
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) {
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(Cell::Empty);
                }
                self.headers.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }

    /// First `limit` rows rendered as display strings.
    pub fn sample(&self, limit: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(Cell::as_display).collect())
            .collect()
    }
}

fn last_non_empty(row: &[Cell]) -> usize {
    row.iter()
        .rposition(|cell| !cell.is_empty())
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let count = seen.entry(header.clone()).or_insert(0);
        *count += 1;
        if *count == 1 && !taken.contains(&header) {
            taken.push(header);
            continue;
        }
        let mut suffix = (*count).max(2);
        let mut candidate = format!("{header}_{suffix}");
        while taken.contains(&candidate) {
            suffix += 1;
            candidate = format!("{header}_{suffix}");
        }
        taken.push(candidate);
    }
    taken
}
