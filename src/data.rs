use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Prefix applied to destination table names that do not start with a letter.
pub const TABLE_NAME_PREFIX: &str = "report_";

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Integer(i) => i.to_string(),
            Cell::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Cell::Decimal(d) => d.normalize().to_string(),
            Cell::Boolean(b) => b.to_string(),
            Cell::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }
    Err(anyhow!("Failed to parse '{value}' as datetime"))
}

/// Converts a spreadsheet serial date (days since 1899-12-30) into a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
    let days = serial.trunc() as i64;
    let seconds = (serial.fract() * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_days(days)? + TimeDelta::try_seconds(seconds)?)
}

pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Derives a destination table name from an uploaded file name.
///
/// The extension is dropped, every character outside `[A-Za-z0-9_]` becomes
/// `_`, the result is lowercased, and names that do not begin with a letter
/// gain [`TABLE_NAME_PREFIX`].
pub fn sanitize_table_name(file_name: &str) -> String {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    let mut name = normalize_column_name(stem);
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert_str(0, TABLE_NAME_PREFIX);
    }
    name
}

/// Coerces a count-like cell to an integer, ignoring thousands separators.
///
/// Fractional input is truncated toward zero.
pub fn parse_count(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Integer(i) => Some(*i),
        Cell::Float(f) if f.is_finite() => Some(f.trunc() as i64),
        Cell::Decimal(d) => d.trunc().to_i64(),
        Cell::Text(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\''))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            if let Ok(int) = cleaned.parse::<i64>() {
                return Some(int);
            }
            cleaned
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }
        _ => None,
    }
}

/// Coerces a money-like cell to a decimal, stripping currency symbols and separators.
///
/// Accounting negatives written as `(12.50)` are honoured.
pub fn parse_amount(cell: &Cell) -> Option<Decimal> {
    match cell {
        Cell::Integer(i) => Some(Decimal::from(*i)),
        Cell::Float(f) => Decimal::from_f64(*f),
        Cell::Decimal(d) => Some(*d),
        Cell::Text(s) => {
            let trimmed = s.trim();
            let (negative, body) = match trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Some(inner) => (true, inner),
                None => (false, trimmed),
            };
            let cleaned: String = body
                .chars()
                .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '$' | '€' | '£' | '¥'))
                .collect();
            if cleaned.is_empty() {
                return None;
            }
            let parsed = Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .ok()?;
            Some(if negative { -parsed } else { parsed })
        }
        _ => None,
    }
}

fn month_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?i)([a-z]{3,9})\.?[\s\-/']*(\d{2}|\d{4})$").expect("valid month regex")
    })
}

fn year_month_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("valid year-month regex"))
}

fn month_from_name(name: &str) -> Option<u32> {
    let lowered = name.to_ascii_lowercase();
    if lowered == "sept" {
        return Some(9);
    }
    MONTH_NAMES
        .iter()
        .position(|full| {
            if lowered.len() == 3 {
                full.starts_with(lowered.as_str())
            } else {
                *full == lowered
            }
        })
        .map(|idx| idx as u32 + 1)
}

fn format_year_month(year: i32, month: u32) -> Option<String> {
    NaiveDate::from_ymd_opt(year, month, 1).map(|date| date.format("%Y-%m").to_string())
}

/// Normalizes a month-like cell to a `YYYY-MM` token.
///
/// Returns `None` when the value is not in an accepted date-like shape; the
/// caller decides how to report it.
pub fn normalize_year_month(cell: &Cell) -> Option<String> {
    match cell {
        Cell::DateTime(dt) => format_year_month(dt.year(), dt.month()),
        Cell::Text(raw) => {
            let value = raw.trim();
            if value.is_empty() {
                return None;
            }
            if let Some(caps) = month_name_pattern().captures(value) {
                let month = month_from_name(&caps[1])?;
                let year_token = &caps[2];
                let mut year: i32 = year_token.parse().ok()?;
                if year_token.len() == 2 {
                    year += 2000;
                }
                return format_year_month(year, month);
            }
            if let Some(caps) = year_month_pattern().captures(value) {
                let year: i32 = caps[1].parse().ok()?;
                let month: u32 = caps[2].parse().ok()?;
                return format_year_month(year, month);
            }
            if let Ok(date) = parse_naive_date(value) {
                return format_year_month(date.year(), date.month());
            }
            parse_naive_datetime(value)
                .ok()
                .and_then(|dt| format_year_month(dt.year(), dt.month()))
        }
        _ => None,
    }
}

/// Drops whitespace and a leading `s` marker from a segment identifier.
pub fn strip_segment_marker(cell: &Cell) -> String {
    let compact: String = cell
        .as_display()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    match compact.strip_prefix(['s', 'S']) {
        Some(rest) => rest.to_string(),
        None => compact,
    }
}

pub fn cell_to_evalexpr(cell: &Cell) -> evalexpr::Value {
    match cell {
        Cell::Empty => evalexpr::Value::String(String::new()),
        Cell::Text(s) => evalexpr::Value::String(s.clone()),
        Cell::Integer(i) => evalexpr::Value::Int(*i),
        Cell::Float(f) => evalexpr::Value::Float(*f),
        Cell::Decimal(d) => d
            .to_f64()
            .map(evalexpr::Value::Float)
            .unwrap_or_else(|| evalexpr::Value::String(d.to_string())),
        Cell::Boolean(b) => evalexpr::Value::Boolean(*b),
        Cell::DateTime(_) => evalexpr::Value::String(cell.as_display()),
    }
}
