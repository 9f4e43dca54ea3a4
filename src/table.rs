//! Plain-text tables for previews and listings on stdout.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::grid::UploadedTable;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    // Header
    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    // Separator
    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    // Rows
    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    print!("{rendered}");
}

/// Prints a titled sample of the first `limit` rows.
pub fn print_preview(title: &str, table: &UploadedTable, limit: usize) {
    println!("{title} ({} row(s), {} column(s))", table.row_count(), table.column_count());
    print_table(table.headers(), &table.sample(limit));
    println!();
}

/// Two-column table of `(left, right)` pairs.
pub fn render_pairs(left: &str, right: &str, pairs: &[(String, String)]) -> String {
    let headers = vec![left.to_string(), right.to_string()];
    let rows = pairs
        .iter()
        .map(|(a, b)| vec![a.clone(), b.clone()])
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths
            .get(idx)
            .copied()
            .unwrap_or_default()
            .saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            // Skip ANSI escape sequence (e.g. \x1b[31m)
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        let mut sanitized = String::with_capacity(value.len());
        for ch in value.chars() {
            match ch {
                '\n' | '\r' | '\t' => sanitized.push(' '),
                other => sanitized.push(other),
            }
        }
        Cow::Owned(sanitized)
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;

    #[test]
    fn columns_pad_to_widest_value() {
        let rendered = render_table(
            &["eMonth".to_string(), "country".to_string()],
            &[vec!["2024-01".to_string(), "DE".to_string()]],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "eMonth   country");
        assert_eq!(lines[1], "-------  -------");
        assert_eq!(lines[2], "2024-01  DE");
    }

    #[test]
    fn embedded_newlines_are_flattened() {
        let table = UploadedTable::new(
            vec!["note".to_string()],
            vec![vec![Cell::text("a\nb")]],
        );
        let rendered = render_table(table.headers(), &table.sample(5));
        assert!(rendered.ends_with("a b\n"));
    }

    #[test]
    fn pairs_render_as_two_columns() {
        let rendered = render_pairs(
            "report column",
            "canonical",
            &[("XYZ".to_string(), "netRev".to_string())],
        );
        assert!(rendered.starts_with("report column  canonical"));
        assert!(rendered.contains("XYZ            netRev"));
    }
}
