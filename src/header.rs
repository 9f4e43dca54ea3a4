//! Header row location for reports that carry title or notes rows above the
//! real column titles.

use crate::data::Cell;

/// Lowercased, trimmed, non-empty aliases ready for substring checks.
fn prepare_aliases<S: AsRef<str>>(aliases: &[S]) -> Vec<String> {
    let mut prepared: Vec<String> = aliases
        .iter()
        .map(|alias| alias.as_ref().trim().to_lowercase())
        .filter(|alias| !alias.is_empty())
        .collect();
    prepared.sort();
    prepared.dedup();
    prepared
}

/// Returns the index of the first row in which any cell contains any alias
/// (case-insensitive substring match), or `0` when no row qualifies.
///
/// `scan_limit` caps how many leading rows are inspected. An empty grid, an
/// empty alias list, or no match all yield `0`, which treats the first row as
/// the header even when it is a decorative title.
pub fn locate_header_row<S: AsRef<str>>(
    grid: &[Vec<Cell>],
    aliases: &[S],
    scan_limit: Option<usize>,
) -> usize {
    let aliases = prepare_aliases(aliases);
    if aliases.is_empty() {
        return 0;
    }
    let limit = scan_limit.unwrap_or(usize::MAX);
    grid.iter()
        .take(limit)
        .position(|row| row_mentions_alias(row, &aliases))
        .unwrap_or(0)
}

fn row_mentions_alias(row: &[Cell], aliases: &[String]) -> bool {
    row.iter().filter(|cell| !cell.is_empty()).any(|cell| {
        let text = cell.as_display().to_lowercase();
        aliases.iter().any(|alias| text.contains(alias.as_str()))
    })
}
