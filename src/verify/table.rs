//! Parsing the server's tabular query output
//!
//! An aggregate answer is printed as
//!
//! ```text
//! +------------------+
//! |           cnt_id |
//! +------------------+
//! |                6 |
//! +------------------+
//! Total record(s): 1
//! ```
//!
//! Only `|`-delimited rows matter. A value belongs to an alias when its row
//! is the first data row after a header row naming that alias.

/// Cells of a `| a | b |` row, or `None` for any other line
pub fn row_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('|') || !trimmed.ends_with('|') {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    Some(inner.split('|').map(|cell| cell.trim().to_string()).collect())
}

/// Value printed under the last header naming `alias`
///
/// `headers` lists every alias the caller queried, so that a header row
/// directly following another header is not mistaken for its value.
/// Returns the raw cell text; `None` when the alias never appears or has
/// no data row (an aggregate over an empty table may print only a header).
pub fn value_for_alias(lines: &[String], alias: &str, headers: &[&str]) -> Option<String> {
    let rows: Vec<Vec<String>> = lines.iter().filter_map(|l| row_cells(l)).collect();

    let header = rows
        .iter()
        .rposition(|cells| cells.len() == 1 && cells[0] == alias)?;

    rows.get(header + 1)
        .filter(|cells| cells.len() == 1 && !headers.contains(&cells[0].as_str()))
        .map(|cells| cells[0].clone())
}

/// Parse a cell as an integer key, tolerating float formatting such as `5.000000`
pub fn parse_integer(cell: &str) -> Option<i64> {
    if let Ok(value) = cell.parse::<i64>() {
        return Some(value);
    }
    match cell.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Some(value as i64),
        _ => None,
    }
}
