//! Fixed-width text tables for chat code blocks.
//!
//! Columns are at least two characters wider than their header. Columns whose
//! cells are all numeric are right-aligned; everything else is left-aligned.

const MIN_PADDING: usize = 2;

fn is_numeric(cell: &str) -> bool {
    !cell.is_empty() && cell.trim().parse::<f64>().is_ok()
}

struct Layout {
    widths: Vec<usize>,
    right_aligned: Vec<bool>,
}

impl Layout {
    fn new(headers: &[&str], rows: &[Vec<String>]) -> Self {
        let widths = headers
            .iter()
            .enumerate()
            .map(|(col, header)| {
                rows.iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.chars().count())
                    .fold(header.chars().count() + MIN_PADDING, usize::max)
            })
            .collect();
        let right_aligned = (0..headers.len())
            .map(|col| {
                !rows.is_empty()
                    && rows
                        .iter()
                        .all(|row| row.get(col).is_some_and(|cell| is_numeric(cell)))
            })
            .collect();
        Self {
            widths,
            right_aligned,
        }
    }

    fn cells<'r>(&self, row: impl IntoIterator<Item = &'r str>) -> Vec<String> {
        row.into_iter()
            .zip(self.widths.iter().zip(&self.right_aligned))
            .map(|(cell, (&width, &right))| {
                if right {
                    format!("{cell:>width$}")
                } else {
                    format!("{cell:<width$}")
                }
            })
            .collect()
    }
}

fn row_strs(row: &[String], columns: usize) -> impl Iterator<Item = &str> {
    (0..columns).map(move |col| row.get(col).map(String::as_str).unwrap_or_default())
}

/// Plain layout: header, dashed rule, rows; columns separated by two spaces.
pub fn simple(headers: &[&str], rows: &[Vec<String>]) -> String {
    let layout = Layout::new(headers, rows);
    let mut lines = vec![layout.cells(headers.iter().copied()).join("  ")];
    lines.push(
        layout
            .widths
            .iter()
            .map(|&width| "-".repeat(width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(layout.cells(row_strs(row, headers.len())).join("  "));
    }
    lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Org-mode layout: `| a | b |` rows with a `|---+---|` rule under the header.
pub fn orgtbl(headers: &[&str], rows: &[Vec<String>]) -> String {
    let layout = Layout::new(headers, rows);
    let render = |cells: Vec<String>| format!("| {} |", cells.join(" | "));

    let mut lines = vec![render(layout.cells(headers.iter().copied()))];
    lines.push(format!(
        "|{}|",
        layout
            .widths
            .iter()
            .map(|&width| "-".repeat(width + 2))
            .collect::<Vec<_>>()
            .join("+")
    ));
    for row in rows {
        lines.push(render(layout.cells(row_strs(row, headers.len()))));
    }
    lines.join("\n")
}
