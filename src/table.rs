//! Elastic plain-text tables for the `list` and `relate` commands.

use std::borrow::Cow;
use std::fmt::Write as _;

const GAP: &str = "  ";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten_cell(cell).chars().count());
        }
    }

    let mut output = String::new();
    push_line(&mut output, headers, &widths);
    let rule = widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>();
    push_line(&mut output, &rule, &widths);
    for row in rows {
        push_line(&mut output, row, &widths);
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn push_line(output: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if idx > 0 {
            line.push_str(GAP);
        }
        let _ = write!(line, "{:<width$}", flatten_cell(cell), width = *width);
    }
    let _ = writeln!(output, "{}", line.trim_end());
}

/// Line breaks and tabs would break the column grid.
fn flatten_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn columns_are_padded_to_widest_cell() {
        let rendered = render_table(
            &strings(&["table", "fields"]),
            &[strings(&["orders", "3"]), strings(&["a", "12"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "table   fields");
        assert_eq!(lines[1], "------  ------");
        assert_eq!(lines[2], "orders  3");
        assert_eq!(lines[3], "a       12");
    }

    #[test]
    fn embedded_line_breaks_are_flattened() {
        let rendered = render_table(&strings(&["note"]), &[strings(&["two\nlines"])]);
        assert!(rendered.contains("two lines"));
        assert_eq!(rendered.lines().count(), 3);
    }
}
