use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Left-aligned columns sized to the widest cell, two spaces apart.
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let widths = column_widths(headers, &rows);

    println!("{}", format_row(headers.iter().copied(), &widths));
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", rule.join("  "));

    for row in &rows {
        println!("{}", format_row(row.iter().map(String::as_str), &widths));
    }
}

/// Print a heading followed by the table, or `(none)` when empty.
pub fn print_section(title: &str, headers: &[&str], rows: Vec<Vec<String>>) {
    println!("{title}");
    if rows.is_empty() {
        println!("  (none)");
    } else {
        print_table(headers, rows);
    }
    println!();
}

fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    widths
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .enumerate()
        .map(|(i, cell)| {
            let w = widths.get(i).copied().unwrap_or(0);
            format!("{cell:w$}")
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_cover_longest_cell() {
        let rows = vec![
            vec!["postgres-0".to_string(), "Running".to_string()],
            vec!["api-gateway-7f9c".to_string(), "Pending".to_string()],
        ];
        assert_eq!(column_widths(&["NAME", "PHASE"], &rows), vec![16, 7]);
    }

    #[test]
    fn rows_are_padded_and_trimmed() {
        let line = format_row(["a", "bb", "c"].into_iter(), &[3, 4, 3]);
        assert_eq!(line, "a    bb    c");
    }
}
