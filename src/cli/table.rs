//! Table builders around comfy-table for consistent display.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

/// A borderless list table with upper-cased headers.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Two-column key/value table for detail views.
pub fn detail_table<K, V>(rows: impl IntoIterator<Item = (K, V)>) -> Table
where
    K: ToString,
    V: ToString,
{
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);
    for (key, value) in rows {
        table.add_row(vec![
            Cell::new(key.to_string()),
            Cell::new(value.to_string()),
        ]);
    }
    table
}

/// Title line followed by a rendered table, or `empty` when there are no rows.
pub fn render_list(title: &str, table: &Table, total: usize, empty: &str) -> String {
    if total == 0 {
        return empty.to_string();
    }
    format!("{} ({total})\n{table}", console::style(title).bold())
}
