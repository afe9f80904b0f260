use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table};
use owo_colors::OwoColorize;

use crate::report::{Report, ReportRow, ReportTotals, TOTAL_LABEL};
use crate::utils::group_thousands;

pub const HEADERS: [&str; 8] = [
    "Name",
    "Size1",
    "Size2",
    "SD",
    "Filecount1",
    "Filecount2",
    "CD",
    "DIFF",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Plain,
    Rich,
}

pub fn render(report: &Report, format: Format) -> String {
    match format {
        Format::Csv => to_csv(report),
        Format::Plain => to_plain(report),
        Format::Rich => to_rich(report),
    }
}

fn flag(set: bool, mark: &str) -> String {
    if set {
        mark.to_string()
    } else {
        String::new()
    }
}

fn row_cells(row: &ReportRow, num: fn(u64) -> String) -> [String; 8] {
    [
        row.name.clone(),
        num(row.size1),
        num(row.size2),
        flag(row.size_differs, "*"),
        num(row.count1),
        num(row.count2),
        flag(row.count_differs, "*"),
        flag(row.any_diff, "**"),
    ]
}

fn totals_cells(t: &ReportTotals, num: fn(u64) -> String) -> [String; 8] {
    [
        TOTAL_LABEL.to_string(),
        num(t.size1),
        num(t.size2),
        num(t.size_diffs as u64),
        num(t.count1),
        num(t.count2),
        num(t.count_diffs as u64),
        num(t.diffs as u64),
    ]
}

fn raw(n: u64) -> String {
    n.to_string()
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Header, one line per row, then the `TOTAL` line with diff tallies.
pub fn to_csv(report: &Report) -> String {
    let mut out = String::new();
    let mut push = |cells: [String; 8]| {
        let line: Vec<String> = cells.iter().map(|c| csv_field(c)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    };
    push(HEADERS.map(String::from));
    for row in &report.rows {
        push(row_cells(row, raw));
    }
    push(totals_cells(&report.totals, raw));
    out
}

fn separator_cells(cells: &[[String; 8]]) -> [String; 8] {
    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in cells {
        for (w, c) in widths.iter_mut().zip(row) {
            *w = (*w).max(c.chars().count());
        }
    }
    widths.map(|w| "─".repeat(w))
}

/// Shared table layout: numbers right-aligned, a dash row before `TOTAL`.
fn build_table(report: &Report, styled: bool) -> Table {
    let colors = [
        Some(Color::Cyan),
        Some(Color::Green),
        Some(Color::Green),
        None,
        Some(Color::Yellow),
        Some(Color::Yellow),
        None,
        Some(Color::Red),
    ];

    let mut body: Vec<[String; 8]> = report
        .rows
        .iter()
        .map(|r| row_cells(r, group_thousands))
        .collect();
    let totals = totals_cells(&report.totals, group_thousands);
    body.push(totals.clone());
    let separator = separator_cells(&body);
    body.pop();

    let mut table = Table::new();
    if styled {
        table.load_preset(UTF8_FULL);
        table.enforce_styling();
        table.set_header(
            HEADERS
                .iter()
                .map(|h| Cell::new(h).fg(Color::Magenta).add_attribute(Attribute::Bold)),
        );
    } else {
        table.load_preset(UTF8_FULL_CONDENSED);
        table.force_no_tty();
        table.set_header(HEADERS);
    }

    let cells = |cells: [String; 8], bold: bool| {
        cells.into_iter().zip(colors).map(move |(c, color)| {
            let mut cell = Cell::new(c);
            if styled {
                if let Some(color) = color {
                    cell = cell.fg(color);
                }
                if bold {
                    cell = cell.add_attribute(Attribute::Bold);
                }
            }
            cell
        })
    };

    for row in body {
        table.add_row(cells(row, false));
    }
    table.add_row(cells(separator, false));
    table.add_row(cells(totals, true));

    for i in 1..HEADERS.len() {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
    table
}

/// Box-drawn table for terminals without color.
pub fn to_plain(report: &Report) -> String {
    format!("{}\n", build_table(report, false))
}

/// Colored report with a heading naming both folders.
pub fn to_rich(report: &Report) -> String {
    format!(
        "{}\n\n{} {}\n{} {}\n\n{}\n",
        "Folder Comparison Report".bold().underline(),
        "Folder 1:".bold(),
        report.folder1,
        "Folder 2:".bold(),
        report.folder2,
        build_table(report, true),
    )
}
