// src/render.rs
//! Terminal and JSON rendering of pipeline results.

use anyhow::Result;
use prettytable::{format, Cell, Row, Table};
use serde::Serialize;
use std::io::Write;

use crate::query::OccupationDetail;
use crate::rank::TrendResult;
use crate::table::HistoryPoint;

const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// `1234567.4` → `"1,234,567"`, `-98.6` → `"-99"`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

fn header(cells: &[&str]) -> Row {
    Row::new(cells.iter().map(|c| Cell::new(c).style_spec("bFg")).collect())
}

fn boxed() -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table
}

fn title_or_code(r: &TrendResult) -> &str {
    r.occupation_title.as_deref().unwrap_or(&r.occupation_code)
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Rank / occupation / growth-per-year table.
pub fn write_ranking<W: Write>(
    out: &mut W,
    heading: &str,
    rows: &[&TrendResult],
    fmt: OutputFormat,
) -> Result<()> {
    if fmt == OutputFormat::Json {
        return write_json(out, rows);
    }
    writeln!(out, "{heading}")?;
    let mut table = boxed();
    table.set_titles(header(&["Rank", "Code", "Occupation", "Growth/Year (persons)"]));
    for r in rows {
        table.add_row(Row::new(vec![
            Cell::new(&r.rank.to_string()).style_spec("r"),
            Cell::new(&r.occupation_code),
            Cell::new(title_or_code(r)),
            Cell::new(&format_thousands(r.slope)).style_spec("r"),
        ]));
    }
    table.print(out)?;
    Ok(())
}

/// Search results: matching titles with their code and rank.
pub fn write_matches<W: Write>(
    out: &mut W,
    matches: &[&TrendResult],
    fmt: OutputFormat,
) -> Result<()> {
    if fmt == OutputFormat::Json {
        return write_json(out, matches);
    }
    if matches.is_empty() {
        writeln!(out, "No occupation found for that term.")?;
        return Ok(());
    }
    writeln!(out, "{} occupation(s) found", matches.len())?;
    let mut table = boxed();
    table.set_titles(header(&["Rank", "Code", "Occupation"]));
    for r in matches {
        table.add_row(Row::new(vec![
            Cell::new(&r.rank.to_string()).style_spec("r"),
            Cell::new(&r.occupation_code),
            Cell::new(title_or_code(r)),
        ]));
    }
    table.print(out)?;
    Ok(())
}

/// One text bar per year, scaled to the largest count.
pub fn history_bars(history: &[HistoryPoint]) -> Vec<String> {
    let max = history
        .iter()
        .map(|p| p.total_employment)
        .fold(0.0_f64, f64::max);
    history
        .iter()
        .map(|p| {
            let len = if max > 0.0 {
                ((p.total_employment.max(0.0) / max) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            format!(
                "{} | {:<width$} {}",
                p.year,
                "#".repeat(len),
                format_thousands(p.total_employment),
                width = BAR_WIDTH
            )
        })
        .collect()
}

/// Detail view: rank, slope and employment history.
pub fn write_detail<W: Write>(out: &mut W, detail: &OccupationDetail, fmt: OutputFormat) -> Result<()> {
    if fmt == OutputFormat::Json {
        return write_json(out, detail);
    }
    let r = &detail.result;
    writeln!(out, "{} ({})", title_or_code(r), r.occupation_code)?;
    writeln!(out, "  Trend rank:      {} of {}", r.rank, detail.total_ranked)?;
    writeln!(out, "  Average change:  {} persons/year", format_thousands(r.slope))?;
    writeln!(out)?;
    if detail.history.is_empty() {
        writeln!(out, "Not enough employment data to chart this occupation.")?;
        return Ok(());
    }
    writeln!(out, "Employment history:")?;
    for line in history_bars(&detail.history) {
        writeln!(out, "  {line}")?;
    }
    Ok(())
}

pub fn write_years<W: Write>(out: &mut W, years: &[i32], fmt: OutputFormat) -> Result<()> {
    if fmt == OutputFormat::Json {
        return write_json(out, years);
    }
    if years.is_empty() {
        writeln!(out, "No year files found.")?;
    }
    for y in years {
        writeln!(out, "{y}")?;
    }
    Ok(())
}
