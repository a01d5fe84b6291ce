//! Column construction shared by all loaders.
//!
//! Loaders hand over a header and raw cells; this module resolves blank and
//! duplicate column names, infers one dtype per column and builds the polars
//! columns of the resulting [`UniformTable`].

use crate::constants::{FALSE_TOKENS, NA_TOKENS, TRUE_TOKENS, UNNAMED_COLUMN_PREFIX};
use crate::error::Result;
use crate::models::UniformTable;
use polars::prelude::Column;
use std::collections::HashSet;

/// A cell as the source format delivered it
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// How text cells take part in type inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextPolicy {
    /// Text may hold numbers, booleans or NA markers (delimited text formats)
    Infer,
    /// Text is always text; only empty strings are null (typed formats)
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

impl ColumnKind {
    fn merge(self, other: ColumnKind) -> ColumnKind {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnKind::Int, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Text,
        }
    }
}

/// Make column names unique and non-blank
///
/// Blank names become `Unnamed: <index>`. Repeats of a name get `.1`, `.2`,
/// ... appended, skipping suffixes that are already used by another column,
/// so no column is ever dropped.
pub fn dedupe_names<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let names: Vec<String> = raw
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            if name.trim().is_empty() {
                format!("{UNNAMED_COLUMN_PREFIX}{index}")
            } else {
                name
            }
        })
        .collect();

    let mut taken: HashSet<String> = names.iter().cloned().collect();
    let mut seen = HashSet::with_capacity(names.len());
    let mut resolved = Vec::with_capacity(names.len());

    for name in names {
        if seen.insert(name.clone()) {
            resolved.push(name);
            continue;
        }

        let mut suffix = 1usize;
        let candidate = loop {
            let candidate = format!("{name}.{suffix}");
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        taken.insert(candidate.clone());
        seen.insert(candidate.clone());
        resolved.push(candidate);
    }

    resolved
}

/// Build a table from a header and row-major cells
///
/// Rows shorter than the header are padded with empty cells; extra cells
/// are ignored. Loaders that must reject ragged input check widths first.
pub fn build_table(
    header: Vec<String>,
    rows: Vec<Vec<RawCell>>,
    policy: TextPolicy,
) -> Result<UniformTable> {
    let names = dedupe_names(header);

    let mut cells_by_column: Vec<Vec<RawCell>> = names
        .iter()
        .map(|_| Vec::with_capacity(rows.len()))
        .collect();
    for row in rows {
        let mut cells = row.into_iter();
        for column in cells_by_column.iter_mut() {
            column.push(cells.next().unwrap_or(RawCell::Empty));
        }
    }

    let columns = names
        .iter()
        .zip(cells_by_column)
        .map(|(name, cells)| build_column(name, &cells, policy))
        .collect();

    UniformTable::from_columns(columns)
}

/// Build one typed column from its cells
pub fn build_column(name: &str, cells: &[RawCell], policy: TextPolicy) -> Column {
    let kind = cells
        .iter()
        .filter_map(|cell| cell_kind(cell, policy))
        .reduce(ColumnKind::merge)
        .unwrap_or(ColumnKind::Text);

    match kind {
        ColumnKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| match cell {
                    RawCell::Int(v) => Some(*v),
                    RawCell::Text(s) => non_null_text(s, policy).and_then(parse_int),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), values)
        }
        ColumnKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|cell| match cell {
                    RawCell::Float(v) => Some(*v),
                    RawCell::Int(v) => Some(*v as f64),
                    RawCell::Text(s) => non_null_text(s, policy).and_then(parse_float),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), values)
        }
        ColumnKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|cell| match cell {
                    RawCell::Bool(v) => Some(*v),
                    RawCell::Text(s) => non_null_text(s, policy).and_then(parse_bool),
                    _ => None,
                })
                .collect();
            Column::new(name.into(), values)
        }
        ColumnKind::Text => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|cell| match cell {
                    RawCell::Empty => None,
                    RawCell::Text(s) => non_null_text(s, policy).map(str::to_string),
                    RawCell::Int(v) => Some(v.to_string()),
                    RawCell::Float(v) => Some(v.to_string()),
                    RawCell::Bool(v) => Some(v.to_string()),
                })
                .collect();
            Column::new(name.into(), values)
        }
    }
}

fn cell_kind(cell: &RawCell, policy: TextPolicy) -> Option<ColumnKind> {
    match cell {
        RawCell::Empty => None,
        RawCell::Int(_) => Some(ColumnKind::Int),
        RawCell::Float(_) => Some(ColumnKind::Float),
        RawCell::Bool(_) => Some(ColumnKind::Bool),
        RawCell::Text(s) => {
            let text = non_null_text(s, policy)?;
            if policy == TextPolicy::Keep {
                Some(ColumnKind::Text)
            } else if parse_int(text).is_some() {
                Some(ColumnKind::Int)
            } else if parse_float(text).is_some() {
                Some(ColumnKind::Float)
            } else if parse_bool(text).is_some() {
                Some(ColumnKind::Bool)
            } else {
                Some(ColumnKind::Text)
            }
        }
    }
}

fn non_null_text(text: &str, policy: TextPolicy) -> Option<&str> {
    let is_null = match policy {
        TextPolicy::Infer => NA_TOKENS.contains(&text.trim()),
        TextPolicy::Keep => text.is_empty(),
    };
    (!is_null).then_some(text)
}

fn parse_int(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    text.trim().parse().ok()
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if TRUE_TOKENS.contains(&text) {
        Some(true)
    } else if FALSE_TOKENS.contains(&text) {
        Some(false)
    } else {
        None
    }
}
