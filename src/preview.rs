//! Bounded dataset previews for display.

use crate::constants::MAX_PREVIEW_ROWS;
use crate::error::Result;
use crate::models::UniformTable;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column list plus the first rows as name to value mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub data: Vec<Map<String, Value>>,
}

/// Preview the first `limit` rows of `table`
///
/// Works on a view of the table; the source stays usable for conversion.
/// `limit` is capped at [`MAX_PREVIEW_ROWS`].
pub fn preview(table: &UniformTable, limit: usize) -> Result<DatasetPreview> {
    let head = table.head(limit.min(MAX_PREVIEW_ROWS));
    let data = (0..head.height())
        .map(|index| head.row(index))
        .collect::<Result<Vec<_>>>()?;

    Ok(DatasetPreview {
        columns: table.column_names(),
        data,
    })
}

/// Resolve a caller-supplied row count into `[0, max]`, falling back to
/// `default` when nothing was requested
pub fn clamp_limit(requested: Option<i64>, default: usize, max: usize) -> usize {
    let max = max.min(MAX_PREVIEW_ROWS);
    match requested {
        None => default.min(max),
        Some(rows) if rows <= 0 => 0,
        Some(rows) => usize::try_from(rows).unwrap_or(max).min(max),
    }
}
