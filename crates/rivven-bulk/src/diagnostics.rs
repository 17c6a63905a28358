//! Column width diagnostics
//!
//! Reports the longest string value per mapped column, handy when a load
//! fails on truncation and the destination column widths need checking.
//! Lengths are counted in UTF-16 code units, the unit `NVARCHAR(n)` uses.

use tracing::info;

use crate::mapping::ColumnMapping;
use crate::types::Value;

/// Longest string seen in one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnStringLength {
    /// Destination column
    pub column: String,
    /// Longest value, in UTF-16 code units
    pub max_length: usize,
}

/// Longest string value per mapped column, in mapping order.
///
/// Only columns that produced at least one string value are reported.
pub fn string_lengths<'r, T: 'r, I>(
    records: I,
    mapping: &ColumnMapping<T>,
) -> Vec<ColumnStringLength>
where
    I: IntoIterator<Item = &'r T>,
{
    let mut longest: Vec<Option<usize>> = vec![None; mapping.len()];

    for record in records {
        for (slot, column) in longest.iter_mut().zip(mapping.columns()) {
            if let Value::String(s) = column.value(record) {
                let len = s.encode_utf16().count();
                *slot = Some(slot.map_or(len, |current| current.max(len)));
            }
        }
    }

    mapping
        .columns()
        .iter()
        .zip(longest)
        .filter_map(|(column, max)| {
            max.map(|max_length| ColumnStringLength {
                column: column.column().to_string(),
                max_length,
            })
        })
        .collect()
}

/// Log the longest string value per mapped column
pub fn log_string_lengths<'r, T: 'r, I>(
    records: I,
    mapping: &ColumnMapping<T>,
) -> Vec<ColumnStringLength>
where
    I: IntoIterator<Item = &'r T>,
{
    let lengths = string_lengths(records, mapping);
    for entry in &lengths {
        info!(
            record = mapping.record_name(),
            column = %entry.column,
            max_length = entry.max_length,
            "Longest string value"
        );
    }
    lengths
}
