//! Loose tabular data and column-name reconciliation.
//!
//! Raw extraction output is tabular but loosely structured: each upstream
//! source names its municipality-code column differently and encodes numbers
//! as integers, floats or strings. This module holds the row representation
//! shared by the bronze and silver layers, the prioritized alias list used to
//! locate the municipality-code column, and the value coercions the silver
//! parsers rely on.

use serde_json::Value;

/// A single loosely-typed row, as delivered by an extractor
pub type Row = serde_json::Map<String, Value>;

/// A loosely-typed table: zero or more rows sharing (roughly) the same columns
pub type RawTable = Vec<Row>;

/// Canonical municipality-code column (7-digit IBGE code)
pub const MUNICIPIO_CODE_COLUMN: &str = "cod_mun_ibge_7";

/// Canonical reference-year column
pub const YEAR_COLUMN: &str = "ano";

/// Known aliases for the municipality-code column, in probe order.
///
/// Covers the legacy numeric-code fields and case variants used by the IBGE
/// localities payload, SIM/SINASC extracts (residence municipality) and older
/// DATASUS exports. New source quirks are added here, not in the callers.
pub const MUNICIPIO_CODE_ALIASES: &[&str] = &[
    "codigo_ibge",
    "id_municipio",
    "CODMUN",
    "cod_mun",
    "codmun",
    "CODMUNRES",
    "codmunres",
];

/// Whether any row of the table carries the given column
#[must_use]
pub fn has_column(table: &[Row], column: &str) -> bool {
    table.iter().any(|row| row.contains_key(column))
}

/// Find the first alias column present in the table, in probe order
#[must_use]
pub fn probe_municipio_column(table: &[Row]) -> Option<&'static str> {
    MUNICIPIO_CODE_ALIASES
        .iter()
        .copied()
        .find(|alias| has_column(table, alias))
}

/// Coerce a loose value to an integer.
///
/// Accepts JSON integers, float-encoded integers and numeric strings
/// (including Brazilian-formatted ones such as `"12.345"` = 12345).
#[must_use]
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => {
            let cleaned = s.trim().replace('.', "").replace(',', ".");
            if cleaned.is_empty() {
                return None;
            }
            cleaned
                .parse::<i64>()
                .ok()
                .or_else(|| cleaned.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

/// Coerce a loose value to a trimmed string, without formatting floats
/// as `"123.0"` when they encode integers
#[must_use]
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else {
                n.as_f64().filter(|f| f.fract() == 0.0).map(|f| format!("{}", f as i64))
            }
        }
        _ => None,
    }
}

/// Read the reference year of a row, if it has one
#[must_use]
pub fn row_year(row: &Row) -> Option<i32> {
    row.get(YEAR_COLUMN)
        .and_then(value_as_i64)
        .and_then(|y| i32::try_from(y).ok())
}
