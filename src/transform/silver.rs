//! Silver transform: cleaning, standardization and typed parsing.
//!
//! Standardization of the join key: every dataset ends up with a
//! `cod_mun_ibge_7` column holding a valid 7-digit IBGE municipality code,
//! and rows that cannot produce one are dropped.

use log::{debug, warn};
use serde_json::Value;

use crate::ibge_code;
use crate::model::{DatasusIndicatorRow, MunicipioRecord, PopulationRow};
use crate::schema::{
    MUNICIPIO_CODE_COLUMN, RawTable, has_column, probe_municipio_column, row_year, value_as_i64,
    value_as_string,
};
use rustc_hash::FxHashMap;

/// Standardize the municipality-code column of a loose table.
///
/// The code is normalized into [`MUNICIPIO_CODE_COLUMN`], sourcing from
/// `key_column` when given, from the canonical column when already present,
/// or from the first known alias otherwise. Without any candidate column the
/// table is returned unchanged (logged, not an error) — downstream joins
/// will simply find no matches.
///
/// Rows whose code does not normalize to exactly 7 digits are dropped; rows
/// with valid codes are not otherwise mutated. The row count never grows.
#[must_use]
pub fn standardize_municipio_code(mut table: RawTable, key_column: Option<&str>) -> RawTable {
    let source = key_column
        .filter(|column| has_column(&table, column))
        .map(str::to_string)
        .or_else(|| {
            has_column(&table, MUNICIPIO_CODE_COLUMN).then(|| MUNICIPIO_CODE_COLUMN.to_string())
        })
        .or_else(|| probe_municipio_column(&table).map(str::to_string));

    let Some(source) = source else {
        if !table.is_empty() {
            warn!("No municipality-code column found; table left unstandardized");
        }
        return table;
    };

    for row in &mut table {
        let normalized = row.get(&source).and_then(ibge_code::normalize_value);
        row.insert(
            MUNICIPIO_CODE_COLUMN.to_string(),
            normalized.map_or(Value::Null, Value::String),
        );
    }

    let before = table.len();
    table.retain(|row| {
        row.get(MUNICIPIO_CODE_COLUMN)
            .and_then(Value::as_str)
            .is_some_and(ibge_code::is_valid)
    });
    if table.len() < before {
        debug!(
            "Dropped {} rows without a valid municipality code",
            before - table.len()
        );
    }
    table
}

/// Keep only rows of the given reference year.
///
/// Tables without a year column pass through unchanged, matching the
/// extractor contract of an implicit requested year.
#[must_use]
pub fn filter_year(table: RawTable, ano: i32) -> RawTable {
    if !has_column(&table, crate::schema::YEAR_COLUMN) {
        return table;
    }
    table
        .into_iter()
        .filter(|row| row_year(row) == Some(ano))
        .collect()
}

/// Parse a standardized municipality table into dimension records
#[must_use]
pub fn parse_municipios(table: &RawTable) -> Vec<MunicipioRecord> {
    table
        .iter()
        .filter_map(|row| {
            let codigo = row.get(MUNICIPIO_CODE_COLUMN)?.as_str()?;
            Some(MunicipioRecord {
                cod_mun_ibge_7: codigo.to_string(),
                nome_municipio: row
                    .get("nome_municipio")
                    .and_then(value_as_string)
                    .unwrap_or_default(),
                sigla_uf: row
                    .get("sigla_uf")
                    .and_then(value_as_string)
                    .unwrap_or_default(),
                cod_uf: row.get("cod_uf").and_then(value_as_i64),
            })
        })
        .collect()
}

/// Parse a standardized population table into typed rows.
///
/// Rows without a year column are labeled with the requested year.
#[must_use]
pub fn parse_population(table: &RawTable, ano: i32) -> Vec<PopulationRow> {
    table
        .iter()
        .filter_map(|row| {
            let codigo = row.get(MUNICIPIO_CODE_COLUMN)?.as_str()?;
            Some(PopulationRow {
                cod_mun_ibge_7: codigo.to_string(),
                ano: row_year(row).unwrap_or(ano),
                populacao: row.get("populacao").and_then(value_as_i64),
            })
        })
        .collect()
}

/// Collapse a standardized DEMAS indicator table into one observation per
/// municipality (row count as the value)
#[must_use]
pub fn parse_datasus_indicators(
    table: &RawTable,
    ano: i32,
    indicador: &str,
    unidade: &str,
) -> Vec<DatasusIndicatorRow> {
    let mut counts: FxHashMap<String, f64> = FxHashMap::default();
    for row in table {
        let Some(codigo) = row.get(MUNICIPIO_CODE_COLUMN).and_then(Value::as_str) else {
            continue;
        };
        *counts.entry(codigo.to_string()).or_insert(0.0) += 1.0;
    }
    let mut rows: Vec<DatasusIndicatorRow> = counts
        .into_iter()
        .map(|(cod_mun_ibge_7, valor)| DatasusIndicatorRow {
            cod_mun_ibge_7,
            ano,
            mes: None,
            indicador: indicador.to_string(),
            valor,
            unidade: unidade.to_string(),
        })
        .collect();
    rows.sort_by(|a, b| a.cod_mun_ibge_7.cmp(&b.cod_mun_ibge_7));
    rows
}
