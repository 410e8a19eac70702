//! Gold transform: per-municipality health indicators.
//!
//! Joins the standardized population, mortality, hospitalization and
//! live-birth datasets on (municipality code, year) and computes the
//! normalized per-100k rates. The population table is the spine of the join:
//! a municipality with population but no reported events gets zero counts
//! and zero rates, never nulls.

use chrono::Local;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::model::HealthIndicatorRow;
use crate::schema::{MUNICIPIO_CODE_COLUMN, Row, has_column, row_year, value_as_i64};

struct SpineEntry {
    populacao: Option<i64>,
    ano: Option<i32>,
}

/// Compute health indicators per municipality for one reference year.
///
/// - empty `populacao` yields an empty result, whatever else is present;
/// - each input is filtered to `ano` where a year value exists on the row;
/// - duplicate population loads collapse to the maximum value per code;
/// - a metric table with a pre-aggregated count column is summed, otherwise
///   its raw rows are counted; multiple rows per code are summed, not
///   overwritten;
/// - an absent metric source contributes `0` totals and `0.0` rates;
/// - a zero or missing population makes the rates undefined (`None`).
#[must_use]
pub fn health_indicators(
    populacao: &[Row],
    obitos: Option<&[Row]>,
    internacoes: Option<&[Row]>,
    nascidos: Option<&[Row]>,
    ano: Option<i32>,
) -> Vec<HealthIndicatorRow> {
    if populacao.is_empty() {
        return Vec::new();
    }

    let mut spine: FxHashMap<String, SpineEntry> = FxHashMap::default();
    for row in populacao.iter().filter(|row| matches_year(row, ano)) {
        let Some(codigo) = row_code(row) else { continue };
        let populacao = row.get("populacao").and_then(value_as_i64);
        let entry = spine.entry(codigo.to_string()).or_insert(SpineEntry {
            populacao: None,
            ano: row_year(row),
        });
        // max population seen per code tolerates duplicate loads
        entry.populacao = match (entry.populacao, populacao) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    let obitos_totals = obitos.map(|table| metric_totals(table, "total_obitos", ano));
    let internacoes_totals =
        internacoes.map(|table| metric_totals(table, "total_internacoes", ano));
    let nascidos_totals = nascidos.map(|table| metric_totals(table, "nascidos_vivos", ano));

    let data_carga = Local::now().to_rfc3339();
    spine
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(codigo, entry)| {
            let populacao = entry.populacao.unwrap_or(0);
            let (total_obitos, taxa_obitos_100k) =
                metric_for(&codigo, populacao, obitos_totals.as_ref());
            let (total_internacoes, taxa_internacao_100k) =
                metric_for(&codigo, populacao, internacoes_totals.as_ref());
            let (nascidos_vivos, _) = metric_for(&codigo, populacao, nascidos_totals.as_ref());
            HealthIndicatorRow {
                cod_mun_ibge_7: codigo,
                ano: entry.ano.or(ano).unwrap_or_default(),
                populacao,
                total_internacoes,
                total_obitos,
                nascidos_vivos,
                taxa_internacao_100k,
                taxa_obitos_100k,
                data_carga: data_carga.clone(),
            }
        })
        .collect()
}

fn matches_year(row: &Row, ano: Option<i32>) -> bool {
    match (ano, row_year(row)) {
        (Some(wanted), Some(year)) => wanted == year,
        _ => true,
    }
}

fn row_code(row: &Row) -> Option<&str> {
    row.get(MUNICIPIO_CODE_COLUMN).and_then(Value::as_str)
}

/// Total events per municipality: sum of the pre-aggregated count column when
/// the table carries one, otherwise one per raw row
fn metric_totals(table: &[Row], count_column: &str, ano: Option<i32>) -> FxHashMap<String, i64> {
    let pre_aggregated = has_column(table, count_column);
    let mut totals: FxHashMap<String, i64> = FxHashMap::default();
    for row in table.iter().filter(|row| matches_year(row, ano)) {
        let Some(codigo) = row_code(row) else { continue };
        let n = if pre_aggregated {
            row.get(count_column).and_then(value_as_i64).unwrap_or(0)
        } else {
            1
        };
        *totals.entry(codigo.to_string()).or_insert(0) += n;
    }
    totals
}

/// Total and rate for one municipality. `totals == None` means the metric
/// source was absent entirely: zero total, zero rate on every row.
fn metric_for(
    codigo: &str,
    populacao: i64,
    totals: Option<&FxHashMap<String, i64>>,
) -> (i64, Option<f64>) {
    match totals {
        None => (0, Some(0.0)),
        Some(totals) => {
            let total = totals.get(codigo).copied().unwrap_or(0);
            (total, rate_per_100k(total, populacao))
        }
    }
}

/// count / population × 100 000, rounded to 2 decimals; undefined when the
/// population is not positive
fn rate_per_100k(total: i64, populacao: i64) -> Option<f64> {
    if populacao <= 0 {
        return None;
    }
    let rate = total as f64 / populacao as f64 * 100_000.0;
    Some((rate * 100.0).round() / 100.0)
}
