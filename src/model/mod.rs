//! Typed rows of the silver and gold layers.
//!
//! These structs are what the pipeline persists: `serde`-derived so the same
//! definitions drive both the SQLite binds and the `serde_arrow` parquet
//! snapshots.

use serde::{Deserialize, Serialize};

/// One municipality in the canonical reference (dimension) table.
///
/// Keyed by the 7-digit IBGE code; re-ingestion overwrites (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipioRecord {
    /// Canonical 7-digit IBGE municipality code
    pub cod_mun_ibge_7: String,
    /// Municipality name
    pub nome_municipio: String,
    /// Two-letter state abbreviation
    pub sigla_uf: String,
    /// Numeric state code, when the source provides it
    pub cod_uf: Option<i64>,
}

/// Estimated resident population of one municipality for one reference year.
///
/// When the requested year is unavailable upstream the most recent available
/// value is substituted, but the row keeps the requested year label
/// (documented approximation inherited from the source system).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationRow {
    /// Canonical 7-digit IBGE municipality code
    pub cod_mun_ibge_7: String,
    /// Reference year as requested from the source
    pub ano: i32,
    /// Estimated resident population; `None` when the value was unparseable
    pub populacao: Option<i64>,
}

/// A generic health indicator observation from the OpenDataSUS APIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasusIndicatorRow {
    /// Canonical 7-digit IBGE municipality code
    pub cod_mun_ibge_7: String,
    /// Reference year
    pub ano: i32,
    /// Reference month, when the indicator is monthly
    pub mes: Option<i32>,
    /// Indicator name (e.g. `doses_aplicadas_pni`)
    pub indicador: String,
    /// Indicator value
    pub valor: f64,
    /// Measurement unit
    pub unidade: String,
}

/// One fully-computed gold row: health indicators for a (municipality, year).
///
/// A pure projection of the silver inputs — recomputed on every run and
/// upserted by (code, year). Rates are `None` only when the population value
/// is zero or missing; an absent metric source yields `0` / `Some(0.0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIndicatorRow {
    /// Canonical 7-digit IBGE municipality code
    pub cod_mun_ibge_7: String,
    /// Reference year
    pub ano: i32,
    /// Estimated resident population
    pub populacao: i64,
    /// Hospitalizations in the year (SIH)
    pub total_internacoes: i64,
    /// Deaths in the year (SIM)
    pub total_obitos: i64,
    /// Live births in the year (SINASC)
    pub nascidos_vivos: i64,
    /// Hospitalizations per 100 000 inhabitants, 2 decimals
    pub taxa_internacao_100k: Option<f64>,
    /// Deaths per 100 000 inhabitants, 2 decimals
    pub taxa_obitos_100k: Option<f64>,
    /// Wall-clock timestamp of the computation
    pub data_carga: String,
}

impl HealthIndicatorRow {
    /// The comparable portion of the row: everything except the load
    /// timestamp. Two runs over identical inputs produce identical keys.
    #[must_use]
    pub fn comparable(
        &self,
    ) -> (
        &str,
        i32,
        i64,
        i64,
        i64,
        i64,
        Option<f64>,
        Option<f64>,
    ) {
        (
            &self.cod_mun_ibge_7,
            self.ano,
            self.populacao,
            self.total_internacoes,
            self.total_obitos,
            self.nascidos_vivos,
            self.taxa_internacao_100k,
            self.taxa_obitos_100k,
        )
    }
}
