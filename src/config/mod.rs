//! Configuration for the pipeline.
//!
//! One `PipelineConfig` is built at process start and passed by reference into
//! every component. No component reads ambient global state.

use std::path::PathBuf;

/// SIDRA aggregate holding the resident population estimates
pub const SIDRA_POPULATION_AGGREGATE: u32 = 6579;
/// SIDRA variable for the estimated resident population
pub const SIDRA_POPULATION_VARIABLE: u32 = 9324;

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the local data lake (bronze/silver/gold live under it)
    pub data_dir: PathBuf,
    /// Path of the local SQLite database
    pub db_path: PathBuf,
    /// Base URL of the IBGE aggregated-data (SIDRA) API
    pub ibge_base_url: String,
    /// URL listing every Brazilian municipality (IBGE localities API)
    pub ibge_municipios_url: String,
    /// Base URL of the OpenDataSUS DEMAS API
    pub demas_base_url: String,
    /// Directory holding raw DATASUS extract files (SIM, SINASC, SIH)
    pub datasus_dir: PathBuf,
    /// Number of municipalities queried for population when no explicit
    /// subset is given (bounds the sequential SIDRA calls)
    pub population_sample_size: usize,
    /// Whether to write timestamped parquet snapshots of each layer
    pub write_snapshots: bool,
    /// Whether to pull PNI vaccination doses from DEMAS into the generic
    /// indicator table
    pub include_pni: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from("data");
        Self {
            db_path: data_dir.join("integragov.db"),
            datasus_dir: data_dir.join("datasus"),
            data_dir,
            ibge_base_url: "https://servicodados.ibge.gov.br/api/v3".to_string(),
            ibge_municipios_url: "https://servicodados.ibge.gov.br/api/v1/localidades/municipios"
                .to_string(),
            demas_base_url: "https://apidadosabertos.saude.gov.br/v1".to_string(),
            population_sample_size: 100,
            write_snapshots: true,
            include_pni: false,
        }
    }
}

impl PipelineConfig {
    /// Directory of raw, immutable extraction output
    #[must_use]
    pub fn bronze_dir(&self) -> PathBuf {
        self.data_dir.join("bronze")
    }

    /// Directory of cleaned, standardized data
    #[must_use]
    pub fn silver_dir(&self) -> PathBuf {
        self.data_dir.join("silver")
    }

    /// Directory of analysis-ready aggregates
    #[must_use]
    pub fn gold_dir(&self) -> PathBuf {
        self.data_dir.join("gold")
    }
}
