//! Integration of Brazilian public demographic and health statistics.
//!
//! Ingests the IBGE municipality registry and SIDRA population estimates
//! plus DATASUS vital statistics (SIM mortality, SINASC live births, SIH
//! hospitalizations), standardizes everything around the 7-digit IBGE
//! municipality code, and computes per-municipality health indicators
//! (rates per 100k inhabitants) persisted in a local SQLite store, with
//! timestamped snapshot files of each layer (JSON for the raw bronze
//! tables, parquet for the typed silver and gold rows).

pub mod config;
pub mod connector;
pub mod error;
pub mod ibge_code;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod storage;
pub mod transform;

// Re-export the most common types for easier use
// Core types
pub use config::PipelineConfig;
pub use error::{IntegraError, Result};
pub use model::{DatasusIndicatorRow, HealthIndicatorRow, MunicipioRecord, PopulationRow};

// Sources
pub use connector::{
    DatasusFilesSource, DemasClient, IbgeConnector, MunicipioSource, VitalEventKind,
    VitalEventsSource,
};

// Pipeline entry points
pub use pipeline::{PipelineSources, RunSummary};
pub use storage::Storage;
