//! Connectors for the public data sources (bronze layer).
//!
//! Each connector pulls raw records from one government source and returns
//! them as loose tabular data; key normalization and column reconciliation
//! happen later, in the silver transform. The pipeline consumes the sources
//! through the traits below so tests can substitute in-memory fakes.
//!
//! Available sources:
//! - IBGE localities: the municipality registry (dimension table spine)
//! - IBGE SIDRA aggregate 6579: estimated resident population
//! - DATASUS SIM: mortality records (deaths by residence municipality)
//! - DATASUS SINASC: live-birth records
//! - DATASUS SIH: hospitalization records
//! - OpenDataSUS DEMAS: REST indicators (e.g. PNI vaccination doses)

pub mod datasus;
pub mod ibge;

use std::future::Future;
use std::pin::Pin;

use crate::Result;
use crate::schema::RawTable;

pub use datasus::{DatasusFilesSource, DemasClient, VitalEventKind};
pub use ibge::IbgeConnector;

/// Source of the municipality registry and population estimates.
///
/// `list_municipios` failing is fatal for a run: without the registry there
/// is no dimension table and no spine for the gold output. A population
/// fetch, by contrast, may legitimately come back empty.
pub trait MunicipioSource: Send + Sync {
    /// Name of the source, for logging
    fn source_name(&self) -> &'static str;

    /// List every municipality known to the source
    fn list_municipios<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>>;

    /// Estimated resident population per municipality for one year.
    ///
    /// When `codigos` is given only those municipalities are queried,
    /// bounding the number of sequential remote calls. A failed call for one
    /// municipality yields no rows for it, never an error for the batch.
    fn population<'a>(
        &'a self,
        ano: i32,
        codigos: Option<&'a [String]>,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>>;
}

/// Source of raw per-event vital-statistics records, aggregated to one count
/// per residence municipality.
///
/// An unavailable or empty source is success with zero rows; the aggregator
/// treats the metric as all-zero.
pub trait VitalEventsSource: Send + Sync {
    /// Name of the source, for logging
    fn source_name(&self) -> &'static str;

    /// Whether the source can deliver data at all (e.g. its drop directory
    /// exists). The pipeline checks this before extracting.
    fn available(&self) -> bool {
        true
    }

    /// Event counts per municipality for one year
    fn counts<'a>(
        &'a self,
        ano: i32,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>>;
}
