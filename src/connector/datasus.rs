//! DATASUS vital-statistics extraction and the OpenDataSUS DEMAS client.
//!
//! The Ministry of Health REST endpoints for SIM/SINASC are offline, so raw
//! per-state extract files (parquet, one file per state download) are expected
//! in a local drop directory, laid out as `<root>/<system>/<year>/*.parquet`.
//! The drop directory is an optional capability: when it is absent the source
//! reports `available() == false` and the pipeline carries on without the
//! metric.
//!
//! DEMAS, the open-data API that still answers, is wrapped by [`DemasClient`]
//! for the generic indicator feeds (e.g. PNI vaccination doses).

use std::fs::File;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use arrow::array::{Array, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{debug, info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

use crate::config::PipelineConfig;
use crate::connector::VitalEventsSource;
use crate::error::IntegraError;
use crate::ibge_code;
use crate::schema::{RawTable, Row};
use crate::Result;

/// The vital-statistics systems the pipeline extracts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalEventKind {
    /// SIM: mortality information system
    Deaths,
    /// SINASC: live-birth information system
    Births,
    /// SIH: hospital admission system
    Hospitalizations,
}

impl VitalEventKind {
    /// Subdirectory of the drop directory holding this system's files
    #[must_use]
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Deaths => "sim",
            Self::Births => "sinasc",
            Self::Hospitalizations => "sih",
        }
    }

    /// Name of the pre-aggregated count column this source emits
    #[must_use]
    pub fn count_column(self) -> &'static str {
        match self {
            Self::Deaths => "total_obitos",
            Self::Births => "nascidos_vivos",
            Self::Hospitalizations => "total_internacoes",
        }
    }

    /// Residence-municipality column candidates, in probe order
    fn residence_columns(self) -> &'static [&'static str] {
        match self {
            Self::Deaths => &["CODMUNRES", "codmunres", "CODESTAB"],
            Self::Births => &["CODMUNRES", "codmunres", "CODMUNNASC"],
            Self::Hospitalizations => &["MUNIC_RES", "CODMUNRES", "codmunres"],
        }
    }
}

/// Vital-events source backed by a drop directory of raw extract files
pub struct DatasusFilesSource {
    root: PathBuf,
    kind: VitalEventKind,
}

impl DatasusFilesSource {
    /// Source for one system under the configured drop directory
    #[must_use]
    pub fn new(config: &PipelineConfig, kind: VitalEventKind) -> Self {
        Self {
            root: config.datasus_dir.clone(),
            kind,
        }
    }

    fn year_dir(&self, ano: i32) -> PathBuf {
        self.root.join(self.kind.subdir()).join(ano.to_string())
    }
}

impl VitalEventsSource for DatasusFilesSource {
    fn source_name(&self) -> &'static str {
        match self.kind {
            VitalEventKind::Deaths => "datasus-sim",
            VitalEventKind::Births => "datasus-sinasc",
            VitalEventKind::Hospitalizations => "datasus-sih",
        }
    }

    fn available(&self) -> bool {
        self.root.join(self.kind.subdir()).is_dir()
    }

    fn counts<'a>(
        &'a self,
        ano: i32,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>> {
        let dir = self.year_dir(ano);
        let kind = self.kind;
        Box::pin(async move {
            // Parquet scans are blocking; keep them off the async executor.
            let rows = tokio::task::spawn_blocking(move || count_events_in_dir(&dir, kind, ano))
                .await
                .map_err(|e| IntegraError::SourceError(format!("Extract task failed: {e}")))??;
            Ok(rows)
        })
    }
}

/// Count events per residence municipality across every extract file for one
/// year. Counts from multiple files (per-state downloads) are summed.
fn count_events_in_dir(dir: &Path, kind: VitalEventKind, ano: i32) -> Result<RawTable> {
    let files = find_parquet_files(dir);
    if files.is_empty() {
        info!("No {} extract files under {}", kind.subdir(), dir.display());
        return Ok(RawTable::new());
    }

    let mut totals: FxHashMap<String, i64> = FxHashMap::default();
    for file in &files {
        match count_events_in_file(file, kind) {
            Ok(file_counts) => {
                for (codigo, n) in file_counts {
                    *totals.entry(codigo).or_insert(0) += n;
                }
            }
            Err(e) => debug!("Skipping extract file {}: {e}", file.display()),
        }
    }

    let mut rows = RawTable::with_capacity(totals.len());
    for (codigo, total) in totals.into_iter().sorted() {
        let mut row = Row::new();
        row.insert("cod_mun_ibge_7".into(), json!(codigo));
        row.insert("ano".into(), json!(ano));
        row.insert(kind.count_column().into(), json!(total));
        rows.push(row);
    }
    info!(
        "{}: {} municipalities from {} extract files (year {ano})",
        kind.subdir(),
        rows.len(),
        files.len()
    );
    Ok(rows)
}

fn count_events_in_file(path: &Path, kind: VitalEventKind) -> Result<FxHashMap<String, i64>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut counts: FxHashMap<String, i64> = FxHashMap::default();
    for batch in reader {
        let batch = batch?;
        let Some(column) = find_residence_column(&batch, kind.residence_columns()) else {
            return Err(IntegraError::SourceError(format!(
                "No residence-municipality column in {}",
                path.display()
            )));
        };
        for codigo in column_as_codes(batch.column(column)) {
            // Rows whose code cannot be normalized are dropped, not counted
            if let Some(codigo) = codigo {
                *counts.entry(codigo).or_insert(0) += 1;
            }
        }
    }
    Ok(counts)
}

fn find_residence_column(batch: &RecordBatch, candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|name| batch.schema().index_of(name).ok())
}

/// Read a column of municipality identifiers as normalized 7-digit codes,
/// whatever physical type the extract used
fn column_as_codes(column: &dyn Array) -> Vec<Option<String>> {
    let any = column.as_any();
    if let Some(values) = any.downcast_ref::<StringArray>() {
        (0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    None
                } else {
                    ibge_code::normalize(values.value(i))
                }
            })
            .collect()
    } else if let Some(values) = any.downcast_ref::<Int64Array>() {
        (0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    None
                } else {
                    ibge_code::normalize(&values.value(i).to_string())
                }
            })
            .collect()
    } else if let Some(values) = any.downcast_ref::<Int32Array>() {
        (0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    None
                } else {
                    ibge_code::normalize(&values.value(i).to_string())
                }
            })
            .collect()
    } else if let Some(values) = any.downcast_ref::<Float64Array>() {
        (0..values.len())
            .map(|i| {
                if values.is_null(i) {
                    None
                } else {
                    ibge_code::normalize_value(&json!(values.value(i)))
                }
            })
            .collect()
    } else {
        vec![None; column.len()]
    }
}

fn find_parquet_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
        .sorted()
        .collect()
}

/// Client for the OpenDataSUS DEMAS API
pub struct DemasClient {
    client: reqwest::Client,
    base_url: String,
}

impl DemasClient {
    /// Build a client from the pipeline configuration
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build DEMAS HTTP client")?;
        Ok(Self {
            client,
            base_url: config.demas_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let payload = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(payload)
    }

    /// PNI vaccination doses applied in one year.
    ///
    /// The API answers either a bare array or a `{"results": [...]}` wrapper;
    /// both are accepted. A `404` means the dataset does not exist for that
    /// year and yields an empty table, not an error.
    pub async fn vacinacao_pni(&self, ano: i32) -> Result<RawTable> {
        let payload = match self.get_json(&format!("vacinacao/doses-aplicadas-pni-{ano}")).await {
            Ok(payload) => payload,
            Err(IntegraError::HttpError(e))
                if e.status() == Some(reqwest::StatusCode::NOT_FOUND) =>
            {
                warn!("DEMAS has no PNI dataset for year {ano}");
                return Ok(RawTable::new());
            }
            Err(e) => return Err(e),
        };
        Ok(records_from_payload(payload))
    }
}

fn records_from_payload(payload: Value) -> RawTable {
    let records = match payload {
        Value::Object(mut obj) => match obj.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Value::Array(items) => items,
        _ => Vec::new(),
    };
    records
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect()
}
