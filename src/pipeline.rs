//! Pipeline orchestration: Bronze → Silver → Gold for one reference year.
//!
//! A run is synchronous batch work: extract the municipality registry and
//! population (IBGE), extract vital-event counts (DATASUS) where available,
//! standardize everything around the 7-digit municipality code, compute the
//! gold indicators and persist. Re-running a year overwrites its gold rows.
//!
//! Only the total absence of the registry aborts a run; every optional
//! source degrades to an empty table with a logged gap.

use log::{info, warn};
use serde_json::Value;

use crate::Result;
use crate::config::PipelineConfig;
use crate::connector::{DemasClient, MunicipioSource, VitalEventsSource};
use crate::error::IntegraError;
use crate::schema::{MUNICIPIO_CODE_COLUMN, RawTable};
use crate::storage::{Storage, snapshot};
use crate::transform::{gold, silver};

/// The collaborators one run pulls from
pub struct PipelineSources<'a> {
    /// Municipality registry and population estimates (required)
    pub ibge: &'a dyn MunicipioSource,
    /// Mortality counts (optional)
    pub obitos: &'a dyn VitalEventsSource,
    /// Live-birth counts (optional)
    pub nascidos: &'a dyn VitalEventsSource,
    /// Hospitalization counts (optional)
    pub internacoes: &'a dyn VitalEventsSource,
    /// DEMAS REST client for generic indicators (optional)
    pub demas: Option<&'a DemasClient>,
}

/// Row counts of one completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Municipalities in the dimension table
    pub municipios: usize,
    /// Standardized population rows persisted
    pub populacao: usize,
    /// Municipalities with death counts
    pub obitos: usize,
    /// Municipalities with live-birth counts
    pub nascidos: usize,
    /// Municipalities with hospitalization counts
    pub internacoes: usize,
    /// Gold indicator rows persisted
    pub gold: usize,
}

/// Execute the full pipeline for one reference year.
///
/// `codigos` restricts the population extraction to an explicit subset of
/// municipality codes; with `todos_municipios` every municipality is
/// queried; otherwise the configured sample size bounds the sequential
/// remote calls.
pub async fn run(
    config: &PipelineConfig,
    storage: &Storage,
    sources: &PipelineSources<'_>,
    ano: i32,
    codigos: Option<Vec<String>>,
    todos_municipios: bool,
) -> Result<RunSummary> {
    info!("Starting pipeline run (year {ano}, all municipalities: {todos_municipios})");
    let data_carga = chrono::Local::now().to_rfc3339();

    // --- Bronze: extraction ---
    let municipios_raw = sources.ibge.list_municipios().await?;
    if municipios_raw.is_empty() {
        return Err(IntegraError::SourceError(
            "Municipality registry returned no rows; aborting run".to_string(),
        ));
    }
    if config.write_snapshots {
        snapshot::write_json(&municipios_raw, &config.bronze_dir(), "ibge_municipios")?;
    }

    let municipios_s = silver::standardize_municipio_code(municipios_raw, None);
    let subset = population_subset(&municipios_s, codigos, todos_municipios, config);

    // The whole run proceeds at the year population actually exists for:
    // when the requested year yields nothing upstream, fall back to the
    // previous one and label the output with the year actually used.
    let mut ano_efetivo = ano;
    let mut populacao_raw = sources.ibge.population(ano, subset.as_deref()).await?;
    if populacao_raw.is_empty() {
        warn!("No population data for year {ano}; trying year {}", ano - 1);
        populacao_raw = sources.ibge.population(ano - 1, subset.as_deref()).await?;
        if !populacao_raw.is_empty() {
            ano_efetivo = ano - 1;
        }
    }
    if config.write_snapshots {
        snapshot::write_json(&populacao_raw, &config.bronze_dir(), "ibge_populacao")?;
    }

    let (obitos_raw, nascidos_raw, internacoes_raw) = futures::join!(
        counts_or_empty(sources.obitos, ano_efetivo),
        counts_or_empty(sources.nascidos, ano_efetivo),
        counts_or_empty(sources.internacoes, ano_efetivo),
    );
    if config.write_snapshots {
        let bronze = config.bronze_dir();
        snapshot::write_json(&obitos_raw, &bronze, "sim_obitos")?;
        snapshot::write_json(&nascidos_raw, &bronze, "sinasc_nascidos_vivos")?;
        snapshot::write_json(&internacoes_raw, &bronze, "sih_internacoes")?;
    }

    // --- Silver: standardization and persistence ---
    let populacao_s = silver::filter_year(
        silver::standardize_municipio_code(populacao_raw, None),
        ano_efetivo,
    );
    let obitos_s = silver::standardize_municipio_code(obitos_raw, None);
    let nascidos_s = silver::standardize_municipio_code(nascidos_raw, None);
    let internacoes_s = silver::standardize_municipio_code(internacoes_raw, None);

    let registros = silver::parse_municipios(&municipios_s);
    let populacao_rows = silver::parse_population(&populacao_s, ano_efetivo);
    storage.upsert_municipios(&registros).await?;
    storage.insert_population(&populacao_rows, &data_carga).await?;
    if config.write_snapshots {
        let silver_dir = config.silver_dir();
        snapshot::write_parquet(&registros, &silver_dir, "silver_municipios")?;
        snapshot::write_parquet(&populacao_rows, &silver_dir, "silver_populacao")?;
    }

    if config.include_pni {
        ingest_pni(config, storage, sources.demas, ano_efetivo, &data_carga).await?;
    }

    // --- Gold: indicators ---
    let indicadores = gold::health_indicators(
        &populacao_s,
        non_empty(&obitos_s),
        non_empty(&internacoes_s),
        non_empty(&nascidos_s),
        Some(ano_efetivo),
    );
    if indicadores.is_empty() {
        warn!("Gold layer empty (no standardized population); check the IBGE extraction");
    } else {
        storage.upsert_gold(&indicadores).await?;
        if config.write_snapshots {
            snapshot::write_parquet(
                &indicadores,
                &config.gold_dir(),
                "gold_indicadores_saude_municipio",
            )?;
        }
    }

    let summary = RunSummary {
        municipios: registros.len(),
        populacao: populacao_rows.len(),
        obitos: obitos_s.len(),
        nascidos: nascidos_s.len(),
        internacoes: internacoes_s.len(),
        gold: indicadores.len(),
    };
    info!(
        "Pipeline finished: {} municipalities, {} population rows, {} gold rows",
        summary.municipios, summary.populacao, summary.gold
    );
    Ok(summary)
}

/// Which municipality codes to query for population: an explicit subset, all
/// of them, or the head of the registry bounded by the configured sample size
fn population_subset(
    municipios: &RawTable,
    codigos: Option<Vec<String>>,
    todos_municipios: bool,
    config: &PipelineConfig,
) -> Option<Vec<String>> {
    if todos_municipios {
        return None;
    }
    if let Some(codigos) = codigos.filter(|c| !c.is_empty()) {
        return Some(codigos);
    }
    let sample: Vec<String> = municipios
        .iter()
        .filter_map(|row| row.get(MUNICIPIO_CODE_COLUMN).and_then(Value::as_str))
        .take(config.population_sample_size)
        .map(str::to_string)
        .collect();
    if sample.len() < municipios.len() {
        info!(
            "Using a sample of {} municipalities for population (use --todos-municipios for all)",
            sample.len()
        );
    }
    Some(sample)
}

/// Extract counts from an optional source, degrading to an empty table on
/// unavailability or failure
async fn counts_or_empty(source: &dyn VitalEventsSource, ano: i32) -> RawTable {
    if !source.available() {
        info!("{} not available; metric will be all-zero", source.source_name());
        return RawTable::new();
    }
    match source.counts(ano).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("{} extraction failed: {e}; proceeding without it", source.source_name());
            RawTable::new()
        }
    }
}

async fn ingest_pni(
    config: &PipelineConfig,
    storage: &Storage,
    demas: Option<&DemasClient>,
    ano: i32,
    data_carga: &str,
) -> Result<()> {
    let Some(demas) = demas else {
        info!("DEMAS client not configured; skipping PNI indicators");
        return Ok(());
    };
    let raw = match demas.vacinacao_pni(ano).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("PNI extraction failed: {e}; proceeding without it");
            return Ok(());
        }
    };
    if config.write_snapshots {
        snapshot::write_json(&raw, &config.bronze_dir(), "demas_vacinacao_pni")?;
    }
    let standardized = silver::standardize_municipio_code(raw, None);
    let rows = silver::parse_datasus_indicators(&standardized, ano, "doses_aplicadas_pni", "doses");
    if rows.is_empty() {
        info!("PNI feed yielded no keyable rows for year {ano}");
        return Ok(());
    }
    storage.insert_datasus_indicadores(&rows, data_carga).await?;
    Ok(())
}

fn non_empty(table: &RawTable) -> Option<&[crate::schema::Row]> {
    if table.is_empty() { None } else { Some(table.as_slice()) }
}
