//! IBGE API client: municipality registry and SIDRA population estimates.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::Result;
use crate::config::{PipelineConfig, SIDRA_POPULATION_AGGREGATE, SIDRA_POPULATION_VARIABLE};
use crate::connector::MunicipioSource;
use crate::schema::{RawTable, Row, value_as_i64};

/// Cap on sequential per-municipality SIDRA calls in one run
const MAX_SEQUENTIAL_REQUESTS: usize = 500;

/// IBGE localities payload (the fields the pipeline uses)
#[derive(Debug, Deserialize)]
struct Localidade {
    id: Option<u64>,
    nome: Option<String>,
    microrregiao: Option<Microrregiao>,
}

#[derive(Debug, Deserialize)]
struct Microrregiao {
    mesorregiao: Option<Mesorregiao>,
}

#[derive(Debug, Deserialize)]
struct Mesorregiao {
    #[serde(rename = "UF")]
    uf: Option<Uf>,
}

#[derive(Debug, Deserialize)]
struct Uf {
    id: Option<i64>,
    sigla: Option<String>,
}

/// SIDRA aggregated-data payload: one entry per variable, each holding
/// series keyed by locality with one value per period
#[derive(Debug, Deserialize)]
struct SidraAggregate {
    #[serde(default)]
    resultados: Vec<SidraResult>,
}

#[derive(Debug, Deserialize)]
struct SidraResult {
    #[serde(default)]
    series: Vec<SidraSeries>,
}

#[derive(Debug, Deserialize)]
struct SidraSeries {
    localidade: Option<SidraLocalidade>,
    #[serde(default)]
    serie: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SidraLocalidade {
    id: Option<String>,
}

/// Client for the IBGE localities and SIDRA APIs
pub struct IbgeConnector {
    client: reqwest::Client,
    municipios_url: String,
    base_url: String,
}

impl IbgeConnector {
    /// Build a connector from the pipeline configuration
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build IBGE HTTP client")?;
        Ok(Self {
            client,
            municipios_url: config.ibge_municipios_url.clone(),
            base_url: config.ibge_base_url.clone(),
        })
    }

    fn population_url(&self, localidades: &str) -> String {
        format!(
            "{}/agregados/{SIDRA_POPULATION_AGGREGATE}/periodos/-1/variaveis/{SIDRA_POPULATION_VARIABLE}?localidades=N6[{localidades}]&formato=json",
            self.base_url
        )
    }

    async fn fetch_population(&self, localidades: &str, ano: i32) -> Result<RawTable> {
        let payload: Vec<SidraAggregate> = self
            .client
            .get(self.population_url(localidades))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_population_response(&payload, ano))
    }

    async fn population_by_list(&self, codigos: &[String], ano: i32) -> RawTable {
        let bounded = &codigos[..codigos.len().min(MAX_SEQUENTIAL_REQUESTS)];
        if bounded.len() < codigos.len() {
            warn!(
                "Population subset truncated to {} of {} municipalities",
                bounded.len(),
                codigos.len()
            );
        }

        let bar = ProgressBar::new(bounded.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("IBGE population");

        let mut rows = RawTable::new();
        for codigo in bounded {
            match self.fetch_population(codigo, ano).await {
                Ok(mut parsed) => rows.append(&mut parsed),
                Err(e) => warn!("Population fetch failed for municipality {codigo}: {e}"),
            }
            bar.inc(1);
        }
        bar.finish_and_clear();
        rows
    }
}

impl MunicipioSource for IbgeConnector {
    fn source_name(&self) -> &'static str {
        "ibge"
    }

    fn list_municipios<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>> {
        Box::pin(async move {
            let payload: Vec<Localidade> = self
                .client
                .get(&self.municipios_url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await
                .context("Failed to decode IBGE municipality list")?;

            let mut rows = RawTable::with_capacity(payload.len());
            for item in payload {
                let (Some(id), Some(nome)) = (item.id, item.nome) else {
                    continue;
                };
                let uf = item
                    .microrregiao
                    .and_then(|m| m.mesorregiao)
                    .and_then(|m| m.uf);
                let (sigla_uf, cod_uf) = match uf {
                    Some(uf) => (uf.sigla.unwrap_or_default(), uf.id),
                    None => (String::new(), None),
                };
                let mut row = Row::new();
                row.insert("cod_mun_ibge_7".into(), json!(format!("{id:0>7}")));
                row.insert("nome_municipio".into(), json!(nome));
                row.insert("sigla_uf".into(), json!(sigla_uf));
                row.insert("cod_uf".into(), json!(cod_uf));
                rows.push(row);
            }
            info!("Listed {} municipalities from IBGE", rows.len());
            Ok(rows)
        })
    }

    fn population<'a>(
        &'a self,
        ano: i32,
        codigos: Option<&'a [String]>,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>> {
        Box::pin(async move {
            let rows = match codigos {
                Some(codigos) => self.population_by_list(codigos, ano).await,
                // N6all: every municipality in one (slow) call
                None => self.fetch_population("N6all", ano).await?,
            };
            info!("Population obtained for {} municipalities (year {ano})", rows.len());
            Ok(rows)
        })
    }
}

/// Extract population rows from a SIDRA response.
///
/// When the requested year is absent from a series the most recent available
/// year's value is used, but the row keeps the requested year label.
fn parse_population_response(payload: &[SidraAggregate], ano: i32) -> RawTable {
    let mut rows = RawTable::new();
    for aggregate in payload {
        for result in &aggregate.resultados {
            for series in &result.series {
                let Some(codigo) = series
                    .localidade
                    .as_ref()
                    .and_then(|l| l.id.as_deref())
                    .filter(|id| !id.is_empty())
                else {
                    continue;
                };
                let Some(value) = series_value_for_year(&series.serie, ano, codigo) else {
                    continue;
                };
                let mut row = Row::new();
                row.insert("cod_mun_ibge_7".into(), json!(format!("{codigo:0>7}")));
                row.insert("ano".into(), json!(ano));
                row.insert("populacao".into(), json!(value_as_i64(value)));
                rows.push(row);
            }
        }
    }
    rows
}

fn series_value_for_year<'v>(
    serie: &'v BTreeMap<String, Value>,
    ano: i32,
    codigo: &str,
) -> Option<&'v Value> {
    if let Some(value) = serie.get(&ano.to_string()) {
        return Some(value);
    }
    let latest = serie
        .keys()
        .filter(|k| k.len() == 4 && k.chars().all(|c| c.is_ascii_digit()))
        .max()?;
    debug!("Year {ano} missing for municipality {codigo}; substituting {latest}");
    serie.get(latest)
}
