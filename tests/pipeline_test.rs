use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use integragov::connector::{MunicipioSource, VitalEventsSource};
use integragov::pipeline::{self, PipelineSources};
use integragov::schema::{RawTable, Row};
use integragov::{PipelineConfig, Result, Storage};
use serde_json::{Value, json};

fn row(value: Value) -> Row {
    serde_json::from_value(value).expect("row literal")
}

/// In-memory registry + population source
struct FakeIbge {
    municipios: RawTable,
    populacao: HashMap<i32, RawTable>,
}

impl FakeIbge {
    fn with_two_municipios() -> Self {
        let municipios = vec![
            row(json!({"cod_mun_ibge_7": "3550308", "nome_municipio": "São Paulo",
                       "sigla_uf": "SP", "cod_uf": 35})),
            row(json!({"cod_mun_ibge_7": "3304557", "nome_municipio": "Rio de Janeiro",
                       "sigla_uf": "RJ", "cod_uf": 33})),
        ];
        let mut populacao = HashMap::new();
        populacao.insert(
            2024,
            vec![
                row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": 12_000_000})),
                row(json!({"cod_mun_ibge_7": "3304557", "ano": 2024, "populacao": 6_000_000})),
            ],
        );
        Self { municipios, populacao }
    }
}

impl MunicipioSource for FakeIbge {
    fn source_name(&self) -> &'static str {
        "fake-ibge"
    }

    fn list_municipios<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>> {
        Box::pin(async move { Ok(self.municipios.clone()) })
    }

    fn population<'a>(
        &'a self,
        ano: i32,
        codigos: Option<&'a [String]>,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>> {
        Box::pin(async move {
            let rows = self.populacao.get(&ano).cloned().unwrap_or_default();
            Ok(match codigos {
                Some(codigos) => rows
                    .into_iter()
                    .filter(|r| {
                        r.get("cod_mun_ibge_7")
                            .and_then(Value::as_str)
                            .is_some_and(|c| codigos.iter().any(|wanted| wanted == c))
                    })
                    .collect(),
                None => rows,
            })
        })
    }
}

/// In-memory vital-events source
struct FakeEvents {
    name: &'static str,
    available: bool,
    rows: RawTable,
}

impl FakeEvents {
    fn unavailable(name: &'static str) -> Self {
        Self { name, available: false, rows: RawTable::new() }
    }
}

impl VitalEventsSource for FakeEvents {
    fn source_name(&self) -> &'static str {
        self.name
    }

    fn available(&self) -> bool {
        self.available
    }

    fn counts<'a>(
        &'a self,
        _ano: i32,
    ) -> Pin<Box<dyn Future<Output = Result<RawTable>> + Send + 'a>> {
        Box::pin(async move { Ok(self.rows.clone()) })
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        write_snapshots: false,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_full_run_produces_gold_rows() -> Result<()> {
    let config = test_config();
    let storage = Storage::open_in_memory().await?;
    let ibge = FakeIbge::with_two_municipios();
    let obitos = FakeEvents {
        name: "fake-sim",
        available: true,
        rows: vec![row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 1200}))],
    };
    let nascidos = FakeEvents::unavailable("fake-sinasc");
    let internacoes = FakeEvents::unavailable("fake-sih");
    let sources = PipelineSources {
        ibge: &ibge,
        obitos: &obitos,
        nascidos: &nascidos,
        internacoes: &internacoes,
        demas: None,
    };

    let summary = pipeline::run(&config, &storage, &sources, 2024, None, true).await?;
    assert_eq!(summary.municipios, 2);
    assert_eq!(summary.populacao, 2);
    assert_eq!(summary.gold, 2);

    assert_eq!(storage.municipio_count().await?, 2);
    let gold = storage.fetch_gold(Some(2024), 10).await?;
    assert_eq!(gold.len(), 2);

    let sp = gold.iter().find(|r| r.cod_mun_ibge_7 == "3550308").unwrap();
    assert_eq!(sp.total_obitos, 1200);
    assert_eq!(sp.taxa_obitos_100k, Some(10.0));
    // Unavailable sources leave fully-populated zero metrics, not nulls
    assert_eq!(sp.nascidos_vivos, 0);
    assert_eq!(sp.total_internacoes, 0);
    assert_eq!(sp.taxa_internacao_100k, Some(0.0));
    Ok(())
}

#[tokio::test]
async fn test_rerun_overwrites_gold_but_appends_population_history() -> Result<()> {
    let config = test_config();
    let storage = Storage::open_in_memory().await?;
    let ibge = FakeIbge::with_two_municipios();
    let obitos = FakeEvents::unavailable("fake-sim");
    let nascidos = FakeEvents::unavailable("fake-sinasc");
    let internacoes = FakeEvents::unavailable("fake-sih");
    let sources = PipelineSources {
        ibge: &ibge,
        obitos: &obitos,
        nascidos: &nascidos,
        internacoes: &internacoes,
        demas: None,
    };

    pipeline::run(&config, &storage, &sources, 2024, None, true).await?;
    pipeline::run(&config, &storage, &sources, 2024, None, true).await?;

    // Gold is idempotent by (code, year); silver population keeps history
    assert_eq!(storage.fetch_gold(Some(2024), 10).await?.len(), 2);
    assert_eq!(storage.population_load_count("3550308", 2024).await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_empty_registry_aborts_the_run() {
    let config = test_config();
    let storage = Storage::open_in_memory().await.unwrap();
    let ibge = FakeIbge { municipios: RawTable::new(), populacao: HashMap::new() };
    let obitos = FakeEvents::unavailable("fake-sim");
    let nascidos = FakeEvents::unavailable("fake-sinasc");
    let internacoes = FakeEvents::unavailable("fake-sih");
    let sources = PipelineSources {
        ibge: &ibge,
        obitos: &obitos,
        nascidos: &nascidos,
        internacoes: &internacoes,
        demas: None,
    };

    let result = pipeline::run(&config, &storage, &sources, 2024, None, true).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_population_falls_back_to_previous_year() -> Result<()> {
    let config = test_config();
    let storage = Storage::open_in_memory().await?;
    let mut ibge = FakeIbge::with_two_municipios();
    let rows_2023 = ibge.populacao.remove(&2024).unwrap();
    let rows_2023: RawTable = rows_2023
        .into_iter()
        .map(|mut r| {
            r.insert("ano".to_string(), json!(2023));
            r
        })
        .collect();
    ibge.populacao.insert(2023, rows_2023);

    let obitos = FakeEvents::unavailable("fake-sim");
    let nascidos = FakeEvents::unavailable("fake-sinasc");
    let internacoes = FakeEvents::unavailable("fake-sih");
    let sources = PipelineSources {
        ibge: &ibge,
        obitos: &obitos,
        nascidos: &nascidos,
        internacoes: &internacoes,
        demas: None,
    };

    let summary = pipeline::run(&config, &storage, &sources, 2024, None, true).await?;
    assert_eq!(summary.gold, 2);
    // Rows are labeled with the year actually used
    assert_eq!(storage.fetch_gold(Some(2023), 10).await?.len(), 2);
    assert!(storage.fetch_gold(Some(2024), 10).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_explicit_code_subset_bounds_the_spine() -> Result<()> {
    let config = test_config();
    let storage = Storage::open_in_memory().await?;
    let ibge = FakeIbge::with_two_municipios();
    let obitos = FakeEvents::unavailable("fake-sim");
    let nascidos = FakeEvents::unavailable("fake-sinasc");
    let internacoes = FakeEvents::unavailable("fake-sih");
    let sources = PipelineSources {
        ibge: &ibge,
        obitos: &obitos,
        nascidos: &nascidos,
        internacoes: &internacoes,
        demas: None,
    };

    let summary = pipeline::run(
        &config,
        &storage,
        &sources,
        2024,
        Some(vec!["3550308".to_string()]),
        false,
    )
    .await?;
    // Dimension keeps every municipality; the gold spine only the subset
    assert_eq!(summary.municipios, 2);
    assert_eq!(summary.gold, 1);
    Ok(())
}
