use clap::{Parser, Subcommand};
use log::{info, warn};

use integragov::connector::{DatasusFilesSource, DemasClient, IbgeConnector, VitalEventKind};
use integragov::pipeline::{self, PipelineSources};
use integragov::{PipelineConfig, Result, Storage};

#[derive(Parser)]
#[command(name = "integragov", about = "Municipal health and demography indicators pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Bronze → Silver → Gold pipeline for one reference year
    Run {
        /// Reference year
        #[arg(long, default_value_t = 2024)]
        ano: i32,
        /// Number of municipalities in the population sample
        #[arg(long, value_name = "N")]
        amostra: Option<usize>,
        /// Query every municipality (can be slow)
        #[arg(long)]
        todos_municipios: bool,
        /// Explicit municipality codes to query for population
        #[arg(long, value_delimiter = ',')]
        municipios: Vec<String>,
        /// Also pull PNI vaccination doses from DEMAS
        #[arg(long)]
        pni: bool,
        /// Skip writing parquet/JSON snapshots of each layer
        #[arg(long)]
        sem_snapshots: bool,
    },
    /// Show persisted gold indicator rows
    Show {
        /// Restrict to one reference year
        #[arg(long)]
        ano: Option<i32>,
        /// Maximum number of rows to print
        #[arg(long, default_value_t = 20)]
        limite: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::default();

    match cli.command {
        Command::Run {
            ano,
            amostra,
            todos_municipios,
            municipios,
            pni,
            sem_snapshots,
        } => {
            if let Some(n) = amostra {
                config.population_sample_size = n;
            }
            config.include_pni = pni;
            config.write_snapshots = !sem_snapshots;

            let storage = Storage::open(&config.db_path).await?;
            let ibge = IbgeConnector::new(&config)?;
            let obitos = DatasusFilesSource::new(&config, VitalEventKind::Deaths);
            let nascidos = DatasusFilesSource::new(&config, VitalEventKind::Births);
            let internacoes = DatasusFilesSource::new(&config, VitalEventKind::Hospitalizations);
            let demas = DemasClient::new(&config)?;
            let sources = PipelineSources {
                ibge: &ibge,
                obitos: &obitos,
                nascidos: &nascidos,
                internacoes: &internacoes,
                demas: Some(&demas),
            };

            let codigos = if municipios.is_empty() { None } else { Some(municipios) };
            let summary =
                pipeline::run(&config, &storage, &sources, ano, codigos, todos_municipios).await?;
            info!(
                "Done: {} municipalities, {} population rows, {} gold rows",
                summary.municipios, summary.populacao, summary.gold
            );
        }
        Command::Show { ano, limite } => {
            if !config.db_path.exists() {
                warn!("No data available; run the pipeline first (integragov run)");
                return Ok(());
            }
            let storage = Storage::open(&config.db_path).await?;
            let tables = storage.gold_tables().await?;
            if tables.is_empty() {
                warn!("No gold tables found; run the pipeline first (integragov run)");
                return Ok(());
            }
            let rows = storage.fetch_gold(ano, limite).await?;
            if rows.is_empty() {
                warn!("No data available; run the pipeline first (integragov run)");
                return Ok(());
            }
            println!(
                "{:<9} {:>6} {:>12} {:>10} {:>10} {:>10} {:>14} {:>14}",
                "codigo", "ano", "populacao", "internac.", "obitos", "nascidos", "tx_intern_100k", "tx_obitos_100k"
            );
            for row in rows {
                println!(
                    "{:<9} {:>6} {:>12} {:>10} {:>10} {:>10} {:>14} {:>14}",
                    row.cod_mun_ibge_7,
                    row.ano,
                    row.populacao,
                    row.total_internacoes,
                    row.total_obitos,
                    row.nascidos_vivos,
                    row.taxa_internacao_100k
                        .map_or_else(|| "-".to_string(), |r| format!("{r:.2}")),
                    row.taxa_obitos_100k
                        .map_or_else(|| "-".to_string(), |r| format!("{r:.2}")),
                );
            }
        }
    }
    Ok(())
}
