//! Local relational store (SQLite).
//!
//! One dimension table (`dim_municipio`, upsert by code), an append-only
//! standardized-population table (`silver_ibge_populacao`, history kept per
//! load timestamp), a generic silver indicator table and the gold indicator
//! table (`gold_indicadores_saude_municipio`, upsert by (code, year)).

pub mod snapshot;

use std::path::Path;

use log::info;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row as SqlxRow;

use crate::Result;
use crate::model::{DatasusIndicatorRow, HealthIndicatorRow, MunicipioRecord, PopulationRow};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS dim_municipio (
        cod_mun_ibge_7 TEXT PRIMARY KEY,
        nome_municipio TEXT,
        sigla_uf TEXT,
        cod_uf INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS silver_ibge_populacao (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cod_mun_ibge_7 TEXT NOT NULL,
        ano INTEGER NOT NULL,
        populacao INTEGER,
        data_carga TEXT
    )",
    "CREATE TABLE IF NOT EXISTS silver_datasus_indicadores (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cod_mun_ibge_7 TEXT,
        ano INTEGER,
        mes INTEGER,
        indicador TEXT,
        valor REAL,
        unidade TEXT,
        data_carga TEXT
    )",
    "CREATE TABLE IF NOT EXISTS gold_indicadores_saude_municipio (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        cod_mun_ibge_7 TEXT NOT NULL,
        ano INTEGER NOT NULL,
        populacao INTEGER,
        total_internacoes INTEGER,
        total_obitos INTEGER,
        nascidos_vivos INTEGER,
        taxa_internacao_100k REAL,
        taxa_obitos_100k REAL,
        data_carga TEXT,
        UNIQUE (cod_mun_ibge_7, ano)
    )",
    "CREATE INDEX IF NOT EXISTS idx_silver_pop_cod_ano
        ON silver_ibge_populacao (cod_mun_ibge_7, ano)",
    "CREATE INDEX IF NOT EXISTS idx_silver_datasus_cod_ano
        ON silver_datasus_indicadores (cod_mun_ibge_7, ano)",
    "CREATE INDEX IF NOT EXISTS idx_gold_cod_ano
        ON gold_indicadores_saude_municipio (cod_mun_ibge_7, ano)",
];

/// Handle to the local SQLite store
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (creating if needed) the database at `db_path` and ensure the
    /// schema exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        Self::connect(&url).await
    }

    /// Open a throwaway in-memory database (tests)
    pub async fn open_in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn connect(url: &str) -> Result<Self> {
        // Single-writer batch process: one connection is enough and keeps
        // in-memory databases coherent across queries.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Upsert the municipality dimension table (last write wins per code)
    pub async fn upsert_municipios(&self, registros: &[MunicipioRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for registro in registros {
            sqlx::query(
                "INSERT INTO dim_municipio (cod_mun_ibge_7, nome_municipio, sigla_uf, cod_uf)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(cod_mun_ibge_7) DO UPDATE SET
                     nome_municipio = excluded.nome_municipio,
                     sigla_uf = excluded.sigla_uf,
                     cod_uf = excluded.cod_uf",
            )
            .bind(&registro.cod_mun_ibge_7)
            .bind(&registro.nome_municipio)
            .bind(&registro.sigla_uf)
            .bind(registro.cod_uf)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!("dim_municipio: {} records", registros.len());
        Ok(registros.len() as u64)
    }

    /// Append standardized population rows (history preserved across loads)
    pub async fn insert_population(
        &self,
        rows: &[PopulationRow],
        data_carga: &str,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO silver_ibge_populacao (cod_mun_ibge_7, ano, populacao, data_carga)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&row.cod_mun_ibge_7)
            .bind(row.ano)
            .bind(row.populacao)
            .bind(data_carga)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!("silver_ibge_populacao: {} records", rows.len());
        Ok(rows.len() as u64)
    }

    /// Append generic silver indicator observations
    pub async fn insert_datasus_indicadores(
        &self,
        rows: &[DatasusIndicatorRow],
        data_carga: &str,
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO silver_datasus_indicadores
                     (cod_mun_ibge_7, ano, mes, indicador, valor, unidade, data_carga)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.cod_mun_ibge_7)
            .bind(row.ano)
            .bind(row.mes)
            .bind(&row.indicador)
            .bind(row.valor)
            .bind(&row.unidade)
            .bind(data_carga)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!("silver_datasus_indicadores: {} records", rows.len());
        Ok(rows.len() as u64)
    }

    /// Upsert gold indicator rows by (code, year): re-running a year
    /// overwrites its rows instead of duplicating them
    pub async fn upsert_gold(&self, rows: &[HealthIndicatorRow]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO gold_indicadores_saude_municipio
                     (cod_mun_ibge_7, ano, populacao, total_internacoes, total_obitos,
                      nascidos_vivos, taxa_internacao_100k, taxa_obitos_100k, data_carga)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(cod_mun_ibge_7, ano) DO UPDATE SET
                     populacao = excluded.populacao,
                     total_internacoes = excluded.total_internacoes,
                     total_obitos = excluded.total_obitos,
                     nascidos_vivos = excluded.nascidos_vivos,
                     taxa_internacao_100k = excluded.taxa_internacao_100k,
                     taxa_obitos_100k = excluded.taxa_obitos_100k,
                     data_carga = excluded.data_carga",
            )
            .bind(&row.cod_mun_ibge_7)
            .bind(row.ano)
            .bind(row.populacao)
            .bind(row.total_internacoes)
            .bind(row.total_obitos)
            .bind(row.nascidos_vivos)
            .bind(row.taxa_internacao_100k)
            .bind(row.taxa_obitos_100k)
            .bind(&row.data_carga)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!("Gold: {} records persisted", rows.len());
        Ok(rows.len() as u64)
    }

    /// Look up one municipality in the dimension table
    pub async fn fetch_municipio(&self, codigo: &str) -> Result<Option<MunicipioRecord>> {
        let row = sqlx::query(
            "SELECT cod_mun_ibge_7, nome_municipio, sigla_uf, cod_uf
             FROM dim_municipio WHERE cod_mun_ibge_7 = ?",
        )
        .bind(codigo)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| MunicipioRecord {
            cod_mun_ibge_7: row.get("cod_mun_ibge_7"),
            nome_municipio: row.get::<Option<String>, _>("nome_municipio").unwrap_or_default(),
            sigla_uf: row.get::<Option<String>, _>("sigla_uf").unwrap_or_default(),
            cod_uf: row.get("cod_uf"),
        }))
    }

    /// Number of rows in the dimension table
    pub async fn municipio_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dim_municipio")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Names of the persisted gold tables
    pub async fn gold_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name LIKE 'gold_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect())
    }

    /// Read gold indicator rows, most populous municipalities first
    pub async fn fetch_gold(&self, ano: Option<i32>, limit: i64) -> Result<Vec<HealthIndicatorRow>> {
        let query = match ano {
            Some(ano) => sqlx::query(
                "SELECT cod_mun_ibge_7, ano, populacao, total_internacoes, total_obitos,
                        nascidos_vivos, taxa_internacao_100k, taxa_obitos_100k, data_carga
                 FROM gold_indicadores_saude_municipio
                 WHERE ano = ? ORDER BY populacao DESC LIMIT ?",
            )
            .bind(ano)
            .bind(limit),
            None => sqlx::query(
                "SELECT cod_mun_ibge_7, ano, populacao, total_internacoes, total_obitos,
                        nascidos_vivos, taxa_internacao_100k, taxa_obitos_100k, data_carga
                 FROM gold_indicadores_saude_municipio
                 ORDER BY populacao DESC LIMIT ?",
            )
            .bind(limit),
        };
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .iter()
            .map(|row| HealthIndicatorRow {
                cod_mun_ibge_7: row.get("cod_mun_ibge_7"),
                ano: row.get("ano"),
                populacao: row.get::<Option<i64>, _>("populacao").unwrap_or(0),
                total_internacoes: row.get::<Option<i64>, _>("total_internacoes").unwrap_or(0),
                total_obitos: row.get::<Option<i64>, _>("total_obitos").unwrap_or(0),
                nascidos_vivos: row.get::<Option<i64>, _>("nascidos_vivos").unwrap_or(0),
                taxa_internacao_100k: row.get("taxa_internacao_100k"),
                taxa_obitos_100k: row.get("taxa_obitos_100k"),
                data_carga: row.get::<Option<String>, _>("data_carga").unwrap_or_default(),
            })
            .collect())
    }

    /// Number of distinct load timestamps in the population history for one
    /// (code, year) — evidence that re-ingestion appends rather than
    /// overwrites
    pub async fn population_load_count(&self, codigo: &str, ano: i32) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM silver_ibge_populacao WHERE cod_mun_ibge_7 = ? AND ano = ?",
        )
        .bind(codigo)
        .bind(ano)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
