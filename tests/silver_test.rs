use integragov::schema::{MUNICIPIO_CODE_COLUMN, RawTable, Row};
use integragov::transform::silver;
use serde_json::{Value, json};

fn row(value: Value) -> Row {
    serde_json::from_value(value).expect("row literal")
}

fn codes(table: &RawTable) -> Vec<&str> {
    table
        .iter()
        .filter_map(|r| r.get(MUNICIPIO_CODE_COLUMN).and_then(Value::as_str))
        .collect()
}

#[test]
fn test_normalizes_canonical_column_in_place() {
    let table = vec![
        row(json!({"cod_mun_ibge_7": 355030, "populacao": 100})),
        row(json!({"cod_mun_ibge_7": "3550308", "populacao": 200})),
    ];
    let clean = silver::standardize_municipio_code(table, None);
    assert_eq!(codes(&clean), vec!["0355030", "3550308"]);
}

#[test]
fn test_adopts_first_alias_present() {
    let table = vec![
        row(json!({"CODMUN": 3106200, "x": 1})),
        row(json!({"CODMUN": "310620", "x": 2})),
    ];
    let clean = silver::standardize_municipio_code(table, None);
    assert_eq!(codes(&clean), vec!["3106200", "0310620"]);
}

#[test]
fn test_explicit_hint_takes_priority_over_aliases() {
    let table = vec![row(json!({"municipio_residencia": 3550308, "CODMUN": 1100015}))];
    let clean = silver::standardize_municipio_code(table, Some("municipio_residencia"));
    assert_eq!(codes(&clean), vec!["3550308"]);
}

#[test]
fn test_no_candidate_column_returns_table_unchanged() {
    let table = vec![row(json!({"nome": "São Paulo", "valor": 10}))];
    let clean = silver::standardize_municipio_code(table.clone(), None);
    assert_eq!(clean, table);
}

#[test]
fn test_drops_rows_with_invalid_keys_and_never_grows() {
    let table = vec![
        row(json!({"cod_mun_ibge_7": "3550308"})),
        row(json!({"cod_mun_ibge_7": "12345"})),
        row(json!({"cod_mun_ibge_7": null})),
        row(json!({"cod_mun_ibge_7": "abc"})),
        row(json!({"cod_mun_ibge_7": 355030})),
    ];
    let before = table.len();
    let clean = silver::standardize_municipio_code(table, None);
    assert!(clean.len() <= before);
    assert_eq!(codes(&clean), vec!["3550308", "0355030"]);
}

#[test]
fn test_valid_rows_keep_their_other_columns_untouched() {
    let table = vec![row(json!({
        "cod_mun_ibge_7": "3550308",
        "nome_municipio": "São Paulo",
        "populacao": 12_000_000
    }))];
    let clean = silver::standardize_municipio_code(table, None);
    assert_eq!(clean[0]["nome_municipio"], json!("São Paulo"));
    assert_eq!(clean[0]["populacao"], json!(12_000_000));
}

#[test]
fn test_filter_year_passes_tables_without_year_column() {
    let table = vec![row(json!({"cod_mun_ibge_7": "3550308"}))];
    assert_eq!(silver::filter_year(table.clone(), 2024), table);

    let table = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024})),
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2023})),
    ];
    let filtered = silver::filter_year(table, 2024);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0]["ano"], json!(2024));
}

#[test]
fn test_parse_municipios_tolerates_missing_state_fields() {
    let table = silver::standardize_municipio_code(
        vec![
            row(json!({"cod_mun_ibge_7": "3550308", "nome_municipio": "São Paulo",
                       "sigla_uf": "SP", "cod_uf": 35})),
            row(json!({"cod_mun_ibge_7": "3304557", "nome_municipio": "Rio de Janeiro"})),
        ],
        None,
    );
    let registros = silver::parse_municipios(&table);
    assert_eq!(registros.len(), 2);
    assert_eq!(registros[0].cod_uf, Some(35));
    assert_eq!(registros[1].sigla_uf, "");
    assert_eq!(registros[1].cod_uf, None);
}

#[test]
fn test_parse_population_coerces_loose_numbers_and_labels_year() {
    let table = silver::standardize_municipio_code(
        vec![
            row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": "12.000.000"})),
            row(json!({"cod_mun_ibge_7": "3304557", "populacao": 6_200_000.0})),
            row(json!({"cod_mun_ibge_7": "3106200", "ano": 2024, "populacao": "..."})),
        ],
        None,
    );
    let rows = silver::parse_population(&table, 2024);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].populacao, Some(12_000_000));
    assert_eq!(rows[1].ano, 2024);
    assert_eq!(rows[1].populacao, Some(6_200_000));
    assert_eq!(rows[2].populacao, None);
}

#[test]
fn test_parse_datasus_indicators_counts_rows_per_municipality() {
    let table = silver::standardize_municipio_code(
        vec![
            row(json!({"codigo_ibge": 3550308, "dose": "1a"})),
            row(json!({"codigo_ibge": 3550308, "dose": "2a"})),
            row(json!({"codigo_ibge": 3304557, "dose": "1a"})),
        ],
        None,
    );
    let rows = silver::parse_datasus_indicators(&table, 2024, "doses_aplicadas_pni", "doses");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].cod_mun_ibge_7, "3304557");
    assert_eq!(rows[0].valor, 1.0);
    assert_eq!(rows[1].valor, 2.0);
    assert_eq!(rows[1].indicador, "doses_aplicadas_pni");
}
