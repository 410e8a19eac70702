use integragov::transform::gold::health_indicators;
use integragov::schema::Row;
use serde_json::{Value, json};

fn row(value: Value) -> Row {
    serde_json::from_value(value).expect("row literal")
}

fn sp_population(populacao: i64) -> Vec<Row> {
    vec![row(json!({
        "cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": populacao
    }))]
}

#[test]
fn test_empty_population_yields_empty_output() {
    let obitos = vec![row(json!({"cod_mun_ibge_7": "3550308", "total_obitos": 10}))];
    let out = health_indicators(&[], Some(&obitos), None, None, Some(2024));
    assert!(out.is_empty());
}

/// Deaths joined onto the population spine, births absent
#[test]
fn test_death_rate_with_absent_birth_source() {
    let populacao = sp_population(12_000_000);
    let obitos = vec![row(json!({
        "cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 1000
    }))];
    let out = health_indicators(&populacao, Some(&obitos), None, None, Some(2024));

    assert_eq!(out.len(), 1);
    let r = &out[0];
    assert_eq!(r.cod_mun_ibge_7, "3550308");
    assert_eq!(r.ano, 2024);
    assert_eq!(r.populacao, 12_000_000);
    assert_eq!(r.total_obitos, 1000);
    assert_eq!(r.taxa_obitos_100k, Some(8.33));
    assert_eq!(r.nascidos_vivos, 0);
    assert_eq!(r.total_internacoes, 0);
    assert_eq!(r.taxa_internacao_100k, Some(0.0));
}

/// Zero population with matching events: undefined rate, not a division error
#[test]
fn test_zero_population_gives_undefined_rate() {
    let populacao = sp_population(0);
    let obitos = vec![row(json!({
        "cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 5
    }))];
    let out = health_indicators(&populacao, Some(&obitos), None, None, Some(2024));

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].total_obitos, 5);
    assert_eq!(out[0].taxa_obitos_100k, None);
}

/// Two pre-aggregated files for the same key/year are summed, not overwritten
#[test]
fn test_duplicate_metric_rows_are_summed() {
    let populacao = sp_population(100_000);
    let obitos = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 3})),
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 4})),
    ];
    let out = health_indicators(&populacao, Some(&obitos), None, None, Some(2024));
    assert_eq!(out[0].total_obitos, 7);
    assert_eq!(out[0].taxa_obitos_100k, Some(7.0));
}

/// A metric table without a pre-aggregated count column is counted row by row
#[test]
fn test_raw_event_rows_are_counted() {
    let populacao = sp_population(50_000);
    let nascidos = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "peso": 3200})),
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "peso": 2900})),
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "peso": 3500})),
    ];
    let out = health_indicators(&populacao, None, None, Some(&nascidos), Some(2024));
    assert_eq!(out[0].nascidos_vivos, 3);
    // Absent deaths and hospitalizations leave no nulls behind
    assert_eq!(out[0].total_obitos, 0);
    assert_eq!(out[0].taxa_obitos_100k, Some(0.0));
}

#[test]
fn test_duplicate_population_loads_collapse_to_max() {
    let populacao = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": 11_900_000})),
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": 12_000_000})),
    ];
    let out = health_indicators(&populacao, None, None, None, Some(2024));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].populacao, 12_000_000);
}

#[test]
fn test_inputs_filtered_to_target_year() {
    let populacao = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": 12_000_000})),
        row(json!({"cod_mun_ibge_7": "3304557", "ano": 2023, "populacao": 6_200_000})),
    ];
    let obitos = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2023, "total_obitos": 999})),
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 120})),
    ];
    let out = health_indicators(&populacao, Some(&obitos), None, None, Some(2024));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].total_obitos, 120);
}

/// A population row with no matching dimension entry is still retained —
/// the join is a lookup, not a constraint
#[test]
fn test_population_only_municipality_gets_zero_rates() {
    let populacao = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": 12_000_000})),
        row(json!({"cod_mun_ibge_7": "1100015", "ano": 2024, "populacao": 22_000})),
    ];
    let obitos = vec![row(json!({
        "cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 1000
    }))];
    let out = health_indicators(&populacao, Some(&obitos), None, None, Some(2024));
    assert_eq!(out.len(), 2);
    let small = out.iter().find(|r| r.cod_mun_ibge_7 == "1100015").unwrap();
    assert_eq!(small.total_obitos, 0);
    assert_eq!(small.taxa_obitos_100k, Some(0.0));
}

/// Identical inputs produce identical rows, modulo the load timestamp
#[test]
fn test_recomputation_is_deterministic() {
    let populacao = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "populacao": 12_000_000})),
        row(json!({"cod_mun_ibge_7": "3304557", "ano": 2024, "populacao": 6_200_000})),
    ];
    let obitos = vec![
        row(json!({"cod_mun_ibge_7": "3550308", "ano": 2024, "total_obitos": 1000})),
        row(json!({"cod_mun_ibge_7": "3304557", "ano": 2024, "total_obitos": 450})),
    ];
    let nascidos = vec![row(json!({
        "cod_mun_ibge_7": "3550308", "ano": 2024, "nascidos_vivos": 150_000
    }))];

    let first = health_indicators(&populacao, Some(&obitos), None, Some(&nascidos), Some(2024));
    let second = health_indicators(&populacao, Some(&obitos), None, Some(&nascidos), Some(2024));

    let first_keys: Vec<_> = first.iter().map(integragov::HealthIndicatorRow::comparable).collect();
    let second_keys: Vec<_> = second.iter().map(integragov::HealthIndicatorRow::comparable).collect();
    assert_eq!(first_keys, second_keys);
}
