use pac_analyzer::*;

const HEADER: &str = "Progr.financiación,Centro gestor,Per.presup.,Pos.presupuestaria,Fondos,PAC inicial,PAC Actual,PAC Reprogramado,Girado y Recaudado PAC,Disponibilidad PAC";

fn analyze(records: Vec<BudgetRecord>) -> AnalysisResult {
    let table = BudgetTable::from_records(records);
    PacAnalyzer::default()
        .analyze_table(&table, Vec::new())
        .unwrap()
}

fn record(center: &str, period: i64, current: f64, disbursed: f64) -> BudgetRecord {
    BudgetRecord::new(center, PeriodKey::Code(period), current, disbursed).with_fund_type("SGP")
}

fn municipal_records() -> Vec<BudgetRecord> {
    vec![
        record("Salud", 202401, 1_200_000.0, 1_000_000.0).with_initial_allocation(1_000_000.0),
        record("Educación", 202401, 800_000.0, 300_000.0).with_initial_allocation(800_000.0),
        record("Salud", 202402, 500_000.0, 520_000.0).with_initial_allocation(600_000.0),
        record("Obras", 202403, 0.0, 0.0),
        BudgetRecord::new("Cultura", PeriodKey::Code(202402), 150_000.0, 90_000.0),
        record("Educación", 202403, 350_000.0, 350_000.0),
    ]
}

#[test]
fn test_by_period_partitions_total_allocation() {
    let result = analyze(municipal_records());

    let by_period_total: f64 = result.by_period.iter().map(|p| p.current_allocation).sum();
    assert!((by_period_total - result.availability.total_allocation).abs() < 1e-6);

    let by_center_total: f64 = result.by_center.iter().map(|c| c.current_allocation).sum();
    assert!((by_center_total - result.availability.total_allocation).abs() < 1e-6);

    // Cultura has no fund type and only drops out of the by-fund view.
    let by_fund_total: f64 = result.by_fund.iter().map(|f| f.current_allocation).sum();
    assert!((by_fund_total - (result.availability.total_allocation - 150_000.0)).abs() < 1e-6);
}

#[test]
fn test_zero_allocation_never_produces_nan() {
    let result = analyze(municipal_records());

    let exec_col = result
        .detailed
        .column_position(DetailColumn::ExecutionPct)
        .unwrap();
    for row in &result.detailed.rows {
        match &row[exec_col] {
            CellValue::Number(pct) => assert!(pct.is_finite()),
            other => panic!("execution cell should be numeric, got {:?}", other),
        }
    }

    let obras = result.by_center.iter().find(|c| c.key == "Obras").unwrap();
    assert_eq!(obras.execution_pct, 0.0);
    assert!(result.execution.mean_execution_pct.is_finite());
}

#[test]
fn test_overrun_boundary() {
    // Educación 202403 is fully executed: availability exactly 0.
    let result = analyze(municipal_records());

    assert_eq!(result.availability.overrun_count, 1);
    assert!((result.availability.overrun_total + 20_000.0).abs() < 1e-9);
}

#[test]
fn test_execution_tiers_are_exhaustive() {
    let result = analyze(municipal_records());
    let tiers = &result.execution;

    assert_eq!(tiers.total_records, 6);
    assert_eq!(tiers.high + tiers.medium + tiers.low, tiers.total_records);
    // 83.3, 37.5, 104, 0, 60, 100
    assert_eq!(tiers.high, 3);
    assert_eq!(tiers.medium, 1);
    assert_eq!(tiers.low, 2);
}

#[test]
fn test_pipeline_is_idempotent() {
    let mut dataset = Dataset::new(HEADER.split(','));
    for (center, period, current, disbursed) in [
        ("112", "202401", "1000", "400"),
        ("210", "202402", "500", "700"),
        ("112", "202402", "0", "0"),
    ] {
        dataset.push_row(vec![
            Cell::from("FP"),
            center.into(),
            period.into(),
            "2.1".into(),
            "Propios".into(),
            current.into(),
            current.into(),
            current.into(),
            disbursed.into(),
            Cell::Empty,
        ]);
    }

    let first = run_analysis(&dataset).unwrap().to_json().unwrap();
    let second = run_analysis(&dataset).unwrap().to_json().unwrap();
    assert_eq!(first, second);

    let report_a = render_report(&run_analysis(&dataset).unwrap());
    let report_b = render_report(&run_analysis(&dataset).unwrap());
    assert_eq!(report_a, report_b);
}

#[test]
fn test_grouped_views_sorted_with_stable_ties() {
    let result = analyze(vec![
        record("B", 202401, 300.0, 0.0),
        record("A", 202401, 500.0, 0.0),
        record("C", 202401, 300.0, 0.0),
        record("D", 202401, 100.0, 0.0),
        record("B", 202402, 0.0, 0.0),
    ]);

    let keys: Vec<&str> = result.by_center.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(keys, vec!["A", "B", "C", "D"]);
    for pair in result.by_center.windows(2) {
        assert!(pair[0].current_allocation >= pair[1].current_allocation);
    }
}

#[test]
fn test_two_record_scenario() {
    let result = analyze(vec![
        record("A", 202401, 100.0, 50.0),
        record("A", 202401, 0.0, 0.0),
    ]);

    assert_eq!(result.by_period.len(), 1);
    let period = &result.by_period[0];
    assert_eq!(period.period, PeriodKey::Code(202401));
    assert!((period.current_allocation - 100.0).abs() < 1e-9);
    assert!((period.disbursed - 50.0).abs() < 1e-9);
    assert!((period.execution_pct - 50.0).abs() < 1e-9);

    let exec_col = result
        .detailed
        .column_position(DetailColumn::ExecutionPct)
        .unwrap();
    assert_eq!(result.detailed.rows[1][exec_col], CellValue::Number(0.0));
}

#[test]
fn test_overrun_scenario_reaches_interpretations() {
    let result = analyze(vec![record("A", 202401, 200.0, 250.0)]);

    assert_eq!(result.availability.overrun_count, 1);
    assert!((result.availability.overrun_total + 50.0).abs() < 1e-9);

    let alert = &result.interpretations[1];
    assert_eq!(alert.category, Category::OverrunAlert);
    assert_eq!(alert.status, Status::Critical);
    assert!(alert.narrative.contains("$50"));
}

#[test]
fn test_top_three_centers_concentration() {
    let result = analyze(vec![
        record("Salud", 202401, 500.0, 100.0),
        record("Educación", 202401, 300.0, 100.0),
        record("Obras", 202401, 200.0, 100.0),
    ]);

    let top = result.interpretations.last().unwrap();
    assert_eq!(top.category, Category::TopCenters);
    assert_eq!(top.status, Status::Info);
    assert!(top.narrative.contains("Salud, Educación, Obras"));
    assert!(top.narrative.contains("100.0%"));
}

#[test]
fn test_top_centers_needs_three_rows() {
    let result = analyze(vec![
        record("Salud", 202401, 500.0, 100.0),
        record("Educación", 202401, 300.0, 100.0),
    ]);

    assert!(result
        .interpretations
        .iter()
        .all(|i| i.category != Category::TopCenters));
    // Summary, best period, distribution.
    assert_eq!(result.interpretations.len(), 3);
}

#[test]
fn test_report_sections_and_workbook() {
    let result = analyze(municipal_records());
    let report = render_report(&result);

    let kinds: Vec<SectionKind> = report.sections.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, SectionKind::ORDER.to_vec());

    let summary = report.section(SectionKind::ExecutiveSummary).unwrap();
    assert_eq!(summary.rows.len(), 6);
    assert_eq!(summary.display_rows()[0][1], "$3,000,000");

    let interpretations = report.section(SectionKind::Interpretations).unwrap();
    assert_eq!(interpretations.rows.len(), result.interpretations.len());
    assert!(interpretations.wrap_text);

    let bytes = report.to_xlsx_bytes().unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn test_csv_end_to_end() -> anyhow::Result<()> {
    let csv = format!(
        "{}\n\
         FP-01,112,202401,2.1.1,SGP,1000,1000,1000,900,100\n\
         FP-01,112,202402,2.1.1,SGP,1000,800,800,200,600\n\
         FP-02,210,202401,2.1.2,Propios,300,300,300,350,-50\n\
         FP-02,,202401,2.1.2,Propios,300,300,300,0,300\n",
        HEADER
    );

    let dataset = Dataset::from_csv_reader(csv.as_bytes())?;
    let result = run_analysis(&dataset)?;

    assert_eq!(result.record_count, 3);
    assert_eq!(result.by_period[0].period, PeriodKey::Code(202401));
    assert!((result.by_period[0].current_allocation - 1300.0).abs() < 1e-9);
    assert_eq!(result.by_fund[0].key, "SGP");
    assert_eq!(result.availability.overrun_count, 1);
    assert!(result.warnings.is_empty());

    let report = render_report(&result);
    let detailed = report.section(SectionKind::DetailedAnalysis).unwrap();
    assert_eq!(detailed.columns.len(), 11);
    assert_eq!(detailed.columns[6].role, FormatRole::Currency);
    assert_eq!(detailed.columns[10].role, FormatRole::Percent { decimals: 2 });
    Ok(())
}

#[test]
fn test_missing_fund_column_aborts_run() {
    let header = HEADER.replace(",Fondos", "");
    let csv = format!("{}\nFP-01,112,202401,2.1.1,1000,1000,1000,900,100\n", header);

    let dataset = Dataset::from_csv_reader(csv.as_bytes()).unwrap();
    match run_analysis(&dataset) {
        Err(PacError::MissingColumn { column, .. }) => assert_eq!(column, "Fondos"),
        other => panic!("expected MissingColumn, got {:?}", other),
    }
}

#[test]
fn test_non_numeric_amount_aborts_run() {
    let csv = format!(
        "{}\n\
         FP-01,112,202401,2.1.1,SGP,1000,1000,1000,900,100\n\
         FP-01,112,202402,2.1.1,SGP,1000,1000,1000,n/a,100\n",
        HEADER
    );

    let dataset = Dataset::from_csv_reader(csv.as_bytes()).unwrap();
    match run_analysis(&dataset) {
        Err(PacError::DataFormat { row, column, value }) => {
            assert_eq!(row, 2);
            assert_eq!(column, "Girado y Recaudado PAC");
            assert_eq!(value, "n/a");
        }
        other => panic!("expected DataFormat, got {:?}", other),
    }
}

#[test]
fn test_login_gate_from_config() {
    let config = AnalyzerConfig::from_json_str(
        r#"{
            "lockout": { "max_attempts": 2, "lock_minutes": 1 },
            "users": {
                "tesoreria": {
                    "password": "pac",
                    "role": "Tesorero",
                    "permissions": ["analisis_pac"]
                }
            }
        }"#,
    )
    .unwrap();
    let store = StaticCredentialStore::new(&config.users);
    let now = chrono::Utc::now();

    let (session, outcome) = Session::new().login(&store, &config.lockout, "tesoreria", "x", now);
    assert_eq!(outcome, LoginOutcome::Rejected { remaining: 1 });

    let (session, outcome) = session.login(&store, &config.lockout, "tesoreria", "y", now);
    assert!(matches!(outcome, LoginOutcome::LockedOut { .. }));

    let (session, outcome) = session.login(&store, &config.lockout, "Tesoreria", "pac", now);
    assert_eq!(outcome, LoginOutcome::Locked { remaining_secs: 60 });
    assert!(session.authorize(Permission::PacAnalysis).is_err());
}
