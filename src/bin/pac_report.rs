//! Runs a PAC analysis over an export and writes the formatted report.

use anyhow::{bail, Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use pac_analyzer::{
    format_currency, format_percent, render_report, report_file_name, AnalyzerConfig,
    LoginOutcome, PacAnalyzer, Permission, Session, StaticCredentialStore,
};
use std::path::PathBuf;

const PASSWORD_VAR: &str = "PAC_PASSWORD";

#[derive(Parser)]
#[command(name = "pac-report")]
#[command(about = "Análisis del Plan Anual de Caja (PAC)")]
#[command(long_about = "Reads a PAC export (CSV or Excel), computes execution views and findings, and writes a formatted Excel report")]
struct Cli {
    /// PAC export (.csv, .xlsx, .xls)
    #[arg(short, long)]
    input: PathBuf,
    /// JSON configuration with column names, lockout policy and users
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Worksheet to read from Excel inputs (overrides the config)
    #[arg(long)]
    sheet: Option<String>,
    /// Report path; defaults to ANALISIS_PAC_<timestamp>.xlsx
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Also write the analysis result as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Login user, required when the config declares users
    #[arg(short, long)]
    user: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::from_path(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };
    if let Some(sheet) = &cli.sheet {
        config.data_sheet = sheet.clone();
    }

    if !config.users.is_empty() {
        authenticate(&config, cli.user.as_deref())?;
    }

    let analyzer = PacAnalyzer::new(config);
    let dataset = analyzer
        .load_dataset(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    let result = analyzer.run(&dataset)?;

    let disp = &result.availability;
    println!("📊 Registros analizados: {}", result.record_count);
    println!("   PAC Total:            {}", format_currency(disp.total_allocation));
    println!("   Girado y Recaudado:   {}", format_currency(disp.total_disbursed));
    println!("   Disponibilidad:       {}", format_currency(disp.total_available));
    println!("   % Ejecución:          {}", format_percent(disp.execution_pct, 1));
    println!("   Registros sobregiro:  {}", disp.overrun_count);
    println!();
    for finding in &result.interpretations {
        println!("{} [{}] {}", finding.status, finding.category, finding.finding);
    }
    for warning in &result.warnings {
        println!("⚠️  {}", warning);
    }

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(report_file_name(Local::now().naive_local())));
    render_report(&result)
        .save_xlsx(&output)
        .with_context(|| format!("Failed to write report {}", output.display()))?;
    println!("\n✅ Reporte generado: {}", output.display());

    if let Some(path) = &cli.json {
        std::fs::write(path, result.to_json()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✅ Resultado JSON: {}", path.display());
    }

    Ok(())
}

fn authenticate(config: &AnalyzerConfig, user: Option<&str>) -> Result<()> {
    let Some(user) = user else {
        bail!("--user is required when the configuration declares users");
    };
    let password = std::env::var(PASSWORD_VAR)
        .with_context(|| format!("{} must hold the password for '{}'", PASSWORD_VAR, user))?;

    let store = StaticCredentialStore::new(&config.users);
    let (session, outcome) =
        Session::new().login(&store, &config.lockout, user, &password, Utc::now());

    match outcome {
        LoginOutcome::Granted => {
            let active = session.authorize(Permission::PacAnalysis)?;
            println!("✓ Bienvenido {} ({})", active.username, active.role);
            Ok(())
        }
        LoginOutcome::Rejected { .. } => bail!("Invalid credentials for '{}'", user),
        LoginOutcome::Locked { remaining_secs } => {
            bail!("Account locked, retry in {} seconds", remaining_secs)
        }
        LoginOutcome::LockedOut { until } => bail!("Account locked until {}", until),
    }
}
