//! # PAC Analyzer
//!
//! Analysis of a municipal cash-flow budget export (PAC, *Plan Anual de
//! Caja*) into grouped execution views, rule-based findings and a
//! formatted multi-sheet report.
//!
//! ## Core Concepts
//!
//! - **Dataset**: the raw export, one row per budget line, columns resolved by header name
//! - **Budget Record**: a cleaned row with typed period, center and money amounts
//! - **Execution %**: disbursed over current allocation, exactly 0 when the allocation is 0
//! - **Overrun**: a record whose availability (current allocation minus disbursed) is negative
//! - **Report**: six ordered sections, rendered to `.xlsx` by [`Report::to_xlsx_bytes`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use pac_analyzer::*;
//!
//! let dataset = Dataset::from_csv_path("pac_2024.csv")?;
//! let result = run_analysis(&dataset)?;
//!
//! for finding in &result.interpretations {
//!     println!("{}: {}", finding.category, finding.finding);
//! }
//!
//! render_report(&result).save_xlsx("ANALISIS_PAC.xlsx")?;
//! ```

pub mod access;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod interpretation;
pub mod report;
pub mod schema;
pub mod utils;
pub mod views;
pub mod xlsx;

pub use access::{
    AccessEntry, AccessResult, ActiveUser, CredentialStore, Grant, LockoutPolicy, LoginOutcome,
    Permission, Session, StaticCredentialStore, UserEntry,
};
pub use config::{AnalyzerConfig, ColumnNames};
pub use engine::{Aggregator, DETAIL_COLUMNS, HIGH_EXECUTION_PCT, MEDIUM_EXECUTION_PCT};
pub use error::{PacError, Result};
pub use ingestion::clean;
pub use interpretation::{generate_interpretations, Category, ExecutionLevel, Interpretation, Status};
pub use report::{Report, ReportCell, Section, SectionKind};
pub use schema::*;
pub use utils::*;
pub use views::*;
pub use xlsx::report_file_name;

use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything one run computes from a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// Records left after cleaning.
    pub record_count: usize,
    pub detailed: DetailedView,
    pub by_period: Vec<PeriodSummary>,
    /// Descending by current allocation.
    pub by_center: Vec<GroupSummary>,
    /// Descending by current allocation.
    pub by_fund: Vec<GroupSummary>,
    pub availability: AvailabilityAnalysis,
    pub execution: ExecutionTiers,
    /// Fixed rule order.
    pub interpretations: Vec<Interpretation>,
    #[serde(default)]
    pub warnings: Vec<AnalysisWarning>,
}

impl AnalysisResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AnalysisResult)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PacAnalyzer {
    config: AnalyzerConfig,
}

impl PacAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Reads `.xlsx`/`.xls`/`.ods` through the configured data sheet and
    /// anything else as CSV.
    pub fn load_dataset<P: AsRef<Path>>(&self, path: P) -> Result<Dataset> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let dataset = match extension.as_deref() {
            Some("xlsx" | "xlsm" | "xls" | "ods") => {
                Dataset::from_xlsx_path(path, &self.config.data_sheet)?
            }
            _ => Dataset::from_csv_path(path)?,
        };

        info!(
            "Loaded {} rows x {} columns from {}",
            dataset.len(),
            dataset.columns.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn run(&self, dataset: &Dataset) -> Result<AnalysisResult> {
        info!("Starting PAC analysis over {} input rows", dataset.len());
        let (table, warnings) = clean(dataset, &self.config.columns)?;
        self.analyze_table(&table, warnings)
    }

    /// Runs every view and rule over an already cleaned table. Any fatal
    /// error aborts the whole run.
    pub fn analyze_table(
        &self,
        table: &BudgetTable,
        mut warnings: Vec<AnalysisWarning>,
    ) -> Result<AnalysisResult> {
        let aggregator = Aggregator::new(table);

        let (detailed, detail_warnings) = aggregator.detailed_view();
        warnings.extend(detail_warnings);

        let by_period = aggregator.by_period()?;
        let by_center = aggregator.by_center()?;
        let by_fund = aggregator.by_fund()?;
        let availability = aggregator.availability()?;
        let execution = aggregator.execution_tiers()?;
        debug!(
            "Views computed: {} periods, {} centers, {} funds",
            by_period.len(),
            by_center.len(),
            by_fund.len()
        );

        let interpretations =
            generate_interpretations(&availability, &execution, &by_period, &by_center);

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            "Analysis complete: {} records, {:.1}% executed, {} findings",
            table.len(),
            availability.execution_pct,
            interpretations.len()
        );

        Ok(AnalysisResult {
            record_count: table.len(),
            detailed,
            by_period,
            by_center,
            by_fund,
            availability,
            execution,
            interpretations,
            warnings,
        })
    }
}

/// Runs the pipeline with the default column names.
pub fn run_analysis(dataset: &Dataset) -> Result<AnalysisResult> {
    PacAnalyzer::default().run(dataset)
}

pub fn render_report(result: &AnalysisResult) -> Report {
    Report::from_analysis(result)
}
