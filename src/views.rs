use crate::schema::{BudgetField, PeriodKey};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a column's values are rendered. Assigned when a view is built,
/// never inferred from the column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "role")]
pub enum FormatRole {
    Text,
    /// Period codes and other identifiers written as plain numbers.
    Code,
    Currency,
    Percent { decimals: u8 },
    Count,
}

/// A materialized table value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map(CellValue::Text).unwrap_or(CellValue::Empty)
    }
}

impl From<&PeriodKey> for CellValue {
    fn from(value: &PeriodKey) -> Self {
        match value {
            PeriodKey::Code(code) => CellValue::Number(*code as f64),
            PeriodKey::Label(label) => CellValue::Text(label.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "field")]
pub enum DetailColumn {
    Field(BudgetField),
    ExecutionPct,
}

/// A column of the detailed view, resolved against the input schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectedColumn {
    pub column: DetailColumn,
    pub label: String,
    pub role: FormatRole,
}

/// Per-record table restricted to the known columns the input carried.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetailedView {
    pub columns: Vec<ProjectedColumn>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DetailedView {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }

    pub fn column_position(&self, column: DetailColumn) -> Option<usize> {
        self.columns.iter().position(|c| c.column == column)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodSummary {
    pub period: PeriodKey,
    pub initial_allocation: f64,
    pub current_allocation: f64,
    pub reprogrammed_allocation: f64,
    pub disbursed: f64,
    pub availability: f64,
    pub execution_pct: f64,
    pub availability_pct: f64,
    /// Current minus initial allocation.
    pub variance: f64,
    pub variance_pct: f64,
}

/// Row of the by-center and by-fund views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupSummary {
    pub key: String,
    pub current_allocation: f64,
    pub disbursed: f64,
    pub availability: f64,
    pub execution_pct: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AvailabilityAnalysis {
    pub total_allocation: f64,
    pub total_disbursed: f64,
    pub total_available: f64,
    pub execution_pct: f64,
    pub availability_pct: f64,
    pub overrun_count: usize,
    /// Sum of the negative availabilities only.
    pub overrun_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutionTiers {
    /// Execution of 80% or more.
    pub high: usize,
    /// Execution in [50%, 80%).
    pub medium: usize,
    /// Execution under 50%.
    pub low: usize,
    pub mean_execution_pct: f64,
    pub total_records: usize,
}

/// Non-fatal conditions met during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "warning")]
pub enum AnalysisWarning {
    MissingDetailColumn { column: String },
    EmptyDetailedView,
    AvailabilityMismatch { rows: usize },
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::MissingDetailColumn { column } => {
                write!(f, "column '{}' not found, skipped in detailed view", column)
            }
            AnalysisWarning::EmptyDetailedView => {
                f.write_str("no known columns found for the detailed view")
            }
            AnalysisWarning::AvailabilityMismatch { rows } => write!(
                f,
                "{} rows report an availability different from current allocation minus disbursed",
                rows
            ),
        }
    }
}
