use crate::config::ColumnNames;
use crate::error::{PacError, Result};
use crate::utils::ratio_pct;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The ten semantic fields of a PAC export row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetField {
    FinancingProgram,
    ManagingCenter,
    Period,
    BudgetPosition,
    FundType,
    InitialAllocation,
    CurrentAllocation,
    ReprogrammedAllocation,
    Disbursed,
    Availability,
}

impl BudgetField {
    pub const ALL: [BudgetField; 10] = [
        BudgetField::FinancingProgram,
        BudgetField::ManagingCenter,
        BudgetField::Period,
        BudgetField::BudgetPosition,
        BudgetField::FundType,
        BudgetField::InitialAllocation,
        BudgetField::CurrentAllocation,
        BudgetField::ReprogrammedAllocation,
        BudgetField::Disbursed,
        BudgetField::Availability,
    ];

    pub fn is_amount(self) -> bool {
        matches!(
            self,
            BudgetField::InitialAllocation
                | BudgetField::CurrentAllocation
                | BudgetField::ReprogrammedAllocation
                | BudgetField::Disbursed
                | BudgetField::Availability
        )
    }

    /// Header shown for the field in the detailed view.
    pub fn label(self) -> &'static str {
        match self {
            BudgetField::FinancingProgram => "Programa Financiación",
            BudgetField::ManagingCenter => "Centro Gestor",
            BudgetField::Period => "Período",
            BudgetField::BudgetPosition => "Pos.Presupuestaria",
            BudgetField::FundType => "Fondos",
            BudgetField::InitialAllocation => "PAC Inicial",
            BudgetField::CurrentAllocation => "PAC Actual",
            BudgetField::ReprogrammedAllocation => "PAC Reprogramado",
            BudgetField::Disbursed => "Girado y Recaudado",
            BudgetField::Availability => "Disponibilidad",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for BudgetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A raw input cell, before any typing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Nulls and blank text both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(n) => n.is_nan(),
        }
    }

    /// Text form of a key cell; integral numbers lose their decimals.
    pub fn as_key(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Number(n) => Some(number_text(*n)),
            Cell::Empty => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// An already-parsed tabular export: named columns and positional rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Dataset {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn with_row(mut self, row: Vec<Cell>) -> Self {
        self.push_row(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.columns.iter().position(|c| c.trim() == wanted)
    }

    /// Cells past the end of a short row read as empty.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        static EMPTY: Cell = Cell::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }
}

/// Budget period code. Numeric codes (e.g. `202401`) order numerically and
/// sort before free-text labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum PeriodKey {
    Code(i64),
    Label(String),
}

impl PeriodKey {
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Empty => None,
            Cell::Number(n) => {
                if n.is_nan() {
                    None
                } else if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    Some(PeriodKey::Code(*n as i64))
                } else {
                    Some(PeriodKey::Label(n.to_string()))
                }
            }
            Cell::Text(raw) => {
                let text = raw.trim();
                if text.is_empty() {
                    return None;
                }
                if let Ok(code) = text.parse::<i64>() {
                    return Some(PeriodKey::Code(code));
                }
                match text.parse::<f64>() {
                    Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                        Some(PeriodKey::Code(n as i64))
                    }
                    _ => Some(PeriodKey::Label(text.to_string())),
                }
            }
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKey::Code(code) => write!(f, "{}", code),
            PeriodKey::Label(label) => f.write_str(label),
        }
    }
}

/// One typed row of the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BudgetRecord {
    #[schemars(description = "Financing program code or name")]
    pub financing_program: Option<String>,

    #[schemars(description = "Organizational unit owning the allocation")]
    pub managing_center: String,

    #[schemars(description = "Budget period code, usually YYYYMM")]
    pub period: PeriodKey,

    pub budget_position: Option<String>,

    #[schemars(description = "Funding source classification. Rows without one are left out of the by-fund view")]
    pub fund_type: Option<String>,

    pub initial_allocation: f64,
    pub current_allocation: f64,
    pub reprogrammed_allocation: f64,

    #[schemars(description = "Disbursed and collected amount")]
    pub disbursed: f64,

    #[schemars(description = "Current allocation minus disbursed. Negative values are overruns")]
    pub availability: f64,
}

impl BudgetRecord {
    /// Builds a record with availability derived from the allocation amounts.
    pub fn new(
        managing_center: impl Into<String>,
        period: PeriodKey,
        current_allocation: f64,
        disbursed: f64,
    ) -> Self {
        Self {
            financing_program: None,
            managing_center: managing_center.into(),
            period,
            budget_position: None,
            fund_type: None,
            initial_allocation: 0.0,
            current_allocation,
            reprogrammed_allocation: 0.0,
            disbursed,
            availability: current_allocation - disbursed,
        }
    }

    pub fn with_fund_type(mut self, fund_type: impl Into<String>) -> Self {
        self.fund_type = Some(fund_type.into());
        self
    }

    pub fn with_initial_allocation(mut self, initial_allocation: f64) -> Self {
        self.initial_allocation = initial_allocation;
        self
    }

    pub fn execution_pct(&self) -> f64 {
        ratio_pct(self.disbursed, self.current_allocation)
    }

    /// Availability of exactly zero is not an overrun.
    pub fn is_overrun(&self) -> bool {
        self.availability < 0.0
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BudgetRecord)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// Which semantic fields the input carried, and at which column position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    positions: [Option<usize>; 10],
}

impl Schema {
    pub fn resolve(dataset: &Dataset, names: &ColumnNames) -> Self {
        let mut positions = [None; 10];
        for field in BudgetField::ALL {
            positions[field.slot()] = dataset.column_index(names.name(field));
        }
        Self { positions }
    }

    /// Every field present, for tables built directly from records.
    pub fn complete() -> Self {
        let mut positions = [None; 10];
        for field in BudgetField::ALL {
            positions[field.slot()] = Some(field.slot());
        }
        Self { positions }
    }

    pub fn without(mut self, field: BudgetField) -> Self {
        self.positions[field.slot()] = None;
        self
    }

    pub fn position(&self, field: BudgetField) -> Option<usize> {
        self.positions[field.slot()]
    }

    pub fn has(&self, field: BudgetField) -> bool {
        self.position(field).is_some()
    }
}

/// Cleaned, typed records together with the schema they were read under.
#[derive(Debug, Clone)]
pub struct BudgetTable {
    pub schema: Schema,
    pub column_names: ColumnNames,
    pub records: Vec<BudgetRecord>,
}

impl BudgetTable {
    pub fn from_records(records: Vec<BudgetRecord>) -> Self {
        Self {
            schema: Schema::complete(),
            column_names: ColumnNames::default(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fails with `MissingColumn` naming the source header when `field`
    /// was not in the input.
    pub fn require(&self, field: BudgetField, purpose: &str) -> Result<()> {
        require_field(&self.schema, &self.column_names, field, purpose)
    }
}

pub(crate) fn require_field(
    schema: &Schema,
    names: &ColumnNames,
    field: BudgetField,
    purpose: &str,
) -> Result<()> {
    if schema.has(field) {
        Ok(())
    } else {
        Err(PacError::MissingColumn {
            field: purpose.to_string(),
            column: names.name(field).to_string(),
        })
    }
}
