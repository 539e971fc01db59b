//! Format-agnostic report document.
//!
//! A [`Report`] holds six sections in a fixed order. Each section has a
//! title, a header row and data rows whose cells carry an explicit
//! [`FormatRole`]. The `xlsx` module turns the document into a workbook.

use crate::interpretation::Status;
use crate::utils::{format_currency, format_percent, group_thousands};
use crate::views::{CellValue, FormatRole, GroupSummary};
use crate::AnalysisResult;
use serde::{Deserialize, Serialize};

const CURRENCY: FormatRole = FormatRole::Currency;
const PCT_1: FormatRole = FormatRole::Percent { decimals: 1 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionKind {
    ExecutiveSummary,
    DetailedAnalysis,
    ByPeriod,
    ByManagingCenter,
    ByFundType,
    Interpretations,
}

impl SectionKind {
    pub const ORDER: [SectionKind; 6] = [
        SectionKind::ExecutiveSummary,
        SectionKind::DetailedAnalysis,
        SectionKind::ByPeriod,
        SectionKind::ByManagingCenter,
        SectionKind::ByFundType,
        SectionKind::Interpretations,
    ];

    pub fn sheet_name(self) -> &'static str {
        match self {
            SectionKind::ExecutiveSummary => "Resumen Ejecutivo",
            SectionKind::DetailedAnalysis => "Análisis Detallado",
            SectionKind::ByPeriod => "Por Período",
            SectionKind::ByManagingCenter => "Por Centro Gestor",
            SectionKind::ByFundType => "Por Fondos",
            SectionKind::Interpretations => "Interpretaciones",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SectionKind::ExecutiveSummary => "ANÁLISIS COMPLETO DEL REPORTE PAC",
            SectionKind::DetailedAnalysis => "ANÁLISIS DETALLADO COMPLETO",
            SectionKind::ByPeriod => "ANÁLISIS POR PERÍODO PRESUPUESTAL",
            SectionKind::ByManagingCenter => "ANÁLISIS POR CENTRO GESTOR",
            SectionKind::ByFundType => "ANÁLISIS POR TIPO DE FONDOS",
            SectionKind::Interpretations => "INTERPRETACIÓN Y HALLAZGOS DEL ANÁLISIS",
        }
    }
}

/// Unit tag of an executive-summary metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Currency,
    Percent,
    Units,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Unit::Currency => "$",
            Unit::Percent => "%",
            Unit::Units => "unidades",
        }
    }

    fn role(self) -> FormatRole {
        match self {
            Unit::Currency => CURRENCY,
            Unit::Percent => PCT_1,
            Unit::Units => FormatRole::Count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub label: String,
    pub role: FormatRole,
    pub width: f64,
}

impl ColumnSpec {
    fn new(label: &str, role: FormatRole, width: f64) -> Self {
        Self {
            label: label.to_string(),
            role,
            width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCell {
    pub value: CellValue,
    pub role: FormatRole,
}

impl ReportCell {
    pub fn new(value: impl Into<CellValue>, role: FormatRole) -> Self {
        Self {
            value: value.into(),
            role,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(CellValue::Text(value.into()), FormatRole::Text)
    }

    /// The value as a reader would see it once formatted.
    pub fn display(&self) -> String {
        match (&self.value, self.role) {
            (CellValue::Empty, _) => String::new(),
            (CellValue::Text(text), _) => text.clone(),
            (CellValue::Number(n), FormatRole::Currency) => format_currency(*n),
            (CellValue::Number(n), FormatRole::Percent { decimals }) => {
                format_percent(*n, decimals as usize)
            }
            (CellValue::Number(n), FormatRole::Count) => {
                let rounded = n.round();
                let digits = group_thousands(&format!("{:.0}", rounded.abs()));
                if rounded < 0.0 {
                    format!("-{}", digits)
                } else {
                    digits
                }
            }
            (CellValue::Number(n), FormatRole::Code | FormatRole::Text) => {
                if n.fract() == 0.0 {
                    format!("{:.0}", n)
                } else {
                    n.to_string()
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    pub subtitle: Option<String>,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<ReportCell>>,
    pub wrap_text: bool,
    /// Fixed height for data rows, in points.
    pub row_height: Option<f64>,
}

impl Section {
    fn new(kind: SectionKind, columns: Vec<ColumnSpec>, rows: Vec<Vec<ReportCell>>) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            subtitle: None,
            columns,
            rows,
            wrap_text: false,
            row_height: None,
        }
    }

    pub fn header(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(ReportCell::display).collect())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub sections: Vec<Section>,
}

impl Report {
    pub fn from_analysis(result: &AnalysisResult) -> Self {
        let sections = SectionKind::ORDER
            .into_iter()
            .map(|kind| match kind {
                SectionKind::ExecutiveSummary => executive_summary(result),
                SectionKind::DetailedAnalysis => detailed_analysis(result),
                SectionKind::ByPeriod => by_period(result),
                SectionKind::ByManagingCenter => {
                    grouped(kind, "Centro Gestor", &result.by_center)
                }
                SectionKind::ByFundType => grouped(kind, "Fondos", &result.by_fund),
                SectionKind::Interpretations => interpretations(result),
            })
            .collect();

        Self { sections }
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}

fn executive_summary(result: &AnalysisResult) -> Section {
    let disp = &result.availability;
    let overrun_status = if disp.overrun_count > 0 {
        Status::Critical
    } else {
        Status::Ok
    };

    let metrics: [(&str, f64, Unit, Option<Status>); 6] = [
        ("PAC Total", disp.total_allocation, Unit::Currency, None),
        ("Girado y Recaudado", disp.total_disbursed, Unit::Currency, None),
        ("Disponibilidad", disp.total_available, Unit::Currency, None),
        (
            "% Ejecución",
            disp.execution_pct,
            Unit::Percent,
            Some(Status::for_execution(disp.execution_pct)),
        ),
        ("% Disponibilidad", disp.availability_pct, Unit::Percent, None),
        (
            "Registros con Sobregiro",
            disp.overrun_count as f64,
            Unit::Units,
            Some(overrun_status),
        ),
    ];

    let rows = metrics
        .into_iter()
        .map(|(name, value, unit, status)| {
            vec![
                ReportCell::text(name),
                ReportCell::new(value, unit.role()),
                ReportCell::text(unit.label()),
                ReportCell::text(status.map(Status::label).unwrap_or_default()),
            ]
        })
        .collect();

    let columns = vec![
        ColumnSpec::new("Métrica", FormatRole::Text, 25.0),
        ColumnSpec::new("Valor", FormatRole::Text, 20.0),
        ColumnSpec::new("Unidad", FormatRole::Text, 12.0),
        ColumnSpec::new("Estado", FormatRole::Text, 15.0),
    ];

    let mut section = Section::new(SectionKind::ExecutiveSummary, columns, rows);
    section.subtitle = Some("INDICADORES GENERALES".to_string());
    section
}

fn detailed_analysis(result: &AnalysisResult) -> Section {
    let view = &result.detailed;
    let columns = view
        .columns
        .iter()
        .map(|column| {
            let width = if column.label.contains("Pos.Presupuestaria")
                || column.label.contains("Programa")
            {
                25.0
            } else if column.label.contains("Centro") {
                20.0
            } else {
                18.0
            };
            ColumnSpec {
                label: column.label.clone(),
                role: column.role,
                width,
            }
        })
        .collect::<Vec<_>>();

    let rows = view
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .zip(&columns)
                .map(|(value, column)| ReportCell::new(value.clone(), column.role))
                .collect()
        })
        .collect();

    Section::new(SectionKind::DetailedAnalysis, columns, rows)
}

fn by_period(result: &AnalysisResult) -> Section {
    let columns = [
        ("Período", FormatRole::Code),
        ("PAC Inicial", CURRENCY),
        ("PAC Actual", CURRENCY),
        ("PAC Reprogramado", CURRENCY),
        ("Girado y Recaudado PAC", CURRENCY),
        ("Disponibilidad PAC", CURRENCY),
        ("Ejecución %", PCT_1),
        ("Disponibilidad %", PCT_1),
        ("Variación PAC", CURRENCY),
        ("Variación %", PCT_1),
    ]
    .into_iter()
    .map(|(label, role)| ColumnSpec::new(label, role, 18.0))
    .collect::<Vec<_>>();

    let rows = result
        .by_period
        .iter()
        .map(|p| {
            let values: [CellValue; 10] = [
                (&p.period).into(),
                p.initial_allocation.into(),
                p.current_allocation.into(),
                p.reprogrammed_allocation.into(),
                p.disbursed.into(),
                p.availability.into(),
                p.execution_pct.into(),
                p.availability_pct.into(),
                p.variance.into(),
                p.variance_pct.into(),
            ];
            values
                .into_iter()
                .zip(&columns)
                .map(|(value, column)| ReportCell::new(value, column.role))
                .collect()
        })
        .collect();

    Section::new(SectionKind::ByPeriod, columns, rows)
}

fn grouped(kind: SectionKind, key_label: &str, groups: &[GroupSummary]) -> Section {
    let columns = vec![
        ColumnSpec::new(key_label, FormatRole::Text, 20.0),
        ColumnSpec::new("PAC Actual", CURRENCY, 20.0),
        ColumnSpec::new("Girado y Recaudado PAC", CURRENCY, 20.0),
        ColumnSpec::new("Disponibilidad PAC", CURRENCY, 20.0),
        ColumnSpec::new("Ejecución %", PCT_1, 20.0),
    ];

    let rows = groups
        .iter()
        .map(|g| {
            vec![
                ReportCell::text(g.key.clone()),
                ReportCell::new(g.current_allocation, CURRENCY),
                ReportCell::new(g.disbursed, CURRENCY),
                ReportCell::new(g.availability, CURRENCY),
                ReportCell::new(g.execution_pct, PCT_1),
            ]
        })
        .collect();

    Section::new(kind, columns, rows)
}

fn interpretations(result: &AnalysisResult) -> Section {
    let columns = vec![
        ColumnSpec::new("Categoría", FormatRole::Text, 20.0),
        ColumnSpec::new("Hallazgo", FormatRole::Text, 35.0),
        ColumnSpec::new("Interpretación", FormatRole::Text, 60.0),
        ColumnSpec::new("Estado", FormatRole::Text, 15.0),
    ];

    let rows = result
        .interpretations
        .iter()
        .map(|i| {
            vec![
                ReportCell::text(i.category.label()),
                ReportCell::text(i.finding.clone()),
                ReportCell::text(i.narrative.clone()),
                ReportCell::text(i.status.label()),
            ]
        })
        .collect();

    let mut section = Section::new(SectionKind::Interpretations, columns, rows);
    section.wrap_text = true;
    section.row_height = Some(45.0);
    section
}
