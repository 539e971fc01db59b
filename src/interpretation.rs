use crate::utils::{format_currency, format_percent, ratio_pct};
use crate::views::{AvailabilityAnalysis, ExecutionTiers, GroupSummary, PeriodSummary};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading centers named in the concentration finding.
pub const TOP_CENTERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionLevel {
    Excellent,
    Good,
    Regular,
    Low,
}

impl ExecutionLevel {
    pub fn classify(pct: f64) -> Self {
        if pct >= 80.0 {
            ExecutionLevel::Excellent
        } else if pct >= 60.0 {
            ExecutionLevel::Good
        } else if pct >= 40.0 {
            ExecutionLevel::Regular
        } else {
            ExecutionLevel::Low
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Level(ExecutionLevel),
    Critical,
    Positive,
    Info,
    Ok,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Level(ExecutionLevel::Excellent) => "✓ EXCELENTE",
            Status::Level(ExecutionLevel::Good) => "✓ BUENO",
            Status::Level(ExecutionLevel::Regular) => "⚠️ REGULAR",
            Status::Level(ExecutionLevel::Low) => "❌ BAJO",
            Status::Critical => "⚠️ CRÍTICO",
            Status::Positive => "✓ POSITIVO",
            Status::Info => "📊 INFO",
            Status::Ok => "✓ OK",
        }
    }

    pub fn for_execution(pct: f64) -> Self {
        Status::Level(ExecutionLevel::classify(pct))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ExecutiveSummary,
    OverrunAlert,
    BestPeriod,
    ExecutionDistribution,
    TopCenters,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::ExecutiveSummary => "RESUMEN EJECUTIVO",
            Category::OverrunAlert => "ALERTA - SOBREGIROS",
            Category::BestPeriod => "EJECUCIÓN POR PERÍODO",
            Category::ExecutionDistribution => "DISTRIBUCIÓN DE EJECUCIÓN",
            Category::TopCenters => "PRINCIPALES CENTROS GESTORES",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A rule-based finding. The text embeds the computed figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Interpretation {
    pub category: Category,
    pub finding: String,
    pub narrative: String,
    pub status: Status,
}

/// Evaluates the rules in their fixed order: executive summary, overrun
/// alert, best period, execution distribution, top centers.
pub fn generate_interpretations(
    availability: &AvailabilityAnalysis,
    tiers: &ExecutionTiers,
    by_period: &[PeriodSummary],
    by_center: &[GroupSummary],
) -> Vec<Interpretation> {
    let mut findings = vec![executive_summary(availability)];

    if availability.overrun_count > 0 {
        findings.push(overrun_alert(availability));
    }

    if let Some(best) = best_period(by_period) {
        findings.push(Interpretation {
            category: Category::BestPeriod,
            finding: format!("Período {} tiene mejor ejecución", best.period),
            narrative: format!(
                "El período {} muestra la mayor ejecución con {} del PAC ejecutado. Girado: {}",
                best.period,
                format_percent(best.execution_pct, 1),
                format_currency(best.disbursed)
            ),
            status: Status::Positive,
        });
    }

    findings.push(execution_distribution(tiers));

    if by_center.len() >= TOP_CENTERS {
        findings.push(top_centers(&by_center[..TOP_CENTERS], availability.total_allocation));
    }

    findings
}

fn executive_summary(availability: &AvailabilityAnalysis) -> Interpretation {
    Interpretation {
        category: Category::ExecutiveSummary,
        finding: format!("PAC Total: {}", format_currency(availability.total_allocation)),
        narrative: format!(
            "El presupuesto total asignado es de {}. Se ha ejecutado {} ({}), quedando disponible {} ({}).",
            format_currency(availability.total_allocation),
            format_currency(availability.total_disbursed),
            format_percent(availability.execution_pct, 1),
            format_currency(availability.total_available),
            format_percent(availability.availability_pct, 1)
        ),
        status: Status::for_execution(availability.execution_pct),
    }
}

fn overrun_alert(availability: &AvailabilityAnalysis) -> Interpretation {
    Interpretation {
        category: Category::OverrunAlert,
        finding: format!(
            "{} registros con disponibilidad negativa",
            availability.overrun_count
        ),
        narrative: format!(
            "Se detectaron {} posiciones presupuestarias con sobregiro, totalizando {}. \
             Esto indica ejecución por encima del PAC asignado y requiere atención inmediata.",
            availability.overrun_count,
            format_currency(availability.overrun_total.abs())
        ),
        status: Status::Critical,
    }
}

/// Highest execution; on ties the first period in view order wins.
fn best_period(by_period: &[PeriodSummary]) -> Option<&PeriodSummary> {
    let mut best: Option<&PeriodSummary> = None;
    for summary in by_period {
        match best {
            Some(current) if summary.execution_pct <= current.execution_pct => {}
            _ => best = Some(summary),
        }
    }
    best
}

fn execution_distribution(tiers: &ExecutionTiers) -> Interpretation {
    let mean = format_percent(tiers.mean_execution_pct, 1);
    Interpretation {
        category: Category::ExecutionDistribution,
        finding: format!("Ejecución promedio: {}", mean),
        narrative: format!(
            "De {} registros: {} tienen ejecución alta (≥80%), {} media (50-80%), y {} baja (<50%). \
             El promedio general de ejecución es {}.",
            tiers.total_records, tiers.high, tiers.medium, tiers.low, mean
        ),
        status: Status::for_execution(tiers.mean_execution_pct),
    }
}

fn top_centers(top: &[GroupSummary], total_allocation: f64) -> Interpretation {
    let combined: f64 = top.iter().map(|c| c.current_allocation).sum();
    let names: Vec<&str> = top.iter().map(|c| c.key.as_str()).collect();

    Interpretation {
        category: Category::TopCenters,
        finding: format!("Top {} concentran {}", top.len(), format_currency(combined)),
        narrative: format!(
            "Los {} principales centros gestores son: {}. Juntos representan el {} del PAC total.",
            top.len(),
            names.join(", "),
            format_percent(ratio_pct(combined, total_allocation), 1)
        ),
        status: Status::Info,
    }
}
