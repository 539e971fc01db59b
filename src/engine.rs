use crate::error::Result;
use crate::schema::{BudgetField, BudgetRecord, BudgetTable};
use crate::utils::ratio_pct;
use crate::views::{
    AnalysisWarning, AvailabilityAnalysis, CellValue, DetailColumn, DetailedView,
    ExecutionTiers, FormatRole, GroupSummary, PeriodSummary, ProjectedColumn,
};
use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

pub const HIGH_EXECUTION_PCT: f64 = 80.0;
pub const MEDIUM_EXECUTION_PCT: f64 = 50.0;

/// One entry of the detailed-view whitelist. Columns absent from the
/// input are skipped with a warning.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDescriptor {
    pub field: BudgetField,
    pub role: FormatRole,
}

const fn descriptor(field: BudgetField, role: FormatRole) -> ColumnDescriptor {
    ColumnDescriptor { field, role }
}

pub const DETAIL_COLUMNS: [ColumnDescriptor; 10] = [
    descriptor(BudgetField::FinancingProgram, FormatRole::Text),
    descriptor(BudgetField::ManagingCenter, FormatRole::Text),
    descriptor(BudgetField::Period, FormatRole::Code),
    descriptor(BudgetField::BudgetPosition, FormatRole::Text),
    descriptor(BudgetField::FundType, FormatRole::Text),
    descriptor(BudgetField::InitialAllocation, FormatRole::Currency),
    descriptor(BudgetField::CurrentAllocation, FormatRole::Currency),
    descriptor(BudgetField::ReprogrammedAllocation, FormatRole::Currency),
    descriptor(BudgetField::Disbursed, FormatRole::Currency),
    descriptor(BudgetField::Availability, FormatRole::Currency),
];

pub const EXECUTION_LABEL: &str = "% Ejecutado";

#[derive(Debug, Clone, Default)]
struct Totals {
    initial: f64,
    current: f64,
    reprogrammed: f64,
    disbursed: f64,
    available: f64,
}

impl Totals {
    fn add(&mut self, record: &BudgetRecord) {
        self.initial += record.initial_allocation;
        self.current += record.current_allocation;
        self.reprogrammed += record.reprogrammed_allocation;
        self.disbursed += record.disbursed;
        self.available += record.availability;
    }
}

/// Groups in first-appearance order; records whose key is `None` are skipped.
fn group_totals<K, F>(records: &[BudgetRecord], key: F) -> Vec<(K, Totals)>
where
    K: Eq + Hash + Clone,
    F: Fn(&BudgetRecord) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Totals)> = Vec::new();

    for record in records {
        let Some(group_key) = key(record) else {
            continue;
        };
        let slot = match index.get(&group_key) {
            Some(&slot) => slot,
            None => {
                groups.push((group_key.clone(), Totals::default()));
                index.insert(group_key, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].1.add(record);
    }

    groups
}

/// Stable: equal allocations keep first-appearance order.
fn rank_by_allocation(groups: &mut [GroupSummary]) {
    groups.sort_by(|a, b| {
        b.current_allocation
            .partial_cmp(&a.current_allocation)
            .unwrap_or(Ordering::Equal)
    });
}

pub struct Aggregator<'a> {
    table: &'a BudgetTable,
}

impl<'a> Aggregator<'a> {
    pub fn new(table: &'a BudgetTable) -> Self {
        Self { table }
    }

    /// Resolves the whitelist against the input schema once.
    pub fn projection_plan(&self) -> (Vec<ProjectedColumn>, Vec<AnalysisWarning>) {
        let mut columns = Vec::new();
        let mut warnings = Vec::new();

        for descriptor in DETAIL_COLUMNS {
            if self.table.schema.has(descriptor.field) {
                columns.push(ProjectedColumn {
                    column: DetailColumn::Field(descriptor.field),
                    label: descriptor.field.label().to_string(),
                    role: descriptor.role,
                });
            } else {
                warnings.push(AnalysisWarning::MissingDetailColumn {
                    column: self.table.column_names.name(descriptor.field).to_string(),
                });
            }
        }

        if self.table.schema.has(BudgetField::CurrentAllocation)
            && self.table.schema.has(BudgetField::Disbursed)
        {
            columns.push(ProjectedColumn {
                column: DetailColumn::ExecutionPct,
                label: EXECUTION_LABEL.to_string(),
                role: FormatRole::Percent { decimals: 2 },
            });
        }

        if columns.is_empty() {
            warnings.push(AnalysisWarning::EmptyDetailedView);
        }

        (columns, warnings)
    }

    /// Every record, sorted by period then managing center when the input
    /// carries those columns. Absent columns never fail the view.
    pub fn detailed_view(&self) -> (DetailedView, Vec<AnalysisWarning>) {
        let (columns, warnings) = self.projection_plan();
        for warning in &warnings {
            warn!("Detailed view: {}", warning);
        }

        if columns.is_empty() {
            return (DetailedView::default(), warnings);
        }

        let by_period = self.table.schema.has(BudgetField::Period);
        let by_center = self.table.schema.has(BudgetField::ManagingCenter);
        let mut ordered: Vec<&BudgetRecord> = self.table.records.iter().collect();
        ordered.sort_by(|a, b| {
            let period = if by_period {
                a.period.cmp(&b.period)
            } else {
                Ordering::Equal
            };
            period.then_with(|| {
                if by_center {
                    a.managing_center.cmp(&b.managing_center)
                } else {
                    Ordering::Equal
                }
            })
        });

        let rows = ordered
            .into_iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|column| detail_value(record, column.column))
                    .collect()
            })
            .collect::<Vec<Vec<CellValue>>>();

        debug!("Detailed view: {} rows x {} columns", rows.len(), columns.len());
        (DetailedView { columns, rows }, warnings)
    }

    /// Ascending by period.
    pub fn by_period(&self) -> Result<Vec<PeriodSummary>> {
        for field in [
            BudgetField::Period,
            BudgetField::InitialAllocation,
            BudgetField::CurrentAllocation,
            BudgetField::ReprogrammedAllocation,
            BudgetField::Disbursed,
        ] {
            self.table.require(field, "by-period view")?;
        }

        let mut groups = group_totals(&self.table.records, |r| Some(r.period.clone()));
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let summaries: Vec<PeriodSummary> = groups
            .into_iter()
            .map(|(period, totals)| {
                let variance = totals.current - totals.initial;
                PeriodSummary {
                    period,
                    initial_allocation: totals.initial,
                    current_allocation: totals.current,
                    reprogrammed_allocation: totals.reprogrammed,
                    disbursed: totals.disbursed,
                    availability: totals.available,
                    execution_pct: ratio_pct(totals.disbursed, totals.current),
                    availability_pct: ratio_pct(totals.available, totals.current),
                    variance,
                    variance_pct: ratio_pct(variance, totals.initial),
                }
            })
            .collect();

        debug!("By-period view: {} periods", summaries.len());
        Ok(summaries)
    }

    /// Descending by current allocation.
    pub fn by_center(&self) -> Result<Vec<GroupSummary>> {
        self.table.require(BudgetField::ManagingCenter, "by-center view")?;
        let summaries =
            self.ranked_groups("by-center view", |r| Some(r.managing_center.clone()))?;
        debug!("By-center view: {} centers", summaries.len());
        Ok(summaries)
    }

    /// Descending by current allocation. Records without a fund type are left out.
    pub fn by_fund(&self) -> Result<Vec<GroupSummary>> {
        self.table.require(BudgetField::FundType, "by-fund view")?;
        let summaries = self.ranked_groups("by-fund view", |r| r.fund_type.clone())?;
        debug!("By-fund view: {} fund types", summaries.len());
        Ok(summaries)
    }

    fn ranked_groups<F>(&self, purpose: &str, key: F) -> Result<Vec<GroupSummary>>
    where
        F: Fn(&BudgetRecord) -> Option<String>,
    {
        self.table.require(BudgetField::CurrentAllocation, purpose)?;
        self.table.require(BudgetField::Disbursed, purpose)?;

        let mut summaries: Vec<GroupSummary> = group_totals(&self.table.records, key)
            .into_iter()
            .map(|(key, totals)| GroupSummary {
                key,
                current_allocation: totals.current,
                disbursed: totals.disbursed,
                availability: totals.available,
                execution_pct: ratio_pct(totals.disbursed, totals.current),
            })
            .collect();

        rank_by_allocation(&mut summaries);
        Ok(summaries)
    }

    pub fn availability(&self) -> Result<AvailabilityAnalysis> {
        self.table.require(BudgetField::CurrentAllocation, "availability analysis")?;
        self.table.require(BudgetField::Disbursed, "availability analysis")?;

        let mut analysis = AvailabilityAnalysis::default();
        for record in &self.table.records {
            analysis.total_allocation += record.current_allocation;
            analysis.total_disbursed += record.disbursed;
            analysis.total_available += record.availability;
            if record.is_overrun() {
                analysis.overrun_count += 1;
                analysis.overrun_total += record.availability;
            }
        }
        analysis.execution_pct = ratio_pct(analysis.total_disbursed, analysis.total_allocation);
        analysis.availability_pct = ratio_pct(analysis.total_available, analysis.total_allocation);

        debug!(
            "Availability: {:.1}% executed, {} overrun records",
            analysis.execution_pct, analysis.overrun_count
        );
        Ok(analysis)
    }

    /// Records with zero current allocation count as 0% executed.
    pub fn execution_tiers(&self) -> Result<ExecutionTiers> {
        self.table.require(BudgetField::CurrentAllocation, "execution analysis")?;
        self.table.require(BudgetField::Disbursed, "execution analysis")?;

        let mut tiers = ExecutionTiers {
            total_records: self.table.len(),
            ..ExecutionTiers::default()
        };
        let mut sum = 0.0;

        for record in &self.table.records {
            let pct = record.execution_pct();
            sum += pct;
            if pct >= HIGH_EXECUTION_PCT {
                tiers.high += 1;
            } else if pct >= MEDIUM_EXECUTION_PCT {
                tiers.medium += 1;
            } else {
                tiers.low += 1;
            }
        }

        if tiers.total_records > 0 {
            tiers.mean_execution_pct = sum / tiers.total_records as f64;
        }

        debug!(
            "Execution tiers: high={} medium={} low={}",
            tiers.high, tiers.medium, tiers.low
        );
        Ok(tiers)
    }
}

fn detail_value(record: &BudgetRecord, column: DetailColumn) -> CellValue {
    match column {
        DetailColumn::ExecutionPct => CellValue::Number(record.execution_pct()),
        DetailColumn::Field(field) => match field {
            BudgetField::FinancingProgram => record.financing_program.clone().into(),
            BudgetField::ManagingCenter => record.managing_center.clone().into(),
            BudgetField::Period => (&record.period).into(),
            BudgetField::BudgetPosition => record.budget_position.clone().into(),
            BudgetField::FundType => record.fund_type.clone().into(),
            BudgetField::InitialAllocation => record.initial_allocation.into(),
            BudgetField::CurrentAllocation => record.current_allocation.into(),
            BudgetField::ReprogrammedAllocation => record.reprogrammed_allocation.into(),
            BudgetField::Disbursed => record.disbursed.into(),
            BudgetField::Availability => record.availability.into(),
        },
    }
}
