use crate::config::ColumnNames;
use crate::error::{PacError, Result};
use crate::schema::{require_field, BudgetField, BudgetRecord, BudgetTable, Cell, Dataset, PeriodKey, Schema};
use crate::views::AnalysisWarning;
use calamine::{open_workbook_auto, Data, Reader};
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Supplied availability may differ from the derived one by rounding only.
const AVAILABILITY_TOLERANCE: f64 = 0.005;

impl Dataset {
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let mut dataset = Dataset {
            columns,
            rows: Vec::new(),
        };

        for record in csv_reader.records() {
            let record = record?;
            dataset.push_row(
                record
                    .iter()
                    .map(|value| {
                        if value.trim().is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(value.to_string())
                        }
                    })
                    .collect(),
            );
        }

        debug!("Read {} CSV rows with {} columns", dataset.len(), dataset.columns.len());
        Ok(dataset)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Reads `sheet` of an `.xlsx`/`.xls` workbook. The first row is the header.
    pub fn from_xlsx_path<P: AsRef<Path>>(path: P, sheet: &str) -> Result<Self> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| PacError::Spreadsheet(e.to_string()))?;
        let range = workbook
            .worksheet_range(sheet)
            .map_err(|e| PacError::Spreadsheet(format!("sheet '{}': {}", sheet, e)))?;

        let mut rows = range.rows();
        let columns = match rows.next() {
            Some(header) => header
                .iter()
                .map(|data| cell_from_data(data).as_key().unwrap_or_default())
                .collect(),
            None => Vec::new(),
        };

        let mut dataset = Dataset {
            columns,
            rows: Vec::new(),
        };
        for row in rows {
            dataset.push_row(row.iter().map(cell_from_data).collect());
        }

        debug!("Read {} rows from sheet '{}'", dataset.len(), sheet);
        Ok(dataset)
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::String(value) => Cell::Text(value.clone()),
        Data::Bool(value) => Cell::Text(value.to_string()),
        other => Cell::Text(other.to_string()),
    }
}

/// Drops rows missing a period or managing center and types the rest.
///
/// Zero and negative amounts are kept. A money cell that is not numeric
/// aborts with `DataFormat`.
pub fn clean(dataset: &Dataset, names: &ColumnNames) -> Result<(BudgetTable, Vec<AnalysisWarning>)> {
    let schema = Schema::resolve(dataset, names);
    require_field(&schema, names, BudgetField::Period, "data cleaning")?;
    require_field(&schema, names, BudgetField::ManagingCenter, "data cleaning")?;

    let mut records = Vec::with_capacity(dataset.len());
    let mut dropped = 0usize;
    let mut mismatched = 0usize;

    for row in 0..dataset.len() {
        let reader = RowReader {
            dataset,
            schema: &schema,
            names,
            row,
        };

        let period = reader.cell(BudgetField::Period).and_then(PeriodKey::from_cell);
        let center = reader.cell(BudgetField::ManagingCenter).and_then(Cell::as_key);
        let (period, managing_center) = match (period, center) {
            (Some(period), Some(center)) => (period, center),
            _ => {
                dropped += 1;
                continue;
            }
        };

        let current_allocation = reader.amount(BudgetField::CurrentAllocation)?;
        let disbursed = reader.amount(BudgetField::Disbursed)?;
        let availability = current_allocation - disbursed;

        let supplied_cell = reader.cell(BudgetField::Availability);
        if supplied_cell.is_some_and(|cell| !cell.is_missing()) {
            let supplied = reader.amount(BudgetField::Availability)?;
            if (supplied - availability).abs() > AVAILABILITY_TOLERANCE {
                mismatched += 1;
            }
        }

        records.push(BudgetRecord {
            financing_program: reader.text(BudgetField::FinancingProgram),
            managing_center,
            period,
            budget_position: reader.text(BudgetField::BudgetPosition),
            fund_type: reader.text(BudgetField::FundType),
            initial_allocation: reader.amount(BudgetField::InitialAllocation)?,
            current_allocation,
            reprogrammed_allocation: reader.amount(BudgetField::ReprogrammedAllocation)?,
            disbursed,
            availability,
        });
    }

    info!(
        "Cleaned dataset: kept {} of {} rows ({} missing period or managing center)",
        records.len(),
        dataset.len(),
        dropped
    );

    let mut warnings = Vec::new();
    if mismatched > 0 {
        warn!(
            "{} rows carry an availability that differs from current allocation minus disbursed",
            mismatched
        );
        warnings.push(AnalysisWarning::AvailabilityMismatch { rows: mismatched });
    }

    let table = BudgetTable {
        schema,
        column_names: names.clone(),
        records,
    };
    Ok((table, warnings))
}

struct RowReader<'a> {
    dataset: &'a Dataset,
    schema: &'a Schema,
    names: &'a ColumnNames,
    row: usize,
}

impl<'a> RowReader<'a> {
    fn cell(&self, field: BudgetField) -> Option<&'a Cell> {
        self.schema
            .position(field)
            .map(|column| self.dataset.cell(self.row, column))
    }

    fn text(&self, field: BudgetField) -> Option<String> {
        self.cell(field).and_then(Cell::as_key)
    }

    /// Absent columns and blank cells read as zero.
    fn amount(&self, field: BudgetField) -> Result<f64> {
        let cell = match self.cell(field) {
            Some(cell) => cell,
            None => return Ok(0.0),
        };

        let invalid = |value: String| PacError::DataFormat {
            row: self.row + 1,
            column: self.names.name(field).to_string(),
            value,
        };

        match cell {
            Cell::Empty => Ok(0.0),
            Cell::Number(n) if n.is_nan() => Ok(0.0),
            Cell::Number(n) if n.is_finite() => Ok(*n),
            Cell::Number(n) => Err(invalid(n.to_string())),
            Cell::Text(raw) => {
                let text = raw.trim();
                if text.is_empty() {
                    return Ok(0.0);
                }
                match text.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(value),
                    _ => Err(invalid(raw.clone())),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Progr.financiación,Centro gestor,Per.presup.,Pos.presupuestaria,Fondos,PAC inicial,PAC Actual,PAC Reprogramado,Girado y Recaudado PAC,Disponibilidad PAC
P1,C-01,202401,O21,Recursos Propios,90,100,0,50,50
P1,C-02,202401,O22,SGP,0,0,0,0,0
,C-03,,O23,SGP,10,10,0,0,10
Total,,,,,100,110,0,50,60
P2,C-01,202402,O21,,50,200,10,250,-50
";

    #[test]
    fn test_csv_loading() {
        let dataset = Dataset::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(dataset.columns.len(), 10);
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.cell(2, 2), &Cell::Empty);
        assert_eq!(dataset.cell(0, 1), &Cell::Text("C-01".to_string()));
    }

    #[test]
    fn test_clean_drops_rows_without_keys() {
        let dataset = Dataset::from_csv_reader(CSV.as_bytes()).unwrap();
        let (table, warnings) = clean(&dataset, &ColumnNames::default()).unwrap();

        assert_eq!(table.len(), 3);
        assert!(warnings.is_empty());
        assert_eq!(table.records[0].period, PeriodKey::Code(202401));
        assert_eq!(table.records[1].current_allocation, 0.0);
        assert_eq!(table.records[2].availability, -50.0);
        assert_eq!(table.records[2].fund_type, None);
        assert_eq!(table.records[0].fund_type.as_deref(), Some("Recursos Propios"));
    }

    #[test]
    fn test_clean_requires_period_column() {
        let dataset = Dataset::new(["Centro gestor", "PAC Actual"])
            .with_row(vec!["A".into(), 10.0.into()]);
        let err = clean(&dataset, &ColumnNames::default()).unwrap_err();
        match err {
            PacError::MissingColumn { column, .. } => assert_eq!(column, "Per.presup."),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_amount_is_data_format_error() {
        let dataset = Dataset::new(["Centro gestor", "Per.presup.", "PAC Actual"])
            .with_row(vec!["A".into(), "202401".into(), "100".into()])
            .with_row(vec!["B".into(), "202401".into(), "cien".into()]);

        let err = clean(&dataset, &ColumnNames::default()).unwrap_err();
        match err {
            PacError::DataFormat { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "PAC Actual");
                assert_eq!(value, "cien");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_infinite_text_rejected() {
        let dataset = Dataset::new(["Centro gestor", "Per.presup.", "PAC Actual"])
            .with_row(vec!["A".into(), "202401".into(), "inf".into()]);
        assert!(matches!(
            clean(&dataset, &ColumnNames::default()),
            Err(PacError::DataFormat { .. })
        ));
    }

    #[test]
    fn test_availability_mismatch_warning() {
        let dataset = Dataset::new([
            "Centro gestor",
            "Per.presup.",
            "PAC Actual",
            "Girado y Recaudado PAC",
            "Disponibilidad PAC",
        ])
        .with_row(vec![
            "A".into(),
            202401.0.into(),
            100.0.into(),
            40.0.into(),
            70.0.into(),
        ]);

        let (table, warnings) = clean(&dataset, &ColumnNames::default()).unwrap();
        assert_eq!(table.records[0].availability, 60.0);
        assert_eq!(warnings, vec![AnalysisWarning::AvailabilityMismatch { rows: 1 }]);
    }

    #[test]
    fn test_numeric_center_codes_lose_decimals() {
        let dataset = Dataset::new(["Centro gestor", "Per.presup."])
            .with_row(vec![Cell::Number(112.0), Cell::Number(202401.0)]);
        let (table, _) = clean(&dataset, &ColumnNames::default()).unwrap();
        assert_eq!(table.records[0].managing_center, "112");
    }

    #[test]
    fn test_missing_xlsx_file_is_spreadsheet_error() {
        let err = Dataset::from_xlsx_path("does/not/exist.xlsx", "Data").unwrap_err();
        assert!(matches!(err, PacError::Spreadsheet(_)));
    }

    #[test]
    fn test_xlsx_data_sheet_through_analysis() {
        let path = std::env::temp_dir().join(format!("pac_data_{}.xlsx", std::process::id()));
        let names = ColumnNames::default();
        let headers = names.headers();

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Data").unwrap();
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).unwrap();
        }
        sheet.write_string(1, 0, "FP-01").unwrap();
        sheet.write_number(1, 1, 112).unwrap();
        sheet.write_number(1, 2, 202401).unwrap();
        sheet.write_string(1, 3, "2.1.1").unwrap();
        sheet.write_string(1, 4, "SGP").unwrap();
        for (col, amount) in [(5, 150.0), (6, 200.0), (8, 250.0), (9, -50.0)] {
            sheet.write_number(1, col, amount).unwrap();
        }
        // No managing center: dropped during cleaning.
        sheet.write_string(2, 0, "FP-02").unwrap();
        sheet.write_number(2, 2, 202402).unwrap();
        sheet.write_number(2, 6, 80).unwrap();
        workbook.save(&path).unwrap();

        let loaded = Dataset::from_xlsx_path(&path, "Data");
        let wrong_sheet = Dataset::from_xlsx_path(&path, "Hoja1");
        std::fs::remove_file(&path).ok();

        assert!(matches!(wrong_sheet, Err(PacError::Spreadsheet(_))));
        let dataset = loaded.unwrap();
        assert_eq!(dataset.columns, headers);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.cell(0, 1), &Cell::Number(112.0));
        assert_eq!(dataset.cell(0, 4), &Cell::Text("SGP".to_string()));
        assert_eq!(dataset.cell(0, 7), &Cell::Empty);
        assert_eq!(dataset.cell(1, 1), &Cell::Empty);

        let result = crate::run_analysis(&dataset).unwrap();
        assert_eq!(result.record_count, 1);
        assert_eq!(result.by_center[0].key, "112");
        assert_eq!(result.by_period[0].period, PeriodKey::Code(202401));
        assert_eq!(result.by_period[0].reprogrammed_allocation, 0.0);
        assert_eq!(result.availability.overrun_count, 1);
        assert!(result.warnings.is_empty());
    }
}
