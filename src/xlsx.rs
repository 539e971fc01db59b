use crate::error::Result;
use crate::report::{Report, Section};
use crate::views::{CellValue, FormatRole};
use chrono::NaiveDateTime;
use log::debug;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::path::Path;

const BRAND_RED: u32 = 0xDA121A;
const WHITE: u32 = 0xFFFFFF;

/// `ANALISIS_PAC_YYYYMMDD_HHMMSS.xlsx`
pub fn report_file_name(generated_at: NaiveDateTime) -> String {
    format!("ANALISIS_PAC_{}.xlsx", generated_at.format("%Y%m%d_%H%M%S"))
}

struct ReportFormats {
    title: Format,
    subtitle: Format,
    header: Format,
    text: Format,
    wrapped_text: Format,
    code: Format,
    currency: Format,
    percent_1: Format,
    percent_2: Format,
    count: Format,
}

impl ReportFormats {
    fn new() -> Self {
        let cell = || Format::new().set_border(FormatBorder::Thin);

        Self {
            title: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_font_color(BRAND_RED),
            subtitle: Format::new().set_bold().set_font_size(12),
            header: Format::new()
                .set_bold()
                .set_font_size(11)
                .set_font_color(WHITE)
                .set_background_color(BRAND_RED)
                .set_border(FormatBorder::Thin),
            text: cell(),
            wrapped_text: cell().set_text_wrap().set_align(FormatAlign::Top),
            code: cell().set_num_format("0"),
            currency: cell().set_num_format("$#,##0"),
            percent_1: cell().set_num_format("0.0"),
            percent_2: cell().set_num_format("0.00"),
            count: cell().set_num_format("#,##0"),
        }
    }

    fn for_cell(&self, role: FormatRole, wrap: bool) -> &Format {
        match role {
            FormatRole::Text if wrap => &self.wrapped_text,
            FormatRole::Text => &self.text,
            FormatRole::Code => &self.code,
            FormatRole::Currency => &self.currency,
            FormatRole::Percent { decimals: 0..=1 } => &self.percent_1,
            FormatRole::Percent { .. } => &self.percent_2,
            FormatRole::Count => &self.count,
        }
    }
}

impl Report {
    pub fn to_workbook(&self) -> Result<Workbook> {
        let mut workbook = Workbook::new();
        let formats = ReportFormats::new();

        for section in &self.sections {
            let sheet = workbook.add_worksheet();
            write_section(sheet, section, &formats)?;
        }

        Ok(workbook)
    }

    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        let mut workbook = self.to_workbook()?;
        Ok(workbook.save_to_buffer()?)
    }

    pub fn save_xlsx<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut workbook = self.to_workbook()?;
        workbook.save(path.as_ref())?;
        debug!("Report written to {}", path.as_ref().display());
        Ok(())
    }
}

/// Title on row 0, optional subtitle on row 2, then header and data rows.
fn write_section(sheet: &mut Worksheet, section: &Section, formats: &ReportFormats) -> Result<()> {
    sheet.set_name(section.kind.sheet_name())?;

    if section.columns.len() > 1 {
        let last_col = (section.columns.len() - 1) as u16;
        sheet.merge_range(0, 0, 0, last_col, &section.title, &formats.title)?;
    } else {
        sheet.write_string_with_format(0, 0, &section.title, &formats.title)?;
    }

    let mut header_row: u32 = 2;
    if let Some(subtitle) = &section.subtitle {
        sheet.write_string_with_format(2, 0, subtitle, &formats.subtitle)?;
        header_row = 3;
    }

    if section.columns.is_empty() {
        return Ok(());
    }

    for (col, column) in section.columns.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(header_row, col, &column.label, &formats.header)?;
        sheet.set_column_width(col, column.width)?;
    }

    for (offset, row) in section.rows.iter().enumerate() {
        let row_num = header_row + 1 + offset as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            let format = formats.for_cell(cell.role, section.wrap_text);
            match &cell.value {
                CellValue::Number(value) => {
                    sheet.write_number_with_format(row_num, col, *value, format)?
                }
                CellValue::Text(text) => sheet.write_string_with_format(row_num, col, text, format)?,
                CellValue::Empty => sheet.write_blank(row_num, col, format)?,
            };
        }
        if let Some(height) = section.row_height {
            sheet.set_row_height(row_num, height)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BudgetRecord, BudgetTable, PeriodKey};
    use crate::PacAnalyzer;
    use chrono::NaiveDate;

    #[test]
    fn test_report_file_name() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(report_file_name(at), "ANALISIS_PAC_20250307_140509.xlsx");
    }

    #[test]
    fn test_workbook_bytes_are_zip() {
        let table = BudgetTable::from_records(vec![
            BudgetRecord::new("A", PeriodKey::Code(202401), 100.0, 50.0).with_fund_type("SGP"),
            BudgetRecord::new("B", PeriodKey::Code(202402), 200.0, 250.0).with_fund_type("SGP"),
        ]);
        let result = PacAnalyzer::default().analyze_table(&table, Vec::new()).unwrap();
        let bytes = Report::from_analysis(&result).to_xlsx_bytes().unwrap();

        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }
}
