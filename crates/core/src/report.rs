use chrono::Datelike;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, XlsxError};

use crate::domain::{AggregatedRow, DateRange, ReportPayload};
use crate::errors::RenderError;

const COLUMN_TITLES: [&str; 4] = ["Item", "Quantity", "Unit", "Requested by"];

/// Renders aggregated rows into a deliverable file payload. Trait seam so the
/// pipeline can be exercised with a failing sink in tests.
pub trait RenderReport: Send + Sync {
    fn render(
        &self,
        rows: &[AggregatedRow],
        range: &DateRange,
    ) -> Result<ReportPayload, RenderError>;
}

/// Workbook renderer. Output is byte-reproducible for a given range: the
/// embedded document creation date is pinned to the range start rather than
/// the render wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct XlsxReportRenderer;

impl RenderReport for XlsxReportRenderer {
    fn render(
        &self,
        rows: &[AggregatedRow],
        range: &DateRange,
    ) -> Result<ReportPayload, RenderError> {
        let bytes = build_workbook(rows, range).map_err(|err| RenderError::Sink(err.to_string()))?;
        Ok(ReportPayload {
            filename: format!("kitchen-orders-{}.xlsx", range.start.format("%Y-%m-%d")),
            bytes,
            row_count: rows.len(),
        })
    }
}

fn build_workbook(rows: &[AggregatedRow], range: &DateRange) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let created = ExcelDateTime::from_ymd(
        range.start.year() as u16,
        range.start.month() as u8,
        range.start.day() as u8,
    )?;
    workbook.set_properties(&DocProperties::new().set_creation_datetime(&created));

    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();

    for (column, title) in COLUMN_TITLES.iter().enumerate() {
        worksheet.write_string_with_format(0, column as u16, *title, &bold)?;
    }

    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        worksheet.write_string(line, 0, &row.name)?;
        if let Some(quantity) = row.total_quantity {
            match quantity.to_f64() {
                Some(value) => {
                    worksheet.write_number(line, 1, value)?;
                }
                None => {
                    worksheet.write_string(line, 1, quantity.to_string())?;
                }
            }
        }
        if let Some(unit) = &row.unit {
            worksheet.write_string(line, 2, unit)?;
        }
        worksheet.write_string(line, 3, row.requesters.join(", "))?;
    }

    worksheet.autofit();
    workbook.save_to_buffer()
}
