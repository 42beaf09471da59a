//! Excel export of checklists
//!
//! The workbook layout comes from a TOML cell template on local disk:
//!
//! ```toml
//! sheet_name = "Checklists"
//! title = "Checklist verification report"
//! title_cell = "A1"
//! range_cell = "A2"
//! header_cell = "A4"
//!
//! [[columns]]
//! header = "Date"
//! field = "date"
//! ```
//!
//! Data rows start directly below the header row. The built-in layout is
//! used when the template file does not exist.

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

use qv_common::approval::ApprovalStatus;
use qv_common::tolerance::ToleranceTable;
use qv_common::{Error, Result};

use crate::db::checklists::{self, ChecklistListing};

const PASS_FILL: u32 = 0xC6EFCE;
const PASS_FONT: u32 = 0x006100;
const FAIL_FILL: u32 = 0xFFC7CE;
const FAIL_FONT: u32 = 0x9C0006;

/// Excel row limit (1-based)
const MAX_ROW: u32 = 1_048_576;
/// Excel column limit (XFD)
const MAX_COLUMN: u32 = 16_384;

/// Value written into an export column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportField {
    Date,
    Shift,
    Operator,
    Model,
    Line,
    Machine,
    Status,
    LinePressure,
    UvFlowInputPressure,
    TestPressureVacuum,
    UvFlowValue,
    Subgroups,
    SupervisorApprovedAt,
    QualityApprovedAt,
    RejectionReason,
}

impl ExportField {
    /// Tolerance field checked for numeric columns
    fn tolerance_field(&self) -> Option<&'static str> {
        match self {
            ExportField::LinePressure => Some("line_pressure"),
            ExportField::UvFlowInputPressure => Some("uv_flow_input_pressure"),
            ExportField::TestPressureVacuum => Some("test_pressure_vacuum"),
            ExportField::UvFlowValue => Some("uv_flow_value"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExportColumn {
    pub header: String,
    pub field: ExportField,
}

/// Cell layout of the checklist export
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportTemplate {
    pub sheet_name: String,
    pub title: String,
    pub title_cell: String,
    pub range_cell: String,
    pub header_cell: String,
    pub columns: Vec<ExportColumn>,
}

impl Default for ExportTemplate {
    fn default() -> Self {
        let column = |header: &str, field| ExportColumn {
            header: header.to_string(),
            field,
        };
        Self {
            sheet_name: "Checklists".to_string(),
            title: "Checklist verification report".to_string(),
            title_cell: "A1".to_string(),
            range_cell: "A2".to_string(),
            header_cell: "A4".to_string(),
            columns: vec![
                column("Date", ExportField::Date),
                column("Shift", ExportField::Shift),
                column("Operator", ExportField::Operator),
                column("Model", ExportField::Model),
                column("Line", ExportField::Line),
                column("Machine", ExportField::Machine),
                column("Line pressure (bar)", ExportField::LinePressure),
                column("UV flow input (kPa)", ExportField::UvFlowInputPressure),
                column("Test pressure (MPa)", ExportField::TestPressureVacuum),
                column("UV flow (LPM)", ExportField::UvFlowValue),
                column("Subgroups", ExportField::Subgroups),
                column("Status", ExportField::Status),
                column("Rejection reason", ExportField::RejectionReason),
            ],
        }
    }
}

impl ExportTemplate {
    pub fn from_toml(content: &str) -> Result<Self> {
        let template: ExportTemplate =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        template.validate()?;
        Ok(template)
    }

    /// Read the template, falling back to the built-in layout when absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No export template, using built-in layout");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::Config("Export template has no columns".to_string()));
        }
        parse_cell(&self.title_cell)?;
        parse_cell(&self.range_cell)?;
        let (row, col) = parse_cell(&self.header_cell)?;
        if col as usize + self.columns.len() > MAX_COLUMN as usize {
            return Err(Error::Config(
                "Export columns run past the last sheet column".to_string(),
            ));
        }
        if row + 1 >= MAX_ROW {
            return Err(Error::Config("Header row leaves no room for data".to_string()));
        }
        Ok(())
    }
}

/// Parse an A1-style reference into zero-based (row, column)
pub fn parse_cell(reference: &str) -> Result<(u32, u16)> {
    let invalid = || Error::Config(format!("Invalid cell reference '{}'", reference));
    let reference = reference.trim();
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    let mut column: u32 = 0;
    for c in letters.chars() {
        let value = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        column = column * 26 + value;
        if column > MAX_COLUMN {
            return Err(invalid());
        }
    }
    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 || row > MAX_ROW {
        return Err(invalid());
    }

    Ok((row - 1, (column - 1) as u16))
}

fn xlsx_error(err: XlsxError) -> Error {
    Error::Internal(format!("Excel export failed: {}", err))
}

struct Formats {
    title: Format,
    header: Format,
    cell: Format,
    pass: Format,
    fail: Format,
}

impl Formats {
    fn new() -> Self {
        let cell = Format::new().set_border(FormatBorder::Thin);
        Self {
            title: Format::new().set_bold().set_font_size(14),
            header: Format::new()
                .set_bold()
                .set_border(FormatBorder::Thin)
                .set_background_color(Color::RGB(0xD9D9D9)),
            pass: cell
                .clone()
                .set_background_color(Color::RGB(PASS_FILL))
                .set_font_color(Color::RGB(PASS_FONT)),
            fail: cell
                .clone()
                .set_background_color(Color::RGB(FAIL_FILL))
                .set_font_color(Color::RGB(FAIL_FONT)),
            cell,
        }
    }
}

fn numeric_value(listing: &ChecklistListing, field: ExportField) -> Option<f64> {
    let readings = &listing.checklist.readings;
    match field {
        ExportField::LinePressure => readings.line_pressure,
        ExportField::UvFlowInputPressure => readings.uv_flow_input_pressure,
        ExportField::TestPressureVacuum => readings.test_pressure_vacuum,
        ExportField::UvFlowValue => readings.uv_flow_value,
        _ => None,
    }
}

fn text_value(listing: &ChecklistListing, field: ExportField) -> String {
    let checklist = &listing.checklist;
    let stamp = |at: Option<chrono::NaiveDateTime>| {
        at.map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    };
    match field {
        ExportField::Date => listing.date.to_string(),
        ExportField::Shift => listing.shift.clone(),
        ExportField::Operator => listing.operator.clone(),
        ExportField::Model => checklist.model.clone(),
        ExportField::Line => checklist.line.clone(),
        ExportField::Machine => checklist.machine.clone(),
        ExportField::Status => checklist.approval.status.as_str().to_string(),
        ExportField::Subgroups => listing.subgroup_count.to_string(),
        ExportField::SupervisorApprovedAt => {
            stamp(checklist.approval.supervisor.as_ref().map(|s| s.at))
        }
        ExportField::QualityApprovedAt => stamp(checklist.approval.quality.as_ref().map(|s| s.at)),
        ExportField::RejectionReason => checklist
            .approval
            .rejection
            .as_ref()
            .map(|r| r.reason.clone())
            .unwrap_or_default(),
        ExportField::LinePressure
        | ExportField::UvFlowInputPressure
        | ExportField::TestPressureVacuum
        | ExportField::UvFlowValue => String::new(),
    }
}

fn write_row(
    worksheet: &mut Worksheet,
    row: u32,
    first_col: u16,
    template: &ExportTemplate,
    listing: &ChecklistListing,
    tolerances: &ToleranceTable,
    formats: &Formats,
) -> std::result::Result<(), XlsxError> {
    for (offset, column) in template.columns.iter().enumerate() {
        let col = first_col + offset as u16;

        if let Some(tolerance_field) = column.field.tolerance_field() {
            match numeric_value(listing, column.field) {
                Some(value) => {
                    let format = match tolerances.get(tolerance_field) {
                        Some(spec) if spec.contains(value) => &formats.pass,
                        Some(_) => &formats.fail,
                        None => &formats.cell,
                    };
                    worksheet.write_number_with_format(row, col, value, format)?;
                }
                None => {
                    worksheet.write_blank(row, col, &formats.cell)?;
                }
            }
            continue;
        }

        let format = match (column.field, listing.checklist.approval.status) {
            (ExportField::Status, ApprovalStatus::QualityApproved) => &formats.pass,
            (ExportField::Status, ApprovalStatus::Rejected) => &formats.fail,
            _ => &formats.cell,
        };
        worksheet.write_string_with_format(row, col, text_value(listing, column.field), format)?;
    }
    Ok(())
}

/// Render listings into an xlsx workbook
pub fn render(
    template: &ExportTemplate,
    listings: &[ChecklistListing],
    tolerances: &ToleranceTable,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<u8>> {
    let (title_row, title_col) = parse_cell(&template.title_cell)?;
    let (range_row, range_col) = parse_cell(&template.range_cell)?;
    let (header_row, first_col) = parse_cell(&template.header_cell)?;
    let formats = Formats::new();

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&template.sheet_name).map_err(xlsx_error)?;
    worksheet
        .write_string_with_format(title_row, title_col, &template.title, &formats.title)
        .map_err(xlsx_error)?;
    worksheet
        .write_string(range_row, range_col, format!("{} to {}", from, to))
        .map_err(xlsx_error)?;

    for (offset, column) in template.columns.iter().enumerate() {
        let col = first_col + offset as u16;
        worksheet
            .write_string_with_format(header_row, col, &column.header, &formats.header)
            .map_err(xlsx_error)?;
        let width = column.header.chars().count().max(10) as f64 + 2.0;
        worksheet.set_column_width(col, width).map_err(xlsx_error)?;
    }

    for (index, listing) in listings.iter().enumerate() {
        let row = header_row + 1 + index as u32;
        if row >= MAX_ROW {
            return Err(Error::InvalidInput(
                "Too many checklists for one sheet; narrow the date range".to_string(),
            ));
        }
        write_row(worksheet, row, first_col, template, listing, tolerances, &formats)
            .map_err(xlsx_error)?;
    }

    workbook.save_to_buffer().map_err(xlsx_error)
}

/// Build the checklist workbook for `[from, to]`
pub async fn export_checklists(
    pool: &SqlitePool,
    template_path: &Path,
    tolerances: &ToleranceTable,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<u8>> {
    if from > to {
        return Err(Error::InvalidInput(format!(
            "Export range starts after it ends ({} > {})",
            from, to
        )));
    }
    let template = ExportTemplate::load_or_default(template_path)?;

    let listings = {
        let mut conn = pool.acquire().await?;
        checklists::list_in_range(&mut conn, from, to).await?
    };
    let bytes = render(&template, &listings, tolerances, from, to)?;

    info!(
        from = %from,
        to = %to,
        rows = listings.len(),
        bytes = bytes.len(),
        "Checklist export generated"
    );
    Ok(bytes)
}
